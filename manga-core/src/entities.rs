//! Catalog entity types and request payloads

use crate::{EntityId, MangaStatus, Role, Timestamp, ValidationError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static USERNAME_RE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_]+$").ok());
static EMAIL_RE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9._%+\-]+@[a-zA-Z0-9.\-]+\.[a-zA-Z]{2,}$").ok());

const USERNAME_MIN: usize = 3;
const USERNAME_MAX: usize = 50;
const PASSWORD_MIN: usize = 6;

/// Default page size for list queries.
pub const DEFAULT_LIST_LIMIT: i64 = 20;
/// Upper bound on page size for list queries.
pub const MAX_LIST_LIMIT: i64 = 100;

// ============================================================================
// MANGA
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manga {
    pub id: EntityId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub cover_image: String,
    pub status: MangaStatus,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub genres: Vec<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewManga {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub cover_image: String,
    #[serde(default)]
    pub status: MangaStatus,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub genres: Vec<String>,
}

impl NewManga {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_blank("title", &self.title)
    }
}

/// Partial manga update; `None` fields keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MangaUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub cover_image: Option<String>,
    pub status: Option<MangaStatus>,
    pub author: Option<String>,
    pub artist: Option<String>,
    /// Replaces the full genre set when present.
    pub genres: Option<Vec<String>>,
}

impl MangaUpdate {
    pub fn validate(&self) -> Result<(), ValidationError> {
        match &self.title {
            Some(title) => require_non_blank("title", title),
            None => Ok(()),
        }
    }

    pub fn apply(self, manga: &mut Manga) {
        if let Some(title) = self.title {
            manga.title = title;
        }
        if let Some(description) = self.description {
            manga.description = description;
        }
        if let Some(cover_image) = self.cover_image {
            manga.cover_image = cover_image;
        }
        if let Some(status) = self.status {
            manga.status = status;
        }
        if let Some(author) = self.author {
            manga.author = author;
        }
        if let Some(artist) = self.artist {
            manga.artist = artist;
        }
        if let Some(mut genres) = self.genres {
            genres.sort();
            genres.dedup();
            manga.genres = genres;
        }
    }
}

/// List query for manga. Only an unfiltered query is cacheable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MangaFilter {
    pub title: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    pub status: Option<MangaStatus>,
    #[serde(default)]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

impl MangaFilter {
    pub fn page(limit: i64, offset: i64) -> Self {
        Self {
            limit,
            offset,
            ..Self::default()
        }
        .normalized()
    }

    /// True when no title, status, or genre filter is active.
    pub fn is_unfiltered(&self) -> bool {
        self.title.as_deref().map_or(true, |t| t.trim().is_empty())
            && self.status.is_none()
            && self.genres.is_empty()
    }

    /// Clamp pagination into the accepted range.
    pub fn normalized(mut self) -> Self {
        if self.limit <= 0 {
            self.limit = DEFAULT_LIST_LIMIT;
        }
        self.limit = self.limit.min(MAX_LIST_LIMIT);
        self.offset = self.offset.max(0);
        self
    }

    pub fn matches(&self, manga: &Manga) -> bool {
        if let Some(title) = self.title.as_deref().filter(|t| !t.trim().is_empty()) {
            if !manga.title.to_lowercase().contains(&title.to_lowercase()) {
                return false;
            }
        }
        if let Some(status) = self.status {
            if manga.status != status {
                return false;
            }
        }
        // Any listed genre matches.
        self.genres.is_empty() || self.genres.iter().any(|g| manga.genres.contains(g))
    }
}

// ============================================================================
// CHAPTER
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: EntityId,
    pub manga_id: EntityId,
    pub number: f64,
    #[serde(default)]
    pub title: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewChapter {
    pub manga_id: EntityId,
    pub number: f64,
    pub title: String,
}

impl NewChapter {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_positive_id("manga_id", self.manga_id)?;
        require_non_blank("title", &self.title)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChapterUpdate {
    pub number: Option<f64>,
    pub title: Option<String>,
}

impl ChapterUpdate {
    pub fn validate(&self) -> Result<(), ValidationError> {
        match &self.title {
            Some(title) => require_non_blank("title", title),
            None => Ok(()),
        }
    }

    pub fn apply(self, chapter: &mut Chapter) {
        if let Some(number) = self.number {
            chapter.number = number;
        }
        if let Some(title) = self.title {
            chapter.title = title;
        }
    }
}

// ============================================================================
// PAGE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub id: EntityId,
    pub chapter_id: EntityId,
    pub number: i32,
    pub image_path: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPage {
    pub chapter_id: EntityId,
    pub number: i32,
    pub image_path: String,
}

impl NewPage {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_positive_id("chapter_id", self.chapter_id)?;
        require_non_blank("image_path", &self.image_path)
    }
}

/// Page update. Moving a page to another chapter is allowed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageUpdate {
    pub chapter_id: Option<EntityId>,
    pub number: Option<i32>,
    pub image_path: Option<String>,
}

impl PageUpdate {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(chapter_id) = self.chapter_id {
            require_positive_id("chapter_id", chapter_id)?;
        }
        match &self.image_path {
            Some(path) => require_non_blank("image_path", path),
            None => Ok(()),
        }
    }

    pub fn apply(self, page: &mut Page) {
        if let Some(chapter_id) = self.chapter_id {
            page.chapter_id = chapter_id;
        }
        if let Some(number) = self.number {
            page.number = number;
        }
        if let Some(image_path) = self.image_path {
            page.image_path = image_path;
        }
    }
}

// ============================================================================
// USER
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: EntityId,
    pub username: String,
    pub email: String,
    /// PHC-formatted password hash. Never serialized.
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: Role,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRegistration {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl UserRegistration {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_username(&self.username)?;
        validate_email(&self.email)?;
        validate_password("password", &self.password)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCredentials {
    /// Username or email.
    pub username: String,
    pub password: String,
}

impl UserCredentials {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_blank("username", &self.username)?;
        require_non_blank("password", &self.password)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub username: String,
    pub email: String,
}

impl ProfileUpdate {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_username(&self.username)?;
        validate_email(&self.email)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordChange {
    pub old_password: String,
    pub new_password: String,
}

/// Data needed to insert a user; the password is already hashed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

// ============================================================================
// STATS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MangaStat {
    pub manga_id: EntityId,
    pub title: String,
    pub views: i64,
}

/// A chapter together with its lifetime view count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterWithStats {
    #[serde(flatten)]
    pub chapter: Chapter,
    pub views: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterStat {
    pub chapter_id: EntityId,
    pub manga_id: EntityId,
    pub number: f64,
    pub title: String,
    pub views: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageStat {
    pub page_id: EntityId,
    pub chapter_id: EntityId,
    pub number: i32,
    pub views: i64,
}

// ============================================================================
// VALIDATION HELPERS
// ============================================================================

fn require_non_blank(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::RequiredFieldMissing {
            field: field.to_string(),
        });
    }
    Ok(())
}

fn require_positive_id(field: &str, id: EntityId) -> Result<(), ValidationError> {
    if id <= 0 {
        return Err(ValidationError::InvalidValue {
            field: field.to_string(),
            reason: "must be a positive id".to_string(),
        });
    }
    Ok(())
}

fn matches_pattern(re: &Lazy<Option<Regex>>, value: &str) -> bool {
    re.as_ref().is_some_and(|re| re.is_match(value))
}

pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    let len = username.chars().count();
    if !(USERNAME_MIN..=USERNAME_MAX).contains(&len) {
        return Err(ValidationError::InvalidLength {
            field: "username".to_string(),
            min: USERNAME_MIN,
            max: USERNAME_MAX,
        });
    }
    if !matches_pattern(&USERNAME_RE, username) {
        return Err(ValidationError::InvalidValue {
            field: "username".to_string(),
            reason: "may contain only letters, digits and underscore".to_string(),
        });
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if !matches_pattern(&EMAIL_RE, email) {
        return Err(ValidationError::InvalidValue {
            field: "email".to_string(),
            reason: "not a valid email address".to_string(),
        });
    }
    Ok(())
}

pub fn validate_password(field: &str, password: &str) -> Result<(), ValidationError> {
    if password.chars().count() < PASSWORD_MIN {
        return Err(ValidationError::InvalidValue {
            field: field.to_string(),
            reason: format!("must be at least {} characters", PASSWORD_MIN),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration(username: &str, email: &str, password: &str) -> UserRegistration {
        UserRegistration {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn test_registration_accepts_valid_input() {
        assert!(registration("reader_1", "reader@example.com", "secret1")
            .validate()
            .is_ok());
    }

    #[test]
    fn test_registration_rejects_bad_fields() {
        assert!(matches!(
            registration("ab", "reader@example.com", "secret1").validate(),
            Err(ValidationError::InvalidLength { .. })
        ));
        assert!(registration("bad name", "reader@example.com", "secret1")
            .validate()
            .is_err());
        assert!(registration("reader", "not-an-email", "secret1")
            .validate()
            .is_err());
        assert!(registration("reader", "reader@example.com", "12345")
            .validate()
            .is_err());
    }

    #[test]
    fn test_filter_cacheability() {
        assert!(MangaFilter::page(20, 0).is_unfiltered());
        let filtered = MangaFilter {
            genres: vec!["action".to_string()],
            ..MangaFilter::default()
        };
        assert!(!filtered.is_unfiltered());
        let blank_title = MangaFilter {
            title: Some("  ".to_string()),
            ..MangaFilter::default()
        };
        assert!(blank_title.is_unfiltered());
    }

    #[test]
    fn test_filter_matching() {
        let now = chrono::Utc::now();
        let manga = Manga {
            id: 1,
            title: "Blue Harbor".to_string(),
            description: String::new(),
            cover_image: String::new(),
            status: MangaStatus::Ongoing,
            author: String::new(),
            artist: String::new(),
            genres: vec!["drama".to_string(), "sea".to_string()],
            created_at: now,
            updated_at: now,
        };
        let by_title = MangaFilter {
            title: Some("harbor".to_string()),
            ..MangaFilter::default()
        };
        assert!(by_title.matches(&manga));

        let any_genre = MangaFilter {
            genres: vec!["action".to_string(), "sea".to_string()],
            ..MangaFilter::default()
        };
        assert!(any_genre.matches(&manga));

        let wrong_status = MangaFilter {
            status: Some(MangaStatus::Completed),
            ..MangaFilter::default()
        };
        assert!(!wrong_status.matches(&manga));
    }

    #[test]
    fn test_filter_normalization() {
        let filter = MangaFilter::page(0, -5);
        assert_eq!(filter.limit, DEFAULT_LIST_LIMIT);
        assert_eq!(filter.offset, 0);
        assert_eq!(MangaFilter::page(1000, 3).limit, MAX_LIST_LIMIT);
    }

    #[test]
    fn test_chapter_and_page_validation() {
        let chapter = NewChapter {
            manga_id: 0,
            number: 1.0,
            title: "Start".to_string(),
        };
        assert!(chapter.validate().is_err());

        let page = NewPage {
            chapter_id: 7,
            number: 1,
            image_path: String::new(),
        };
        assert!(matches!(
            page.validate(),
            Err(ValidationError::RequiredFieldMissing { .. })
        ));
    }

    #[test]
    fn test_password_hash_not_serialized() -> Result<(), serde_json::Error> {
        let user = User {
            id: 1,
            username: "reader".to_string(),
            email: "reader@example.com".to_string(),
            password_hash: "$argon2id$v=19$secret".to_string(),
            role: Role::User,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        let json = serde_json::to_string(&user)?;
        assert!(!json.contains("argon2id"));
        assert!(!json.contains("password"));
        Ok(())
    }
}
