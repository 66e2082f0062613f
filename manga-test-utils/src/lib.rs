//! Manga Test Utilities
//!
//! Shared test infrastructure for the workspace:
//! - Proptest generators for catalog entities and stats periods
//! - Fixtures and a seeded in-memory catalog
//! - Assertions over error kinds

pub use manga_storage::{InMemoryCatalog, InMemoryKvStore};

pub use manga_core::{
    Chapter, EntityId, EntityKind, ErrorKind, Manga, MangaError, MangaResult, MangaStatus,
    NewChapter, NewManga, NewPage, NewUser, Page, Role, StatsPeriod, SubjectKind, Timestamp,
    User, UserRegistration,
};

use chrono::Utc;

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for catalog types.

    use super::*;
    use proptest::prelude::*;

    /// Store-assigned ids are positive.
    pub fn arb_entity_id() -> impl Strategy<Value = EntityId> {
        1i64..1_000_000
    }

    /// Timestamps between 2020 and 2030.
    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        (1577836800i64..1893456000i64).prop_map(|secs| {
            chrono::DateTime::from_timestamp(secs, 0).unwrap_or_else(Utc::now)
        })
    }

    pub fn arb_entity_kind() -> impl Strategy<Value = EntityKind> {
        prop_oneof![
            Just(EntityKind::Manga),
            Just(EntityKind::Chapter),
            Just(EntityKind::Page),
            Just(EntityKind::User),
        ]
    }

    pub fn arb_subject_kind() -> impl Strategy<Value = SubjectKind> {
        prop::sample::select(SubjectKind::ALL.to_vec())
    }

    pub fn arb_stats_period() -> impl Strategy<Value = StatsPeriod> {
        prop::sample::select(StatsPeriod::ALL.to_vec())
    }

    pub fn arb_manga_status() -> impl Strategy<Value = MangaStatus> {
        prop_oneof![
            Just(MangaStatus::Ongoing),
            Just(MangaStatus::Completed),
            Just(MangaStatus::Hiatus),
        ]
    }

    pub fn arb_role() -> impl Strategy<Value = Role> {
        prop_oneof![Just(Role::User), Just(Role::Admin)]
    }

    pub fn arb_username() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9_]{3,20}"
    }

    pub fn arb_manga() -> impl Strategy<Value = Manga> {
        (
            arb_entity_id(),
            "[A-Za-z ]{1,40}",
            arb_manga_status(),
            prop::collection::vec("[a-z]{3,10}", 0..4),
            arb_timestamp(),
        )
            .prop_map(|(id, title, status, mut genres, created_at)| {
                genres.sort();
                genres.dedup();
                Manga {
                    id,
                    title: format!("M{}", title),
                    description: String::new(),
                    cover_image: String::new(),
                    status,
                    author: String::new(),
                    artist: String::new(),
                    genres,
                    created_at,
                    updated_at: created_at,
                }
            })
    }

    pub fn arb_user() -> impl Strategy<Value = User> {
        (arb_entity_id(), arb_username(), arb_role(), arb_timestamp()).prop_map(
            |(id, username, role, created_at)| User {
                id,
                email: format!("{}@example.com", username.to_lowercase()),
                username,
                password_hash: String::new(),
                role,
                created_at,
                updated_at: created_at,
            },
        )
    }

    /// A sequence of view targets drawn from a small id pool, so rankings
    /// contain repeats and ties.
    pub fn arb_view_sequence() -> impl Strategy<Value = Vec<EntityId>> {
        prop::collection::vec(1i64..12, 0..80)
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Ready-made catalog inputs.

    use super::*;
    use manga_storage::{ChapterRepository, MangaRepository, PageRepository};

    pub fn new_manga(title: &str) -> NewManga {
        NewManga {
            title: title.to_string(),
            description: format!("{} description", title),
            author: "Author".to_string(),
            genres: vec!["action".to_string()],
            ..NewManga::default()
        }
    }

    pub fn new_chapter(manga_id: EntityId, number: f64) -> NewChapter {
        NewChapter {
            manga_id,
            number,
            title: format!("Chapter {}", number),
        }
    }

    pub fn new_page(chapter_id: EntityId, number: i32) -> NewPage {
        NewPage {
            chapter_id,
            number,
            image_path: format!("pages/{}/{}.png", chapter_id, number),
        }
    }

    pub fn registration(username: &str) -> UserRegistration {
        UserRegistration {
            username: username.to_string(),
            email: format!("{}@example.com", username),
            password: "correct-horse".to_string(),
        }
    }

    /// Catalog rows created by [`seed_catalog`].
    #[derive(Debug, Clone)]
    pub struct SeededCatalog {
        pub manga: Manga,
        pub chapters: Vec<Chapter>,
        pub pages: Vec<Page>,
    }

    /// One manga with two chapters of three pages each.
    pub async fn seed_catalog(catalog: &InMemoryCatalog) -> MangaResult<SeededCatalog> {
        let manga = MangaRepository::create(catalog, new_manga("Blue Harbor")).await?;
        let mut chapters = Vec::new();
        let mut pages = Vec::new();
        for number in 1..=2 {
            let chapter =
                ChapterRepository::create(catalog, new_chapter(manga.id, f64::from(number)))
                    .await?;
            for page_number in 1..=3 {
                pages.push(PageRepository::create(catalog, new_page(chapter.id, page_number)).await?);
            }
            chapters.push(chapter);
        }
        Ok(SeededCatalog {
            manga,
            chapters,
            pages,
        })
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions over [`MangaError`] kinds.

    use super::*;

    pub fn assert_kind<T: std::fmt::Debug>(result: &MangaResult<T>, kind: ErrorKind) {
        match result {
            Err(e) => assert_eq!(e.kind(), kind, "unexpected error: {:?}", e),
            Ok(value) => panic!("expected {:?} error, got Ok({:?})", kind, value),
        }
    }

    pub fn assert_not_found<T: std::fmt::Debug>(result: &MangaResult<T>, entity: EntityKind) {
        match result {
            Err(MangaError::NotFound { entity: actual, .. }) => assert_eq!(*actual, entity),
            other => panic!("expected {} not found, got {:?}", entity, other),
        }
    }
}
