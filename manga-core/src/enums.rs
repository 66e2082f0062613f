//! Enum types for catalog entities

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

// ============================================================================
// ENTITY KINDS
// ============================================================================

/// Entity type discriminator used in cache keys and error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Manga,
    Chapter,
    Page,
    User,
}

impl EntityKind {
    /// Stable lowercase name, used verbatim in cache keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Manga => "manga",
            EntityKind::Chapter => "chapter",
            EntityKind::Page => "page",
            EntityKind::User => "user",
        }
    }

    /// Parse from the stable lowercase name.
    pub fn from_name(s: &str) -> Option<Self> {
        match s {
            "manga" => Some(EntityKind::Manga),
            "chapter" => Some(EntityKind::Chapter),
            "page" => Some(EntityKind::Page),
            "user" => Some(EntityKind::User),
            _ => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| ParseEnumError::new("entity kind", s))
    }
}

/// Entities that can be viewed and ranked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectKind {
    Manga,
    Chapter,
    Page,
}

impl SubjectKind {
    pub const ALL: [SubjectKind; 3] = [SubjectKind::Manga, SubjectKind::Chapter, SubjectKind::Page];

    pub fn as_str(&self) -> &'static str {
        self.entity_kind().as_str()
    }

    pub fn entity_kind(&self) -> EntityKind {
        match self {
            SubjectKind::Manga => EntityKind::Manga,
            SubjectKind::Chapter => EntityKind::Chapter,
            SubjectKind::Page => EntityKind::Page,
        }
    }
}

impl fmt::Display for SubjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubjectKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manga" => Ok(SubjectKind::Manga),
            "chapter" => Ok(SubjectKind::Chapter),
            "page" => Ok(SubjectKind::Page),
            other => Err(ParseEnumError::new("subject kind", other)),
        }
    }
}

// ============================================================================
// STATS PERIOD
// ============================================================================

/// Ranking bucket. Each period is an independent counter set that is
/// cleared only by an explicit reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatsPeriod {
    Daily,
    #[default]
    Weekly,
    Monthly,
    AllTime,
}

impl StatsPeriod {
    pub const ALL: [StatsPeriod; 4] = [
        StatsPeriod::Daily,
        StatsPeriod::Weekly,
        StatsPeriod::Monthly,
        StatsPeriod::AllTime,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StatsPeriod::Daily => "daily",
            StatsPeriod::Weekly => "weekly",
            StatsPeriod::Monthly => "monthly",
            StatsPeriod::AllTime => "all_time",
        }
    }

    /// Cache lifetime for a leaderboard built from this period.
    pub fn popular_ttl(&self) -> Duration {
        match self {
            StatsPeriod::Daily => Duration::from_secs(60 * 60),
            StatsPeriod::Weekly => Duration::from_secs(4 * 60 * 60),
            StatsPeriod::Monthly => Duration::from_secs(12 * 60 * 60),
            StatsPeriod::AllTime => Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl fmt::Display for StatsPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatsPeriod {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(StatsPeriod::Daily),
            "weekly" => Ok(StatsPeriod::Weekly),
            "monthly" => Ok(StatsPeriod::Monthly),
            "all_time" => Ok(StatsPeriod::AllTime),
            other => Err(ParseEnumError::new("stats period", other)),
        }
    }
}

// ============================================================================
// STATUS AND ROLE
// ============================================================================

/// Publication status of a manga.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MangaStatus {
    #[default]
    Ongoing,
    Completed,
    Hiatus,
}

impl MangaStatus {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            MangaStatus::Ongoing => "ongoing",
            MangaStatus::Completed => "completed",
            MangaStatus::Hiatus => "hiatus",
        }
    }
}

impl fmt::Display for MangaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_db_str())
    }
}

impl FromStr for MangaStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ongoing" => Ok(MangaStatus::Ongoing),
            "completed" => Ok(MangaStatus::Completed),
            "hiatus" => Ok(MangaStatus::Hiatus),
            other => Err(ParseEnumError::new("manga status", other)),
        }
    }
}

/// Account role carried in access tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_db_str())
    }
}

impl FromStr for Role {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(ParseEnumError::new("role", other)),
        }
    }
}

/// Error when parsing an unknown enum name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid {}: {}", self.kind, self.value)
    }
}

impl std::error::Error for ParseEnumError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_period_names_round_trip() {
        for period in StatsPeriod::ALL {
            assert_eq!(period.as_str().parse::<StatsPeriod>(), Ok(period));
        }
        assert!("yearly".parse::<StatsPeriod>().is_err());
    }

    #[test]
    fn test_popular_ttl_grows_with_period() {
        assert_eq!(StatsPeriod::Daily.popular_ttl(), Duration::from_secs(3600));
        assert_eq!(StatsPeriod::Weekly.popular_ttl(), Duration::from_secs(4 * 3600));
        assert_eq!(StatsPeriod::Monthly.popular_ttl(), Duration::from_secs(12 * 3600));
        assert_eq!(StatsPeriod::AllTime.popular_ttl(), Duration::from_secs(24 * 3600));
    }

    #[test]
    fn test_all_time_serializes_snake_case() -> Result<(), serde_json::Error> {
        let json = serde_json::to_string(&StatsPeriod::AllTime)?;
        assert_eq!(json, "\"all_time\"");
        Ok(())
    }

    #[test]
    fn test_subject_kind_maps_to_entity_kind() {
        assert_eq!(SubjectKind::Chapter.entity_kind(), EntityKind::Chapter);
        assert_eq!(SubjectKind::Page.as_str(), "page");
    }
}
