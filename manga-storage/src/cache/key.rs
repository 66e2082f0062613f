//! Typed cache keys.
//!
//! Every cached value is addressed by a [`CacheKey`]. The string form is a
//! stable contract shared with any process reading the same store:
//!
//! | Variant    | Encoded form                          | Example                    |
//! |------------|---------------------------------------|----------------------------|
//! | `Item`     | `<kind>:<id>`                         | `manga:42`                 |
//! | `Children` | `<parent>:<id>:<collection>`          | `manga:42:chapters`        |
//! | `List`     | `<kind>:list:<limit>:<offset>`        | `manga:list:20:0`          |
//! | `Popular`  | `<kind>:popular:<period>:<limit>`     | `manga:popular:weekly:10`  |
//!
//! Decoding is strict: only the canonical rendering of a key parses, so no
//! two distinct strings decode to the same key.

use std::fmt;
use std::str::FromStr;

use manga_core::{EntityId, EntityKind, StatsPeriod};

use crate::error::CacheError;

const LIST_SEGMENT: &str = "list";
const POPULAR_SEGMENT: &str = "popular";

/// Child collection cached under a parent entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChildCollection {
    Chapters,
    Pages,
}

impl ChildCollection {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChildCollection::Chapters => "chapters",
            ChildCollection::Pages => "pages",
        }
    }

    fn from_name(s: &str) -> Option<Self> {
        match s {
            "chapters" => Some(ChildCollection::Chapters),
            "pages" => Some(ChildCollection::Pages),
            _ => None,
        }
    }
}

/// Address of one cached value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// A single entity.
    Item { kind: EntityKind, id: EntityId },
    /// A collection nested under a parent entity.
    Children {
        parent: EntityKind,
        id: EntityId,
        collection: ChildCollection,
    },
    /// One page of an unfiltered listing.
    List {
        kind: EntityKind,
        limit: i64,
        offset: i64,
    },
    /// A leaderboard for one period.
    Popular {
        kind: EntityKind,
        period: StatsPeriod,
        limit: i64,
    },
}

impl CacheKey {
    pub fn item(kind: EntityKind, id: EntityId) -> Self {
        CacheKey::Item { kind, id }
    }

    pub fn manga(id: EntityId) -> Self {
        Self::item(EntityKind::Manga, id)
    }

    pub fn chapter(id: EntityId) -> Self {
        Self::item(EntityKind::Chapter, id)
    }

    pub fn page(id: EntityId) -> Self {
        Self::item(EntityKind::Page, id)
    }

    /// `manga:<id>:chapters`
    pub fn manga_chapters(manga_id: EntityId) -> Self {
        CacheKey::Children {
            parent: EntityKind::Manga,
            id: manga_id,
            collection: ChildCollection::Chapters,
        }
    }

    /// `chapter:<id>:pages`
    pub fn chapter_pages(chapter_id: EntityId) -> Self {
        CacheKey::Children {
            parent: EntityKind::Chapter,
            id: chapter_id,
            collection: ChildCollection::Pages,
        }
    }

    pub fn list(kind: EntityKind, limit: i64, offset: i64) -> Self {
        CacheKey::List {
            kind,
            limit,
            offset,
        }
    }

    pub fn popular(kind: EntityKind, period: StatsPeriod, limit: i64) -> Self {
        CacheKey::Popular {
            kind,
            period,
            limit,
        }
    }

    /// Entity kind the key belongs to. For nested collections this is the
    /// parent.
    pub fn kind(&self) -> EntityKind {
        match self {
            CacheKey::Item { kind, .. }
            | CacheKey::List { kind, .. }
            | CacheKey::Popular { kind, .. } => *kind,
            CacheKey::Children { parent, .. } => *parent,
        }
    }

    /// The pattern this key falls under, for parameterized keys. Such keys
    /// are tracked in the pattern's index when written.
    pub fn pattern(&self) -> Option<KeyPattern> {
        match self {
            CacheKey::List { kind, .. } => Some(KeyPattern::ListsOf(*kind)),
            CacheKey::Popular { kind, .. } => Some(KeyPattern::PopularOf(*kind)),
            CacheKey::Item { .. } | CacheKey::Children { .. } => None,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Item { kind, id } => write!(f, "{}:{}", kind, id),
            CacheKey::Children {
                parent,
                id,
                collection,
            } => write!(f, "{}:{}:{}", parent, id, collection.as_str()),
            CacheKey::List {
                kind,
                limit,
                offset,
            } => write!(f, "{}:{}:{}:{}", kind, LIST_SEGMENT, limit, offset),
            CacheKey::Popular {
                kind,
                period,
                limit,
            } => write!(f, "{}:{}:{}:{}", kind, POPULAR_SEGMENT, period, limit),
        }
    }
}

impl FromStr for CacheKey {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CacheError::InvalidKey { key: s.to_string() };
        let parts: Vec<&str> = s.split(':').collect();
        let kind = parts
            .first()
            .and_then(|name| EntityKind::from_name(name))
            .ok_or_else(invalid)?;

        match parts.as_slice() {
            [_, id] => Ok(CacheKey::Item {
                kind,
                id: parse_canonical(id).ok_or_else(invalid)?,
            }),
            [_, id, collection] => Ok(CacheKey::Children {
                parent: kind,
                id: parse_canonical(id).ok_or_else(invalid)?,
                collection: ChildCollection::from_name(collection).ok_or_else(invalid)?,
            }),
            [_, segment, limit, offset] if *segment == LIST_SEGMENT => Ok(CacheKey::List {
                kind,
                limit: parse_canonical(limit).ok_or_else(invalid)?,
                offset: parse_canonical(offset).ok_or_else(invalid)?,
            }),
            [_, segment, period, limit] if *segment == POPULAR_SEGMENT => {
                Ok(CacheKey::Popular {
                    kind,
                    period: period.parse().map_err(|_| invalid())?,
                    limit: parse_canonical(limit).ok_or_else(invalid)?,
                })
            }
            _ => Err(invalid()),
        }
    }
}

/// Parse an integer, rejecting anything that would not render back to the
/// same text (`+5`, `007`, `-0`).
fn parse_canonical(s: &str) -> Option<i64> {
    let value: i64 = s.parse().ok()?;
    (value.to_string() == s).then_some(value)
}

// ============================================================================
// PATTERNS
// ============================================================================

/// A family of parameterized keys that is invalidated as a whole.
///
/// Issued keys are recorded in a sorted set named by [`KeyPattern::index_key`];
/// invalidating the pattern deletes every recorded key and the index itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyPattern {
    /// Every `<kind>:list:*` key.
    ListsOf(EntityKind),
    /// Every `<kind>:popular:*` key.
    PopularOf(EntityKind),
}

impl KeyPattern {
    pub fn index_key(&self) -> String {
        match self {
            KeyPattern::ListsOf(kind) => format!("index:{}:{}", kind, LIST_SEGMENT),
            KeyPattern::PopularOf(kind) => format!("index:{}:{}", kind, POPULAR_SEGMENT),
        }
    }
}

impl fmt::Display for KeyPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPattern::ListsOf(kind) => write!(f, "{}:{}:*", kind, LIST_SEGMENT),
            KeyPattern::PopularOf(kind) => write!(f, "{}:{}:*", kind, POPULAR_SEGMENT),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_key_schema() {
        assert_eq!(CacheKey::manga(42).to_string(), "manga:42");
        assert_eq!(CacheKey::chapter(7).to_string(), "chapter:7");
        assert_eq!(CacheKey::page(3).to_string(), "page:3");
        assert_eq!(CacheKey::manga_chapters(42).to_string(), "manga:42:chapters");
        assert_eq!(CacheKey::chapter_pages(7).to_string(), "chapter:7:pages");
        assert_eq!(
            CacheKey::list(EntityKind::Manga, 20, 0).to_string(),
            "manga:list:20:0"
        );
        assert_eq!(
            CacheKey::popular(EntityKind::Manga, StatsPeriod::AllTime, 10).to_string(),
            "manga:popular:all_time:10"
        );
    }

    #[test]
    fn test_pattern_index_keys() {
        assert_eq!(
            KeyPattern::ListsOf(EntityKind::Manga).index_key(),
            "index:manga:list"
        );
        assert_eq!(
            KeyPattern::PopularOf(EntityKind::Chapter).index_key(),
            "index:chapter:popular"
        );
        assert_eq!(KeyPattern::ListsOf(EntityKind::Manga).to_string(), "manga:list:*");
        assert_eq!(
            CacheKey::list(EntityKind::Manga, 20, 40).pattern(),
            Some(KeyPattern::ListsOf(EntityKind::Manga))
        );
        assert_eq!(CacheKey::manga(1).pattern(), None);
    }

    #[test]
    fn test_parse_rejects_malformed_keys() {
        for bad in [
            "",
            "manga",
            "comic:1",
            "manga:abc",
            "manga:007",
            "manga:+7",
            "manga:1:volumes",
            "manga:list:20",
            "manga:popular:yearly:10",
            "manga:other:1:2",
            "manga:1:2:3:4",
        ] {
            assert!(bad.parse::<CacheKey>().is_err(), "accepted {:?}", bad);
        }
    }

    fn arb_kind() -> impl Strategy<Value = EntityKind> {
        prop_oneof![
            Just(EntityKind::Manga),
            Just(EntityKind::Chapter),
            Just(EntityKind::Page),
            Just(EntityKind::User),
        ]
    }

    fn arb_period() -> impl Strategy<Value = StatsPeriod> {
        prop::sample::select(StatsPeriod::ALL.to_vec())
    }

    fn arb_key() -> impl Strategy<Value = CacheKey> {
        prop_oneof![
            (arb_kind(), any::<i64>()).prop_map(|(kind, id)| CacheKey::item(kind, id)),
            (any::<i64>(), any::<bool>()).prop_map(|(id, chapters)| if chapters {
                CacheKey::manga_chapters(id)
            } else {
                CacheKey::chapter_pages(id)
            }),
            (arb_kind(), 0i64..=100, 0i64..100_000)
                .prop_map(|(kind, limit, offset)| CacheKey::list(kind, limit, offset)),
            (arb_kind(), arb_period(), 0i64..=100)
                .prop_map(|(kind, period, limit)| CacheKey::popular(kind, period, limit)),
        ]
    }

    proptest! {
        #[test]
        fn prop_key_round_trip(key in arb_key()) {
            let encoded = key.to_string();
            let decoded: CacheKey = encoded.parse().map_err(|e| TestCaseError::fail(format!("{}", e)))?;
            prop_assert_eq!(decoded, key);
        }

        #[test]
        fn prop_distinct_keys_encode_distinctly(a in arb_key(), b in arb_key()) {
            prop_assume!(a != b);
            prop_assert_ne!(a.to_string(), b.to_string());
        }
    }
}
