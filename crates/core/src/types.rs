//! Shared primitive type aliases and domain enums.

use serde::{Deserialize, Serialize};

/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Classification of a content version within its item's history.
///
/// - `Draft`     -- a working copy, mutable only in the sense that newer
///   drafts supersede it.
/// - `Published` -- a version that was made live; immutable and never
///   hard-deleted.
/// - `AutoSave`  -- a periodic background snapshot, pruned over time.
/// - `Archived`  -- retained for history but no longer in active rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionKind {
    Draft,
    Published,
    AutoSave,
    Archived,
}

impl VersionKind {
    /// String representation for display, logging, and database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
            Self::AutoSave => "auto_save",
            Self::Archived => "archived",
        }
    }

    /// Parse the database/string representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(Self::Draft),
            "published" => Some(Self::Published),
            "auto_save" => Some(Self::AutoSave),
            "archived" => Some(Self::Archived),
            _ => None,
        }
    }
}

impl std::fmt::Display for VersionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a preview token grants access for.
///
/// - `Preview` -- internal review of an unpublished state.
/// - `Share`   -- external, link-based read access.
/// - `Embed`   -- read access for embedding in another surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Preview,
    Share,
    Embed,
}

impl TokenKind {
    /// String representation for display, logging, and database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Preview => "preview",
            Self::Share => "share",
            Self::Embed => "embed",
        }
    }

    /// Parse the database/string representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "preview" => Some(Self::Preview),
            "share" => Some(Self::Share),
            "embed" => Some(Self::Embed),
            _ => None,
        }
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The (tenant, content type, content id) triple that scopes every version
/// sequence. Locale is carried alongside but does not partition numbering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentKey {
    pub tenant_id: DbId,
    pub content_type: String,
    pub content_id: DbId,
}

impl ContentKey {
    pub fn new(tenant_id: DbId, content_type: impl Into<String>, content_id: DbId) -> Self {
        Self {
            tenant_id,
            content_type: content_type.into(),
            content_id,
        }
    }
}

impl std::fmt::Display for ContentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.tenant_id, self.content_type, self.content_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_kind_roundtrips_through_str() {
        for kind in [
            VersionKind::Draft,
            VersionKind::Published,
            VersionKind::AutoSave,
            VersionKind::Archived,
        ] {
            assert_eq!(VersionKind::parse(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn version_kind_rejects_unknown() {
        assert_eq!(VersionKind::parse("banana"), None);
    }

    #[test]
    fn token_kind_roundtrips_through_str() {
        for kind in [TokenKind::Preview, TokenKind::Share, TokenKind::Embed] {
            assert_eq!(TokenKind::parse(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&VersionKind::AutoSave).unwrap();
        assert_eq!(json, "\"auto_save\"");
    }

    #[test]
    fn content_key_display() {
        let key = ContentKey::new(7, "article", 42);
        assert_eq!(key.to_string(), "7/article/42");
    }
}
