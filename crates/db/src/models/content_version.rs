//! Content version entity model and DTOs.
//!
//! Versions are immutable snapshots: corrections always create a new
//! version, and published versions are never hard-deleted.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use chronicle_core::types::{ContentKey, DbId, Timestamp, VersionKind};

/// A row from the `content_versions` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ContentVersion {
    pub id: DbId,
    pub tenant_id: DbId,
    pub locale: String,
    pub content_type: String,
    pub content_id: DbId,
    pub version_number: i32,
    pub version_kind: String,
    pub is_current_draft: bool,
    pub is_current_published: bool,
    pub title: String,
    pub slug: String,
    pub body: String,
    pub excerpt: Option<String>,
    pub structured_data: serde_json::Value,
    pub metadata: serde_json::Value,
    pub created_by_id: DbId,
    pub created_at: Timestamp,
    pub published_at: Option<Timestamp>,
    pub published_by_id: Option<DbId>,
    pub change_summary: Option<String>,
    /// Best-effort annotation: fields that differed from the version that
    /// was latest at creation time. Not recomputed if ordering later
    /// changes (e.g. after a revert).
    pub changed_fields: Option<serde_json::Value>,
    pub content_hash: Option<String>,
}

impl ContentVersion {
    /// The parsed version kind. Stored values are constrained by a database
    /// CHECK, so an unparseable kind indicates corruption.
    pub fn kind(&self) -> Option<VersionKind> {
        VersionKind::parse(&self.version_kind)
    }

    /// The content key this version belongs to.
    pub fn content_key(&self) -> ContentKey {
        ContentKey::new(self.tenant_id, self.content_type.clone(), self.content_id)
    }
}

/// DTO for creating a new content version. The version number is assigned
/// by the repository, never by the caller.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateContentVersion {
    pub tenant_id: DbId,
    #[validate(length(min = 1, max = 16))]
    pub locale: String,
    #[validate(length(min = 1, max = 64))]
    pub content_type: String,
    pub content_id: DbId,
    pub version_kind: VersionKind,
    #[validate(length(min = 1, max = 512))]
    pub title: String,
    #[validate(length(min = 1, max = 256))]
    pub slug: String,
    pub body: String,
    #[validate(length(max = 1024))]
    pub excerpt: Option<String>,
    pub structured_data: Option<serde_json::Value>,
    pub metadata: Option<serde_json::Value>,
    #[validate(length(max = 1024))]
    pub change_summary: Option<String>,
    pub content_hash: Option<String>,
}

impl CreateContentVersion {
    pub fn content_key(&self) -> ContentKey {
        ContentKey::new(self.tenant_id, self.content_type.clone(), self.content_id)
    }
}

/// Filters for version history queries. All filters are optional; the
/// tenant scope is mandatory and carried separately.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VersionHistoryFilter {
    pub kind: Option<VersionKind>,
    pub created_by_id: Option<DbId>,
    pub created_after: Option<Timestamp>,
    pub created_before: Option<Timestamp>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Default page size for history queries.
pub const DEFAULT_HISTORY_LIMIT: i64 = 50;

/// Hard cap on history page size.
pub const MAX_HISTORY_LIMIT: i64 = 200;
