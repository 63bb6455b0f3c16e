//! Audit log entry model.
//!
//! Entries are insert-only and written in the same transaction as the
//! mutation they record, so the log never shows a failed operation as
//! having succeeded.

use serde::Serialize;
use sqlx::FromRow;

use chronicle_core::audit::DataSensitivity;
use chronicle_core::types::{DbId, Timestamp};

/// A row from the `audit_log` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AuditLogEntry {
    pub id: DbId,
    pub tenant_id: DbId,
    pub actor_id: DbId,
    pub action_type: String,
    /// Structured detail payload; sensitive fields are redacted before
    /// storage.
    pub details: serde_json::Value,
    /// Coarse PII classification of the affected content.
    pub sensitivity: String,
    pub created_at: Timestamp,
}

/// DTO for writing an audit entry.
#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    pub tenant_id: DbId,
    pub actor_id: DbId,
    pub action_type: &'static str,
    pub details: serde_json::Value,
    pub sensitivity: DataSensitivity,
}
