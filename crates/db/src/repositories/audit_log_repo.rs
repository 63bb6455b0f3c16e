//! Repository for the `audit_log` table.

use sqlx::{PgConnection, PgPool};

use chronicle_core::types::DbId;

use crate::models::audit_log::{AuditLogEntry, NewAuditEntry};

const COLUMNS: &str = "id, tenant_id, actor_id, action_type, details, sensitivity, created_at";

/// Insert-only access to the audit log.
pub struct AuditLogRepo;

impl AuditLogRepo {
    /// Write an audit entry. Takes a connection so callers can include the
    /// entry in the transaction of the mutation it records.
    pub async fn insert(
        conn: &mut PgConnection,
        entry: &NewAuditEntry,
    ) -> Result<AuditLogEntry, sqlx::Error> {
        let query = format!(
            "INSERT INTO audit_log (tenant_id, actor_id, action_type, details, sensitivity)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AuditLogEntry>(&query)
            .bind(entry.tenant_id)
            .bind(entry.actor_id)
            .bind(entry.action_type)
            .bind(&entry.details)
            .bind(entry.sensitivity.as_str())
            .fetch_one(conn)
            .await
    }

    /// Most recent entries for a tenant, newest first.
    pub async fn list_recent(
        pool: &PgPool,
        tenant_id: DbId,
        limit: i64,
    ) -> Result<Vec<AuditLogEntry>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM audit_log
             WHERE tenant_id = $1
             ORDER BY created_at DESC
             LIMIT $2"
        );
        sqlx::query_as::<_, AuditLogEntry>(&query)
            .bind(tenant_id)
            .bind(limit.clamp(1, 500))
            .fetch_all(pool)
            .await
    }
}
