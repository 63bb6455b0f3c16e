//! Repository for the `content_versions` table.
//!
//! Multi-statement mutations (publish, revert, create-with-audit) are
//! composed by the service layer inside a single transaction, so the write
//! methods here take `&mut PgConnection`. Plain reads take the pool.

use sqlx::{PgConnection, PgPool};

use chronicle_core::types::{ContentKey, DbId};

use crate::models::content_version::{
    ContentVersion, CreateContentVersion, VersionHistoryFilter, DEFAULT_HISTORY_LIMIT,
    MAX_HISTORY_LIMIT,
};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, tenant_id, locale, content_type, content_id, version_number, \
    version_kind, is_current_draft, is_current_published, title, slug, body, excerpt, \
    structured_data, metadata, created_by_id, created_at, published_at, published_by_id, \
    change_summary, changed_fields, content_hash";

/// Provides CRUD and lifecycle operations for content versions.
pub struct ContentVersionRepo;

impl ContentVersionRepo {
    // ── Serialization of version-number assignment ───────────────────

    /// Take a transaction-scoped advisory lock on a content key.
    ///
    /// Serializes the read-then-insert of version numbering per
    /// (tenant, type, id): concurrent creators for the same key queue here,
    /// so `MAX(version_number) + 1` can never be computed twice. The lock
    /// releases automatically at commit or rollback.
    pub async fn lock_content_key(
        conn: &mut PgConnection,
        key: &ContentKey,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(key.to_string())
            .execute(conn)
            .await?;
        Ok(())
    }

    // ── Writes (transaction-scoped) ──────────────────────────────────

    /// Insert a new version, auto-assigning the next version number for the
    /// content key. Callers must hold the advisory lock for the key (see
    /// [`Self::lock_content_key`]).
    pub async fn insert(
        conn: &mut PgConnection,
        input: &CreateContentVersion,
        changed_fields: Option<&serde_json::Value>,
        created_by_id: DbId,
        is_current_draft: bool,
    ) -> Result<ContentVersion, sqlx::Error> {
        let query = format!(
            "INSERT INTO content_versions
                (tenant_id, locale, content_type, content_id, version_number, version_kind,
                 is_current_draft, title, slug, body, excerpt, structured_data, metadata,
                 created_by_id, change_summary, changed_fields, content_hash)
             VALUES (
                $1, $2, $3, $4,
                (SELECT COALESCE(MAX(version_number), 0) + 1 FROM content_versions
                  WHERE tenant_id = $1 AND content_type = $3 AND content_id = $4),
                $5, $6, $7, $8, $9, $10,
                COALESCE($11, '{{}}'::jsonb), COALESCE($12, '{{}}'::jsonb),
                $13, $14, $15, $16
             )
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ContentVersion>(&query)
            .bind(input.tenant_id)
            .bind(&input.locale)
            .bind(&input.content_type)
            .bind(input.content_id)
            .bind(input.version_kind.as_str())
            .bind(is_current_draft)
            .bind(&input.title)
            .bind(&input.slug)
            .bind(&input.body)
            .bind(&input.excerpt)
            .bind(&input.structured_data)
            .bind(&input.metadata)
            .bind(created_by_id)
            .bind(&input.change_summary)
            .bind(changed_fields)
            .bind(&input.content_hash)
            .fetch_one(conn)
            .await
    }

    /// Clear the current-draft flag for a content key.
    pub async fn clear_current_draft(
        conn: &mut PgConnection,
        key: &ContentKey,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE content_versions SET is_current_draft = FALSE
             WHERE tenant_id = $1 AND content_type = $2 AND content_id = $3
               AND is_current_draft",
        )
        .bind(key.tenant_id)
        .bind(&key.content_type)
        .bind(key.content_id)
        .execute(conn)
        .await?;
        Ok(result.rows_affected())
    }

    /// Clear the current-published flag for a content key.
    pub async fn clear_current_published(
        conn: &mut PgConnection,
        key: &ContentKey,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE content_versions SET is_current_published = FALSE
             WHERE tenant_id = $1 AND content_type = $2 AND content_id = $3
               AND is_current_published",
        )
        .bind(key.tenant_id)
        .bind(&key.content_type)
        .bind(key.content_id)
        .execute(conn)
        .await?;
        Ok(result.rows_affected())
    }

    /// Mark a version as the current published one: sets the flag, stamps
    /// publish time and publisher, and promotes the row's kind.
    ///
    /// Returns `None` if the version does not exist.
    pub async fn mark_published(
        conn: &mut PgConnection,
        version_id: DbId,
        published_by_id: DbId,
    ) -> Result<Option<ContentVersion>, sqlx::Error> {
        let query = format!(
            "UPDATE content_versions SET
                is_current_published = TRUE,
                version_kind = 'published',
                published_at = NOW(),
                published_by_id = $2
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ContentVersion>(&query)
            .bind(version_id)
            .bind(published_by_id)
            .fetch_optional(conn)
            .await
    }

    /// Permanently delete a version by ID. Returns `true` if a row was
    /// removed. Kind checks (published rows are immortal) happen in the
    /// service layer before this is called.
    pub async fn hard_delete(conn: &mut PgConnection, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM content_versions WHERE id = $1")
            .bind(id)
            .execute(conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a set of versions by ID. Returns the number removed.
    pub async fn delete_by_ids(pool: &PgPool, ids: &[DbId]) -> Result<u64, sqlx::Error> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query("DELETE FROM content_versions WHERE id = ANY($1)")
            .bind(ids)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// Find a version by its primary key.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<ContentVersion>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM content_versions WHERE id = $1");
        sqlx::query_as::<_, ContentVersion>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Count versions for a content key.
    pub async fn count_for_content(
        conn: &mut PgConnection,
        key: &ContentKey,
    ) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM content_versions
             WHERE tenant_id = $1 AND content_type = $2 AND content_id = $3",
        )
        .bind(key.tenant_id)
        .bind(&key.content_type)
        .bind(key.content_id)
        .fetch_one(conn)
        .await?;
        Ok(row.0)
    }

    /// The most recent version for a key (highest version number), if any.
    pub async fn latest_for_content(
        conn: &mut PgConnection,
        key: &ContentKey,
    ) -> Result<Option<ContentVersion>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM content_versions
             WHERE tenant_id = $1 AND content_type = $2 AND content_id = $3
             ORDER BY version_number DESC
             LIMIT 1"
        );
        sqlx::query_as::<_, ContentVersion>(&query)
            .bind(key.tenant_id)
            .bind(&key.content_type)
            .bind(key.content_id)
            .fetch_optional(conn)
            .await
    }

    /// The content hash of the most recent version for a key, if any.
    /// Used for auto-save deduplication.
    pub async fn latest_content_hash(
        pool: &PgPool,
        key: &ContentKey,
    ) -> Result<Option<String>, sqlx::Error> {
        let row: Option<(Option<String>,)> = sqlx::query_as(
            "SELECT content_hash FROM content_versions
             WHERE tenant_id = $1 AND content_type = $2 AND content_id = $3
             ORDER BY version_number DESC
             LIMIT 1",
        )
        .bind(key.tenant_id)
        .bind(&key.content_type)
        .bind(key.content_id)
        .fetch_optional(pool)
        .await?;
        Ok(row.and_then(|r| r.0))
    }

    /// The single row flagged as current draft, if any.
    ///
    /// Currency is always read from the flag, never inferred from version
    /// ordering: drafts and publishes interleave.
    pub async fn get_current_draft(
        pool: &PgPool,
        key: &ContentKey,
    ) -> Result<Option<ContentVersion>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM content_versions
             WHERE tenant_id = $1 AND content_type = $2 AND content_id = $3
               AND is_current_draft"
        );
        sqlx::query_as::<_, ContentVersion>(&query)
            .bind(key.tenant_id)
            .bind(&key.content_type)
            .bind(key.content_id)
            .fetch_optional(pool)
            .await
    }

    /// The single row flagged as current published, if any.
    pub async fn get_current_published(
        pool: &PgPool,
        key: &ContentKey,
    ) -> Result<Option<ContentVersion>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM content_versions
             WHERE tenant_id = $1 AND content_type = $2 AND content_id = $3
               AND is_current_published"
        );
        sqlx::query_as::<_, ContentVersion>(&query)
            .bind(key.tenant_id)
            .bind(&key.content_type)
            .bind(key.content_id)
            .fetch_optional(pool)
            .await
    }

    /// Paginated, filterable version history for a content key, newest
    /// first. Always tenant-scoped through the key.
    pub async fn list_history(
        pool: &PgPool,
        key: &ContentKey,
        filter: &VersionHistoryFilter,
    ) -> Result<Vec<ContentVersion>, sqlx::Error> {
        let limit = filter
            .limit
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
            .clamp(1, MAX_HISTORY_LIMIT);
        let offset = filter.offset.unwrap_or(0).max(0);
        let query = format!(
            "SELECT {COLUMNS} FROM content_versions
             WHERE tenant_id = $1 AND content_type = $2 AND content_id = $3
               AND ($4::text IS NULL OR version_kind = $4)
               AND ($5::bigint IS NULL OR created_by_id = $5)
               AND ($6::timestamptz IS NULL OR created_at >= $6)
               AND ($7::timestamptz IS NULL OR created_at <= $7)
             ORDER BY version_number DESC
             LIMIT $8 OFFSET $9"
        );
        sqlx::query_as::<_, ContentVersion>(&query)
            .bind(key.tenant_id)
            .bind(&key.content_type)
            .bind(key.content_id)
            .bind(filter.kind.map(|k| k.as_str()))
            .bind(filter.created_by_id)
            .bind(filter.created_after)
            .bind(filter.created_before)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Total rows matching a history filter (for pagination).
    pub async fn count_history(
        pool: &PgPool,
        key: &ContentKey,
        filter: &VersionHistoryFilter,
    ) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM content_versions
             WHERE tenant_id = $1 AND content_type = $2 AND content_id = $3
               AND ($4::text IS NULL OR version_kind = $4)
               AND ($5::bigint IS NULL OR created_by_id = $5)
               AND ($6::timestamptz IS NULL OR created_at >= $6)
               AND ($7::timestamptz IS NULL OR created_at <= $7)",
        )
        .bind(key.tenant_id)
        .bind(&key.content_type)
        .bind(key.content_id)
        .bind(filter.kind.map(|k| k.as_str()))
        .bind(filter.created_by_id)
        .bind(filter.created_after)
        .bind(filter.created_before)
        .fetch_one(pool)
        .await?;
        Ok(row.0)
    }

    // ── Auto-save pruning ────────────────────────────────────────────

    /// IDs of auto-save versions beyond the keep-count or older than the
    /// cutoff, oldest-first. Never returns current-flagged rows.
    pub async fn stale_auto_save_ids(
        pool: &PgPool,
        key: &ContentKey,
        keep_most_recent: i64,
        older_than: chronicle_core::types::Timestamp,
    ) -> Result<Vec<DbId>, sqlx::Error> {
        let rows: Vec<(DbId,)> = sqlx::query_as(
            "WITH ranked AS (
                SELECT id, created_at,
                       ROW_NUMBER() OVER (ORDER BY version_number DESC) AS rn
                FROM content_versions
                WHERE tenant_id = $1 AND content_type = $2 AND content_id = $3
                  AND version_kind = 'auto_save'
                  AND NOT is_current_draft AND NOT is_current_published
             )
             SELECT id FROM ranked
             WHERE rn > $4 OR created_at < $5
             ORDER BY rn DESC",
        )
        .bind(key.tenant_id)
        .bind(&key.content_type)
        .bind(key.content_id)
        .bind(keep_most_recent)
        .bind(older_than)
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }
}
