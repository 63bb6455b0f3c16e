//! Repository for the `preview_tokens` table.
//!
//! Lookups are by token hash, never by plaintext. Revocation is a soft
//! tombstone (`revoked_at`); expired and revoked rows are swept by the
//! background job after a grace period.

use sqlx::{PgConnection, PgPool};

use chronicle_core::types::{DbId, Timestamp};

use crate::models::preview_token::{CreatePreviewToken, PreviewToken};

const COLUMNS: &str = "id, tenant_id, version_id, token_kind, token_hash, token_prefix, \
    sealed_payload, domain, locale, expires_at, max_uses, use_count, password_hash, \
    allowed_ips, allowed_emails, settings, created_by_id, created_at, last_used_at, \
    revoked_at, revoked_reason";

/// Provides CRUD and lifecycle operations for preview tokens.
pub struct PreviewTokenRepo;

impl PreviewTokenRepo {
    /// Insert a new token row.
    pub async fn insert(
        conn: &mut PgConnection,
        input: &CreatePreviewToken,
    ) -> Result<PreviewToken, sqlx::Error> {
        let query = format!(
            "INSERT INTO preview_tokens
                (tenant_id, version_id, token_kind, token_hash, token_prefix, sealed_payload,
                 domain, locale, expires_at, max_uses, password_hash, allowed_ips,
                 allowed_emails, settings, created_by_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PreviewToken>(&query)
            .bind(input.tenant_id)
            .bind(input.version_id)
            .bind(input.token_kind.as_str())
            .bind(&input.token_hash)
            .bind(&input.token_prefix)
            .bind(&input.sealed_payload)
            .bind(&input.domain)
            .bind(&input.locale)
            .bind(input.expires_at)
            .bind(input.max_uses)
            .bind(&input.password_hash)
            .bind(&input.allowed_ips)
            .bind(&input.allowed_emails)
            .bind(&input.settings)
            .bind(input.created_by_id)
            .fetch_one(conn)
            .await
    }

    /// Find a token by its primary key.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<PreviewToken>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM preview_tokens WHERE id = $1");
        sqlx::query_as::<_, PreviewToken>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a token by the SHA-256 hex digest of its secret.
    pub async fn find_by_hash(
        pool: &PgPool,
        token_hash: &str,
    ) -> Result<Option<PreviewToken>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM preview_tokens WHERE token_hash = $1");
        sqlx::query_as::<_, PreviewToken>(&query)
            .bind(token_hash)
            .fetch_optional(pool)
            .await
    }

    /// Active (unrevoked, unexpired) token count for an actor, for the
    /// per-actor minting cap.
    pub async fn count_active_for_actor(
        pool: &PgPool,
        tenant_id: DbId,
        created_by_id: DbId,
    ) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM preview_tokens
             WHERE tenant_id = $1 AND created_by_id = $2
               AND revoked_at IS NULL AND expires_at > NOW()",
        )
        .bind(tenant_id)
        .bind(created_by_id)
        .fetch_one(pool)
        .await?;
        Ok(row.0)
    }

    /// Atomically consume one use of a token.
    ///
    /// The guard conditions are re-checked in the UPDATE itself so two
    /// concurrent validations cannot both take the last use: the row only
    /// changes when it is still live and under its use budget. Returns the
    /// updated row, or `None` when the guard lost the race.
    pub async fn record_use(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<PreviewToken>, sqlx::Error> {
        let query = format!(
            "UPDATE preview_tokens SET
                use_count = use_count + 1,
                last_used_at = NOW()
             WHERE id = $1
               AND revoked_at IS NULL
               AND expires_at > NOW()
               AND (max_uses IS NULL OR use_count < max_uses)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PreviewToken>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Soft-revoke a token. Idempotent: revoking an already-revoked token
    /// keeps the original tombstone. Returns the row, or `None` if absent.
    pub async fn revoke(
        pool: &PgPool,
        id: DbId,
        reason: Option<&str>,
    ) -> Result<Option<PreviewToken>, sqlx::Error> {
        let query = format!(
            "UPDATE preview_tokens SET
                revoked_at = COALESCE(revoked_at, NOW()),
                revoked_reason = COALESCE(revoked_reason, $2)
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PreviewToken>(&query)
            .bind(id)
            .bind(reason)
            .fetch_optional(pool)
            .await
    }

    /// Tokens minted for a version, newest first. Used when listing and
    /// when revoking en masse after a version is deleted.
    pub async fn list_for_version(
        pool: &PgPool,
        version_id: DbId,
    ) -> Result<Vec<PreviewToken>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM preview_tokens
             WHERE version_id = $1
             ORDER BY created_at DESC"
        );
        sqlx::query_as::<_, PreviewToken>(&query)
            .bind(version_id)
            .fetch_all(pool)
            .await
    }

    /// Delete tokens that expired or were revoked before the cutoff.
    /// Analytics rows go with them via the foreign-key cascade.
    pub async fn delete_defunct_before(
        pool: &PgPool,
        cutoff: Timestamp,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM preview_tokens
             WHERE expires_at < $1 OR revoked_at < $1",
        )
        .bind(cutoff)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
