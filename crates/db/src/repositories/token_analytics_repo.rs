//! Repository for the `preview_token_analytics` table.

use sqlx::PgPool;

use chronicle_core::types::{DbId, Timestamp};

use crate::models::token_analytics::{CreateTokenAnalyticsEvent, TokenAnalyticsEvent};

const COLUMNS: &str =
    "id, token_id, tenant_id, ip_address, user_agent, referer, response_time_ms, created_at";

/// Access-log rows for preview token validations.
pub struct TokenAnalyticsRepo;

impl TokenAnalyticsRepo {
    /// Record one token use. Written off the validation path; a failure
    /// here never fails the validation itself.
    pub async fn insert(
        pool: &PgPool,
        event: &CreateTokenAnalyticsEvent,
    ) -> Result<TokenAnalyticsEvent, sqlx::Error> {
        let query = format!(
            "INSERT INTO preview_token_analytics
                (token_id, tenant_id, ip_address, user_agent, referer, response_time_ms)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, TokenAnalyticsEvent>(&query)
            .bind(event.token_id)
            .bind(event.tenant_id)
            .bind(&event.ip_address)
            .bind(&event.user_agent)
            .bind(&event.referer)
            .bind(event.response_time_ms)
            .fetch_one(pool)
            .await
    }

    /// Recent events for a token, newest first.
    pub async fn list_for_token(
        pool: &PgPool,
        token_id: DbId,
        limit: i64,
    ) -> Result<Vec<TokenAnalyticsEvent>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM preview_token_analytics
             WHERE token_id = $1
             ORDER BY created_at DESC
             LIMIT $2"
        );
        sqlx::query_as::<_, TokenAnalyticsEvent>(&query)
            .bind(token_id)
            .bind(limit.clamp(1, 500))
            .fetch_all(pool)
            .await
    }

    /// Drop events older than the retention cutoff. Returns rows removed.
    pub async fn delete_older_than(pool: &PgPool, cutoff: Timestamp) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM preview_token_analytics WHERE created_at < $1")
            .bind(cutoff)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
