//! Repository for the `content_items` table.
//!
//! Items hold the live published surface of a piece of content; the full
//! history lives in `content_versions`. Publishing syncs the winning
//! version's fields back onto the item inside the publish transaction.

use sqlx::{PgConnection, PgPool};

use chronicle_core::types::DbId;

use crate::models::content_item::{ContentItem, CreateContentItem};
use crate::models::content_version::ContentVersion;

const COLUMNS: &str =
    "id, tenant_id, content_type, locale, title, slug, body, metadata, created_at, updated_at";

/// Provides CRUD operations for content items.
pub struct ContentItemRepo;

impl ContentItemRepo {
    /// Find an item by its primary key.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<ContentItem>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM content_items WHERE id = $1");
        sqlx::query_as::<_, ContentItem>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Create a new content item.
    pub async fn create(
        pool: &PgPool,
        input: &CreateContentItem,
    ) -> Result<ContentItem, sqlx::Error> {
        let query = format!(
            "INSERT INTO content_items (tenant_id, content_type, locale, title, slug, body, metadata)
             VALUES ($1, $2, $3, $4, $5, $6, COALESCE($7, '{{}}'::jsonb))
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ContentItem>(&query)
            .bind(input.tenant_id)
            .bind(&input.content_type)
            .bind(&input.locale)
            .bind(&input.title)
            .bind(&input.slug)
            .bind(&input.body)
            .bind(&input.metadata)
            .fetch_one(pool)
            .await
    }

    /// Copy a published version's fields onto its content item. Runs inside
    /// the publish transaction so the live surface and the current-published
    /// flag change together.
    pub async fn sync_published_fields(
        conn: &mut PgConnection,
        version: &ContentVersion,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE content_items SET
                title = $2, slug = $3, body = $4, metadata = $5, locale = $6,
                updated_at = NOW()
             WHERE id = $1 AND tenant_id = $7",
        )
        .bind(version.content_id)
        .bind(&version.title)
        .bind(&version.slug)
        .bind(&version.body)
        .bind(&version.metadata)
        .bind(&version.locale)
        .bind(version.tenant_id)
        .execute(conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
