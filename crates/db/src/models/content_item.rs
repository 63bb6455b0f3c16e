//! Live content entity model.
//!
//! The CRUD lifecycle of content items belongs to the embedding application;
//! the engine only needs their identity plus the denormalized fields it
//! synchronizes on publish.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use chronicle_core::types::{DbId, Timestamp};

/// A row from the `content_items` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ContentItem {
    pub id: DbId,
    pub tenant_id: DbId,
    pub content_type: String,
    pub locale: String,
    pub title: String,
    pub slug: String,
    pub body: String,
    pub metadata: serde_json::Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a content item (used by embedding code and tests).
#[derive(Debug, Clone, Deserialize)]
pub struct CreateContentItem {
    pub tenant_id: DbId,
    pub content_type: String,
    pub locale: String,
    pub title: String,
    pub slug: String,
    pub body: String,
    pub metadata: Option<serde_json::Value>,
}
