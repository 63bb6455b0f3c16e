//! Preview token usage analytics model.
//!
//! One row per successful validation, recorded off the request path.

use serde::Serialize;
use sqlx::FromRow;

use chronicle_core::types::{DbId, Timestamp};

/// A row from the `preview_token_analytics` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TokenAnalyticsEvent {
    pub id: DbId,
    pub token_id: DbId,
    pub tenant_id: DbId,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub referer: Option<String>,
    pub response_time_ms: Option<i32>,
    pub created_at: Timestamp,
}

/// DTO for recording a token use.
#[derive(Debug, Clone)]
pub struct CreateTokenAnalyticsEvent {
    pub token_id: DbId,
    pub tenant_id: DbId,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub referer: Option<String>,
    pub response_time_ms: Option<i32>,
}
