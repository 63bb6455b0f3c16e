//! Preview token entity model and DTOs.
//!
//! Only the token's hash is stored; the plaintext secret is returned to the
//! creator exactly once. The signed claims travel in `sealed_payload`,
//! encrypted at rest.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use chronicle_core::types::{DbId, Timestamp, TokenKind};

/// A row from the `preview_tokens` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PreviewToken {
    pub id: DbId,
    pub tenant_id: DbId,
    pub version_id: DbId,
    pub token_kind: String,
    /// SHA-256 hex digest of the plaintext secret.
    #[serde(skip_serializing)]
    pub token_hash: String,
    /// First characters of the secret, for display in token lists.
    pub token_prefix: String,
    /// AES-GCM encrypted, HMAC-signed claims.
    #[serde(skip_serializing)]
    pub sealed_payload: Vec<u8>,
    pub domain: Option<String>,
    pub locale: Option<String>,
    pub expires_at: Timestamp,
    pub max_uses: Option<i32>,
    pub use_count: i32,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    /// Allow-listed presenter IPs; empty means unrestricted.
    pub allowed_ips: Vec<String>,
    /// Allow-listed presenter emails; empty means unrestricted.
    pub allowed_emails: Vec<String>,
    pub settings: serde_json::Value,
    pub created_by_id: DbId,
    pub created_at: Timestamp,
    pub last_used_at: Option<Timestamp>,
    pub revoked_at: Option<Timestamp>,
    pub revoked_reason: Option<String>,
}

impl PreviewToken {
    /// The parsed token kind. Stored values are constrained by a database
    /// CHECK, so an unparseable kind indicates corruption.
    pub fn kind(&self) -> Option<TokenKind> {
        TokenKind::parse(&self.token_kind)
    }
}

/// DTO for inserting a preview token row. Hashing, payload sealing, and
/// password hashing happen in the service layer before this is built.
#[derive(Debug, Clone)]
pub struct CreatePreviewToken {
    pub tenant_id: DbId,
    pub version_id: DbId,
    pub token_kind: TokenKind,
    pub token_hash: String,
    pub token_prefix: String,
    pub sealed_payload: Vec<u8>,
    pub domain: Option<String>,
    pub locale: Option<String>,
    pub expires_at: Timestamp,
    pub max_uses: Option<i32>,
    pub password_hash: Option<String>,
    pub allowed_ips: Vec<String>,
    pub allowed_emails: Vec<String>,
    pub settings: serde_json::Value,
    pub created_by_id: DbId,
}

/// Caller-facing request to mint a token, before any crypto.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PreviewTokenRequest {
    pub tenant_id: DbId,
    pub version_id: DbId,
    pub token_kind: TokenKind,
    #[validate(length(max = 256))]
    pub domain: Option<String>,
    #[validate(length(max = 16))]
    pub locale: Option<String>,
    /// Lifetime in seconds; bounded by the service configuration.
    pub ttl_secs: Option<i64>,
    pub max_uses: Option<i32>,
    #[validate(length(min = 4, max = 128))]
    pub password: Option<String>,
    pub allowed_ips: Option<Vec<String>>,
    pub allowed_emails: Option<Vec<String>>,
    pub settings: Option<serde_json::Value>,
}
