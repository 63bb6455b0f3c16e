//! Domain error type shared across the workspace.
//!
//! Every failure mode the engine can surface to a caller is a distinct
//! variant so callers can branch without string matching. Token rejection
//! reasons in particular stay separate (a caller prompting for a password
//! needs to distinguish `PasswordRequired` from `TokenExpired`).

use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum ChronicleError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    /// A cross-tenant access attempt. Always fatal, never retried.
    #[error("Tenant mismatch: {0}")]
    TenantMismatch(String),

    #[error("Version limit exceeded: content already holds {limit} versions")]
    VersionLimitExceeded { limit: i64 },

    #[error("Validation failed: {0}")]
    Validation(String),

    /// A concurrent-mutation race was detected (e.g. two publishes of the
    /// same content). Safe for the caller to retry.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Preview token has expired")]
    TokenExpired,

    #[error("Preview token was revoked")]
    TokenRevoked,

    #[error("Preview token use count exhausted")]
    TokenUseExceeded,

    #[error("Preview token requires a password")]
    PasswordRequired,

    #[error("Preview token password is invalid")]
    PasswordInvalid,

    /// The presenter's IP or email is not on the token's allow-list.
    #[error("Access restricted: {0}")]
    AccessRestricted(String),

    /// Transient storage failure. Retryable with backoff.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ChronicleError {
    /// Whether a bounded retry is appropriate for this error.
    ///
    /// Only transient storage failures and detected write conflicts qualify.
    /// Security rejections (`TenantMismatch`, token errors) must never be
    /// retried or downgraded.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ChronicleError::StorageUnavailable(_) | ChronicleError::Conflict(_)
        )
    }
}

/// Convenience alias used by service-layer APIs.
pub type ChronicleResult<T> = Result<T, ChronicleError>;
