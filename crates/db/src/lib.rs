//! Persistence layer: sqlx models and repositories over PostgreSQL.

pub mod models;
pub mod repositories;

use std::time::Duration;

use chronicle_core::error::ChronicleError;

/// Convenience alias for the shared connection pool.
pub type DbPool = sqlx::PgPool;

/// Default per-connection acquire timeout. No data-store call should be able
/// to block a caller indefinitely.
pub const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default maximum pool size.
pub const MAX_CONNECTIONS: u32 = 16;

/// Connect to PostgreSQL with the engine's pool settings.
pub async fn connect(database_url: &str) -> Result<DbPool, sqlx::Error> {
    sqlx::postgres::PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect(database_url)
        .await
}

/// Map a sqlx error onto the domain error model.
///
/// - Serialization failures and deadlocks (PostgreSQL 40001/40P01) surface
///   as `Conflict`: a concurrent-mutation race the caller may retry.
/// - Pool timeouts and I/O failures surface as `StorageUnavailable`:
///   transient, retryable with backoff.
/// - Everything else is `Internal` with a sanitized message.
pub fn classify_sqlx_error(err: sqlx::Error) -> ChronicleError {
    match &err {
        sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
            Some("40001") | Some("40P01") => {
                ChronicleError::Conflict("concurrent write detected".to_string())
            }
            _ => {
                tracing::error!(error = %db_err, "Database error");
                ChronicleError::Internal("database error".to_string())
            }
        },
        sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => {
            ChronicleError::StorageUnavailable(err.to_string())
        }
        sqlx::Error::RowNotFound => ChronicleError::Internal("row not found".to_string()),
        other => {
            tracing::error!(error = %other, "Database error");
            ChronicleError::Internal("database error".to_string())
        }
    }
}
