//! Engine configuration.
//!
//! One struct shared (via `Arc`) by all three service components and the
//! background jobs. Every limit has a production default; tests override
//! individual fields.

use std::time::Duration;

/// Tunables for the versioning engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// 32-byte master key for sealing token payloads. The signing key is
    /// derived from it.
    pub master_key: [u8; 32],
    /// Base URL that shareable preview links are built from.
    pub preview_base_url: String,

    /// Hard cap on versions per content key.
    pub max_versions_per_content: i64,
    /// Auto-saves kept per content key beyond the pruning pass.
    pub auto_save_keep: i64,
    /// Auto-saves older than this are pruned regardless of count.
    pub auto_save_max_age: chrono::Duration,

    /// Active (unrevoked, unexpired) tokens one actor may hold per tenant.
    pub max_active_tokens_per_actor: i64,
    /// Token lifetime when the request does not specify one.
    pub default_token_ttl_secs: i64,
    /// Upper bound on requested token lifetimes.
    pub max_token_ttl_secs: i64,
    /// How long expired or revoked tokens linger before the sweep deletes
    /// them. Keeps recently-dead tokens inspectable.
    pub token_sweep_grace: chrono::Duration,
    /// Analytics rows older than this are purged by the sweep.
    pub analytics_retention: chrono::Duration,

    pub version_cache_capacity: usize,
    pub version_cache_ttl: Duration,
    pub history_cache_capacity: usize,
    pub diff_cache_capacity: usize,
    pub diff_cache_ttl: Duration,
    pub token_cache_capacity: usize,
    pub token_cache_ttl: Duration,

    /// Attempts for operations hitting transient storage errors.
    pub max_retry_attempts: u32,
}

impl EngineConfig {
    /// Production defaults around the given master key and preview base URL.
    pub fn new(master_key: [u8; 32], preview_base_url: impl Into<String>) -> Self {
        Self {
            master_key,
            preview_base_url: preview_base_url.into(),
            max_versions_per_content: 500,
            auto_save_keep: 5,
            auto_save_max_age: chrono::Duration::hours(72),
            max_active_tokens_per_actor: 50,
            default_token_ttl_secs: 24 * 3600,
            max_token_ttl_secs: 30 * 24 * 3600,
            token_sweep_grace: chrono::Duration::days(7),
            analytics_retention: chrono::Duration::days(90),
            version_cache_capacity: 1024,
            version_cache_ttl: Duration::from_secs(60),
            history_cache_capacity: 256,
            diff_cache_capacity: 256,
            diff_cache_ttl: Duration::from_secs(300),
            token_cache_capacity: 1024,
            token_cache_ttl: Duration::from_secs(30),
            max_retry_attempts: 3,
        }
    }
}
