//! Periodic cleanup of defunct preview tokens and aged analytics.
//!
//! Deletes tokens whose expiry or revocation is older than the configured
//! grace period (their analytics rows cascade away with them) and purges
//! remaining analytics beyond the retention window. Runs on a fixed
//! interval using `tokio::time::interval`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use chronicle_db::repositories::{PreviewTokenRepo, TokenAnalyticsRepo};
use chronicle_db::DbPool;

use crate::config::EngineConfig;

/// How often the sweep runs.
const SWEEP_INTERVAL: Duration = Duration::from_secs(3600); // 1 hour

/// Run the token sweep loop until `cancel` is triggered.
pub async fn run(pool: DbPool, config: Arc<EngineConfig>, cancel: CancellationToken) {
    tracing::info!(
        grace_days = config.token_sweep_grace.num_days(),
        retention_days = config.analytics_retention.num_days(),
        interval_secs = SWEEP_INTERVAL.as_secs(),
        "Token sweep job started"
    );

    let mut interval = tokio::time::interval(SWEEP_INTERVAL);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Token sweep job stopping");
                break;
            }
            _ = interval.tick() => {
                sweep_once(&pool, &config).await;
            }
        }
    }
}

/// One sweep pass. Failures are logged and retried on the next tick.
pub async fn sweep_once(pool: &DbPool, config: &EngineConfig) {
    let now = Utc::now();

    match PreviewTokenRepo::delete_defunct_before(pool, now - config.token_sweep_grace).await {
        Ok(deleted) if deleted > 0 => {
            tracing::info!(deleted, "Token sweep: purged defunct tokens");
        }
        Ok(_) => {
            tracing::debug!("Token sweep: no defunct tokens");
        }
        Err(e) => {
            tracing::error!(error = %e, "Token sweep: token purge failed");
        }
    }

    match TokenAnalyticsRepo::delete_older_than(pool, now - config.analytics_retention).await {
        Ok(deleted) if deleted > 0 => {
            tracing::info!(deleted, "Token sweep: purged aged analytics");
        }
        Ok(_) => {
            tracing::debug!("Token sweep: no aged analytics");
        }
        Err(e) => {
            tracing::error!(error = %e, "Token sweep: analytics purge failed");
        }
    }
}
