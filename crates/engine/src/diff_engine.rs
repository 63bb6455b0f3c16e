//! Comparison service: loads two versions, runs the diff layers, caches
//! the result, and records an audit entry per computed comparison.
//!
//! Diff results are derived data and live only in the cache; a miss just
//! recomputes.

use std::sync::{Arc, Mutex};

use chronicle_core::audit::{action_types, classify_sensitivity, DataSensitivity};
use chronicle_core::cache::TtlCache;
use chronicle_core::diff::{
    compute_version_diff, export_diff, DiffExportFormat, DiffOptions, DiffSource, VersionDiff,
};
use chronicle_core::error::{ChronicleError, ChronicleResult};
use chronicle_core::types::DbId;
use chronicle_db::models::audit_log::NewAuditEntry;
use chronicle_db::models::content_version::ContentVersion;
use chronicle_db::repositories::{AuditLogRepo, ContentVersionRepo};
use chronicle_db::{classify_sqlx_error, DbPool};

use crate::config::EngineConfig;
use crate::lock_cache;

/// Cache key: requesting tenant, ordered version pair, options fingerprint.
/// The tenant component keeps a warmed entry from ever serving another
/// tenant; cross-tenant requests always reach the ownership check.
type DiffCacheKey = (DbId, DbId, DbId, String);

/// Version comparison over one connection pool.
pub struct DiffEngine {
    pool: DbPool,
    cache: Mutex<TtlCache<DiffCacheKey, VersionDiff>>,
}

impl DiffEngine {
    pub fn new(pool: DbPool, config: Arc<EngineConfig>) -> Self {
        Self {
            pool,
            cache: Mutex::new(TtlCache::new(
                config.diff_cache_capacity,
                config.diff_cache_ttl,
            )),
        }
    }

    /// Compare two versions. Both must belong to the given tenant; a
    /// mismatch on either side is fatal and never retried.
    ///
    /// The (a, b) direction is significant: spans report a→b edits. Cached
    /// by (tenant, a, b, options fingerprint).
    pub async fn compare_versions(
        &self,
        tenant_id: DbId,
        actor_id: DbId,
        version_a_id: DbId,
        version_b_id: DbId,
        options: &DiffOptions,
    ) -> ChronicleResult<VersionDiff> {
        let cache_key = (tenant_id, version_a_id, version_b_id, options.fingerprint());
        if let Some(hit) = lock_cache(&self.cache).get(&cache_key) {
            return Ok(hit);
        }

        let a = self.load_owned(tenant_id, version_a_id).await?;
        let b = self.load_owned(tenant_id, version_b_id).await?;

        let diff = compute_version_diff(
            DiffSource {
                version_id: a.id,
                body: &a.body,
                metadata: &a.metadata,
            },
            DiffSource {
                version_id: b.id,
                body: &b.body,
                metadata: &b.metadata,
            },
            options,
        );
        lock_cache(&self.cache).insert(cache_key, diff.clone());

        self.record_comparison(tenant_id, actor_id, &a, &b, &diff)
            .await?;

        tracing::debug!(
            tenant_id,
            version_a_id,
            version_b_id,
            hunks = diff.text.hunks.len(),
            structural_changes = diff.structural.changes.len(),
            "Versions compared"
        );
        Ok(diff)
    }

    /// Serialize a computed diff for callers (JSON or standalone HTML).
    pub fn export(&self, diff: &VersionDiff, format: DiffExportFormat) -> ChronicleResult<String> {
        export_diff(diff, format)
    }

    /// Drop every cached comparison involving a version, across tenants.
    /// This is the dispatch target for [`SideEffect::InvalidateDiffs`].
    ///
    /// [`SideEffect::InvalidateDiffs`]: chronicle_core::effects::SideEffect
    pub fn invalidate_version(&self, version_id: DbId) {
        lock_cache(&self.cache)
            .invalidate_matching(|(_, a, b, _)| *a == version_id || *b == version_id);
    }

    async fn load_owned(
        &self,
        tenant_id: DbId,
        version_id: DbId,
    ) -> ChronicleResult<ContentVersion> {
        let version = ContentVersionRepo::find_by_id(&self.pool, version_id)
            .await
            .map_err(classify_sqlx_error)?
            .ok_or(ChronicleError::NotFound {
                entity: "content_version",
                id: version_id,
            })?;
        if version.tenant_id != tenant_id {
            return Err(ChronicleError::TenantMismatch(format!(
                "version {version_id} belongs to another tenant"
            )));
        }
        Ok(version)
    }

    async fn record_comparison(
        &self,
        tenant_id: DbId,
        actor_id: DbId,
        a: &ContentVersion,
        b: &ContentVersion,
        diff: &VersionDiff,
    ) -> ChronicleResult<()> {
        let sensitivity =
            match (classify_sensitivity(&a.body), classify_sensitivity(&b.body)) {
                (DataSensitivity::Normal, DataSensitivity::Normal) => DataSensitivity::Normal,
                _ => DataSensitivity::Sensitive,
            };
        let mut conn = self.pool.acquire().await.map_err(classify_sqlx_error)?;
        AuditLogRepo::insert(
            &mut conn,
            &NewAuditEntry {
                tenant_id,
                actor_id,
                action_type: action_types::VERSION_COMPARE,
                details: serde_json::json!({
                    "version_a_id": a.id,
                    "version_b_id": b.id,
                    "lines_added": diff.stats.lines_added,
                    "lines_removed": diff.stats.lines_removed,
                    "complexity_score": diff.stats.complexity_score,
                }),
                sensitivity,
            },
        )
        .await
        .map_err(classify_sqlx_error)?;
        Ok(())
    }
}
