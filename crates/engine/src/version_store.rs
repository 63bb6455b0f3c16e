//! Version lifecycle service: create, publish, revert, delete, auto-save,
//! and history reads.
//!
//! Every mutation runs in a single transaction together with its audit
//! entry, and returns a [`VersionOutcome`] carrying the affected row plus
//! side-effect descriptors. The store applies its own cache invalidations;
//! descriptors let the embedding application invalidate caches it owns
//! (e.g. token validation state after a version delete).

use std::sync::{Arc, Mutex};

use chrono::Utc;
use validator::Validate;

use chronicle_core::audit::{
    action_types, changed_fields, classify_sensitivity, redact_sensitive_fields,
};
use chronicle_core::cache::TtlCache;
use chronicle_core::effects::{version_mutation_effects, SideEffect};
use chronicle_core::error::{ChronicleError, ChronicleResult};
use chronicle_core::hashing;
use chronicle_core::retry::with_retries;
use chronicle_core::sanitize::{is_valid_slug, strip_executable_markup};
use chronicle_core::types::{ContentKey, DbId, VersionKind};
use chronicle_db::models::audit_log::NewAuditEntry;
use chronicle_db::models::content_version::{ContentVersion, CreateContentVersion, VersionHistoryFilter};
use chronicle_db::repositories::{AuditLogRepo, ContentItemRepo, ContentVersionRepo, PreviewTokenRepo};
use chronicle_db::{classify_sqlx_error, DbPool};

use crate::config::EngineConfig;
use crate::lock_cache;

/// The result of a version mutation.
#[derive(Debug)]
pub struct VersionOutcome {
    pub version: ContentVersion,
    /// Effects the caller is expected to dispatch. Cache invalidations for
    /// the store's own caches are already applied.
    pub side_effects: Vec<SideEffect>,
}

/// Version lifecycle operations over one connection pool.
pub struct VersionStore {
    pool: DbPool,
    config: Arc<EngineConfig>,
    current_draft: Mutex<TtlCache<ContentKey, ContentVersion>>,
    current_published: Mutex<TtlCache<ContentKey, ContentVersion>>,
    history: Mutex<TtlCache<(ContentKey, String), Vec<ContentVersion>>>,
}

impl VersionStore {
    pub fn new(pool: DbPool, config: Arc<EngineConfig>) -> Self {
        Self {
            pool,
            current_draft: Mutex::new(TtlCache::new(
                config.version_cache_capacity,
                config.version_cache_ttl,
            )),
            current_published: Mutex::new(TtlCache::new(
                config.version_cache_capacity,
                config.version_cache_ttl,
            )),
            history: Mutex::new(TtlCache::new(
                config.history_cache_capacity,
                config.version_cache_ttl,
            )),
            config,
        }
    }

    // ── Mutations ────────────────────────────────────────────────────

    /// Create a new version. Drafts become the current draft for their key.
    pub async fn create_version(
        &self,
        input: &CreateContentVersion,
        actor_id: DbId,
    ) -> ChronicleResult<VersionOutcome> {
        let prepared = self.prepare_input(input)?;
        with_retries(self.config.max_retry_attempts, || {
            self.create_once(&prepared, actor_id, action_types::VERSION_CREATE)
        })
        .await
    }

    /// Capture an auto-save snapshot.
    ///
    /// Returns `Ok(None)` when the content hash matches the most recent
    /// version, so unchanged editor heartbeats do not pile up versions.
    /// Stale auto-saves beyond the keep-count are pruned off the save path.
    pub async fn auto_save(
        &self,
        input: &CreateContentVersion,
        actor_id: DbId,
    ) -> ChronicleResult<Option<VersionOutcome>> {
        let mut prepared = self.prepare_input(input)?;
        prepared.version_kind = VersionKind::AutoSave;
        let key = prepared.content_key();

        let latest_hash = ContentVersionRepo::latest_content_hash(&self.pool, &key)
            .await
            .map_err(classify_sqlx_error)?;
        if latest_hash.is_some() && latest_hash == prepared.content_hash {
            tracing::debug!(content_key = %key, "Auto-save skipped, content unchanged");
            return Ok(None);
        }

        let outcome = with_retries(self.config.max_retry_attempts, || {
            self.create_once(&prepared, actor_id, action_types::VERSION_AUTO_SAVE)
        })
        .await?;

        self.spawn_auto_save_prune(key);
        Ok(Some(outcome))
    }

    /// Make a version the current published one for its content key.
    ///
    /// Runs under SERIALIZABLE isolation; a concurrent publish of the same
    /// key surfaces as `Conflict` and is retried here.
    pub async fn publish_version(
        &self,
        tenant_id: DbId,
        version_id: DbId,
        actor_id: DbId,
    ) -> ChronicleResult<VersionOutcome> {
        with_retries(self.config.max_retry_attempts, || {
            self.publish_once(tenant_id, version_id, actor_id)
        })
        .await
    }

    /// Restore an earlier version by copying its content into a brand-new
    /// version and publishing that copy. History stays append-only: the
    /// revert itself is a visible, numbered version.
    pub async fn revert_to_version(
        &self,
        tenant_id: DbId,
        source_version_id: DbId,
        actor_id: DbId,
    ) -> ChronicleResult<VersionOutcome> {
        with_retries(self.config.max_retry_attempts, || {
            self.revert_once(tenant_id, source_version_id, actor_id)
        })
        .await
    }

    /// Permanently delete a version. Published versions are refused; the
    /// published history of a piece of content is immutable.
    pub async fn delete_version(
        &self,
        tenant_id: DbId,
        version_id: DbId,
        actor_id: DbId,
    ) -> ChronicleResult<VersionOutcome> {
        let version = self.load_owned(tenant_id, version_id).await?;
        if version.kind() == Some(VersionKind::Published) || version.is_current_published {
            return Err(ChronicleError::Validation(
                "published versions cannot be deleted".to_string(),
            ));
        }
        let key = version.content_key();

        // Tokens pointing at this version die with it (FK cascade); report
        // them so external validation caches can drop their entries.
        let doomed_tokens = PreviewTokenRepo::list_for_version(&self.pool, version_id)
            .await
            .map_err(classify_sqlx_error)?;

        let mut tx = self.pool.begin().await.map_err(classify_sqlx_error)?;
        AuditLogRepo::insert(
            &mut tx,
            &NewAuditEntry {
                tenant_id,
                actor_id,
                action_type: action_types::VERSION_DELETE,
                details: serde_json::json!({
                    "content_key": key.to_string(),
                    "version_id": version.id,
                    "version_number": version.version_number,
                    "version_kind": version.version_kind,
                }),
                sensitivity: classify_sensitivity(&version.body),
            },
        )
        .await
        .map_err(classify_sqlx_error)?;
        ContentVersionRepo::hard_delete(&mut tx, version_id)
            .await
            .map_err(classify_sqlx_error)?;
        tx.commit().await.map_err(classify_sqlx_error)?;

        self.invalidate_for_key(&key);
        let mut side_effects = version_mutation_effects(&key, version.id);
        side_effects.extend(
            doomed_tokens
                .iter()
                .map(|t| SideEffect::InvalidateToken { token_id: t.id }),
        );

        tracing::info!(
            content_key = %key,
            version_id,
            version_number = version.version_number,
            "Version deleted"
        );
        Ok(VersionOutcome {
            version,
            side_effects,
        })
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// A version by ID, tenant-checked.
    pub async fn get_version(
        &self,
        tenant_id: DbId,
        version_id: DbId,
    ) -> ChronicleResult<ContentVersion> {
        self.load_owned(tenant_id, version_id).await
    }

    /// The current draft for a content key, if one exists.
    pub async fn get_latest_draft(
        &self,
        key: &ContentKey,
    ) -> ChronicleResult<Option<ContentVersion>> {
        if let Some(hit) = lock_cache(&self.current_draft).get(key) {
            return Ok(Some(hit));
        }
        let version = ContentVersionRepo::get_current_draft(&self.pool, key)
            .await
            .map_err(classify_sqlx_error)?;
        if let Some(v) = &version {
            lock_cache(&self.current_draft).insert(key.clone(), v.clone());
        }
        Ok(version)
    }

    /// The current published version for a content key, if one exists.
    pub async fn get_published_version(
        &self,
        key: &ContentKey,
    ) -> ChronicleResult<Option<ContentVersion>> {
        if let Some(hit) = lock_cache(&self.current_published).get(key) {
            return Ok(Some(hit));
        }
        let version = ContentVersionRepo::get_current_published(&self.pool, key)
            .await
            .map_err(classify_sqlx_error)?;
        if let Some(v) = &version {
            lock_cache(&self.current_published).insert(key.clone(), v.clone());
        }
        Ok(version)
    }

    /// Filterable, paginated version history, newest first.
    pub async fn get_version_history(
        &self,
        key: &ContentKey,
        filter: &VersionHistoryFilter,
    ) -> ChronicleResult<Vec<ContentVersion>> {
        let cache_key = (key.clone(), filter_fingerprint(filter));
        if let Some(hit) = lock_cache(&self.history).get(&cache_key) {
            return Ok(hit);
        }
        let versions = ContentVersionRepo::list_history(&self.pool, key, filter)
            .await
            .map_err(classify_sqlx_error)?;
        lock_cache(&self.history).insert(cache_key, versions.clone());
        Ok(versions)
    }

    /// Total rows matching a history filter.
    pub async fn count_version_history(
        &self,
        key: &ContentKey,
        filter: &VersionHistoryFilter,
    ) -> ChronicleResult<i64> {
        ContentVersionRepo::count_history(&self.pool, key, filter)
            .await
            .map_err(classify_sqlx_error)
    }

    // ── Internals ────────────────────────────────────────────────────

    /// Validate and sanitize a create request: slug shape, length bounds,
    /// executable markup stripped from body and excerpt, content hash
    /// computed over the sanitized fields.
    fn prepare_input(&self, input: &CreateContentVersion) -> ChronicleResult<CreateContentVersion> {
        input
            .validate()
            .map_err(|e| ChronicleError::Validation(e.to_string()))?;
        if !is_valid_slug(&input.slug) {
            return Err(ChronicleError::Validation(format!(
                "invalid slug: {}",
                input.slug
            )));
        }

        let mut prepared = input.clone();
        prepared.body = strip_executable_markup(&input.body);
        prepared.excerpt = input
            .excerpt
            .as_deref()
            .map(strip_executable_markup);
        prepared.content_hash = Some(hashing::content_hash(
            &prepared.title,
            &prepared.body,
            prepared.excerpt.as_deref().unwrap_or(""),
        ));
        Ok(prepared)
    }

    async fn create_once(
        &self,
        input: &CreateContentVersion,
        actor_id: DbId,
        action_type: &'static str,
    ) -> ChronicleResult<VersionOutcome> {
        let key = input.content_key();
        let is_draft = input.version_kind == VersionKind::Draft;

        let mut tx = self.pool.begin().await.map_err(classify_sqlx_error)?;
        ContentVersionRepo::lock_content_key(&mut tx, &key)
            .await
            .map_err(classify_sqlx_error)?;

        let count = ContentVersionRepo::count_for_content(&mut tx, &key)
            .await
            .map_err(classify_sqlx_error)?;
        if count >= self.config.max_versions_per_content {
            return Err(ChronicleError::VersionLimitExceeded {
                limit: self.config.max_versions_per_content,
            });
        }

        let previous = ContentVersionRepo::latest_for_content(&mut tx, &key)
            .await
            .map_err(classify_sqlx_error)?;
        let changed = previous
            .as_ref()
            .map(|prev| changed_fields(&field_map(prev), &input_field_map(input)));
        let changed_json = changed.as_ref().map(|c| serde_json::json!(c));

        if is_draft {
            ContentVersionRepo::clear_current_draft(&mut tx, &key)
                .await
                .map_err(classify_sqlx_error)?;
        }
        let version =
            ContentVersionRepo::insert(&mut tx, input, changed_json.as_ref(), actor_id, is_draft)
                .await
                .map_err(classify_sqlx_error)?;

        AuditLogRepo::insert(
            &mut tx,
            &NewAuditEntry {
                tenant_id: key.tenant_id,
                actor_id,
                action_type,
                details: redact_sensitive_fields(&serde_json::json!({
                    "content_key": key.to_string(),
                    "version_id": version.id,
                    "version_number": version.version_number,
                    "version_kind": version.version_kind,
                    "changed_fields": changed_json,
                })),
                sensitivity: classify_sensitivity(&version.body),
            },
        )
        .await
        .map_err(classify_sqlx_error)?;
        tx.commit().await.map_err(classify_sqlx_error)?;

        self.invalidate_for_key(&key);
        tracing::info!(
            content_key = %key,
            version_id = version.id,
            version_number = version.version_number,
            kind = %version.version_kind,
            "Version created"
        );
        Ok(VersionOutcome {
            side_effects: version_mutation_effects(&key, version.id),
            version,
        })
    }

    async fn publish_once(
        &self,
        tenant_id: DbId,
        version_id: DbId,
        actor_id: DbId,
    ) -> ChronicleResult<VersionOutcome> {
        let version = self.load_owned(tenant_id, version_id).await?;
        let key = version.content_key();

        let mut tx = self.pool.begin().await.map_err(classify_sqlx_error)?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await
            .map_err(classify_sqlx_error)?;

        ContentVersionRepo::clear_current_published(&mut tx, &key)
            .await
            .map_err(classify_sqlx_error)?;
        let published = ContentVersionRepo::mark_published(&mut tx, version_id, actor_id)
            .await
            .map_err(classify_sqlx_error)?
            .ok_or(ChronicleError::NotFound {
                entity: "content_version",
                id: version_id,
            })?;
        ContentItemRepo::sync_published_fields(&mut tx, &published)
            .await
            .map_err(classify_sqlx_error)?;

        AuditLogRepo::insert(
            &mut tx,
            &NewAuditEntry {
                tenant_id,
                actor_id,
                action_type: action_types::VERSION_PUBLISH,
                details: serde_json::json!({
                    "content_key": key.to_string(),
                    "version_id": published.id,
                    "version_number": published.version_number,
                }),
                sensitivity: classify_sensitivity(&published.body),
            },
        )
        .await
        .map_err(classify_sqlx_error)?;
        tx.commit().await.map_err(classify_sqlx_error)?;

        self.invalidate_for_key(&key);
        tracing::info!(
            content_key = %key,
            version_id = published.id,
            version_number = published.version_number,
            "Version published"
        );
        Ok(VersionOutcome {
            side_effects: version_mutation_effects(&key, published.id),
            version: published,
        })
    }

    async fn revert_once(
        &self,
        tenant_id: DbId,
        source_version_id: DbId,
        actor_id: DbId,
    ) -> ChronicleResult<VersionOutcome> {
        let source = self.load_owned(tenant_id, source_version_id).await?;
        let key = source.content_key();
        let input = CreateContentVersion {
            tenant_id: source.tenant_id,
            locale: source.locale.clone(),
            content_type: source.content_type.clone(),
            content_id: source.content_id,
            version_kind: VersionKind::Draft,
            title: source.title.clone(),
            slug: source.slug.clone(),
            body: source.body.clone(),
            excerpt: source.excerpt.clone(),
            structured_data: Some(source.structured_data.clone()),
            metadata: Some(source.metadata.clone()),
            change_summary: Some(format!("Reverted to version {}", source.version_number)),
            content_hash: source.content_hash.clone(),
        };

        let mut tx = self.pool.begin().await.map_err(classify_sqlx_error)?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await
            .map_err(classify_sqlx_error)?;
        ContentVersionRepo::lock_content_key(&mut tx, &key)
            .await
            .map_err(classify_sqlx_error)?;

        let count = ContentVersionRepo::count_for_content(&mut tx, &key)
            .await
            .map_err(classify_sqlx_error)?;
        if count >= self.config.max_versions_per_content {
            return Err(ChronicleError::VersionLimitExceeded {
                limit: self.config.max_versions_per_content,
            });
        }

        ContentVersionRepo::clear_current_draft(&mut tx, &key)
            .await
            .map_err(classify_sqlx_error)?;
        let copy = ContentVersionRepo::insert(&mut tx, &input, None, actor_id, true)
            .await
            .map_err(classify_sqlx_error)?;
        ContentVersionRepo::clear_current_published(&mut tx, &key)
            .await
            .map_err(classify_sqlx_error)?;
        let published = ContentVersionRepo::mark_published(&mut tx, copy.id, actor_id)
            .await
            .map_err(classify_sqlx_error)?
            .ok_or(ChronicleError::NotFound {
                entity: "content_version",
                id: copy.id,
            })?;
        ContentItemRepo::sync_published_fields(&mut tx, &published)
            .await
            .map_err(classify_sqlx_error)?;

        AuditLogRepo::insert(
            &mut tx,
            &NewAuditEntry {
                tenant_id,
                actor_id,
                action_type: action_types::VERSION_REVERT,
                details: serde_json::json!({
                    "content_key": key.to_string(),
                    "source_version_id": source.id,
                    "source_version_number": source.version_number,
                    "new_version_id": published.id,
                    "new_version_number": published.version_number,
                }),
                sensitivity: classify_sensitivity(&published.body),
            },
        )
        .await
        .map_err(classify_sqlx_error)?;
        tx.commit().await.map_err(classify_sqlx_error)?;

        self.invalidate_for_key(&key);
        tracing::info!(
            content_key = %key,
            source_version_id,
            new_version_id = published.id,
            "Version reverted"
        );
        Ok(VersionOutcome {
            side_effects: version_mutation_effects(&key, published.id),
            version: published,
        })
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

    fn invalidate_for_key(&self, key: &ContentKey) {
        lock_cache(&self.current_draft).invalidate(key);
        lock_cache(&self.current_published).invalidate(key);
        lock_cache(&self.history).invalidate_matching(|(k, _)| k == key);
    }

    fn spawn_auto_save_prune(&self, key: ContentKey) {
        let pool = self.pool.clone();
        let keep = self.config.auto_save_keep;
        let cutoff = Utc::now() - self.config.auto_save_max_age;
        tokio::spawn(async move {
            let stale = match ContentVersionRepo::stale_auto_save_ids(&pool, &key, keep, cutoff)
                .await
            {
                Ok(ids) => ids,
                Err(e) => {
                    tracing::warn!(content_key = %key, error = %e, "Auto-save prune scan failed");
                    return;
                }
            };
            if stale.is_empty() {
                return;
            }
            match ContentVersionRepo::delete_by_ids(&pool, &stale).await {
                Ok(removed) => {
                    tracing::debug!(content_key = %key, removed, "Pruned stale auto-saves");
                }
                Err(e) => {
                    tracing::warn!(content_key = %key, error = %e, "Auto-save prune failed");
                }
            }
        });
    }
}

/// Stable cache-key form of a history filter.
fn filter_fingerprint(filter: &VersionHistoryFilter) -> String {
    format!(
        "{:?}:{:?}:{:?}:{:?}:{:?}:{:?}",
        filter.kind,
        filter.created_by_id,
        filter.created_after,
        filter.created_before,
        filter.limit,
        filter.offset,
    )
}

fn field_map(version: &ContentVersion) -> serde_json::Map<String, serde_json::Value> {
    build_field_map(
        &version.title,
        &version.slug,
        &version.body,
        version.excerpt.as_deref(),
        &version.metadata,
    )
}

fn input_field_map(input: &CreateContentVersion) -> serde_json::Map<String, serde_json::Value> {
    // Absent metadata persists as an empty object, so compare it as one.
    let metadata = input
        .metadata
        .clone()
        .unwrap_or_else(|| serde_json::json!({}));
    build_field_map(
        &input.title,
        &input.slug,
        &input.body,
        input.excerpt.as_deref(),
        &metadata,
    )
}

fn build_field_map(
    title: &str,
    slug: &str,
    body: &str,
    excerpt: Option<&str>,
    metadata: &serde_json::Value,
) -> serde_json::Map<String, serde_json::Value> {
    let mut map = serde_json::Map::new();
    map.insert("title".to_string(), serde_json::json!(title));
    map.insert("slug".to_string(), serde_json::json!(slug));
    map.insert("body".to_string(), serde_json::json!(body));
    map.insert("excerpt".to_string(), serde_json::json!(excerpt));
    map.insert("metadata".to_string(), metadata.clone());
    map
}
