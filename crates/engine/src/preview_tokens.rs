//! Preview token service: minting, validation, and revocation of shareable
//! access tokens for unpublished versions.
//!
//! The plaintext secret is returned to the minter exactly once. Validation
//! checks run in a fixed order so callers get the most specific rejection:
//! revoked before expired, expired before use budget, use budget before the
//! password and allow-list gates. Successful validations of unrestricted
//! tokens are cached briefly by hash.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::{Duration, Utc};
use uuid::Uuid;
use validator::Validate;

use chronicle_core::audit::{action_types, DataSensitivity};
use chronicle_core::cache::TtlCache;
use chronicle_core::effects::SideEffect;
use chronicle_core::error::{ChronicleError, ChronicleResult};
use chronicle_core::tokens::{
    generate_token, hash_access_password, hash_token, verify_access_password, PayloadCipher,
    TokenPayload,
};
use chronicle_core::types::{DbId, Timestamp};
use chronicle_db::models::audit_log::NewAuditEntry;
use chronicle_db::models::content_version::ContentVersion;
use chronicle_db::models::preview_token::{CreatePreviewToken, PreviewToken, PreviewTokenRequest};
use chronicle_db::models::token_analytics::CreateTokenAnalyticsEvent;
use chronicle_db::repositories::{
    AuditLogRepo, ContentVersionRepo, PreviewTokenRepo, TokenAnalyticsRepo,
};
use chronicle_db::{classify_sqlx_error, DbPool};

use crate::config::EngineConfig;
use crate::lock_cache;

/// A freshly minted token. `secret` is shown once and never stored.
#[derive(Debug)]
pub struct IssuedToken {
    pub token: PreviewToken,
    pub secret: String,
    pub share_url: String,
}

/// Everything a presenter supplies (or the transport knows) at validation.
#[derive(Debug, Clone, Default)]
pub struct AccessContext {
    pub ip: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub user_agent: Option<String>,
    pub referer: Option<String>,
}

/// A successful validation: the version the token grants access to.
#[derive(Debug, Clone)]
pub struct TokenAccess {
    pub token_id: DbId,
    pub version: ContentVersion,
    pub settings: serde_json::Value,
}

/// The result of a token mutation (revocation).
#[derive(Debug)]
pub struct TokenOutcome {
    pub token: PreviewToken,
    pub side_effects: Vec<SideEffect>,
}

#[derive(Clone)]
struct CachedAccess {
    token_id: DbId,
    expires_at: Timestamp,
    version: ContentVersion,
    settings: serde_json::Value,
}

/// Token lifecycle operations over one connection pool.
pub struct PreviewTokenService {
    pool: DbPool,
    config: Arc<EngineConfig>,
    cipher: PayloadCipher,
    /// Successful validations keyed by token hash. Only tokens with no use
    /// budget, password, or allow-lists are cached; everything else must
    /// hit the authoritative row every time.
    cache: Mutex<TtlCache<String, CachedAccess>>,
}

impl PreviewTokenService {
    pub fn new(pool: DbPool, config: Arc<EngineConfig>) -> Self {
        Self {
            pool,
            cipher: PayloadCipher::new(&config.master_key),
            cache: Mutex::new(TtlCache::new(
                config.token_cache_capacity,
                config.token_cache_ttl,
            )),
            config,
        }
    }

    // ── Minting ──────────────────────────────────────────────────────

    /// Mint a token granting access to one version.
    pub async fn generate_token(
        &self,
        request: &PreviewTokenRequest,
        actor_id: DbId,
    ) -> ChronicleResult<IssuedToken> {
        request
            .validate()
            .map_err(|e| ChronicleError::Validation(e.to_string()))?;

        let version = ContentVersionRepo::find_by_id(&self.pool, request.version_id)
            .await
            .map_err(classify_sqlx_error)?
            .ok_or(ChronicleError::NotFound {
                entity: "content_version",
                id: request.version_id,
            })?;
        if version.tenant_id != request.tenant_id {
            return Err(ChronicleError::TenantMismatch(format!(
                "version {} belongs to another tenant",
                request.version_id
            )));
        }

        let active = PreviewTokenRepo::count_active_for_actor(
            &self.pool,
            request.tenant_id,
            actor_id,
        )
        .await
        .map_err(classify_sqlx_error)?;
        if active >= self.config.max_active_tokens_per_actor {
            return Err(ChronicleError::Validation(format!(
                "active token limit reached ({})",
                self.config.max_active_tokens_per_actor
            )));
        }

        let ttl_secs = request
            .ttl_secs
            .unwrap_or(self.config.default_token_ttl_secs)
            .clamp(1, self.config.max_token_ttl_secs);
        let expires_at = Utc::now() + Duration::seconds(ttl_secs);

        let generated = generate_token();
        let sealed = self.cipher.seal(&TokenPayload {
            tenant_id: request.tenant_id,
            version_id: request.version_id,
            expires_at,
            nonce: Uuid::new_v4(),
        })?;
        let password_hash = request
            .password
            .as_deref()
            .map(hash_access_password)
            .transpose()?;

        let create = CreatePreviewToken {
            tenant_id: request.tenant_id,
            version_id: request.version_id,
            token_kind: request.token_kind,
            token_hash: generated.hash,
            token_prefix: generated.prefix,
            sealed_payload: sealed,
            domain: request.domain.clone(),
            locale: request.locale.clone(),
            expires_at,
            max_uses: request.max_uses,
            password_hash,
            allowed_ips: request.allowed_ips.clone().unwrap_or_default(),
            allowed_emails: request.allowed_emails.clone().unwrap_or_default(),
            settings: request.settings.clone().unwrap_or_else(|| serde_json::json!({})),
            created_by_id: actor_id,
        };

        let mut tx = self.pool.begin().await.map_err(classify_sqlx_error)?;
        let token = PreviewTokenRepo::insert(&mut tx, &create)
            .await
            .map_err(classify_sqlx_error)?;
        AuditLogRepo::insert(
            &mut tx,
            &NewAuditEntry {
                tenant_id: request.tenant_id,
                actor_id,
                action_type: action_types::TOKEN_GENERATE,
                details: serde_json::json!({
                    "token_id": token.id,
                    "token_prefix": token.token_prefix,
                    "token_kind": token.token_kind,
                    "version_id": token.version_id,
                    "expires_at": token.expires_at,
                    "max_uses": token.max_uses,
                    "password_gated": token.password_hash.is_some(),
                }),
                sensitivity: DataSensitivity::Normal,
            },
        )
        .await
        .map_err(classify_sqlx_error)?;
        tx.commit().await.map_err(classify_sqlx_error)?;

        let share_url = format!(
            "{}/preview/{}",
            self.config.preview_base_url.trim_end_matches('/'),
            generated.plaintext
        );
        tracing::info!(
            tenant_id = token.tenant_id,
            token_id = token.id,
            token_prefix = %token.token_prefix,
            version_id = token.version_id,
            "Preview token minted"
        );
        Ok(IssuedToken {
            token,
            secret: generated.plaintext,
            share_url,
        })
    }

    // ── Validation ───────────────────────────────────────────────────

    /// Validate a presented secret and return the version it unlocks.
    ///
    /// Consumes one use on success and records an analytics event off the
    /// caller's path.
    pub async fn validate_token(
        &self,
        secret: &str,
        ctx: &AccessContext,
    ) -> ChronicleResult<TokenAccess> {
        let started = Instant::now();
        let token_hash = hash_token(secret);

        if let Some(hit) = lock_cache(&self.cache).get(&token_hash) {
            if hit.expires_at > Utc::now() {
                self.spawn_use_recording(hit.token_id, hit.version.tenant_id, ctx, started, true);
                return Ok(TokenAccess {
                    token_id: hit.token_id,
                    version: hit.version,
                    settings: hit.settings,
                });
            }
            lock_cache(&self.cache).invalidate(&token_hash);
            return Err(ChronicleError::TokenExpired);
        }

        let token = PreviewTokenRepo::find_by_hash(&self.pool, &token_hash)
            .await
            .map_err(classify_sqlx_error)?
            .ok_or(ChronicleError::NotFound {
                entity: "preview_token",
                id: 0,
            })?;

        self.check_access(&token, ctx)?;

        // Verify the sealed claims still match the row; a mismatch means the
        // stored payload was tampered with.
        let payload = self.cipher.open(&token.sealed_payload)?;
        if payload.tenant_id != token.tenant_id || payload.version_id != token.version_id {
            tracing::error!(token_id = token.id, "Token payload does not match its row");
            return Err(ChronicleError::Internal("token payload mismatch".to_string()));
        }

        // Consume a use atomically; losing the race means another validation
        // took the last use (or the token died) in between.
        let consumed = PreviewTokenRepo::record_use(&self.pool, token.id)
            .await
            .map_err(classify_sqlx_error)?
            .ok_or(if token.max_uses.is_some() {
                ChronicleError::TokenUseExceeded
            } else {
                ChronicleError::TokenExpired
            })?;

        let version = ContentVersionRepo::find_by_id(&self.pool, token.version_id)
            .await
            .map_err(classify_sqlx_error)?
            .ok_or(ChronicleError::NotFound {
                entity: "content_version",
                id: token.version_id,
            })?;

        if consumed.max_uses.is_none()
            && consumed.password_hash.is_none()
            && consumed.allowed_ips.is_empty()
            && consumed.allowed_emails.is_empty()
        {
            lock_cache(&self.cache).insert(
                token_hash,
                CachedAccess {
                    token_id: consumed.id,
                    expires_at: consumed.expires_at,
                    version: version.clone(),
                    settings: consumed.settings.clone(),
                },
            );
        }

        self.spawn_analytics(&consumed, ctx, started);
        Ok(TokenAccess {
            token_id: consumed.id,
            version,
            settings: consumed.settings,
        })
    }

    // ── Revocation ───────────────────────────────────────────────────

    /// Revoke a token permanently. Only its creator or a tenant admin may
    /// revoke; the validation cache entry is dropped synchronously.
    pub async fn revoke_token(
        &self,
        tenant_id: DbId,
        token_id: DbId,
        actor_id: DbId,
        is_tenant_admin: bool,
        reason: Option<&str>,
    ) -> ChronicleResult<TokenOutcome> {
        let token = PreviewTokenRepo::find_by_id(&self.pool, token_id)
            .await
            .map_err(classify_sqlx_error)?
            .ok_or(ChronicleError::NotFound {
                entity: "preview_token",
                id: token_id,
            })?;
        if token.tenant_id != tenant_id {
            return Err(ChronicleError::TenantMismatch(format!(
                "token {token_id} belongs to another tenant"
            )));
        }
        if token.created_by_id != actor_id && !is_tenant_admin {
            return Err(ChronicleError::AccessRestricted(
                "only the creator or a tenant admin may revoke a token".to_string(),
            ));
        }

        let revoked = PreviewTokenRepo::revoke(&self.pool, token_id, reason)
            .await
            .map_err(classify_sqlx_error)?
            .ok_or(ChronicleError::NotFound {
                entity: "preview_token",
                id: token_id,
            })?;
        lock_cache(&self.cache).invalidate(&revoked.token_hash);

        let mut conn = self.pool.acquire().await.map_err(classify_sqlx_error)?;
        AuditLogRepo::insert(
            &mut conn,
            &NewAuditEntry {
                tenant_id,
                actor_id,
                action_type: action_types::TOKEN_REVOKE,
                details: serde_json::json!({
                    "token_id": revoked.id,
                    "token_prefix": revoked.token_prefix,
                    "reason": reason,
                }),
                sensitivity: DataSensitivity::Normal,
            },
        )
        .await
        .map_err(classify_sqlx_error)?;

        tracing::info!(tenant_id, token_id, "Preview token revoked");
        Ok(TokenOutcome {
            side_effects: vec![SideEffect::InvalidateToken { token_id }],
            token: revoked,
        })
    }

    // ── Internals ────────────────────────────────────────────────────

    /// Gate checks in rejection-precedence order: revoked, expired, use
    /// budget, password, IP allow-list, email allow-list.
    fn check_access(&self, token: &PreviewToken, ctx: &AccessContext) -> ChronicleResult<()> {
        if token.revoked_at.is_some() {
            return Err(ChronicleError::TokenRevoked);
        }
        if token.expires_at <= Utc::now() {
            return Err(ChronicleError::TokenExpired);
        }
        if let Some(max) = token.max_uses {
            if token.use_count >= max {
                return Err(ChronicleError::TokenUseExceeded);
            }
        }
        if let Some(stored) = &token.password_hash {
            let presented = ctx.password.as_deref().ok_or(ChronicleError::PasswordRequired)?;
            if !verify_access_password(presented, stored)? {
                return Err(ChronicleError::PasswordInvalid);
            }
        }
        if !token.allowed_ips.is_empty() {
            let allowed = ctx
                .ip
                .as_deref()
                .is_some_and(|ip| token.allowed_ips.iter().any(|a| a == ip));
            if !allowed {
                return Err(ChronicleError::AccessRestricted(
                    "presenter IP is not on the token's allow-list".to_string(),
                ));
            }
        }
        if !token.allowed_emails.is_empty() {
            let allowed = ctx.email.as_deref().is_some_and(|email| {
                token
                    .allowed_emails
                    .iter()
                    .any(|a| a.eq_ignore_ascii_case(email))
            });
            if !allowed {
                return Err(ChronicleError::AccessRestricted(
                    "presenter email is not on the token's allow-list".to_string(),
                ));
            }
        }
        Ok(())
    }

    fn spawn_analytics(&self, token: &PreviewToken, ctx: &AccessContext, started: Instant) {
        self.spawn_use_recording(token.id, token.tenant_id, ctx, started, false);
    }

    /// Record the use off the validation caller's path. `consume` is set on
    /// the cache-hit path, where the synchronous `record_use` was skipped.
    fn spawn_use_recording(
        &self,
        token_id: DbId,
        tenant_id: DbId,
        ctx: &AccessContext,
        started: Instant,
        consume: bool,
    ) {
        let pool = self.pool.clone();
        let event = CreateTokenAnalyticsEvent {
            token_id,
            tenant_id,
            ip_address: ctx.ip.clone(),
            user_agent: ctx.user_agent.clone(),
            referer: ctx.referer.clone(),
            response_time_ms: Some(started.elapsed().as_millis() as i32),
        };
        tokio::spawn(async move {
            if consume {
                if let Err(e) = PreviewTokenRepo::record_use(&pool, token_id).await {
                    tracing::warn!(token_id, error = %e, "Deferred use recording failed");
                }
            }
            if let Err(e) = TokenAnalyticsRepo::insert(&pool, &event).await {
                tracing::warn!(token_id, error = %e, "Token analytics recording failed");
            }
        });
    }
}
