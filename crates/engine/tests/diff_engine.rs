//! Integration tests for the comparison service.
//!
//! Exercises `DiffEngine` against a real database:
//! - Full comparison across text, structure, metadata, and stats
//! - Tenant scope enforcement on both sides
//! - Audit entry per computed comparison
//! - Export passthrough

use std::sync::Arc;

use assert_matches::assert_matches;
use sqlx::PgPool;

use chronicle_core::diff::{DiffExportFormat, DiffOptions};
use chronicle_core::effects::SideEffect;
use chronicle_core::error::ChronicleError;
use chronicle_core::types::{ContentKey, VersionKind};
use chronicle_db::models::content_item::CreateContentItem;
use chronicle_db::models::content_version::CreateContentVersion;
use chronicle_db::repositories::{AuditLogRepo, ContentItemRepo, ContentVersionRepo};
use chronicle_engine::{DiffEngine, EngineConfig, VersionStore};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn engine(pool: &PgPool) -> DiffEngine {
    DiffEngine::new(
        pool.clone(),
        Arc::new(EngineConfig::new([7u8; 32], "https://preview.example.com")),
    )
}

async fn seed_version(
    pool: &PgPool,
    tenant_id: i64,
    body: &str,
    metadata: serde_json::Value,
) -> i64 {
    let input = CreateContentVersion {
        tenant_id,
        locale: "en".to_string(),
        content_type: "article".to_string(),
        content_id: 1,
        version_kind: VersionKind::Draft,
        title: "Compared".to_string(),
        slug: "compared".to_string(),
        body: body.to_string(),
        excerpt: None,
        structured_data: None,
        metadata: Some(metadata),
        change_summary: None,
        content_hash: None,
    };
    let mut tx = pool.begin().await.unwrap();
    let key = ContentKey::new(tenant_id, "article", 1);
    ContentVersionRepo::lock_content_key(&mut tx, &key).await.unwrap();
    let version = ContentVersionRepo::insert(&mut tx, &input, None, 7, false)
        .await
        .unwrap();
    tx.commit().await.unwrap();
    version.id
}

// ---------------------------------------------------------------------------
// Test: full comparison populates all layers and audits
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn test_compare_versions(pool: PgPool) {
    let engine = engine(&pool);
    let a = seed_version(
        &pool,
        1,
        "<p>one two three</p>",
        serde_json::json!({"title": "Old"}),
    )
    .await;
    let b = seed_version(
        &pool,
        1,
        "<p>one 2 three</p><img src=\"new.png\">",
        serde_json::json!({"title": "New"}),
    )
    .await;

    let diff = engine
        .compare_versions(1, 7, a, b, &DiffOptions::default())
        .await
        .unwrap();
    assert_eq!(diff.version_a_id, a);
    assert_eq!(diff.version_b_id, b);
    assert!(!diff.text.hunks.is_empty());
    assert!(diff.structural.elements_added >= 1, "the img was added");
    assert_eq!(diff.metadata.len(), 1);
    assert!(diff.stats.complexity_score > 0.0);

    let audit = AuditLogRepo::list_recent(&pool, 1, 10).await.unwrap();
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].action_type, "version_compare");

    // Same request again is served from cache: no second audit entry.
    engine
        .compare_versions(1, 7, a, b, &DiffOptions::default())
        .await
        .unwrap();
    let audit = AuditLogRepo::list_recent(&pool, 1, 10).await.unwrap();
    assert_eq!(audit.len(), 1);
}

// ---------------------------------------------------------------------------
// Test: tenant scope is enforced on both sides
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn test_compare_tenant_mismatch(pool: PgPool) {
    let engine = engine(&pool);
    let mine = seed_version(&pool, 1, "a", serde_json::json!({})).await;
    let theirs = seed_version(&pool, 2, "b", serde_json::json!({})).await;

    assert_matches!(
        engine.compare_versions(1, 7, mine, theirs, &DiffOptions::default()).await,
        Err(ChronicleError::TenantMismatch(_))
    );
    assert_matches!(
        engine.compare_versions(2, 7, mine, theirs, &DiffOptions::default()).await,
        Err(ChronicleError::TenantMismatch(_))
    );
    assert_matches!(
        engine.compare_versions(1, 7, mine, 999_999, &DiffOptions::default()).await,
        Err(ChronicleError::NotFound { .. })
    );
}

// ---------------------------------------------------------------------------
// Test: a cached comparison never leaks across tenants
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn test_cached_comparison_stays_tenant_scoped(pool: PgPool) {
    let engine = engine(&pool);
    let a = seed_version(&pool, 1, "quarterly revenue: 4.2M", serde_json::json!({})).await;
    let b = seed_version(&pool, 1, "quarterly revenue: 5.1M", serde_json::json!({})).await;

    // The owning tenant warms the cache for this pair.
    engine
        .compare_versions(1, 7, a, b, &DiffOptions::default())
        .await
        .unwrap();

    // The same pair requested by another tenant must still hit the
    // ownership check, not the warmed entry.
    assert_matches!(
        engine.compare_versions(2, 7, a, b, &DiffOptions::default()).await,
        Err(ChronicleError::TenantMismatch(_))
    );
}

// ---------------------------------------------------------------------------
// Test: publishing a compared version drops its cached comparisons
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn test_publish_invalidates_cached_comparisons(pool: PgPool) {
    let config = Arc::new(EngineConfig::new([7u8; 32], "https://preview.example.com"));
    let engine = DiffEngine::new(pool.clone(), config.clone());
    let store = VersionStore::new(pool.clone(), config);

    let item_id = ContentItemRepo::create(
        &pool,
        &CreateContentItem {
            tenant_id: 1,
            content_type: "article".to_string(),
            locale: "en".to_string(),
            title: "Start".to_string(),
            slug: "compared".to_string(),
            body: String::new(),
            metadata: None,
        },
    )
    .await
    .unwrap()
    .id;

    let new_draft = |title: &str, body: &str| CreateContentVersion {
        tenant_id: 1,
        locale: "en".to_string(),
        content_type: "article".to_string(),
        content_id: item_id,
        version_kind: VersionKind::Draft,
        title: title.to_string(),
        slug: "compared".to_string(),
        body: body.to_string(),
        excerpt: None,
        structured_data: None,
        metadata: None,
        change_summary: None,
        content_hash: None,
    };
    let a = store.create_version(&new_draft("One", "first body"), 7).await.unwrap();
    let b = store.create_version(&new_draft("Two", "second body"), 7).await.unwrap();

    let compare_count = |entries: Vec<chronicle_db::models::audit_log::AuditLogEntry>| {
        entries
            .iter()
            .filter(|e| e.action_type == "version_compare")
            .count()
    };

    engine
        .compare_versions(1, 7, a.version.id, b.version.id, &DiffOptions::default())
        .await
        .unwrap();
    let audit = AuditLogRepo::list_recent(&pool, 1, 50).await.unwrap();
    assert_eq!(compare_count(audit), 1);

    // Dispatch the publish outcome's effects the way an embedding caller
    // would; the diff invalidation carries the published version's id.
    let published = store.publish_version(1, b.version.id, 9).await.unwrap();
    assert!(published
        .side_effects
        .contains(&SideEffect::InvalidateDiffs { version_id: b.version.id }));
    for effect in &published.side_effects {
        if let SideEffect::InvalidateDiffs { version_id } = effect {
            engine.invalidate_version(*version_id);
        }
    }

    // The pair is gone from the cache: the next request recomputes and
    // writes a second audit entry.
    engine
        .compare_versions(1, 7, a.version.id, b.version.id, &DiffOptions::default())
        .await
        .unwrap();
    let audit = AuditLogRepo::list_recent(&pool, 1, 50).await.unwrap();
    assert_eq!(compare_count(audit), 2);
}

// ---------------------------------------------------------------------------
// Test: export passthrough
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn test_export(pool: PgPool) {
    let engine = engine(&pool);
    let a = seed_version(&pool, 1, "alpha", serde_json::json!({})).await;
    let b = seed_version(&pool, 1, "beta", serde_json::json!({})).await;

    let diff = engine
        .compare_versions(1, 7, a, b, &DiffOptions::default())
        .await
        .unwrap();

    let json = engine.export(&diff, DiffExportFormat::Json).unwrap();
    assert!(serde_json::from_str::<serde_json::Value>(&json).is_ok());

    let html = engine.export(&diff, DiffExportFormat::Html).unwrap();
    assert!(html.contains("class=\"diff\""));
}
