//! Integration tests for the version lifecycle service.
//!
//! Exercises `VersionStore` against a real database:
//! - Create assigns numbers, moves the current-draft flag, and audits
//! - Executable markup is stripped before persisting
//! - Publish swaps the published flag and syncs the content item
//! - Revert copies into a new published version
//! - Delete refuses published versions
//! - Auto-save dedupes on content hash

use std::sync::Arc;

use assert_matches::assert_matches;
use sqlx::PgPool;

use chronicle_core::error::ChronicleError;
use chronicle_core::types::{ContentKey, VersionKind};
use chronicle_db::models::content_item::CreateContentItem;
use chronicle_db::models::content_version::{CreateContentVersion, VersionHistoryFilter};
use chronicle_db::repositories::{AuditLogRepo, ContentItemRepo};
use chronicle_engine::{EngineConfig, VersionStore};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn test_config() -> EngineConfig {
    EngineConfig::new([7u8; 32], "https://preview.example.com")
}

fn store(pool: &PgPool) -> VersionStore {
    VersionStore::new(pool.clone(), Arc::new(test_config()))
}

fn key(content_id: i64) -> ContentKey {
    ContentKey::new(1, "article", content_id)
}

fn draft(content_id: i64, title: &str, body: &str) -> CreateContentVersion {
    CreateContentVersion {
        tenant_id: 1,
        locale: "en".to_string(),
        content_type: "article".to_string(),
        content_id,
        version_kind: VersionKind::Draft,
        title: title.to_string(),
        slug: "my-article".to_string(),
        body: body.to_string(),
        excerpt: None,
        structured_data: None,
        metadata: None,
        change_summary: None,
        content_hash: None,
    }
}

async fn seed_item(pool: &PgPool, title: &str) -> i64 {
    ContentItemRepo::create(
        pool,
        &CreateContentItem {
            tenant_id: 1,
            content_type: "article".to_string(),
            locale: "en".to_string(),
            title: title.to_string(),
            slug: "my-article".to_string(),
            body: String::new(),
            metadata: None,
        },
    )
    .await
    .unwrap()
    .id
}

// ---------------------------------------------------------------------------
// Test: create assigns numbers, flags, and audit entries
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn test_create_version(pool: PgPool) {
    let store = store(&pool);

    let first = store.create_version(&draft(1, "One", "Body one."), 7).await.unwrap();
    assert_eq!(first.version.version_number, 1);
    assert!(first.version.is_current_draft);
    assert_eq!(first.version.created_by_id, 7);
    assert!(first.version.content_hash.is_some());
    assert_eq!(first.side_effects.len(), 5);

    let second = store.create_version(&draft(1, "Two", "Body two."), 7).await.unwrap();
    assert_eq!(second.version.version_number, 2);
    assert!(second.version.is_current_draft);

    let current = store.get_latest_draft(&key(1)).await.unwrap().unwrap();
    assert_eq!(current.id, second.version.id, "flag moved to the newest draft");

    // The changed-fields annotation names what differed from v1.
    let changed = second.version.changed_fields.unwrap();
    let changed: Vec<String> = serde_json::from_value(changed).unwrap();
    assert!(changed.contains(&"title".to_string()));
    assert!(changed.contains(&"body".to_string()));
    assert!(!changed.contains(&"slug".to_string()));

    let audit = AuditLogRepo::list_recent(&pool, 1, 10).await.unwrap();
    assert_eq!(audit.len(), 2);
    assert!(audit.iter().all(|e| e.action_type == "version_create"));
}

// ---------------------------------------------------------------------------
// Test: concurrent creates for one key get gap-free, unique numbers
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn test_concurrent_creates_number_without_gaps(pool: PgPool) {
    let store = store(&pool);

    // All four race on the same content key; the advisory lock serializes
    // number assignment.
    let (da, db, dc, dd) = (
        draft(9, "A", "body a"),
        draft(9, "B", "body b"),
        draft(9, "C", "body c"),
        draft(9, "D", "body d"),
    );
    let (a, b, c, d) = tokio::join!(
        store.create_version(&da, 7),
        store.create_version(&db, 7),
        store.create_version(&dc, 7),
        store.create_version(&dd, 7),
    );
    let mut numbers: Vec<i32> = [a, b, c, d]
        .into_iter()
        .map(|outcome| outcome.unwrap().version.version_number)
        .collect();
    numbers.sort_unstable();
    assert_eq!(numbers, vec![1, 2, 3, 4]);

    let history = store
        .get_version_history(&key(9), &VersionHistoryFilter::default())
        .await
        .unwrap();
    assert_eq!(history.len(), 4);
}

// ---------------------------------------------------------------------------
// Test: executable markup is stripped before persisting
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn test_create_sanitizes_body(pool: PgPool) {
    let store = store(&pool);
    let body = r#"<p onclick="steal()">Hello</p><script>alert(1)</script>"#;
    let outcome = store.create_version(&draft(2, "Clean", body), 7).await.unwrap();

    assert!(!outcome.version.body.contains("<script"));
    assert!(!outcome.version.body.contains("onclick"));
    assert!(outcome.version.body.contains("Hello"));
}

// ---------------------------------------------------------------------------
// Test: validation failures are rejected before any write
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn test_create_rejects_bad_input(pool: PgPool) {
    let store = store(&pool);

    let mut bad_slug = draft(3, "Title", "Body.");
    bad_slug.slug = "Not A Slug!".to_string();
    assert_matches!(
        store.create_version(&bad_slug, 7).await,
        Err(ChronicleError::Validation(_))
    );

    let empty_title = draft(3, "", "Body.");
    assert_matches!(
        store.create_version(&empty_title, 7).await,
        Err(ChronicleError::Validation(_))
    );

    let history = store
        .get_version_history(&key(3), &VersionHistoryFilter::default())
        .await
        .unwrap();
    assert!(history.is_empty(), "rejected input must not persist");
}

// ---------------------------------------------------------------------------
// Test: per-key version cap
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn test_version_limit(pool: PgPool) {
    let mut config = test_config();
    config.max_versions_per_content = 2;
    let store = VersionStore::new(pool.clone(), Arc::new(config));

    store.create_version(&draft(4, "One", "a"), 7).await.unwrap();
    store.create_version(&draft(4, "Two", "b"), 7).await.unwrap();
    assert_matches!(
        store.create_version(&draft(4, "Three", "c"), 7).await,
        Err(ChronicleError::VersionLimitExceeded { limit: 2 })
    );
}

// ---------------------------------------------------------------------------
// Test: publish swaps the flag and syncs the content item
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn test_publish_version(pool: PgPool) {
    let store = store(&pool);
    let item_id = seed_item(&pool, "Old title").await;

    let v1 = store
        .create_version(&draft(item_id, "Published title", "Live body."), 7)
        .await
        .unwrap();
    let published = store.publish_version(1, v1.version.id, 9).await.unwrap();

    assert!(published.version.is_current_published);
    assert_eq!(published.version.version_kind, "published");
    assert_eq!(published.version.published_by_id, Some(9));

    let item = ContentItemRepo::find_by_id(&pool, item_id).await.unwrap().unwrap();
    assert_eq!(item.title, "Published title");
    assert_eq!(item.body, "Live body.");

    let current = store.get_published_version(&key(item_id)).await.unwrap().unwrap();
    assert_eq!(current.id, v1.version.id);

    // Publishing a second version moves the flag.
    let v2 = store
        .create_version(&draft(item_id, "Newer title", "Newer body."), 7)
        .await
        .unwrap();
    store.publish_version(1, v2.version.id, 9).await.unwrap();
    let current = store.get_published_version(&key(item_id)).await.unwrap().unwrap();
    assert_eq!(current.id, v2.version.id);

    let old = store.get_version(1, v1.version.id).await.unwrap();
    assert!(!old.is_current_published);
}

// ---------------------------------------------------------------------------
// Test: publish enforces tenant scope
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn test_publish_tenant_mismatch(pool: PgPool) {
    let store = store(&pool);
    let v = store.create_version(&draft(6, "Mine", "Body."), 7).await.unwrap();

    assert_matches!(
        store.publish_version(2, v.version.id, 9).await,
        Err(ChronicleError::TenantMismatch(_))
    );
}

// ---------------------------------------------------------------------------
// Test: revert copies into a new published version
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn test_revert_to_version(pool: PgPool) {
    let store = store(&pool);
    let item_id = seed_item(&pool, "Start").await;

    let v1 = store
        .create_version(&draft(item_id, "Good", "Good body."), 7)
        .await
        .unwrap();
    store
        .create_version(&draft(item_id, "Bad", "Bad body."), 7)
        .await
        .unwrap();

    let reverted = store.revert_to_version(1, v1.version.id, 9).await.unwrap();
    assert_eq!(reverted.version.version_number, 3, "revert is a new version");
    assert_eq!(reverted.version.title, "Good");
    assert!(reverted.version.is_current_published);
    assert_eq!(
        reverted.version.change_summary.as_deref(),
        Some("Reverted to version 1")
    );

    let item = ContentItemRepo::find_by_id(&pool, item_id).await.unwrap().unwrap();
    assert_eq!(item.title, "Good");

    // The source version is untouched.
    let source = store.get_version(1, v1.version.id).await.unwrap();
    assert_eq!(source.version_number, 1);
    assert!(!source.is_current_published);
}

// ---------------------------------------------------------------------------
// Test: delete refuses published versions, removes drafts
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn test_delete_version(pool: PgPool) {
    let store = store(&pool);
    let item_id = seed_item(&pool, "Start").await;

    let v1 = store.create_version(&draft(item_id, "One", "a"), 7).await.unwrap();
    let v2 = store.create_version(&draft(item_id, "Two", "b"), 7).await.unwrap();
    store.publish_version(1, v2.version.id, 7).await.unwrap();

    assert_matches!(
        store.delete_version(1, v2.version.id, 7).await,
        Err(ChronicleError::Validation(_))
    );

    let deleted = store.delete_version(1, v1.version.id, 7).await.unwrap();
    assert_eq!(deleted.version.id, v1.version.id);
    assert_matches!(
        store.get_version(1, v1.version.id).await,
        Err(ChronicleError::NotFound { .. })
    );
}

// ---------------------------------------------------------------------------
// Test: auto-save dedupes on content hash
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn test_auto_save_dedup(pool: PgPool) {
    let store = store(&pool);

    let first = store.auto_save(&draft(8, "Working", "In progress."), 7).await.unwrap();
    let saved = first.expect("first auto-save should persist");
    assert_eq!(saved.version.version_kind, "auto_save");
    assert!(!saved.version.is_current_draft, "auto-saves never take the draft flag");

    // Identical content: skipped.
    let second = store.auto_save(&draft(8, "Working", "In progress."), 7).await.unwrap();
    assert!(second.is_none());

    // Changed content: persists with the next number.
    let third = store.auto_save(&draft(8, "Working", "In progress, more."), 7).await.unwrap();
    assert_eq!(third.unwrap().version.version_number, 2);
}
