//! Service layer: the three engine components plus background jobs.
//!
//! Each component owns its caches as instance fields and exposes plain
//! async methods; there is no HTTP surface here. Mutations return outcome
//! structs carrying side-effect descriptors for the embedding application
//! to dispatch.

pub mod background;
pub mod config;
pub mod diff_engine;
pub mod preview_tokens;
pub mod version_store;

pub use config::EngineConfig;
pub use diff_engine::DiffEngine;
pub use preview_tokens::PreviewTokenService;
pub use version_store::VersionStore;

/// Lock a cache mutex, recovering from poisoning. The caches hold derived
/// data only, so state left by a panicked holder is safe to keep using.
pub(crate) fn lock_cache<T>(m: &std::sync::Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
