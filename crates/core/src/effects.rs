//! Side-effect descriptors returned from mutating operations.
//!
//! Instead of emitting events to implicit global listeners, a mutation
//! returns the record it produced plus a list of side effects the caller is
//! expected to dispatch (cache invalidations are applied by the service
//! itself; notifications are handed outward).

use serde::{Deserialize, Serialize};

use crate::types::{ContentKey, DbId};

/// A content-key-scoped cache family owned by the version store. Diff and
/// token caches are keyed differently and have their own effect variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheFamily {
    VersionHistory,
    CurrentDraft,
    CurrentPublished,
    VersionMetrics,
}

/// A side effect of a completed mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SideEffect {
    /// Invalidate cached entries in `family` for the given content key.
    InvalidateCache {
        family: CacheFamily,
        key: ContentKey,
    },
    /// Drop cached comparisons involving a version. Carries the version id
    /// because comparison caches are keyed by version pair, not content key.
    InvalidateDiffs { version_id: DbId },
    /// Invalidate any cached state referencing a specific token.
    InvalidateToken { token_id: DbId },
    /// A notification the embedding application may want to surface.
    Notify {
        topic: String,
        subject_id: DbId,
    },
}

/// Convenience constructor for the full set of invalidations a version
/// mutation triggers: the key-scoped caches plus any cached comparison the
/// mutated version participates in.
pub fn version_mutation_effects(key: &ContentKey, version_id: DbId) -> Vec<SideEffect> {
    let mut effects: Vec<SideEffect> = [
        CacheFamily::VersionHistory,
        CacheFamily::CurrentDraft,
        CacheFamily::CurrentPublished,
        CacheFamily::VersionMetrics,
    ]
    .into_iter()
    .map(|family| SideEffect::InvalidateCache {
        family,
        key: key.clone(),
    })
    .collect();
    effects.push(SideEffect::InvalidateDiffs { version_id });
    effects
}
