//! Field-by-field metadata differencing over a fixed allow-list.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The status of an item in a diff comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffStatus {
    Added,
    Removed,
    Modified,
}

impl DiffStatus {
    /// String representation for display, logging, and database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Removed => "removed",
            Self::Modified => "modified",
        }
    }
}

impl std::fmt::Display for DiffStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata keys that participate in comparison. Anything outside this list
/// is ignored on both sides (internal bookkeeping keys, importer residue).
pub const METADATA_ALLOW_LIST: &[&str] = &[
    "title",
    "slug",
    "excerpt",
    "locale",
    "author",
    "tags",
    "category",
    "template",
    "seo_title",
    "seo_description",
    "featured_image",
];

/// One changed metadata field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataFieldChange {
    pub field: String,
    pub status: DiffStatus,
    pub before: Option<Value>,
    pub after: Option<Value>,
}

/// Compare two metadata objects over [`METADATA_ALLOW_LIST`].
///
/// A key counts as absent when it is missing or explicitly `null`.
pub fn diff_metadata(old: &Value, new: &Value) -> Vec<MetadataFieldChange> {
    let empty = serde_json::Map::new();
    let old_map = old.as_object().unwrap_or(&empty);
    let new_map = new.as_object().unwrap_or(&empty);

    let mut changes = Vec::new();
    for &field in METADATA_ALLOW_LIST {
        let before = old_map.get(field).filter(|v| !v.is_null());
        let after = new_map.get(field).filter(|v| !v.is_null());
        let status = match (before, after) {
            (None, Some(_)) => DiffStatus::Added,
            (Some(_), None) => DiffStatus::Removed,
            (Some(b), Some(a)) if b != a => DiffStatus::Modified,
            _ => continue,
        };
        changes.push(MetadataFieldChange {
            field: field.to_string(),
            status,
            before: before.cloned(),
            after: after.cloned(),
        });
    }
    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn identical_metadata_reports_nothing() {
        let v = json!({"title": "A", "tags": ["x"]});
        assert!(diff_metadata(&v, &v).is_empty());
    }

    #[test]
    fn classifies_added_removed_modified() {
        let old = json!({"title": "A", "category": "news"});
        let new = json!({"title": "B", "tags": ["x"]});
        let changes = diff_metadata(&old, &new);
        let by_field = |f: &str| changes.iter().find(|c| c.field == f).unwrap();
        assert_eq!(by_field("title").status, DiffStatus::Modified);
        assert_eq!(by_field("category").status, DiffStatus::Removed);
        assert_eq!(by_field("tags").status, DiffStatus::Added);
        assert_eq!(changes.len(), 3);
    }

    #[test]
    fn ignores_keys_outside_allow_list() {
        let old = json!({"internal_id": 1});
        let new = json!({"internal_id": 2});
        assert!(diff_metadata(&old, &new).is_empty());
    }

    #[test]
    fn null_counts_as_absent() {
        let old = json!({"excerpt": null});
        let new = json!({"excerpt": "now set"});
        let changes = diff_metadata(&old, &new);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].status, DiffStatus::Added);
    }

    #[test]
    fn non_object_inputs_are_tolerated() {
        let changes = diff_metadata(&json!(null), &json!({"title": "A"}));
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].status, DiffStatus::Added);
    }
}
