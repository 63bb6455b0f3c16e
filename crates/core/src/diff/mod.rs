//! Structured differencing between two historical content states.
//!
//! Three layers make up a full comparison: a text diff over the body, a
//! structural diff over parsed markup, and a metadata diff over an
//! allow-listed field set, plus aggregate statistics. Results are derived
//! data: cache-only, always reconstructible.

pub mod export;
pub mod metadata;
pub mod stats;
pub mod structure;
pub mod text;

use serde::{Deserialize, Serialize};

pub use export::{export_diff, DiffExportFormat};
pub use metadata::{diff_metadata, DiffStatus, MetadataFieldChange, METADATA_ALLOW_LIST};
pub use stats::{calculate_change_stats, ChangeStats};
pub use structure::{
    diff_markup, parse_markup, MarkupNode, StructuralChange, StructuralChangeKind, StructuralDiff,
};
pub use text::{
    change_counts, diff_text, DiffGranularity, DiffHunk, DiffSpan, SpanKind, TextDiff,
    TextDiffAlgorithm, TextDiffOptions,
};

use crate::types::DbId;

/// Options for a full version comparison. The text options feed the text
/// layer; the structural and metadata layers take no options.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct DiffOptions {
    pub text: TextDiffOptions,
}

impl DiffOptions {
    /// Stable string form used as part of cache keys. Every field that can
    /// change the output participates.
    pub fn fingerprint(&self) -> String {
        format!(
            "{}:{}:{}:{}:{}",
            self.text.algorithm.as_str(),
            self.text.granularity.as_str(),
            self.text.context,
            self.text.ignore_whitespace,
            self.text.max_hunks,
        )
    }
}

/// The content of one version, as the diff layer needs it.
#[derive(Debug, Clone, Copy)]
pub struct DiffSource<'a> {
    pub version_id: DbId,
    pub body: &'a str,
    pub metadata: &'a serde_json::Value,
}

/// A full structured comparison between two versions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionDiff {
    pub version_a_id: DbId,
    pub version_b_id: DbId,
    pub text: TextDiff,
    pub structural: StructuralDiff,
    pub metadata: Vec<MetadataFieldChange>,
    pub stats: ChangeStats,
}

/// Run all three diff layers plus statistics.
pub fn compute_version_diff(a: DiffSource<'_>, b: DiffSource<'_>, options: &DiffOptions) -> VersionDiff {
    let text = diff_text(a.body, b.body, &options.text);
    let structural = diff_markup(a.body, b.body);
    let metadata = diff_metadata(a.metadata, b.metadata);
    let stats = calculate_change_stats(a.body, b.body, &structural);
    VersionDiff {
        version_a_id: a.version_id,
        version_b_id: b.version_id,
        text,
        structural,
        metadata,
        stats,
    }
}
