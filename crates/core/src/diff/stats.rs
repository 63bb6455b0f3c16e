//! Aggregate change statistics for a version comparison.

use serde::{Deserialize, Serialize};

use super::structure::StructuralDiff;
use super::text::{change_counts, DiffGranularity};

/// Weight of one structural change relative to one changed line.
const STRUCTURAL_WEIGHT: f64 = 2.0;

/// Weight of one changed word relative to one changed line.
const WORD_WEIGHT: f64 = 0.2;

/// Review-time model: minutes per unit of complexity, plus a fixed floor.
const REVIEW_MINUTES_PER_COMPLEXITY: f64 = 0.05;
const REVIEW_MINUTES_FLOOR: f64 = 1.0;

/// Aggregate statistics over a comparison of two versions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ChangeStats {
    pub lines_added: usize,
    pub lines_removed: usize,
    pub words_added: usize,
    pub words_removed: usize,
    pub chars_added: usize,
    pub chars_removed: usize,
    /// Changed lines over the larger side's line count, in `[0, 1]`.
    pub percent_changed: f64,
    /// Weighted combination of text and structural change volume.
    pub complexity_score: f64,
    /// Human-facing review-time estimate in whole minutes.
    pub estimated_review_minutes: u32,
}

/// Compute statistics for a pair of bodies plus their structural diff.
///
/// Counts always come from the Myers alignment so they are independent of
/// the display algorithm, and symmetric: `lines_added(a, b)` equals
/// `lines_removed(b, a)`.
pub fn calculate_change_stats(
    old_body: &str,
    new_body: &str,
    structural: &StructuralDiff,
) -> ChangeStats {
    let (lines_added, lines_removed) =
        change_counts(old_body, new_body, DiffGranularity::Line, false);
    let (words_added, words_removed) =
        change_counts(old_body, new_body, DiffGranularity::Word, false);
    let (chars_added, chars_removed) =
        change_counts(old_body, new_body, DiffGranularity::Character, false);

    let total_lines = old_body.lines().count().max(new_body.lines().count());
    let changed_lines = lines_added.max(lines_removed);
    let percent_changed = changed_lines as f64 / total_lines.max(1) as f64;

    let structural_volume = structural.elements_added
        + structural.elements_removed
        + structural.elements_moved
        + structural.elements_modified;
    let complexity_score = (lines_added + lines_removed) as f64
        + (words_added + words_removed) as f64 * WORD_WEIGHT
        + structural_volume as f64 * STRUCTURAL_WEIGHT;

    let estimated_review_minutes =
        (REVIEW_MINUTES_FLOOR + complexity_score * REVIEW_MINUTES_PER_COMPLEXITY).ceil() as u32;

    ChangeStats {
        lines_added,
        lines_removed,
        words_added,
        words_removed,
        chars_added,
        chars_removed,
        percent_changed,
        complexity_score,
        estimated_review_minutes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(old: &str, new: &str) -> ChangeStats {
        calculate_change_stats(old, new, &StructuralDiff::default())
    }

    #[test]
    fn identical_bodies_report_zero_change() {
        let s = stats("a\nb\nc", "a\nb\nc");
        assert_eq!(s.lines_added, 0);
        assert_eq!(s.lines_removed, 0);
        assert_eq!(s.percent_changed, 0.0);
        assert_eq!(s.estimated_review_minutes, 1);
    }

    #[test]
    fn counts_are_symmetric() {
        let a = "one\ntwo\nthree";
        let b = "one\n2\nthree\nfour";
        let ab = stats(a, b);
        let ba = stats(b, a);
        assert_eq!(ab.lines_added, ba.lines_removed);
        assert_eq!(ab.lines_removed, ba.lines_added);
        assert_eq!(ab.words_added, ba.words_removed);
        assert_eq!(ab.chars_added, ba.chars_removed);
    }

    #[test]
    fn percent_changed_uses_larger_side() {
        // One of four lines replaced: 25%.
        let s = stats("a\nb\nc\nd", "a\nX\nc\nd");
        assert!((s.percent_changed - 0.25).abs() < 1e-9);
    }

    #[test]
    fn percent_changed_handles_empty_inputs() {
        let s = stats("", "");
        assert_eq!(s.percent_changed, 0.0);
    }

    #[test]
    fn structural_changes_raise_complexity() {
        let plain = stats("a", "b");
        let structural = StructuralDiff {
            elements_added: 3,
            ..Default::default()
        };
        let with_structure = calculate_change_stats("a", "b", &structural);
        assert!(with_structure.complexity_score > plain.complexity_score);
    }

    #[test]
    fn review_estimate_grows_with_change_volume() {
        let small = stats("a", "b");
        let big_old: String = (0..200).map(|i| format!("line {i}\n")).collect();
        let big_new: String = (0..200).map(|i| format!("LINE {i}\n")).collect();
        let big = stats(&big_old, &big_new);
        assert!(big.estimated_review_minutes > small.estimated_review_minutes);
    }
}
