//! Text differencing: Myers, Patience, Histogram, and a semantic variant.
//!
//! All algorithms produce the same op representation and differ only in how
//! they align ambiguous regions. The choice is part of the cache key, so
//! tie-break behavior must stay deterministic: Myers prefers the shortest
//! edit path and resolves ties toward deletions; Patience anchors on lines
//! unique to both sides before falling back to Myers in the gaps; Histogram
//! generalizes Patience to lowest-occurrence-count anchors.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Which alignment algorithm to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TextDiffAlgorithm {
    #[default]
    Myers,
    Patience,
    Histogram,
    Semantic,
}

impl TextDiffAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Myers => "myers",
            Self::Patience => "patience",
            Self::Histogram => "histogram",
            Self::Semantic => "semantic",
        }
    }
}

/// The comparison unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DiffGranularity {
    #[default]
    Line,
    Word,
    Character,
}

impl DiffGranularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Line => "line",
            Self::Word => "word",
            Self::Character => "character",
        }
    }
}

/// Options controlling a text diff run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextDiffOptions {
    pub algorithm: TextDiffAlgorithm,
    pub granularity: DiffGranularity,
    /// Unchanged units of context kept around each change run.
    pub context: usize,
    /// Compare with runs of whitespace collapsed; reported text is original.
    pub ignore_whitespace: bool,
    /// Upper bound on emitted hunks; the diff is marked truncated past it.
    pub max_hunks: usize,
}

impl Default for TextDiffOptions {
    fn default() -> Self {
        Self {
            algorithm: TextDiffAlgorithm::default(),
            granularity: DiffGranularity::default(),
            context: 3,
            ignore_whitespace: false,
            max_hunks: 1_000,
        }
    }
}

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// Kind of a single span within a hunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanKind {
    Unchanged,
    Added,
    Removed,
    Modified,
}

/// One contiguous unit (line/word/char depending on granularity) in a hunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSpan {
    pub kind: SpanKind,
    /// Zero-based index into the old token sequence, when the span has an
    /// old side.
    pub old_index: Option<usize>,
    /// Zero-based index into the new token sequence, when the span has a
    /// new side.
    pub new_index: Option<usize>,
    /// The new-side text (or old-side text for removals).
    pub content: String,
    /// The old-side text for `Modified` spans.
    pub old_content: Option<String>,
}

/// A contiguous block of changes with surrounding context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffHunk {
    pub old_start: usize,
    pub old_len: usize,
    pub new_start: usize,
    pub new_len: usize,
    pub spans: Vec<DiffSpan>,
}

/// The result of a text diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextDiff {
    pub algorithm: TextDiffAlgorithm,
    pub granularity: DiffGranularity,
    pub hunks: Vec<DiffHunk>,
    /// True when hunk generation hit `max_hunks` and stopped.
    pub truncated: bool,
    pub units_added: usize,
    pub units_removed: usize,
}

// ---------------------------------------------------------------------------
// Tokenization
// ---------------------------------------------------------------------------

fn tokenize(text: &str, granularity: DiffGranularity) -> Vec<String> {
    match granularity {
        DiffGranularity::Line => text.lines().map(str::to_string).collect(),
        DiffGranularity::Word => text.split_whitespace().map(str::to_string).collect(),
        DiffGranularity::Character => text.chars().map(String::from).collect(),
    }
}

/// Comparison key for a token, honoring the whitespace option.
fn token_key(token: &str, ignore_whitespace: bool) -> String {
    if ignore_whitespace {
        token.split_whitespace().collect::<Vec<_>>().join(" ")
    } else {
        token.to_string()
    }
}

/// Intern both token sequences into comparable ids.
fn intern(a: &[String], b: &[String], ignore_whitespace: bool) -> (Vec<usize>, Vec<usize>) {
    let mut table: HashMap<String, usize> = HashMap::new();
    let mut intern_one = |tokens: &[String]| -> Vec<usize> {
        tokens
            .iter()
            .map(|t| {
                let key = token_key(t, ignore_whitespace);
                let next = table.len();
                *table.entry(key).or_insert(next)
            })
            .collect()
    };
    let ids_a = intern_one(a);
    let ids_b = intern_one(b);
    (ids_a, ids_b)
}

// ---------------------------------------------------------------------------
// Edit ops
// ---------------------------------------------------------------------------

/// One token-level edit operation, in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Op {
    /// Token present on both sides: (old index, new index).
    Equal(usize, usize),
    /// Token removed from the old side.
    Delete(usize),
    /// Token inserted on the new side.
    Insert(usize),
}

/// Run the selected algorithm over interned token sequences.
pub(crate) fn diff_ops(a: &[usize], b: &[usize], algorithm: TextDiffAlgorithm) -> Vec<Op> {
    match algorithm {
        TextDiffAlgorithm::Myers => myers(a, b, 0, 0),
        TextDiffAlgorithm::Patience => anchored(a, b, 0, 0, AnchorPolicy::Unique),
        TextDiffAlgorithm::Histogram => anchored(a, b, 0, 0, AnchorPolicy::LowOccurrence),
        TextDiffAlgorithm::Semantic => merge_small_islands(myers(a, b, 0, 0)),
    }
}

// -- Myers shortest edit script ---------------------------------------------

/// Classic Myers O(ND) greedy diff with trace-based backtracking.
///
/// Tie-break: when both predecessors reach the same column, the deletion
/// (rightward move) is taken, matching the canonical algorithm.
fn myers(a: &[usize], b: &[usize], a_off: usize, b_off: usize) -> Vec<Op> {
    let n = a.len() as isize;
    let m = b.len() as isize;
    if n == 0 && m == 0 {
        return Vec::new();
    }
    let max = n + m;
    let offset = max;
    let width = (2 * max + 1) as usize;
    let mut v = vec![0isize; width];
    let mut trace: Vec<Vec<isize>> = Vec::new();

    'outer: for d in 0..=max {
        trace.push(v.clone());
        let mut k = -d;
        while k <= d {
            let idx = (k + offset) as usize;
            let mut x = if k == -d || (k != d && v[idx - 1] < v[idx + 1]) {
                v[idx + 1]
            } else {
                v[idx - 1] + 1
            };
            let mut y = x - k;
            while x < n && y < m && a[x as usize] == b[y as usize] {
                x += 1;
                y += 1;
            }
            v[idx] = x;
            if x >= n && y >= m {
                break 'outer;
            }
            k += 2;
        }
    }

    // Backtrack from (n, m) through the recorded V states.
    let mut ops_rev: Vec<Op> = Vec::new();
    let mut x = n;
    let mut y = m;
    for (d, v) in trace.iter().enumerate().rev() {
        let d = d as isize;
        let k = x - y;
        let idx = (k + offset) as usize;
        let prev_k = if k == -d || (k != d && v[idx - 1] < v[idx + 1]) {
            k + 1
        } else {
            k - 1
        };
        let prev_x = v[(prev_k + offset) as usize];
        let prev_y = prev_x - prev_k;
        while x > prev_x && y > prev_y {
            ops_rev.push(Op::Equal(
                (x - 1) as usize + a_off,
                (y - 1) as usize + b_off,
            ));
            x -= 1;
            y -= 1;
        }
        if d > 0 {
            if x == prev_x {
                ops_rev.push(Op::Insert((y - 1) as usize + b_off));
            } else {
                ops_rev.push(Op::Delete((x - 1) as usize + a_off));
            }
        }
        x = prev_x;
        y = prev_y;
    }
    ops_rev.reverse();
    ops_rev
}

// -- Anchored diffs (Patience / Histogram) ----------------------------------

#[derive(Clone, Copy)]
enum AnchorPolicy {
    /// Tokens occurring exactly once on each side (Patience).
    Unique,
    /// Tokens with the lowest combined occurrence count (Histogram).
    LowOccurrence,
}

/// Occurrence cap past which a token is never used as a Histogram anchor.
const HISTOGRAM_OCCURRENCE_CAP: usize = 64;

fn occurrence_counts(tokens: &[usize]) -> HashMap<usize, usize> {
    let mut counts = HashMap::new();
    for &t in tokens {
        *counts.entry(t).or_insert(0) += 1;
    }
    counts
}

/// Pick anchor pairs (index in a, index in b) according to the policy,
/// ordered by position in `a`.
fn select_anchors(a: &[usize], b: &[usize], policy: AnchorPolicy) -> Vec<(usize, usize)> {
    let counts_a = occurrence_counts(a);
    let counts_b = occurrence_counts(b);

    match policy {
        AnchorPolicy::Unique => {
            let mut pos_b: HashMap<usize, usize> = HashMap::new();
            for (i, &t) in b.iter().enumerate() {
                if counts_b[&t] == 1 {
                    pos_b.insert(t, i);
                }
            }
            a.iter()
                .enumerate()
                .filter(|(_, t)| counts_a[*t] == 1)
                .filter_map(|(i, t)| pos_b.get(t).map(|&j| (i, j)))
                .collect()
        }
        AnchorPolicy::LowOccurrence => {
            // Lowest combined occurrence count among tokens common to both
            // sides, bounded so frequent tokens never anchor.
            let lowest = a
                .iter()
                .filter(|t| counts_b.contains_key(t))
                .map(|t| counts_a[t] + counts_b[t])
                .filter(|&c| c <= HISTOGRAM_OCCURRENCE_CAP)
                .min();
            let Some(lowest) = lowest else {
                return Vec::new();
            };

            // Pair the k-th occurrence in `a` with the k-th in `b`.
            let mut b_positions: HashMap<usize, Vec<usize>> = HashMap::new();
            for (j, &t) in b.iter().enumerate().rev() {
                b_positions.entry(t).or_default().push(j);
            }
            let mut anchors = Vec::new();
            for (i, &t) in a.iter().enumerate() {
                if counts_b.get(&t).map(|&cb| counts_a[&t] + cb) == Some(lowest) {
                    if let Some(positions) = b_positions.get_mut(&t) {
                        if let Some(j) = positions.pop() {
                            anchors.push((i, j));
                        }
                    }
                }
            }
            anchors
        }
    }
}

/// Longest increasing subsequence over the `b` coordinates of anchor pairs,
/// keeping pairs already ordered by their `a` coordinate.
fn longest_increasing(anchors: &[(usize, usize)]) -> Vec<(usize, usize)> {
    if anchors.is_empty() {
        return Vec::new();
    }
    let mut tails: Vec<usize> = Vec::new(); // indices into anchors
    let mut parents: Vec<Option<usize>> = vec![None; anchors.len()];
    for (i, &(_, bj)) in anchors.iter().enumerate() {
        let pos = tails.partition_point(|&t| anchors[t].1 < bj);
        if pos > 0 {
            parents[i] = Some(tails[pos - 1]);
        }
        if pos == tails.len() {
            tails.push(i);
        } else {
            tails[pos] = i;
        }
    }
    let mut chain = Vec::new();
    let mut cursor = tails.last().copied();
    while let Some(i) = cursor {
        chain.push(anchors[i]);
        cursor = parents[i];
    }
    chain.reverse();
    chain
}

/// Diff by recursing around anchor points, falling back to Myers in regions
/// with no usable anchors.
fn anchored(a: &[usize], b: &[usize], a_off: usize, b_off: usize, policy: AnchorPolicy) -> Vec<Op> {
    if a.is_empty() || b.is_empty() {
        return myers(a, b, a_off, b_off);
    }
    let chain = longest_increasing(&select_anchors(a, b, policy));
    if chain.is_empty() {
        return myers(a, b, a_off, b_off);
    }

    let mut ops = Vec::new();
    let mut prev_a = 0;
    let mut prev_b = 0;
    for (ai, bi) in chain {
        ops.extend(anchored(
            &a[prev_a..ai],
            &b[prev_b..bi],
            a_off + prev_a,
            b_off + prev_b,
            policy,
        ));
        ops.push(Op::Equal(a_off + ai, b_off + bi));
        prev_a = ai + 1;
        prev_b = bi + 1;
    }
    ops.extend(anchored(
        &a[prev_a..],
        &b[prev_b..],
        a_off + prev_a,
        b_off + prev_b,
        policy,
    ));
    ops
}

// -- Semantic post-pass ------------------------------------------------------

/// Unchanged islands shorter than this, flanked by changes on both sides,
/// are absorbed into the surrounding change.
const SEMANTIC_ISLAND_MAX: usize = 2;

/// Merge small unchanged islands between changes so closely-related edits
/// read as one block instead of several fragments.
fn merge_small_islands(ops: Vec<Op>) -> Vec<Op> {
    let is_change = |op: &Op| !matches!(op, Op::Equal(_, _));

    let mut out: Vec<Op> = Vec::with_capacity(ops.len());
    let mut i = 0;
    while i < ops.len() {
        if let Op::Equal(_, _) = ops[i] {
            let run_start = i;
            while i < ops.len() && matches!(ops[i], Op::Equal(_, _)) {
                i += 1;
            }
            let run = &ops[run_start..i];
            let flanked = run_start > 0
                && is_change(&ops[run_start - 1])
                && i < ops.len()
                && is_change(&ops[i]);
            if flanked && run.len() <= SEMANTIC_ISLAND_MAX {
                // Rewrite the island as a paired delete+insert.
                for op in run {
                    if let Op::Equal(ai, _) = op {
                        out.push(Op::Delete(*ai));
                    }
                }
                for op in run {
                    if let Op::Equal(_, bi) = op {
                        out.push(Op::Insert(*bi));
                    }
                }
            } else {
                out.extend_from_slice(run);
            }
        } else {
            out.push(ops[i]);
            i += 1;
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Hunk assembly
// ---------------------------------------------------------------------------

fn spans_for_change_run(
    run: &[Op],
    tokens_a: &[String],
    tokens_b: &[String],
) -> Vec<DiffSpan> {
    let deletes: Vec<usize> = run
        .iter()
        .filter_map(|op| match op {
            Op::Delete(i) => Some(*i),
            _ => None,
        })
        .collect();
    let inserts: Vec<usize> = run
        .iter()
        .filter_map(|op| match op {
            Op::Insert(i) => Some(*i),
            _ => None,
        })
        .collect();

    let paired = deletes.len().min(inserts.len());
    let mut spans = Vec::with_capacity(deletes.len().max(inserts.len()));
    for p in 0..paired {
        spans.push(DiffSpan {
            kind: SpanKind::Modified,
            old_index: Some(deletes[p]),
            new_index: Some(inserts[p]),
            content: tokens_b[inserts[p]].clone(),
            old_content: Some(tokens_a[deletes[p]].clone()),
        });
    }
    for &di in &deletes[paired..] {
        spans.push(DiffSpan {
            kind: SpanKind::Removed,
            old_index: Some(di),
            new_index: None,
            content: tokens_a[di].clone(),
            old_content: None,
        });
    }
    for &ii in &inserts[paired..] {
        spans.push(DiffSpan {
            kind: SpanKind::Added,
            old_index: None,
            new_index: Some(ii),
            content: tokens_b[ii].clone(),
            old_content: None,
        });
    }
    spans
}

/// Group ops into hunks with `context` unchanged units of surrounding
/// context, merging change runs whose gap is within twice the context.
fn build_hunks(
    ops: &[Op],
    tokens_a: &[String],
    tokens_b: &[String],
    context: usize,
    max_hunks: usize,
) -> (Vec<DiffHunk>, bool) {
    // Indices of ops that are changes.
    let change_idx: Vec<usize> = ops
        .iter()
        .enumerate()
        .filter(|(_, op)| !matches!(op, Op::Equal(_, _)))
        .map(|(i, _)| i)
        .collect();
    if change_idx.is_empty() {
        return (Vec::new(), false);
    }

    // Group changes whose unchanged gap fits inside merged context.
    let mut groups: Vec<(usize, usize)> = Vec::new(); // inclusive op ranges
    let mut start = change_idx[0];
    let mut end = change_idx[0];
    for &ci in &change_idx[1..] {
        if ci - end <= 2 * context + 1 {
            end = ci;
        } else {
            groups.push((start, end));
            start = ci;
            end = ci;
        }
    }
    groups.push((start, end));

    let truncated = groups.len() > max_hunks;
    groups.truncate(max_hunks);

    let mut hunks = Vec::with_capacity(groups.len());
    for (gs, ge) in groups {
        let lo = gs.saturating_sub(context);
        let hi = (ge + context + 1).min(ops.len());
        let window = &ops[lo..hi];

        let mut spans: Vec<DiffSpan> = Vec::new();
        let mut i = 0;
        while i < window.len() {
            match window[i] {
                Op::Equal(ai, bi) => {
                    spans.push(DiffSpan {
                        kind: SpanKind::Unchanged,
                        old_index: Some(ai),
                        new_index: Some(bi),
                        content: tokens_a[ai].clone(),
                        old_content: None,
                    });
                    i += 1;
                }
                _ => {
                    let run_start = i;
                    while i < window.len() && !matches!(window[i], Op::Equal(_, _)) {
                        i += 1;
                    }
                    spans.extend(spans_for_change_run(
                        &window[run_start..i],
                        tokens_a,
                        tokens_b,
                    ));
                }
            }
        }

        let old_indices: Vec<usize> = spans.iter().filter_map(|s| s.old_index).collect();
        let new_indices: Vec<usize> = spans.iter().filter_map(|s| s.new_index).collect();
        hunks.push(DiffHunk {
            old_start: old_indices.first().copied().unwrap_or(0),
            old_len: old_indices.len(),
            new_start: new_indices.first().copied().unwrap_or(0),
            new_len: new_indices.len(),
            spans,
        });
    }
    (hunks, truncated)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Diff two texts under the given options.
pub fn diff_text(old: &str, new: &str, options: &TextDiffOptions) -> TextDiff {
    let tokens_a = tokenize(old, options.granularity);
    let tokens_b = tokenize(new, options.granularity);
    let (ids_a, ids_b) = intern(&tokens_a, &tokens_b, options.ignore_whitespace);

    let ops = diff_ops(&ids_a, &ids_b, options.algorithm);
    let units_added = ops.iter().filter(|op| matches!(op, Op::Insert(_))).count();
    let units_removed = ops.iter().filter(|op| matches!(op, Op::Delete(_))).count();
    let (hunks, truncated) = build_hunks(
        &ops,
        &tokens_a,
        &tokens_b,
        options.context,
        options.max_hunks,
    );

    TextDiff {
        algorithm: options.algorithm,
        granularity: options.granularity,
        hunks,
        truncated,
        units_added,
        units_removed,
    }
}

/// Added/removed unit counts at a given granularity, always via Myers so the
/// counts are stable regardless of the display algorithm.
pub fn change_counts(
    old: &str,
    new: &str,
    granularity: DiffGranularity,
    ignore_whitespace: bool,
) -> (usize, usize) {
    let tokens_a = tokenize(old, granularity);
    let tokens_b = tokenize(new, granularity);
    let (ids_a, ids_b) = intern(&tokens_a, &tokens_b, ignore_whitespace);
    let ops = diff_ops(&ids_a, &ids_b, TextDiffAlgorithm::Myers);
    let added = ops.iter().filter(|op| matches!(op, Op::Insert(_))).count();
    let removed = ops.iter().filter(|op| matches!(op, Op::Delete(_))).count();
    (added, removed)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
