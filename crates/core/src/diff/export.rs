//! Diff export: structured JSON and escaped, color-codeable HTML.

use serde::{Deserialize, Serialize};

use super::text::SpanKind;
use super::VersionDiff;
use crate::error::{ChronicleError, ChronicleResult};

/// Supported export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffExportFormat {
    Json,
    Html,
}

/// Render a diff in the requested format.
pub fn export_diff(diff: &VersionDiff, format: DiffExportFormat) -> ChronicleResult<String> {
    match format {
        DiffExportFormat::Json => to_json_string(diff),
        DiffExportFormat::Html => Ok(to_html(diff)),
    }
}

/// Serialize the structured result. Re-parsing with [`parse_json`] yields an
/// identical value.
pub fn to_json_string(diff: &VersionDiff) -> ChronicleResult<String> {
    serde_json::to_string(diff)
        .map_err(|e| ChronicleError::Internal(format!("diff serialization: {e}")))
}

/// Parse a previously exported JSON diff.
pub fn parse_json(json: &str) -> ChronicleResult<VersionDiff> {
    serde_json::from_str(json)
        .map_err(|e| ChronicleError::Internal(format!("diff deserialization: {e}")))
}

/// Escape text for safe embedding in HTML output.
///
/// Every piece of user content passes through here before being embedded;
/// version bodies are attacker-influenced by definition.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

fn span_class(kind: SpanKind) -> &'static str {
    match kind {
        SpanKind::Unchanged => "diff-unchanged",
        SpanKind::Added => "diff-added",
        SpanKind::Removed => "diff-removed",
        SpanKind::Modified => "diff-modified",
    }
}

/// Render the text layer of a diff as HTML with classed, escaped spans.
pub fn to_html(diff: &VersionDiff) -> String {
    let mut html = String::new();
    html.push_str(&format!(
        "<div class=\"diff\" data-version-a=\"{}\" data-version-b=\"{}\">\n",
        diff.version_a_id, diff.version_b_id
    ));
    html.push_str(&format!(
        "<div class=\"diff-stats\">+{} \u{2212}{} ({:.1}% changed)</div>\n",
        diff.stats.lines_added,
        diff.stats.lines_removed,
        diff.stats.percent_changed * 100.0
    ));
    for hunk in &diff.text.hunks {
        html.push_str(&format!(
            "<div class=\"diff-hunk\" data-old-start=\"{}\" data-new-start=\"{}\">\n",
            hunk.old_start, hunk.new_start
        ));
        for span in &hunk.spans {
            match span.kind {
                SpanKind::Modified => {
                    let old = span.old_content.as_deref().unwrap_or_default();
                    html.push_str(&format!(
                        "<del class=\"diff-removed\">{}</del>",
                        escape_html(old)
                    ));
                    html.push_str(&format!(
                        "<ins class=\"diff-added\">{}</ins>\n",
                        escape_html(&span.content)
                    ));
                }
                kind => {
                    html.push_str(&format!(
                        "<span class=\"{}\">{}</span>\n",
                        span_class(kind),
                        escape_html(&span.content)
                    ));
                }
            }
        }
        html.push_str("</div>\n");
    }
    if diff.text.truncated {
        html.push_str("<div class=\"diff-truncated\">Diff truncated</div>\n");
    }
    html.push_str("</div>\n");
    html
}
