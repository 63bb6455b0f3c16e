//! Structural differencing of markup fragments.
//!
//! Both sides are parsed into element trees and compared positionally in
//! document order (not by generic tree-edit-distance). Nodes pair up by a
//! stable identity signature (tag + key attributes) so moved elements are
//! recognized as moves rather than delete/insert pairs, even when their text
//! changed in flight.

use std::collections::{BTreeMap, HashMap, VecDeque};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Markup tree
// ---------------------------------------------------------------------------

/// Attributes that contribute to a node's identity signature.
const KEY_ATTRIBUTES: &[&str] = &["id", "href", "src", "name"];

/// Elements that never carry children.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// A parsed markup node. Text runs are nodes with `tag == "#text"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupNode {
    pub tag: String,
    pub attributes: BTreeMap<String, String>,
    /// Direct text content: the text of a `#text` node, empty for elements.
    pub text: String,
    pub children: Vec<MarkupNode>,
}

impl MarkupNode {
    fn element(tag: String, attributes: BTreeMap<String, String>) -> Self {
        Self {
            tag,
            attributes,
            text: String::new(),
            children: Vec::new(),
        }
    }

    fn text_node(text: String) -> Self {
        Self {
            tag: "#text".to_string(),
            attributes: BTreeMap::new(),
            text,
            children: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Parse a markup fragment into a node forest.
///
/// This is a tolerant scanner, not a spec HTML parser: unknown constructs
/// are kept as text, stray close tags are ignored, and unterminated
/// elements are closed at end of input. Good enough for diffing stored
/// rich-text, which has already been sanitized.
pub fn parse_markup(input: &str) -> Vec<MarkupNode> {
    let mut root: Vec<MarkupNode> = Vec::new();
    let mut stack: Vec<MarkupNode> = Vec::new();
    let bytes = input.as_bytes();
    let mut pos = 0;

    let push_node = |stack: &mut Vec<MarkupNode>, root: &mut Vec<MarkupNode>, node: MarkupNode| {
        match stack.last_mut() {
            Some(parent) => parent.children.push(node),
            None => root.push(node),
        }
    };

    while pos < bytes.len() {
        if bytes[pos] == b'<' {
            // Comments and doctype declarations are skipped entirely.
            if input[pos..].starts_with("<!--") {
                pos = match input[pos..].find("-->") {
                    Some(end) => pos + end + 3,
                    None => bytes.len(),
                };
                continue;
            }
            if input[pos..].starts_with("<!") {
                pos = match input[pos..].find('>') {
                    Some(end) => pos + end + 1,
                    None => bytes.len(),
                };
                continue;
            }
            let Some(close) = input[pos..].find('>') else {
                // Trailing junk; treat as text.
                let text = input[pos..].trim();
                if !text.is_empty() {
                    push_node(&mut stack, &mut root, MarkupNode::text_node(text.to_string()));
                }
                break;
            };
            let inner = &input[pos + 1..pos + close];
            pos += close + 1;

            if let Some(name) = inner.strip_prefix('/') {
                let name = name.trim().to_ascii_lowercase();
                // Close the nearest matching open element; ignore strays.
                if let Some(depth) = stack.iter().rposition(|n| n.tag == name) {
                    while stack.len() > depth {
                        let Some(node) = stack.pop() else { break };
                        push_node(&mut stack, &mut root, node);
                    }
                }
                continue;
            }

            let self_closing = inner.ends_with('/');
            let inner = inner.trim_end_matches('/');
            let (tag, attributes) = parse_tag(inner);
            if tag.is_empty() {
                continue;
            }
            let node = MarkupNode::element(tag.clone(), attributes);
            if self_closing || VOID_ELEMENTS.contains(&tag.as_str()) {
                push_node(&mut stack, &mut root, node);
            } else {
                stack.push(node);
            }
        } else {
            let end = input[pos..].find('<').map_or(bytes.len(), |i| pos + i);
            let text = input[pos..end].trim();
            if !text.is_empty() {
                push_node(&mut stack, &mut root, MarkupNode::text_node(text.to_string()));
            }
            pos = end;
        }
    }

    // Close anything left open at end of input.
    while let Some(node) = stack.pop() {
        match stack.last_mut() {
            Some(parent) => parent.children.push(node),
            None => root.push(node),
        }
    }
    root
}

/// Split a tag's interior into its name and attribute map.
fn parse_tag(inner: &str) -> (String, BTreeMap<String, String>) {
    let inner = inner.trim();
    let name_end = inner
        .find(|c: char| c.is_whitespace())
        .unwrap_or(inner.len());
    let tag = inner[..name_end].to_ascii_lowercase();
    let mut attributes = BTreeMap::new();

    let mut rest = inner[name_end..].trim_start();
    while !rest.is_empty() {
        let name_end = rest
            .find(|c: char| c.is_whitespace() || c == '=')
            .unwrap_or(rest.len());
        let name = rest[..name_end].to_ascii_lowercase();
        rest = rest[name_end..].trim_start();
        if let Some(stripped) = rest.strip_prefix('=') {
            let stripped = stripped.trim_start();
            let (value, remainder) = match stripped.chars().next() {
                Some(q @ ('"' | '\'')) => {
                    let body = &stripped[1..];
                    match body.find(q) {
                        Some(end) => (body[..end].to_string(), &body[end + 1..]),
                        None => (body.to_string(), ""),
                    }
                }
                _ => {
                    let end = stripped
                        .find(|c: char| c.is_whitespace())
                        .unwrap_or(stripped.len());
                    (stripped[..end].to_string(), &stripped[end..])
                }
            };
            if !name.is_empty() {
                attributes.insert(name, value);
            }
            rest = remainder.trim_start();
        } else if !name.is_empty() {
            attributes.insert(name, String::new());
        } else {
            break;
        }
    }
    (tag, attributes)
}

// ---------------------------------------------------------------------------
// Flattening
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct FlatNode {
    signature: String,
    tag: String,
    path: String,
    attributes: BTreeMap<String, String>,
    text: String,
}

fn flatten(nodes: &[MarkupNode]) -> Vec<FlatNode> {
    let mut out = Vec::new();
    for (i, node) in nodes.iter().enumerate() {
        flatten_into(node, &format!("{i}"), &mut out);
    }
    out
}

fn flatten_into(node: &MarkupNode, path: &str, out: &mut Vec<FlatNode>) {
    out.push(FlatNode {
        signature: signature_of(node),
        tag: node.tag.clone(),
        path: path.to_string(),
        attributes: node.attributes.clone(),
        text: direct_text(node),
    });
    for (i, child) in node.children.iter().enumerate() {
        flatten_into(child, &format!("{path}/{i}"), out);
    }
}

/// Identity signature: tag plus key attribute values. Content equality is
/// deliberately not part of the signature so an edited element can still be
/// recognized across a move.
fn signature_of(node: &MarkupNode) -> String {
    let mut sig = node.tag.clone();
    for key in KEY_ATTRIBUTES {
        if let Some(value) = node.attributes.get(*key) {
            sig.push_str("\u{1}");
            sig.push_str(key);
            sig.push('=');
            sig.push_str(value);
        }
    }
    sig
}

/// Direct text of a node: own text plus immediate `#text` children.
fn direct_text(node: &MarkupNode) -> String {
    if node.tag == "#text" {
        return node.text.clone();
    }
    node.children
        .iter()
        .filter(|c| c.tag == "#text")
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

// ---------------------------------------------------------------------------
// Diff
// ---------------------------------------------------------------------------

/// What happened to one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructuralChangeKind {
    Added,
    Removed,
    Moved,
    AttributesModified,
    TextModified,
}

/// One structural change entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuralChange {
    pub kind: StructuralChangeKind,
    pub tag: String,
    /// Path in the tree the node exists in (new side for added/moved,
    /// old side for removed).
    pub path: String,
    /// Human-oriented detail: changed attribute names or before/after text.
    pub detail: Option<String>,
}

/// The result of a structural comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StructuralDiff {
    pub changes: Vec<StructuralChange>,
    pub elements_added: usize,
    pub elements_removed: usize,
    pub elements_moved: usize,
    pub elements_modified: usize,
}

/// Compare two markup fragments structurally.
pub fn diff_markup(old: &str, new: &str) -> StructuralDiff {
    let flat_a = flatten(&parse_markup(old));
    let flat_b = flatten(&parse_markup(new));

    // Queue of new-side positions per signature, consumed in document order.
    let mut b_by_sig: HashMap<&str, VecDeque<usize>> = HashMap::new();
    for (j, node) in flat_b.iter().enumerate() {
        b_by_sig
            .entry(node.signature.as_str())
            .or_default()
            .push_back(j);
    }

    let mut diff = StructuralDiff::default();
    let mut matched_b = vec![false; flat_b.len()];
    let mut highest_matched_b: Option<usize> = None;

    for node_a in &flat_a {
        let matched = b_by_sig
            .get_mut(node_a.signature.as_str())
            .and_then(|queue| queue.pop_front());
        let Some(j) = matched else {
            diff.changes.push(StructuralChange {
                kind: StructuralChangeKind::Removed,
                tag: node_a.tag.clone(),
                path: node_a.path.clone(),
                detail: None,
            });
            diff.elements_removed += 1;
            continue;
        };
        matched_b[j] = true;
        let node_b = &flat_b[j];

        // A pair landing before an already-matched position broke document
        // order: that is a move.
        let moved = highest_matched_b.is_some_and(|h| j < h);
        if !moved {
            highest_matched_b = Some(j);
        }
        if moved {
            diff.changes.push(StructuralChange {
                kind: StructuralChangeKind::Moved,
                tag: node_b.tag.clone(),
                path: node_b.path.clone(),
                detail: Some(format!("from {} to {}", node_a.path, node_b.path)),
            });
            diff.elements_moved += 1;
        }

        let mut modified = false;
        if node_a.attributes != node_b.attributes {
            let changed = changed_attribute_names(&node_a.attributes, &node_b.attributes);
            diff.changes.push(StructuralChange {
                kind: StructuralChangeKind::AttributesModified,
                tag: node_b.tag.clone(),
                path: node_b.path.clone(),
                detail: Some(changed.join(", ")),
            });
            modified = true;
        }
        if node_a.text != node_b.text {
            diff.changes.push(StructuralChange {
                kind: StructuralChangeKind::TextModified,
                tag: node_b.tag.clone(),
                path: node_b.path.clone(),
                detail: Some(format!("{:?} -> {:?}", node_a.text, node_b.text)),
            });
            modified = true;
        }
        if modified {
            diff.elements_modified += 1;
        }
    }

    for (j, node_b) in flat_b.iter().enumerate() {
        if !matched_b[j] {
            diff.changes.push(StructuralChange {
                kind: StructuralChangeKind::Added,
                tag: node_b.tag.clone(),
                path: node_b.path.clone(),
                detail: None,
            });
            diff.elements_added += 1;
        }
    }

    diff
}

fn changed_attribute_names(
    a: &BTreeMap<String, String>,
    b: &BTreeMap<String, String>,
) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for (key, value) in b {
        if a.get(key) != Some(value) {
            names.push(key.clone());
        }
    }
    for key in a.keys() {
        if !b.contains_key(key) {
            names.push(key.clone());
        }
    }
    names.sort();
    names.dedup();
    names
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
