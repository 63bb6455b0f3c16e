//! Rich-text sanitization for version bodies.
//!
//! Versions store caller-supplied HTML fragments. Before persisting we strip
//! anything executable: `<script>`/`<style>` blocks, inline event handler
//! attributes (`onclick=` etc.), and `javascript:` URLs. This is storage-side
//! hardening; render-side escaping still happens in the diff exporter.

use regex::Regex;
use std::sync::OnceLock;

fn script_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</(script|style)\s*>").expect("static regex")
    })
}

fn dangling_script_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Unterminated script/style tags are removed through end of input.
    RE.get_or_init(|| Regex::new(r"(?is)<(script|style)\b[^>]*>.*").expect("static regex"))
}

fn event_attr_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)\s+on[a-z]+\s*=\s*("[^"]*"|'[^']*'|[^\s>]+)"#).expect("static regex")
    })
}

fn js_url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)(href|src|action)\s*=\s*("|')?\s*javascript:[^"'>\s]*("|')?"#)
            .expect("static regex")
    })
}

/// Strip executable markup from a rich-text field.
///
/// The result is still HTML (formatting tags survive); only script-capable
/// constructs are removed.
pub fn strip_executable_markup(input: &str) -> String {
    let out = script_block_re().replace_all(input, "");
    let out = dangling_script_re().replace_all(&out, "");
    let out = event_attr_re().replace_all(&out, "");
    let out = js_url_re().replace_all(&out, "$1=\"\"");
    out.into_owned()
}

/// Validate that a slug contains only URL-safe characters.
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug.len() <= 256
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_script_blocks() {
        let input = "<p>hello</p><script>alert(1)</script><p>world</p>";
        let out = strip_executable_markup(input);
        assert_eq!(out, "<p>hello</p><p>world</p>");
    }

    #[test]
    fn strips_unterminated_script() {
        let input = "<p>ok</p><script>evil(";
        let out = strip_executable_markup(input);
        assert_eq!(out, "<p>ok</p>");
    }

    #[test]
    fn strips_event_handlers() {
        let input = r#"<img src="a.png" onerror="steal()">"#;
        let out = strip_executable_markup(input);
        assert!(!out.to_lowercase().contains("onerror"));
        assert!(out.contains("a.png"));
    }

    #[test]
    fn strips_javascript_urls() {
        let input = r#"<a href="javascript:alert(1)">x</a>"#;
        let out = strip_executable_markup(input);
        assert!(!out.to_lowercase().contains("javascript:"));
        assert!(out.contains("<a"));
    }

    #[test]
    fn leaves_formatting_alone() {
        let input = "<h1>Title</h1><p><strong>bold</strong> and <em>italic</em></p>";
        assert_eq!(strip_executable_markup(input), input);
    }

    #[test]
    fn slug_validation() {
        assert!(is_valid_slug("my-page_2"));
        assert!(!is_valid_slug(""));
        assert!(!is_valid_slug("Has Spaces"));
        assert!(!is_valid_slug("Upper"));
    }
}
