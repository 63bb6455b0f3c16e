//! Audit logging constants and utility functions.
//!
//! This module lives in `core` (zero internal deps) so it can be used by both
//! the persistence layer and any future worker or CLI tooling. Audit entries
//! are written in the same transaction as the mutation they record, so a
//! failed mutation never appears in the log.

use regex::Regex;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Action type constants
// ---------------------------------------------------------------------------

/// Known action types for audit log entries.
pub mod action_types {
    pub const VERSION_CREATE: &str = "version_create";
    pub const VERSION_PUBLISH: &str = "version_publish";
    pub const VERSION_REVERT: &str = "version_revert";
    pub const VERSION_DELETE: &str = "version_delete";
    pub const VERSION_AUTO_SAVE: &str = "version_auto_save";
    pub const VERSION_COMPARE: &str = "version_compare";
    pub const TOKEN_GENERATE: &str = "token_generate";
    pub const TOKEN_REVOKE: &str = "token_revoke";
}

// ---------------------------------------------------------------------------
// Sensitivity classification
// ---------------------------------------------------------------------------

/// Coarse data-sensitivity classification stored alongside audit entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSensitivity {
    Normal,
    Sensitive,
}

impl DataSensitivity {
    /// String representation for display, logging, and database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Sensitive => "sensitive",
        }
    }
}

fn email_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("static regex")
    })
}

fn ssn_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").expect("static regex"))
}

fn card_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(?:\d[ -]?){13,16}\b").expect("static regex"))
}

/// Scan content for PII-shaped patterns (emails, SSN-like, card-like digit
/// runs) and classify it.
///
/// This is a coarse signal used for audit retention grouping, not a DLP
/// mechanism; false positives are acceptable, silent false negatives on the
/// obvious shapes are not.
pub fn classify_sensitivity(content: &str) -> DataSensitivity {
    if email_re().is_match(content) || ssn_re().is_match(content) || card_re().is_match(content) {
        DataSensitivity::Sensitive
    } else {
        DataSensitivity::Normal
    }
}

// ---------------------------------------------------------------------------
// Sensitive field redaction
// ---------------------------------------------------------------------------

/// Fields that should be redacted from audit log details before storage.
pub const SENSITIVE_FIELDS: &[&str] = &[
    "password",
    "token",
    "secret",
    "api_key",
    "private_key",
    "authorization",
    "credential",
];

/// Redact sensitive fields from a JSON value.
///
/// Replaces the value of any key matching [`SENSITIVE_FIELDS`] with
/// `"[REDACTED]"`, recursing into nested objects and arrays. Returns a new
/// `serde_json::Value` with redactions applied.
pub fn redact_sensitive_fields(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut redacted = serde_json::Map::new();
            for (key, val) in map {
                let lower_key = key.to_lowercase();
                if SENSITIVE_FIELDS.iter().any(|f| lower_key.contains(f)) {
                    redacted.insert(
                        key.clone(),
                        serde_json::Value::String("[REDACTED]".to_string()),
                    );
                } else {
                    redacted.insert(key.clone(), redact_sensitive_fields(val));
                }
            }
            serde_json::Value::Object(redacted)
        }
        serde_json::Value::Array(arr) => {
            serde_json::Value::Array(arr.iter().map(redact_sensitive_fields).collect())
        }
        other => other.clone(),
    }
}

// ---------------------------------------------------------------------------
// Changed-field summaries
// ---------------------------------------------------------------------------

/// Compute the list of fields whose values differ between two flat JSON
/// objects (field name -> value). Used for the audit trail's changed-fields
/// annotation when a new version is created.
pub fn changed_fields(
    before: &serde_json::Map<String, serde_json::Value>,
    after: &serde_json::Map<String, serde_json::Value>,
) -> Vec<String> {
    let mut fields: Vec<String> = Vec::new();
    for (key, after_val) in after {
        match before.get(key) {
            Some(before_val) if before_val == after_val => {}
            _ => fields.push(key.clone()),
        }
    }
    for key in before.keys() {
        if !after.contains_key(key) {
            fields.push(key.clone());
        }
    }
    fields.sort();
    fields
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // -- Sensitivity classification -----------------------------------------

    #[test]
    fn plain_text_is_normal() {
        assert_eq!(
            classify_sensitivity("just an ordinary article body"),
            DataSensitivity::Normal
        );
    }

    #[test]
    fn email_is_sensitive() {
        assert_eq!(
            classify_sensitivity("contact alice@example.com for details"),
            DataSensitivity::Sensitive
        );
    }

    #[test]
    fn ssn_shape_is_sensitive() {
        assert_eq!(
            classify_sensitivity("ssn 123-45-6789 on file"),
            DataSensitivity::Sensitive
        );
    }

    #[test]
    fn card_shape_is_sensitive() {
        assert_eq!(
            classify_sensitivity("card 4111 1111 1111 1111"),
            DataSensitivity::Sensitive
        );
    }

    #[test]
    fn short_digit_runs_are_normal() {
        assert_eq!(
            classify_sensitivity("order number 123456"),
            DataSensitivity::Normal
        );
    }

    // -- Redaction -----------------------------------------------------------

    #[test]
    fn redacts_password_field() {
        let input = json!({"username": "alice", "password": "s3cret"});
        let result = redact_sensitive_fields(&input);
        assert_eq!(result["username"], "alice");
        assert_eq!(result["password"], "[REDACTED]");
    }

    #[test]
    fn redacts_nested_token_field() {
        let input = json!({"outer": {"share_token": "abc", "name": "keep"}});
        let result = redact_sensitive_fields(&input);
        assert_eq!(result["outer"]["share_token"], "[REDACTED]");
        assert_eq!(result["outer"]["name"], "keep");
    }

    #[test]
    fn handles_arrays() {
        let input = json!([{"token": "hidden"}, {"data": "visible"}]);
        let result = redact_sensitive_fields(&input);
        assert_eq!(result[0]["token"], "[REDACTED]");
        assert_eq!(result[1]["data"], "visible");
    }

    // -- Changed fields ------------------------------------------------------

    #[test]
    fn changed_fields_detects_modification_and_addition() {
        let before = json!({"title": "A", "body": "x"});
        let after = json!({"title": "B", "body": "x", "excerpt": "new"});
        let fields = changed_fields(
            before.as_object().unwrap(),
            after.as_object().unwrap(),
        );
        assert_eq!(fields, vec!["excerpt", "title"]);
    }

    #[test]
    fn changed_fields_detects_removal() {
        let before = json!({"title": "A", "slug": "a"});
        let after = json!({"title": "A"});
        let fields = changed_fields(
            before.as_object().unwrap(),
            after.as_object().unwrap(),
        );
        assert_eq!(fields, vec!["slug"]);
    }

    #[test]
    fn identical_objects_report_nothing() {
        let v = json!({"title": "A"});
        let fields = changed_fields(v.as_object().unwrap(), v.as_object().unwrap());
        assert!(fields.is_empty());
    }
}
