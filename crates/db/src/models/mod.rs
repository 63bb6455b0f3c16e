//! Row models and DTOs, one module per table.

pub mod audit_log;
pub mod content_item;
pub mod content_version;
pub mod preview_token;
pub mod token_analytics;
