//! Repository layer: one unit struct of static async methods per table.

pub mod audit_log_repo;
pub mod content_item_repo;
pub mod content_version_repo;
pub mod preview_token_repo;
pub mod token_analytics_repo;

pub use audit_log_repo::AuditLogRepo;
pub use content_item_repo::ContentItemRepo;
pub use content_version_repo::ContentVersionRepo;
pub use preview_token_repo::PreviewTokenRepo;
pub use token_analytics_repo::TokenAnalyticsRepo;
