//! Domain crate for the chronicle versioning engine.
//!
//! Everything here is free of internal dependencies and database concerns so
//! it can be used by the persistence layer, the service layer, and any future
//! worker or CLI tooling.

pub mod audit;
pub mod cache;
pub mod diff;
pub mod effects;
pub mod error;
pub mod hashing;
pub mod retry;
pub mod sanitize;
pub mod tokens;
pub mod types;
