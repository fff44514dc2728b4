//! Domain layer types and invariants.

pub mod api_keys;
pub mod comments;
pub mod error;
pub mod files;
pub mod nodes;
pub mod subjects;
pub mod types;
