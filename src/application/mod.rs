//! Application services layer.

pub mod api_keys;
pub mod error;
pub mod jobs;
pub mod migrations;
pub mod preprints;
pub mod render;
pub mod repos;
