//! Quire: preprint API, cached file rendering and data migrations.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
