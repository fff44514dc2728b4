//! Taxonomy subjects a preprint can be filed under.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subject {
    pub id: String,
    pub text: String,
    #[serde(skip)]
    pub parent_ids: Vec<String>,
}
