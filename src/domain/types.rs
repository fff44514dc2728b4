//! Shared domain enumerations aligned with persisted values.

use serde::{Deserialize, Serialize};

/// Background job kinds dispatched through the worker queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    RenderFile,
}

impl JobType {
    pub fn as_str(self) -> &'static str {
        match self {
            JobType::RenderFile => "render_file",
        }
    }
}

impl TryFrom<&str> for JobType {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "render_file" => Ok(JobType::RenderFile),
            _ => Err(()),
        }
    }
}
