//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::api_keys::{ApiKeyRecord, ApiScope};
use crate::domain::comments::{Comment, SpamStatus};
use crate::domain::files::StoredFile;
use crate::domain::nodes::Node;
use crate::domain::subjects::Subject;
use crate::domain::types::JobType;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[async_trait]
pub trait NodesRepo: Send + Sync {
    async fn find_node(&self, id: &str) -> Result<Option<Node>, RepoError>;

    /// Write every field of `node` (including tags and subjects) as one unit.
    async fn save_node(&self, node: &Node) -> Result<(), RepoError>;
}

#[async_trait]
pub trait FilesRepo: Send + Sync {
    async fn find_file(&self, id: &str) -> Result<Option<StoredFile>, RepoError>;
}

#[async_trait]
pub trait SubjectsRepo: Send + Sync {
    /// Load the subjects among `ids` that exist; unknown ids are skipped.
    async fn find_subjects(&self, ids: &[String]) -> Result<Vec<Subject>, RepoError>;
}

#[async_trait]
pub trait CommentsRepo: Send + Sync {
    async fn list_comments_without_status(&self) -> Result<Vec<Comment>, RepoError>;

    async fn list_reported_comments_without_latest(&self) -> Result<Vec<Comment>, RepoError>;

    async fn update_spam_state(
        &self,
        id: &str,
        spam_status: Option<SpamStatus>,
        latest_report: Option<OffsetDateTime>,
    ) -> Result<(), RepoError>;
}

#[derive(Debug, Clone)]
pub struct NewJobRecord {
    pub job_type: JobType,
    pub payload: serde_json::Value,
    pub run_at: OffsetDateTime,
    pub max_attempts: i32,
    pub priority: i32,
}

#[async_trait]
pub trait JobsRepo: Send + Sync {
    /// Push a job onto the worker queue and return its id.
    async fn enqueue_job(&self, job: NewJobRecord) -> Result<String, RepoError>;
}

#[derive(Debug, Clone)]
pub struct CreateApiKeyParams {
    pub name: String,
    pub user_id: String,
    pub prefix: String,
    pub hashed_secret: Vec<u8>,
    pub scopes: Vec<ApiScope>,
    pub expires_at: Option<OffsetDateTime>,
}

#[async_trait]
pub trait ApiKeysRepo: Send + Sync {
    async fn create_key(&self, params: CreateApiKeyParams) -> Result<ApiKeyRecord, RepoError>;

    async fn find_by_prefix(&self, prefix: &str) -> Result<Option<ApiKeyRecord>, RepoError>;

    async fn revoke_key(&self, id: Uuid, revoked_at: OffsetDateTime) -> Result<(), RepoError>;

    async fn update_last_used(&self, id: Uuid, used_at: OffsetDateTime) -> Result<(), RepoError>;
}
