//! Typed payloads for the Postgres-backed worker queue.

use serde::Serialize;
use time::OffsetDateTime;

use crate::application::repos::{JobsRepo, NewJobRecord, RepoError};
use crate::domain::types::JobType;

/// A payload a worker knows how to run.
pub trait QueuedJob: Serialize {
    const JOB_TYPE: JobType;
    const MAX_ATTEMPTS: i32 = 3;
    const PRIORITY: i32 = 0;
}

/// Push `job` to run as soon as a worker is free; returns the queue's job id.
pub async fn enqueue<J: QueuedJob>(repo: &dyn JobsRepo, job: &J) -> Result<String, RepoError> {
    let payload = serde_json::to_value(job).map_err(RepoError::from_persistence)?;
    repo.enqueue_job(NewJobRecord {
        job_type: J::JOB_TYPE,
        payload,
        run_at: OffsetDateTime::now_utc(),
        max_attempts: J::MAX_ATTEMPTS,
        priority: J::PRIORITY,
    })
    .await
}
