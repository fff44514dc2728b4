use std::sync::Arc;

use apalis::prelude::{Data, Error as ApalisError};
use tracing::info;

use crate::application::jobs::QueuedJob;
use crate::domain::types::JobType;

use super::executor::RenderRunner;
use super::types::{RenderFileJob, RenderTaskError};

impl QueuedJob for RenderFileJob {
    const JOB_TYPE: JobType = JobType::RenderFile;
}

/// State shared by every render worker.
#[derive(Clone)]
pub struct RenderWorkerContext {
    pub runner: RenderRunner,
}

/// Worker entry point for queued render jobs.
pub async fn process_render_file_job(
    job: RenderFileJob,
    context: Data<RenderWorkerContext>,
) -> Result<(), ApalisError> {
    info!(
        target = "quire::render::jobs",
        cache_file_name = %job.cache_file_name,
        "processing render job"
    );
    context.runner.run(job).await.map_err(worker_failure)?;
    Ok(())
}

fn worker_failure(err: RenderTaskError) -> ApalisError {
    let boxed: Box<dyn std::error::Error + Send + Sync> = Box::new(err);
    ApalisError::Failed(Arc::new(boxed))
}
