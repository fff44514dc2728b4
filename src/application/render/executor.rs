//! Where render tasks run: inline on the blocking pool, or on the worker queue.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::application::jobs::enqueue;
use crate::application::repos::JobsRepo;

use super::task::build_rendered_html;
use super::types::{FileRenderer, RenderFileJob, RenderTaskError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderDispatch {
    /// The cache file has been written.
    Completed,
    /// A worker will write the cache file later.
    Enqueued { job_id: String },
}

#[async_trait]
pub trait RenderExecutor: Send + Sync {
    async fn dispatch(&self, job: RenderFileJob) -> Result<RenderDispatch, RenderTaskError>;
}

/// Runs the render task on the blocking pool under a time limit.
#[derive(Clone)]
pub struct RenderRunner {
    renderer: Arc<dyn FileRenderer>,
    static_path: String,
    max_duration: Duration,
}

impl RenderRunner {
    pub fn new(
        renderer: Arc<dyn FileRenderer>,
        static_path: impl Into<String>,
        max_duration: Duration,
    ) -> Self {
        Self {
            renderer,
            static_path: static_path.into(),
            max_duration,
        }
    }

    pub async fn run(&self, job: RenderFileJob) -> Result<bool, RenderTaskError> {
        let renderer = Arc::clone(&self.renderer);
        let static_path = self.static_path.clone();
        let cache_file_name = job.cache_file_name.clone();

        let handle = tokio::task::spawn_blocking(move || {
            build_rendered_html(&job, renderer.as_ref(), &static_path)
        });

        match tokio::time::timeout(self.max_duration, handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(RenderTaskError::Aborted(join_err.to_string())),
            Err(_) => {
                warn!(
                    target = "quire::render::executor",
                    op = "render::run",
                    result = "timeout",
                    cache_file_name = %cache_file_name,
                    limit_secs = self.max_duration.as_secs(),
                    "Render exceeded its time limit"
                );
                Err(RenderTaskError::TimedOut {
                    seconds: self.max_duration.as_secs(),
                })
            }
        }
    }
}

pub struct ImmediateExecutor {
    runner: RenderRunner,
}

impl ImmediateExecutor {
    pub fn new(runner: RenderRunner) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl RenderExecutor for ImmediateExecutor {
    async fn dispatch(&self, job: RenderFileJob) -> Result<RenderDispatch, RenderTaskError> {
        self.runner.run(job).await?;
        Ok(RenderDispatch::Completed)
    }
}

pub struct QueuedExecutor {
    jobs: Arc<dyn JobsRepo>,
}

impl QueuedExecutor {
    pub fn new(jobs: Arc<dyn JobsRepo>) -> Self {
        Self { jobs }
    }
}

#[async_trait]
impl RenderExecutor for QueuedExecutor {
    async fn dispatch(&self, job: RenderFileJob) -> Result<RenderDispatch, RenderTaskError> {
        let job_id = enqueue(self.jobs.as_ref(), &job)
            .await
            .map_err(|err| RenderTaskError::Enqueue(err.to_string()))?;

        info!(
            target = "quire::render::executor",
            op = "render::enqueue",
            job_id = %job_id,
            cache_file_name = %job.cache_file_name,
            "Render job enqueued"
        );
        Ok(RenderDispatch::Enqueued { job_id })
    }
}
