//! File rendering into cached HTML.
//!
//! Renderers are pure functions of a file on disk and a [`RenderContext`].
//! The task in [`build_rendered_html`] wraps one renderer call with input
//! staging, the fallback snippet and the cache write; executors decide
//! whether that task runs inline or on the worker queue.

mod executor;
mod external;
mod jobs;
mod markup;
mod registry;
mod tabular;
mod task;
mod types;

pub use executor::{ImmediateExecutor, QueuedExecutor, RenderDispatch, RenderExecutor, RenderRunner};
pub use jobs::{RenderWorkerContext, process_render_file_job};
pub use registry::RendererRegistry;
pub use tabular::{MAX_TABLE_ROWS, StataHeader, StataVariable, parse_delimited, parse_stata_header};
pub use task::{build_rendered_html, ensure_path, fallback_html, failure_message};
pub use types::{
    FileRenderer, RenderContext, RenderFileJob, RenderTaskError, RendererError, cache_file_name,
};
