//! The render-and-cache task shared by every executor.

use std::fs::{self, File};
use std::io::{self, ErrorKind, Write};
use std::path::Path;
use std::time::Instant;

use ammonia::clean_text;
use metrics::{counter, histogram};
use tracing::{info, warn};

use super::types::{FileRenderer, RenderContext, RenderFileJob, RenderTaskError, RendererError};

const SUPPORT_NOTICE: &str = "Contact support@osf.io for further assistance.";

/// Create `path` and its parents; an existing directory is fine.
pub fn ensure_path(path: &Path) -> io::Result<()> {
    match fs::create_dir_all(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::AlreadyExists => Ok(()),
        Err(err) => Err(err),
    }
}

/// User-facing explanation for a renderer failure.
pub fn failure_message(err: &RendererError) -> String {
    match err {
        RendererError::StataVersion { .. } => format!(
            "Version of given Stata file is not 104, 105, 108, 113 (Stata 8/9), 114 (Stata 10/11) or 115 (Stata 12)<p>{SUPPORT_NOTICE}</p>"
        ),
        RendererError::BlankOrCorruptTable { .. } => {
            format!("Is this a valid instance of this file type?<p>{SUPPORT_NOTICE}</p>")
        }
        other => clean_text(&other.to_string()),
    }
}

pub fn fallback_html(err: &RendererError, download_path: &str) -> String {
    format!(
        "<div class=\"quire-render-error\">\n<p>Unable to render. <a href='{}'>Download</a> file to view it.</p>\n<p>{}</p>\n</div>",
        clean_text(download_path),
        failure_message(err)
    )
}

/// Render `job`'s file and write the HTML (or the fallback snippet) to its cache file.
///
/// Renderer failures are absorbed into the fallback; only I/O around the
/// task (opening the input, the cache directory, the cache write) fails it.
pub fn build_rendered_html(
    job: &RenderFileJob,
    renderer: &dyn FileRenderer,
    static_path: &str,
) -> Result<bool, RenderTaskError> {
    let started_at = Instant::now();

    // Keeps the staged copy alive until rendering is done.
    let staged = match &job.file_content {
        Some(content) => Some(stage_content(&job.file_name, content)?),
        None => {
            File::open(&job.file_name).map_err(|source| RenderTaskError::Open {
                path: job.file_name.clone(),
                source,
            })?;
            None
        }
    };
    let input = staged
        .as_ref()
        .map_or_else(|| Path::new(&job.file_name), |file| file.path());

    ensure_path(&job.cache_dir).map_err(|source| RenderTaskError::CacheDir {
        path: job.cache_dir.display().to_string(),
        source,
    })?;
    let cache_path = job.cache_path();

    let context = RenderContext {
        download_url: job.download_path.clone(),
        static_path: static_path.to_string(),
    };
    let (html, outcome) = match renderer.render(input, &context) {
        Ok(html) => (html, "rendered"),
        Err(err) => {
            warn!(
                target = "quire::render::task",
                op = "render::build_rendered_html",
                result = "fallback",
                kind = err.kind(),
                file_name = %job.file_name,
                error = %err,
                "Renderer failed; caching fallback snippet"
            );
            counter!("quire_render_fallback_total", "kind" => err.kind()).increment(1);
            (fallback_html(&err, &job.download_path), "fallback")
        }
    };
    drop(staged);

    let mut file = File::create(&cache_path).map_err(|source| RenderTaskError::Write {
        path: cache_path.display().to_string(),
        source,
    })?;
    file.write_all(html.as_bytes())
        .map_err(|source| RenderTaskError::Write {
            path: cache_path.display().to_string(),
            source,
        })?;

    let elapsed_ms = started_at.elapsed().as_millis() as u64;
    counter!("quire_render_total", "outcome" => outcome).increment(1);
    histogram!("quire_render_ms").record(elapsed_ms as f64);
    info!(
        target = "quire::render::task",
        op = "render::build_rendered_html",
        result = outcome,
        elapsed_ms,
        cache_path = %cache_path.display(),
        html_bytes = html.len(),
        "Render cached"
    );

    Ok(true)
}

fn stage_content(file_name: &str, content: &[u8]) -> Result<tempfile::NamedTempFile, RenderTaskError> {
    let suffix = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default();
    let mut file = tempfile::Builder::new()
        .prefix("quire-render-")
        .suffix(&suffix)
        .tempfile()
        .map_err(RenderTaskError::Stage)?;
    file.write_all(content).map_err(RenderTaskError::Stage)?;
    file.flush().map_err(RenderTaskError::Stage)?;
    Ok(file)
}
