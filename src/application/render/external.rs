use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    process::{Command, Stdio},
    time::Instant,
};

use tracing::{info, warn};

use super::types::{RenderContext, RendererError};

/// Delegates formats without a built-in renderer to a configured command.
///
/// The command is invoked as `<command> --input <file> --url <download url>
/// --static-path <static path>` and must print an HTML fragment on stdout.
#[derive(Debug, Clone)]
pub struct ExternalRenderer {
    command: PathBuf,
}

impl ExternalRenderer {
    pub fn new(command: PathBuf) -> Self {
        Self { command }
    }

    pub fn render(&self, path: &Path, context: &RenderContext) -> Result<String, RendererError> {
        let started_at = Instant::now();
        let output = Command::new(&self.command)
            .arg("--input")
            .arg(path)
            .arg("--url")
            .arg(&context.download_url)
            .arg("--static-path")
            .arg(&context.static_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|err| {
                warn!(
                    target = "quire::render::external",
                    op = "external::render",
                    result = "error",
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    error_code = "spawn",
                    command = %self.command.display(),
                    error = %err,
                    "Failed to spawn external renderer"
                );
                if err.kind() == ErrorKind::NotFound {
                    RendererError::External {
                        exit_code: None,
                        stderr: format!("renderer `{}` not found", self.command.display()),
                    }
                } else {
                    RendererError::Io(err)
                }
            })?;

        if !output.status.success() {
            let exit_code = output.status.code();
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!(
                target = "quire::render::external",
                op = "external::render",
                result = "error",
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                exit_code = exit_code.map(i64::from).unwrap_or(-1),
                error_code = "exit_status",
                stderr = %stderr,
                "External renderer failed"
            );
            return Err(RendererError::External { exit_code, stderr });
        }

        let html = String::from_utf8_lossy(&output.stdout).into_owned();
        info!(
            target = "quire::render::external",
            op = "external::render",
            result = "ok",
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            html_bytes = html.len(),
            "External renderer produced HTML"
        );
        Ok(html)
    }
}
