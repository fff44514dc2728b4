use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::domain::files::StoredFile;

/// One render-and-cache request.
///
/// When `file_content` is present it is rendered from a temporary copy and
/// `file_name` only contributes its extension; otherwise `file_name` is the
/// path of the file to render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderFileJob {
    pub file_name: String,
    #[serde(default, with = "base64_content", skip_serializing_if = "Option::is_none")]
    pub file_content: Option<Vec<u8>>,
    pub cache_dir: PathBuf,
    pub cache_file_name: String,
    pub download_path: String,
}

impl RenderFileJob {
    /// Job rendering the current version of a stored file from disk.
    pub fn for_stored_file(
        file: &StoredFile,
        cache_dir: impl Into<PathBuf>,
        download_path: impl Into<String>,
    ) -> Self {
        Self {
            file_name: file.location.to_string_lossy().into_owned(),
            file_content: None,
            cache_dir: cache_dir.into(),
            cache_file_name: cache_file_name(file),
            download_path: download_path.into(),
        }
    }

    pub fn cache_path(&self) -> PathBuf {
        self.cache_dir.join(&self.cache_file_name)
    }
}

/// Cache entry name for a stored file; changes whenever the file is replaced.
pub fn cache_file_name(file: &StoredFile) -> String {
    let mut hasher = Sha256::new();
    hasher.update(file.location.to_string_lossy().as_bytes());
    hasher.update(b"\0");
    hasher.update(file.date_modified.unix_timestamp_nanos().to_be_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("{}-{}.html", file.id, &digest[..16])
}

mod base64_content {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => serializer.serialize_some(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error> {
        let encoded = Option::<String>::deserialize(deserializer)?;
        encoded
            .map(|text| STANDARD.decode(text).map_err(serde::de::Error::custom))
            .transpose()
    }
}

/// What a renderer gets besides the file itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderContext {
    pub download_url: String,
    pub static_path: String,
}

/// A renderer's refusal or failure; the fallback snippet is chosen by kind.
#[derive(Debug, Error)]
pub enum RendererError {
    #[error("unsupported Stata format version `{version}`")]
    StataVersion { version: String },
    #[error("blank or corrupt table: {reason}")]
    BlankOrCorruptTable { reason: String },
    #[error("no renderer available for `{extension}` files")]
    Unsupported { extension: String },
    #[error("external renderer failed (exit {exit_code:?}): {stderr}")]
    External {
        exit_code: Option<i32>,
        stderr: String,
    },
    #[error("failed to read file: {0}")]
    Io(#[from] io::Error),
}

impl RendererError {
    pub fn blank_or_corrupt(reason: impl Into<String>) -> Self {
        Self::BlankOrCorruptTable {
            reason: reason.into(),
        }
    }

    /// Stable label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StataVersion { .. } => "stata_version",
            Self::BlankOrCorruptTable { .. } => "blank_or_corrupt_table",
            Self::Unsupported { .. } => "unsupported",
            Self::External { .. } => "external",
            Self::Io(_) => "io",
        }
    }
}

/// Turns a file on disk into an HTML fragment.
pub trait FileRenderer: Send + Sync {
    fn render(&self, path: &Path, context: &RenderContext) -> Result<String, RendererError>;
}

/// Failures of the render task itself; renderer failures never end up here.
#[derive(Debug, Error)]
pub enum RenderTaskError {
    #[error("failed to open `{path}`: {source}")]
    Open { path: String, source: io::Error },
    #[error("failed to stage file content: {0}")]
    Stage(io::Error),
    #[error("failed to prepare cache directory `{path}`: {source}")]
    CacheDir { path: String, source: io::Error },
    #[error("failed to write cache file `{path}`: {source}")]
    Write { path: String, source: io::Error },
    #[error("render exceeded {seconds}s time limit")]
    TimedOut { seconds: u64 },
    #[error("render task aborted: {0}")]
    Aborted(String),
    #[error("failed to enqueue render job: {0}")]
    Enqueue(String),
}
