use std::error::Error as StdError;

use axum::{http::StatusCode, response::Response};
use thiserror::Error;

use crate::application::api_keys::ApiKeyError;
use crate::application::render::RenderTaskError;
use crate::application::repos::RepoError;
use crate::config::LoadError;
use crate::infra::error::InfraError;

/// Diagnostic a handler leaves on its response for the logging middleware.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    /// Outermost message first, then each `source()` in turn.
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = vec![error.to_string()];
        let mut next = error.source();
        while let Some(inner) = next {
            messages.push(inner.to_string());
            next = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn detail(&self) -> &str {
        self.messages
            .first()
            .map(String::as_str)
            .unwrap_or("no diagnostic available")
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

/// Why a `quire` command exited unsuccessfully.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to load configuration: {0}")]
    Config(#[from] LoadError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("api key command failed: {0}")]
    ApiKey(#[from] ApiKeyError),
    #[error("render failed: {0}")]
    Render(#[from] RenderTaskError),
    #[error("invalid arguments: {0}")]
    Usage(String),
    #[error("server stopped: {0}")]
    Server(String),
}

impl AppError {
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage(message.into())
    }

    /// Process exit status: 2 for bad invocations, 1 for everything else.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Usage(_) | Self::Config(_) => 2,
            Self::ApiKey(ApiKeyError::InvalidScopes | ApiKeyError::MissingUser) => 2,
            _ => 1,
        }
    }
}
