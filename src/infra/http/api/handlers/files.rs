//! File render handler

use std::io;

use axum::extract::{Extension, Path, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::debug;

use crate::application::api_keys::ApiPrincipal;
use crate::application::render::{RenderDispatch, RenderFileJob};
use crate::domain::api_keys::ApiScope;

use super::json_api;
use crate::infra::http::api::error::{ApiException, ApiExceptionKind};
use crate::infra::http::api::middleware::authorize_read;
use crate::infra::http::api::state::ApiState;

/// Serve the cached HTML rendition of a stored file, rendering it on a miss.
pub async fn render_file(
    State(state): State<ApiState>,
    principal: Option<Extension<ApiPrincipal>>,
    Path(file_id): Path<String>,
) -> Result<Response, ApiException> {
    authorize_read(principal.as_deref(), ApiScope::FileRender)?;

    let file = state
        .files
        .find_file(&file_id)
        .await?
        .ok_or_else(ApiException::not_found)?;
    if file.is_deleted {
        return Err(ApiException::new(ApiExceptionKind::Gone));
    }

    let download_path = state.serializer.links().file_download(&file.id);
    let job = RenderFileJob::for_stored_file(&file, state.render_cache_dir.clone(), download_path);
    let cache_path = job.cache_path();

    if let Some(html) = read_cached(&cache_path).await? {
        debug!(
            target = "quire::http::render",
            file_id = %file.id,
            result = "hit",
            "Serving cached rendition"
        );
        return Ok(html_response(html));
    }

    match state.render.dispatch(job).await? {
        RenderDispatch::Completed => match read_cached(&cache_path).await? {
            Some(html) => Ok(html_response(html)),
            None => Err(ApiException::new(ApiExceptionKind::ServerError)
                .source("infra::http::api::render")
                .cause(format!("render completed without writing {}", cache_path.display()))),
        },
        RenderDispatch::Enqueued { job_id } => json_api(
            StatusCode::ACCEPTED,
            &json!({
                "meta": {
                    "status": "pending",
                    "job_id": job_id,
                    "file_id": file.id,
                }
            }),
        ),
    }
}

async fn read_cached(path: &std::path::Path) -> Result<Option<String>, ApiException> {
    match tokio::fs::read_to_string(path).await {
        Ok(html) => Ok(Some(html)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(ApiException::new(ApiExceptionKind::ServerError)
            .source("infra::http::api::render")
            .cause(format!("failed to read {}: {err}", path.display()))),
    }
}

fn html_response(html: String) -> Response {
    let mut response = (StatusCode::OK, html).into_response();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    response
}
