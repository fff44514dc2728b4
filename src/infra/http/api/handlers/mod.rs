//! API handlers organized by resource type.

mod files;
mod preprints;

pub use files::render_file;
pub use preprints::{create_preprint, get_preprint, update_preprint};

use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use super::error::{ApiException, ApiExceptionKind, JSON_API_CONTENT_TYPE};

/// Serialize `document` with the JSON:API media type.
fn json_api<T: Serialize>(status: StatusCode, document: &T) -> Result<Response, ApiException> {
    let body = serde_json::to_vec(document).map_err(|err| {
        ApiException::new(ApiExceptionKind::ServerError)
            .source("infra::http::api::serialize")
            .cause(err.to_string())
    })?;

    let mut response = (status, body).into_response();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(JSON_API_CONTENT_TYPE),
    );
    Ok(response)
}
