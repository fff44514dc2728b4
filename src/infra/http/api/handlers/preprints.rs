//! Preprint handlers

use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::response::Response;

use crate::application::api_keys::ApiPrincipal;
use crate::application::preprints::PreprintDocument;
use crate::domain::api_keys::ApiScope;

use super::json_api;
use crate::infra::http::api::error::ApiException;
use crate::infra::http::api::extract::JsonApiBody;
use crate::infra::http::api::middleware::{authorize_read, authorize_write};
use crate::infra::http::api::state::ApiState;

pub async fn get_preprint(
    State(state): State<ApiState>,
    principal: Option<Extension<ApiPrincipal>>,
    Path(id): Path<String>,
) -> Result<Response, ApiException> {
    authorize_read(principal.as_deref(), ApiScope::PreprintRead)?;

    let view = state.preprints.get(&id).await?;
    json_api(StatusCode::OK, &state.serializer.to_document(&view))
}

pub async fn create_preprint(
    State(state): State<ApiState>,
    principal: Option<Extension<ApiPrincipal>>,
    JsonApiBody(document): JsonApiBody<PreprintDocument>,
) -> Result<Response, ApiException> {
    let principal = authorize_write(principal.as_deref(), ApiScope::PreprintWrite)?;

    let changes = document.into_changes(None)?;
    let view = state.preprints.create(changes, &principal.auth()).await?;
    json_api(StatusCode::CREATED, &state.serializer.to_document(&view))
}

pub async fn update_preprint(
    State(state): State<ApiState>,
    principal: Option<Extension<ApiPrincipal>>,
    Path(id): Path<String>,
    JsonApiBody(document): JsonApiBody<PreprintDocument>,
) -> Result<Response, ApiException> {
    let principal = authorize_write(principal.as_deref(), ApiScope::PreprintWrite)?;

    let changes = document.into_changes(Some(&id))?;
    let view = state.preprints.update(&id, changes, &principal.auth()).await?;
    json_api(StatusCode::OK, &state.serializer.to_document(&view))
}
