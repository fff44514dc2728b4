use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, Request, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::application::api_keys::ApiPrincipal;
use crate::domain::api_keys::ApiScope;

use super::error::{ApiException, ApiExceptionKind};
use super::state::ApiState;

/// Resolve an API key into an [`ApiPrincipal`] when one is presented.
///
/// Requests without a token pass through anonymously; a token that does not
/// authenticate is rejected outright.
pub async fn api_auth(
    State(state): State<ApiState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let Some(token) = extract_token(request.headers()) else {
        return next.run(request).await;
    };

    match state.api_keys.authenticate(&token).await {
        Ok(principal) => {
            request.extensions_mut().insert(principal.clone());
            let mut response = next.run(request).await;
            response.extensions_mut().insert(principal);
            response
        }
        Err(err) => ApiException::new(ApiExceptionKind::AuthenticationFailed)
            .source("infra::http::api::auth")
            .cause(err.to_string())
            .into_response(),
    }
}

fn extract_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|raw| raw.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string());

    bearer
        .or_else(|| {
            headers
                .get("x-api-key")
                .and_then(|value| value.to_str().ok())
                .map(|token| token.trim().to_string())
        })
        .filter(|token| !token.is_empty())
}

/// Reads are open to anonymous callers; a presented key must carry `scope`.
pub fn authorize_read(
    principal: Option<&ApiPrincipal>,
    scope: ApiScope,
) -> Result<(), ApiException> {
    match principal {
        Some(principal) if !principal.allows(scope) => Err(missing_scope(scope)),
        _ => Ok(()),
    }
}

/// Writes need an authenticated caller holding `scope`.
pub fn authorize_write(
    principal: Option<&ApiPrincipal>,
    scope: ApiScope,
) -> Result<&ApiPrincipal, ApiException> {
    let principal = principal.ok_or_else(|| {
        ApiException::new(ApiExceptionKind::NotAuthenticated).source("infra::http::api::auth")
    })?;
    if !principal.allows(scope) {
        return Err(missing_scope(scope));
    }
    Ok(principal)
}

fn missing_scope(scope: ApiScope) -> ApiException {
    ApiException::new(ApiExceptionKind::PermissionDenied)
        .source("infra::http::api::auth")
        .cause(format!("api key lacks scope `{scope}`"))
}
