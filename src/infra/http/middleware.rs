use std::time::Instant;

use axum::{
    body::Body,
    http::{HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use tracing::{error, warn};
use uuid::Uuid;

use crate::{application::api_keys::ApiPrincipal, application::error::ErrorReport};

const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Clone)]
pub struct RequestContext {
    pub request_id: String,
}

/// Tag each request with an id, reusing a well-formed inbound `X-Request-Id`.
pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty() && value.len() <= 128)
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let ctx = RequestContext {
        request_id: request_id.clone(),
    };
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&ctx.request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response.extensions_mut().insert(ctx);
    response
}

/// Log each 4xx/5xx response with its `ErrorReport`, request id and calling key.
pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let started = Instant::now();
    let method = request.method().clone();
    let uri = request.uri().clone();
    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();

    let mut response = next.run(request).await;
    let status = response.status();
    if !status.is_client_error() && !status.is_server_error() {
        return response;
    }

    let elapsed_ms = started.elapsed().as_millis();
    let (api_key_id, user_id) = response
        .extensions()
        .get::<ApiPrincipal>()
        .map(|principal| (principal.key_id.to_string(), principal.user_id.clone()))
        .unwrap_or_default();
    let report = response.extensions_mut().remove::<ErrorReport>();
    let source = report.as_ref().map_or("unknown", |report| report.source);
    let detail = report
        .as_ref()
        .map_or("no diagnostic available", ErrorReport::detail);
    let chain = report
        .as_ref()
        .map(|report| report.messages.as_slice())
        .unwrap_or_default();

    macro_rules! log_failure {
        ($level:ident, $message:literal) => {
            $level!(
                target = "quire::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                query = uri.query().unwrap_or(""),
                elapsed_ms,
                source,
                detail,
                chain = ?chain,
                request_id = %request_id,
                api_key_id = %api_key_id,
                user_id = %user_id,
                $message,
            )
        };
    }

    if status.is_server_error() {
        log_failure!(error, "request failed");
    } else {
        log_failure!(warn, "client request error");
    }

    response
}
