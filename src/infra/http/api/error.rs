//! JSON:API error envelope.
//!
//! Handlers fail with an [`ApiException`]. Turning it into a response happens
//! in two steps: [`exception_handler`] produces the framework payload and the
//! status code, and the [`json_api_errors`] response middleware rewrites that
//! payload into `{"errors": [...]}` with [`normalize_error_payload`]. The
//! status code set by the first step is never touched by the second.

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderValue, Request, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde_json::{Map, Value, json};

use crate::application::error::ErrorReport;
use crate::application::preprints::{DocumentError, PreprintError};
use crate::application::render::RenderTaskError;
use crate::application::repos::RepoError;

pub const JSON_API_CONTENT_TYPE: &str = "application/vnd.api+json";

/// Payload keys carried over as-is into an error object.
const TOP_LEVEL_ERROR_KEYS: [&str; 7] = ["id", "links", "status", "code", "detail", "source", "meta"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiExceptionKind {
    ParseError,
    ValidationError,
    NotAuthenticated,
    AuthenticationFailed,
    PermissionDenied,
    NotFound,
    Conflict,
    Gone,
    Throttled,
    ServerError,
}

impl ApiExceptionKind {
    pub fn status(self) -> StatusCode {
        match self {
            Self::ParseError | Self::ValidationError => StatusCode::BAD_REQUEST,
            Self::NotAuthenticated | Self::AuthenticationFailed => StatusCode::UNAUTHORIZED,
            Self::PermissionDenied => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Conflict => StatusCode::CONFLICT,
            Self::Gone => StatusCode::GONE,
            Self::Throttled => StatusCode::SERVICE_UNAVAILABLE,
            Self::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn default_detail(self) -> &'static str {
        match self {
            Self::ParseError => "Malformed request.",
            Self::ValidationError => "Invalid input.",
            Self::NotAuthenticated => "Authentication credentials were not provided.",
            Self::AuthenticationFailed => "Incorrect authentication credentials.",
            Self::PermissionDenied => "You do not have permission to perform this action.",
            Self::NotFound => "Not found.",
            Self::Conflict => "Resource identifier does not match server endpoint.",
            Self::Gone => "The requested resource is no longer available.",
            Self::Throttled => "Service unavailable.",
            Self::ServerError => "A server error occurred.",
        }
    }
}

/// Client-facing detail of an exception.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorDetail {
    Message(String),
    /// Field name to messages, in insertion order.
    Fields(Map<String, Value>),
}

#[derive(Debug, Clone)]
pub struct ApiException {
    kind: ApiExceptionKind,
    detail: Option<ErrorDetail>,
    source: &'static str,
    cause: Option<String>,
}

impl ApiException {
    pub fn new(kind: ApiExceptionKind) -> Self {
        Self {
            kind,
            detail: None,
            source: "infra::http::api",
            cause: None,
        }
    }

    pub fn with_detail(kind: ApiExceptionKind, message: impl Into<String>) -> Self {
        Self::new(kind).detail(ErrorDetail::Message(message.into()))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::with_detail(ApiExceptionKind::ValidationError, message)
    }

    /// Validation failure reported against a single field.
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let mut fields = Map::new();
        fields.insert(field.to_string(), json!([message.into()]));
        Self::new(ApiExceptionKind::ValidationError).detail(ErrorDetail::Fields(fields))
    }

    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::with_detail(ApiExceptionKind::ParseError, message)
    }

    pub fn not_found() -> Self {
        Self::new(ApiExceptionKind::NotFound)
    }

    pub fn detail(mut self, detail: ErrorDetail) -> Self {
        self.detail = Some(detail);
        self
    }

    pub fn source(mut self, source: &'static str) -> Self {
        self.source = source;
        self
    }

    /// Server-side cause, logged but never sent to the client.
    pub fn cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    pub fn kind(&self) -> ApiExceptionKind {
        self.kind
    }

    pub fn status(&self) -> StatusCode {
        self.kind.status()
    }

    fn message(&self) -> String {
        match &self.detail {
            Some(ErrorDetail::Message(message)) => message.clone(),
            Some(ErrorDetail::Fields(fields)) => Value::Object(fields.clone()).to_string(),
            None => self.kind.default_detail().to_string(),
        }
    }
}

/// Framework payload carried on a response until [`json_api_errors`] rewrites it.
#[derive(Debug, Clone)]
pub struct ExceptionPayload(pub Value);

/// First step: the payload and status an exception maps to.
pub fn exception_handler(exception: &ApiException) -> (StatusCode, Value) {
    let payload = match (exception.kind, &exception.detail) {
        (ApiExceptionKind::ValidationError, Some(ErrorDetail::Fields(fields))) => {
            Value::Object(fields.clone())
        }
        (ApiExceptionKind::ValidationError, _) => json!([exception.message()]),
        _ => json!({ "detail": exception.message() }),
    };
    (exception.status(), payload)
}

/// Second step: flatten a framework payload into a list of error objects.
pub fn normalize_error_payload(payload: Value) -> Value {
    let errors: Vec<Value> = match payload {
        Value::Object(map) => map
            .into_iter()
            .map(|(key, value)| {
                if TOP_LEVEL_ERROR_KEYS.contains(&key.as_str()) {
                    single_key(key, value)
                } else {
                    single_key("detail".to_string(), single_key(key, value))
                }
            })
            .collect(),
        Value::Array(items) => items
            .into_iter()
            .map(|item| single_key("detail".to_string(), item))
            .collect(),
        other => vec![single_key("detail".to_string(), other)],
    };

    json!({ "errors": errors })
}

fn single_key(key: String, value: Value) -> Value {
    let mut map = Map::with_capacity(1);
    map.insert(key, value);
    Value::Object(map)
}

impl IntoResponse for ApiException {
    fn into_response(self) -> Response {
        let (status, payload) = exception_handler(&self);
        let body = serde_json::to_vec(&payload).unwrap_or_default();

        let mut response = (status, body).into_response();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(JSON_API_CONTENT_TYPE),
        );
        response.extensions_mut().insert(ExceptionPayload(payload));

        let mut messages = vec![self.message()];
        messages.extend(self.cause);
        ErrorReport {
            source: self.source,
            status,
            messages,
        }
        .attach(&mut response);
        response
    }
}

/// Rewrites every response carrying an [`ExceptionPayload`] into the error envelope.
pub async fn json_api_errors(request: Request<Body>, next: Next) -> Response {
    let response = next.run(request).await;
    let Some(ExceptionPayload(payload)) = response.extensions().get::<ExceptionPayload>().cloned()
    else {
        return response;
    };

    let (mut parts, _) = response.into_parts();
    parts.extensions.remove::<ExceptionPayload>();
    parts.headers.remove(header::CONTENT_LENGTH);
    parts.headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(JSON_API_CONTENT_TYPE),
    );

    let envelope = normalize_error_payload(payload);
    let body = serde_json::to_vec(&envelope).unwrap_or_default();
    Response::from_parts(parts, Body::from(body))
}

impl From<JsonRejection> for ApiException {
    fn from(rejection: JsonRejection) -> Self {
        Self::parse_error(rejection.body_text()).source("infra::http::api::extract")
    }
}

impl From<RepoError> for ApiException {
    fn from(err: RepoError) -> Self {
        let cause = err.to_string();
        let exception = match err {
            RepoError::NotFound => Self::not_found(),
            RepoError::InvalidInput { message } => Self::validation(message),
            RepoError::Duplicate { .. } | RepoError::Integrity { .. } => {
                Self::new(ApiExceptionKind::Conflict)
            }
            RepoError::Timeout => Self::new(ApiExceptionKind::Throttled),
            RepoError::Persistence(_) => Self::new(ApiExceptionKind::ServerError),
        };
        exception.source("infra::http::api::repo").cause(cause)
    }
}

impl From<PreprintError> for ApiException {
    fn from(err: PreprintError) -> Self {
        let exception = match err {
            PreprintError::Document(DocumentError::MissingType) => {
                Self::field("type", DocumentError::MissingType.to_string())
            }
            PreprintError::Document(doc) => {
                Self::with_detail(ApiExceptionKind::Conflict, doc.to_string())
            }
            PreprintError::NodeNotFound => {
                Self::with_detail(ApiExceptionKind::NotFound, err.to_string())
            }
            PreprintError::NotAPreprint => Self::not_found(),
            PreprintError::AlreadyPreprint => {
                Self::with_detail(ApiExceptionKind::Conflict, err.to_string())
            }
            PreprintError::PermissionDenied => {
                Self::with_detail(ApiExceptionKind::PermissionDenied, err.to_string())
            }
            PreprintError::MissingPrimaryFile
            | PreprintError::MissingSubjects
            | PreprintError::UnknownPrimaryFile
            | PreprintError::Invalid(_) => Self::validation(err.to_string()),
            PreprintError::Repo(repo) => return Self::from(repo),
        };
        exception.source("infra::http::api::preprints")
    }
}

impl From<DocumentError> for ApiException {
    fn from(err: DocumentError) -> Self {
        Self::from(PreprintError::from(err))
    }
}

impl From<RenderTaskError> for ApiException {
    fn from(err: RenderTaskError) -> Self {
        let kind = match err {
            RenderTaskError::TimedOut { .. } => ApiExceptionKind::Throttled,
            _ => ApiExceptionKind::ServerError,
        };
        Self::new(kind)
            .source("infra::http::api::render")
            .cause(err.to_string())
    }
}
