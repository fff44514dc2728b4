use axum::Json;
use axum::extract::{FromRequest, Request};
use serde::de::DeserializeOwned;

use super::error::ApiException;

/// JSON request body whose extraction failures surface as `ParseError`.
///
/// Accepts `application/json` and `application/vnd.api+json`.
#[derive(Debug, Clone)]
pub struct JsonApiBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonApiBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiException;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}
