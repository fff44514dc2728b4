pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod state;

pub use state::ApiState;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};

use error::{ApiException, json_api_errors};

pub fn build_api_router(state: ApiState) -> Router {
    let auth_state = state.clone();

    Router::new()
        .route("/v2/preprints/", post(handlers::create_preprint))
        .route(
            "/v2/preprints/{id}/",
            get(handlers::get_preprint).patch(handlers::update_preprint),
        )
        .route("/v2/files/{file_id}/render", get(handlers::render_file))
        .fallback(|| async { ApiException::not_found() })
        .with_state(state)
        .layer(axum_middleware::from_fn_with_state(
            auth_state,
            middleware::api_auth,
        ))
        .layer(axum_middleware::from_fn(json_api_errors))
}
