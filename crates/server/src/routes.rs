//! HTTP route definitions.

use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;

use crate::handlers::{health, metadata};
use crate::state::AppState;

/// Build the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health::root))
        .route("/health", get(health::health))
        .route("/metadata", get(metadata::get_metadata).post(metadata::create_metadata))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
