//! Liveness and readiness endpoints.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::state::AppState;

pub const SERVICE_NAME: &str = "HTTP Metadata Inventory Service";

/// Health response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
}

/// GET / - process liveness, no dependencies checked.
pub async fn root() -> Json<HealthResponse> {
    Json(HealthResponse { status: "healthy".into(), service: SERVICE_NAME.into(), database: None })
}

/// GET /health - readiness, including a store round trip.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    if state.collector.db().ping().await {
        let body = HealthResponse {
            status: "healthy".into(),
            service: SERVICE_NAME.into(),
            database: Some("connected".into()),
        };
        (StatusCode::OK, Json(body))
    } else {
        let body = HealthResponse {
            status: "unhealthy".into(),
            service: SERVICE_NAME.into(),
            database: Some("disconnected".into()),
        };
        (StatusCode::SERVICE_UNAVAILABLE, Json(body))
    }
}
