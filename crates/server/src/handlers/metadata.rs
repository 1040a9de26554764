//! Metadata create and read endpoints.

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use urlmeta_client::parse_target;
use urlmeta_core::{MetadataRecord, MetadataStatus, StringMap};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Body of `POST /metadata`.
#[derive(Debug, Deserialize)]
pub struct CreateMetadataRequest {
    pub url: String,
}

/// Query of `GET /metadata`.
#[derive(Debug, Deserialize)]
pub struct MetadataQuery {
    pub url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MetadataCreateResponse {
    pub message: String,
    pub url: String,
    pub status: MetadataStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MetadataAcceptedResponse {
    pub message: String,
    pub url: String,
    pub status: MetadataStatus,
}

/// Stored record as returned to clients.
#[derive(Debug, Serialize, Deserialize)]
pub struct MetadataResponse {
    pub url: String,
    pub status: MetadataStatus,
    pub headers: Option<StringMap>,
    pub cookies: Option<StringMap>,
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<MetadataRecord> for MetadataResponse {
    fn from(record: MetadataRecord) -> Self {
        Self {
            status: record.status(),
            headers: record.headers().cloned(),
            cookies: record.cookies().cloned(),
            body: record.body().map(str::to_string),
            error_message: record.error_message().map(str::to_string),
            url: record.url,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// POST /metadata - fetch now and store the result.
///
/// Fetch failures still produce a stored `failed` record and a 201.
pub async fn create_metadata(
    State(state): State<AppState>, payload: Result<Json<CreateMetadataRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<MetadataCreateResponse>)> {
    let Json(request) = payload.map_err(|e| ApiError::Validation(e.body_text()))?;
    parse_target(&request.url).map_err(|e| ApiError::Validation(format!("url: {e}")))?;

    let status = state.collector.collect(&request.url).await?;

    let body = MetadataCreateResponse {
        message: "Metadata collected and stored successfully".into(),
        url: request.url,
        status,
    };
    Ok((StatusCode::CREATED, Json(body)))
}

/// GET /metadata - return the stored record, or schedule collection on a miss.
pub async fn get_metadata(
    State(state): State<AppState>, query: Result<Query<MetadataQuery>, QueryRejection>,
) -> ApiResult<Response> {
    let Query(query) = query.map_err(|e| ApiError::Validation(e.body_text()))?;
    let url = match query.url {
        Some(url) if !url.is_empty() => url,
        _ => return Err(ApiError::Validation("url: query parameter is required".into())),
    };

    if let Some(record) = state.collector.lookup(&url).await? {
        return Ok((StatusCode::OK, Json(MetadataResponse::from(record))).into_response());
    }

    miss(&state, url).await
}

/// Deferred path for a URL that had no record at lookup time.
async fn miss(state: &AppState, url: String) -> ApiResult<Response> {
    if !reserve_and_schedule(state, &url).await? {
        // Another request owns the placeholder; a create may already have finished it.
        match state.collector.lookup(&url).await? {
            Some(record) if record.status().is_terminal() => {
                return Ok((StatusCode::OK, Json(MetadataResponse::from(record))).into_response());
            }
            _ => {}
        }
    }

    let body = MetadataAcceptedResponse {
        message: "Request accepted. Metadata collection in progress.".into(),
        url,
        status: MetadataStatus::Pending,
    };
    Ok((StatusCode::ACCEPTED, Json(body)).into_response())
}

/// Claim `url` and hand it to the workers if this call created the placeholder.
///
/// Runs on its own task so a dropped request cannot separate the placeholder
/// write from the handoff.
async fn reserve_and_schedule(state: &AppState, url: &str) -> ApiResult<bool> {
    let collector = state.collector.clone();
    let queue = state.queue.clone();
    let url = url.to_string();

    let task = tokio::spawn(async move {
        let reserved = collector.reserve(&url).await?;
        if reserved {
            queue.enqueue(url.clone())?;
            tracing::info!(url = %url, "scheduled deferred collection");
        }
        Ok::<_, ApiError>(reserved)
    });

    task.await.map_err(|e| ApiError::Internal(e.to_string()))?
}
