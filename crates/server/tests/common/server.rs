//! Server test utilities.

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use urlmeta_client::{FetchConfig, HttpFetcher};
use urlmeta_core::{Collector, MetadataDb};
use urlmeta_server::{AppState, CollectionQueue, create_router};

/// A test server backed by an in-memory store and a real HTTP fetcher.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    pub db: MetadataDb,
}

#[allow(dead_code)]
impl TestServer {
    pub async fn new() -> Self {
        Self::with_queue(64, 4).await
    }

    /// Test server with a specific worker queue size and concurrency.
    pub async fn with_queue(capacity: usize, concurrency: usize) -> Self {
        let db = MetadataDb::open_in_memory("url_metadata")
            .await
            .expect("Failed to open in-memory store");

        let fetch_config = FetchConfig { timeout: Duration::from_secs(2), ..Default::default() };
        let fetcher = HttpFetcher::new(fetch_config).expect("Failed to build fetcher");
        let collector = Collector::new(Arc::new(fetcher), db.clone());
        let (queue, _workers) = CollectionQueue::start(collector.clone(), capacity, concurrency);

        let state = AppState::new(collector, queue);
        let router = create_router(state.clone());

        Self { router, state, db }
    }

    /// Send a request and decode the JSON response body.
    pub async fn request(
        &self, method: &str, uri: &str, body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let body = body.map(|v| serde_json::to_vec(&v).unwrap());
        self.raw_request(method, uri, body, "application/json").await
    }

    pub async fn raw_request(
        &self, method: &str, uri: &str, body: Option<Vec<u8>>, content_type: &str,
    ) -> (StatusCode, serde_json::Value) {
        use axum::body::Body;
        use axum::http::Request;
        use tower::ServiceExt;

        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(bytes) => {
                builder = builder.header("Content-Type", content_type);
                Body::from(bytes)
            }
            None => Body::empty(),
        };

        let request = builder.body(body).unwrap();
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();

        let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body_json: serde_json::Value = if body_bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(serde_json::Value::Null)
        };

        (status, body_json)
    }

    /// Poll `GET /metadata` until the record leaves `pending`.
    pub async fn wait_for_terminal(&self, url: &str) -> serde_json::Value {
        let uri = metadata_uri(url);
        for _ in 0..200 {
            let (status, body) = self.request("GET", &uri, None).await;
            if status == StatusCode::OK && body["status"] != "pending" {
                return body;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("record for {url} never reached a terminal state");
    }
}

/// `/metadata?url=...` with the target percent-encoded.
#[allow(dead_code)]
pub fn metadata_uri(url: &str) -> String {
    let encoded: String = url
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => (b as char).to_string(),
            _ => format!("%{b:02X}"),
        })
        .collect();
    format!("/metadata?url={encoded}")
}
