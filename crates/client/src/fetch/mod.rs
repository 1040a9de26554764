//! HTTP fetcher backed by reqwest.
//!
//! ### Request policy
//! - One GET per call, no retries
//! - Total timeout from configuration (1-60s)
//! - Redirects followed up to `max_redirects`
//! - TLS certificates always verified (rustls)
//!
//! ### Outcome mapping
//! - Status < 400: success with headers, cookies and decoded body
//! - Status >= 400 or any transport error: categorical [`FetchFailure`]

pub mod url;

use std::error::Error as StdError;
use std::io;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, header};

pub use url::{UrlError, parse_target};

use urlmeta_core::{AppConfig, FetchFailure, FetchOutcome, FetchedPage, Fetcher, StringMap};

/// Configuration for the HTTP fetcher.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "urlmeta/0.1")
    pub user_agent: String,

    /// Total request timeout (default: 10s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 10)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { user_agent: "urlmeta/0.1".to_string(), timeout: Duration::from_secs(10), max_redirects: 10 }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            timeout: config.request_timeout(),
            max_redirects: config.max_redirects,
        }
    }
}

/// Error building the underlying HTTP client.
#[derive(Debug, thiserror::Error)]
#[error("failed to build HTTP client: {0}")]
pub struct ClientBuildError(#[from] reqwest::Error);

/// Reqwest-backed [`Fetcher`].
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    http: Client,
    config: FetchConfig,
}

impl HttpFetcher {
    /// Create a new fetcher with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, ClientBuildError> {
        let redirect = if config.max_redirects == 0 {
            reqwest::redirect::Policy::none()
        } else {
            reqwest::redirect::Policy::limited(config.max_redirects)
        };

        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(redirect)
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> FetchOutcome {
        let start = Instant::now();

        let response = match self
            .http
            .get(url)
            .header(header::ACCEPT, "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return failed(url, classify(&e), &e),
        };

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            tracing::warn!(url, status = status.as_u16(), "fetch returned error status");
            return FetchOutcome::Failure(FetchFailure::HttpStatus(status.as_u16()));
        }

        let headers = flatten_headers(response.headers());
        let cookies: StringMap = response
            .cookies()
            .map(|c| (c.name().to_string(), c.value().to_string()))
            .collect();

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                let failure = if e.is_timeout() { FetchFailure::Timeout } else { FetchFailure::Body };
                return failed(url, failure, &e);
            }
        };

        tracing::debug!(
            url,
            status = status.as_u16(),
            bytes = body.len(),
            fetch_ms = start.elapsed().as_millis() as u64,
            "fetched page"
        );

        FetchOutcome::Success(FetchedPage { status: status.as_u16(), headers, cookies, body })
    }
}

fn failed(url: &str, failure: FetchFailure, err: &reqwest::Error) -> FetchOutcome {
    tracing::warn!(url, reason = %failure, error = %err, "fetch failed");
    FetchOutcome::Failure(failure)
}

/// Map a transport error onto its failure category.
fn classify(err: &reqwest::Error) -> FetchFailure {
    if err.is_timeout() {
        FetchFailure::Timeout
    } else if err.is_redirect() {
        FetchFailure::Redirect
    } else if is_tls_error(err) {
        FetchFailure::Tls
    } else if err.is_connect() {
        FetchFailure::Connect
    } else if err.is_body() || err.is_decode() {
        FetchFailure::Body
    } else {
        FetchFailure::Request
    }
}

/// reqwest reports TLS failures as connect errors; look through the source chain.
///
/// `io::Error` hides its inner error from `source()`, so wrapped rustls errors are
/// checked through `get_ref`.
fn is_tls_error(err: &reqwest::Error) -> bool {
    let mut source = err.source();
    while let Some(inner) = source {
        if inner.is::<rustls::Error>() {
            return true;
        }
        if let Some(io) = inner.downcast_ref::<io::Error>() {
            let wraps_rustls = io.get_ref().is_some_and(|e| e.is::<rustls::Error>());
            if wraps_rustls || io.kind() == io::ErrorKind::InvalidData {
                return true;
            }
        }
        source = inner.source();
    }
    false
}

/// Header map as name -> value, joining repeated headers with `", "`.
fn flatten_headers(headers: &header::HeaderMap) -> StringMap {
    headers
        .keys()
        .map(|name| {
            let value = headers
                .get_all(name)
                .iter()
                .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
                .collect::<Vec<_>>()
                .join(", ");
            (name.as_str().to_string(), value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher(timeout: Duration, max_redirects: usize) -> HttpFetcher {
        HttpFetcher::new(FetchConfig { timeout, max_redirects, ..Default::default() }).unwrap()
    }

    fn default_fetcher() -> HttpFetcher {
        fetcher(Duration::from_secs(5), 10)
    }

    #[test]
    fn test_fetch_config_default() {
        let config = FetchConfig::default();
        assert_eq!(config.user_agent, "urlmeta/0.1");
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.max_redirects, 10);
    }

    #[test]
    fn test_fetch_config_from_app_config() {
        let app = AppConfig { request_timeout_secs: 3, max_redirects: 2, ..Default::default() };
        let config = FetchConfig::from(&app);
        assert_eq!(config.timeout, Duration::from_secs(3));
        assert_eq!(config.max_redirects, 2);
        assert_eq!(config.user_agent, app.user_agent);
    }

    #[test]
    fn test_flatten_headers_joins_repeated_values() {
        let mut headers = header::HeaderMap::new();
        headers.append("vary", header::HeaderValue::from_static("accept"));
        headers.append("vary", header::HeaderValue::from_static("origin"));
        headers.insert("content-type", header::HeaderValue::from_static("text/html"));

        let flat = flatten_headers(&headers);
        assert_eq!(flat.get("vary").map(String::as_str), Some("accept, origin"));
        assert_eq!(flat.get("content-type").map(String::as_str), Some("text/html"));
    }

    #[tokio::test]
    async fn test_fetch_success_collects_headers_cookies_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ok"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .append_header("set-cookie", "session=abc; Path=/")
                    .append_header("set-cookie", "theme=dark; Path=/")
                    .set_body_string("<html>ok</html>"),
            )
            .mount(&server)
            .await;

        let outcome = default_fetcher().fetch(&format!("{}/ok", server.uri())).await;

        let FetchOutcome::Success(page) = outcome else {
            panic!("expected success, got {outcome:?}");
        };
        assert_eq!(page.status, 200);
        assert_eq!(page.body, "<html>ok</html>");
        assert_eq!(page.headers.get("content-type").map(String::as_str), Some("text/html"));
        assert_eq!(page.cookies.get("session").map(String::as_str), Some("abc"));
        assert_eq!(page.cookies.get("theme").map(String::as_str), Some("dark"));
    }

    #[tokio::test]
    async fn test_fetch_not_found_is_http_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/404"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let outcome = default_fetcher().fetch(&format!("{}/404", server.uri())).await;
        assert_eq!(outcome, FetchOutcome::Failure(FetchFailure::HttpStatus(404)));
    }

    #[tokio::test]
    async fn test_fetch_server_error_is_http_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let outcome = default_fetcher().fetch(&server.uri()).await;
        assert_eq!(outcome, FetchOutcome::Failure(FetchFailure::HttpStatus(503)));
    }

    #[tokio::test]
    async fn test_fetch_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let outcome = fetcher(Duration::from_secs(1), 10).fetch(&server.uri()).await;
        assert_eq!(outcome, FetchOutcome::Failure(FetchFailure::Timeout));
    }

    #[tokio::test]
    async fn test_fetch_follows_redirects() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/old"))
            .respond_with(ResponseTemplate::new(301).insert_header("location", "/new"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/new"))
            .respond_with(ResponseTemplate::new(200).set_body_string("moved here"))
            .mount(&server)
            .await;

        let outcome = default_fetcher().fetch(&format!("{}/old", server.uri())).await;
        let FetchOutcome::Success(page) = outcome else {
            panic!("expected success, got {outcome:?}");
        };
        assert_eq!(page.body, "moved here");
    }

    #[tokio::test]
    async fn test_fetch_redirect_loop() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/loop"))
            .respond_with(ResponseTemplate::new(302).insert_header("location", "/loop"))
            .mount(&server)
            .await;

        let outcome = fetcher(Duration::from_secs(5), 3).fetch(&format!("{}/loop", server.uri())).await;
        assert_eq!(outcome, FetchOutcome::Failure(FetchFailure::Redirect));
    }

    #[tokio::test]
    async fn test_fetch_connection_refused() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let outcome = default_fetcher().fetch(&format!("http://{addr}/")).await;
        assert_eq!(outcome, FetchOutcome::Failure(FetchFailure::Connect));
    }

    #[tokio::test]
    async fn test_fetch_https_against_plain_http_is_tls_failure() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let _ = socket
                    .write_all(b"HTTP/1.1 400 Bad Request\r\ncontent-length: 0\r\nconnection: close\r\n\r\n")
                    .await;
            }
        });

        let outcome = default_fetcher().fetch(&format!("https://{addr}/")).await;
        assert_eq!(outcome, FetchOutcome::Failure(FetchFailure::Tls));
    }

    #[tokio::test]
    async fn test_fetch_https_against_wiremock_is_tls_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let url = server.uri().replacen("http://", "https://", 1);
        let outcome = default_fetcher().fetch(&url).await;
        assert_eq!(outcome, FetchOutcome::Failure(FetchFailure::Tls));
    }

    #[tokio::test]
    async fn test_fetch_unparseable_url() {
        let outcome = default_fetcher().fetch("not a url").await;
        assert_eq!(outcome, FetchOutcome::Failure(FetchFailure::Request));
    }
}
