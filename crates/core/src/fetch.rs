//! Fetcher contract shared by the lifecycle manager and the HTTP client.
//!
//! A fetch never errors: transport and HTTP failures come back as
//! [`FetchOutcome::Failure`] with a short categorical reason, because they are
//! stored as failed records rather than propagated.

use async_trait::async_trait;

use crate::record::StringMap;

/// A successfully fetched page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    /// HTTP status code (always below 400)
    pub status: u16,
    /// Response headers, multi-valued headers joined with `", "`
    pub headers: StringMap,
    /// Cookies set by the response, name -> value
    pub cookies: StringMap,
    /// Decoded response body
    pub body: String,
}

/// Why a fetch attempt failed.
///
/// The display strings are stable and deliberately omit transport details.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FetchFailure {
    #[error("FETCH_TIMEOUT: request timed out")]
    Timeout,

    #[error("CONNECT_ERROR: could not connect to host")]
    Connect,

    #[error("TLS_ERROR: TLS handshake or certificate verification failed")]
    Tls,

    #[error("REDIRECT_ERROR: too many redirects")]
    Redirect,

    #[error("HTTP_ERROR: status {0}")]
    HttpStatus(u16),

    #[error("BODY_ERROR: failed to read or decode response body")]
    Body,

    #[error("REQUEST_ERROR: request could not be sent")]
    Request,
}

/// Result of a single fetch attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Success(FetchedPage),
    Failure(FetchFailure),
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success(_))
    }
}

/// Performs one GET against a URL.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> FetchOutcome;
}
