//! Target URL validation for collection requests.
//!
//! Validation never rewrites the caller's URL: records are keyed on the exact
//! submitted string, so the parsed form is only used to accept or reject it.

/// Error type for URL validation failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("URL has no host")]
    MissingHost,

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Check that `input` is an absolute `http` or `https` URL with a host.
///
/// Unlike a browser address bar, a missing scheme is an error rather than
/// a default, and surrounding whitespace is not trimmed.
pub fn parse_target(input: &str) -> Result<url::Url, UrlError> {
    if input.trim().is_empty() {
        return Err(UrlError::Empty);
    }

    let parsed = url::Url::parse(input).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    match parsed.host_str() {
        Some(host) if !host.is_empty() => Ok(parsed),
        _ => Err(UrlError::MissingHost),
    }
}
