use std::time::Duration;

use thiserror::Error;

/// Failure to complete an HTTP exchange.
///
/// HTTP error statuses are not errors at this layer; a 404 is a successful
/// exchange with a 404 response.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum HttpError {
    #[error("failed to build request: {0}")]
    RequestBuild(#[from] http::Error),

    #[error("invalid header value: {0}")]
    InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),

    #[error("invalid header name: {0}")]
    InvalidHeaderName(#[from] http::header::InvalidHeaderName),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Connection refused, DNS failure, reset, broken body stream.
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("TLS error: {0}")]
    Tls(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("response body too large: limit {limit} bytes, got at least {actual} bytes")]
    BodyTooLarge { limit: usize, actual: usize },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The buffer worker behind the client is gone.
    #[error("HTTP client is closed")]
    ServiceClosed,

    #[error("invalid URL '{url}': {reason}")]
    InvalidUri { url: String, reason: String },

    #[error("URL scheme '{scheme}' not allowed: {reason}")]
    InvalidScheme { scheme: String, reason: String },
}

impl HttpError {
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

impl From<hyper_util::client::legacy::Error> for HttpError {
    fn from(err: hyper_util::client::legacy::Error) -> Self {
        Self::Transport(Box::new(err))
    }
}
