//! Error types for the proxy pipeline.
//!
//! Every failure is converted to an HTTP response at the point it occurs;
//! nothing here propagates past a handler.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Errors that can occur while serving a proxied request.
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Missing query parameter: {0}")]
    MissingParam(&'static str),

    #[error("Invalid target URL: {0}")]
    InvalidTarget(String),

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Request body too large")]
    PayloadTooLarge,

    #[error("Upstream request failed: {0}")]
    Upstream(String),

    #[error("Upstream did not respond in time")]
    UpstreamTimeout,

    #[error("Upstream document exceeds {limit} bytes")]
    ResponseTooLarge { limit: usize },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ProxyError {
    /// HTTP status reported to the client for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ProxyError::MissingParam(_) | ProxyError::InvalidTarget(_) => StatusCode::BAD_REQUEST,
            ProxyError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ProxyError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ProxyError::Upstream(_)
            | ProxyError::UpstreamTimeout
            | ProxyError::ResponseTooLarge { .. } => StatusCode::BAD_GATEWAY,
            ProxyError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<reqwest::Error> for ProxyError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProxyError::UpstreamTimeout
        } else {
            ProxyError::Upstream(err.to_string())
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "Request handling failed");
        }

        let body = match &self {
            // Upstream detail stays in the logs.
            ProxyError::Upstream(_) | ProxyError::UpstreamTimeout | ProxyError::ResponseTooLarge { .. } => {
                "Bad Gateway".to_string()
            }
            ProxyError::Internal(_) => "Internal Server Error".to_string(),
            other => other.to_string(),
        };

        (
            status,
            [(header::CACHE_CONTROL, "no-store")],
            body,
        )
            .into_response()
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, ProxyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ProxyError::RateLimited.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(ProxyError::MissingParam("url").status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ProxyError::InvalidTarget("ftp://x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ProxyError::MethodNotAllowed.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(ProxyError::UpstreamTimeout.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            ProxyError::ResponseTooLarge { limit: 1 }.status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ProxyError::Internal("boom".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_response_hides_upstream_detail() {
        let response = ProxyError::Upstream("dns error: no such host".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
    }
}
