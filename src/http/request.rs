//! Request inspection helpers.
//!
//! # Responsibilities
//! - Generate unique request IDs (UUID v4)
//! - Derive the client identity used for rate limiting
//! - Select the few client headers that are forwarded upstream
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Only an explicit allowlist of client headers ever leaves the proxy

use std::net::SocketAddr;

use axum::http::{
    header::{self, HeaderMap, HeaderName},
    HeaderValue, Request,
};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

pub const X_REQUEST_ID: &str = "x-request-id";

const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Client headers copied onto every outbound request.
fn forwarded_client_header_names() -> [HeaderName; 2] {
    [header::ACCEPT, header::ACCEPT_LANGUAGE]
}

/// Stamps each request with a random UUID.
#[derive(Clone, Copy, Default)]
pub struct MakeRequestUuidV4;

impl MakeRequestId for MakeRequestUuidV4 {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let value = HeaderValue::from_str(&Uuid::new_v4().to_string()).ok()?;
        Some(RequestId::new(value))
    }
}

/// Request ID assigned by the request-id layer, if any.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// Rate limiting key for a request.
///
/// The first `X-Forwarded-For` hop wins when trusted; otherwise the socket
/// peer address is used.
pub fn client_identity(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trust_forwarded_for: bool,
) -> String {
    if trust_forwarded_for {
        let forwarded = headers
            .get(X_FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(client) = forwarded {
            return client.to_string();
        }
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Client headers that are passed to the upstream fetcher.
pub fn forwarded_client_headers(inbound: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for name in forwarded_client_header_names() {
        for value in inbound.get_all(&name) {
            headers.append(name.clone(), value.clone());
        }
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> Option<SocketAddr> {
        Some("192.0.2.7:51234".parse().unwrap())
    }

    #[test]
    fn test_identity_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_static("203.0.113.1, 10.0.0.1"));
        assert_eq!(client_identity(&headers, peer(), true), "203.0.113.1");
        assert_eq!(client_identity(&headers, peer(), false), "192.0.2.7");
    }

    #[test]
    fn test_identity_falls_back_to_peer() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_identity(&headers, peer(), true), "192.0.2.7");

        headers.insert(X_FORWARDED_FOR, HeaderValue::from_static(" "));
        assert_eq!(client_identity(&headers, peer(), true), "192.0.2.7");
        assert_eq!(client_identity(&headers, None, true), "unknown");
    }

    #[test]
    fn test_forwarded_client_headers_allowlist() {
        let mut inbound = HeaderMap::new();
        inbound.insert(header::ACCEPT, HeaderValue::from_static("text/html"));
        inbound.insert(header::ACCEPT_LANGUAGE, HeaderValue::from_static("en-GB"));
        inbound.insert(header::COOKIE, HeaderValue::from_static("sid=1"));
        inbound.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer x"));
        inbound.insert(header::ACCEPT_ENCODING, HeaderValue::from_static("gzip"));

        let headers = forwarded_client_headers(&inbound);
        assert_eq!(headers.len(), 2);
        assert_eq!(headers[header::ACCEPT_LANGUAGE], "en-GB");
    }

    #[test]
    fn test_request_ids_are_unique() {
        let request = Request::new(());
        let mut maker = MakeRequestUuidV4;
        let a = maker.make_request_id(&request).unwrap();
        let b = maker.make_request_id(&request).unwrap();
        assert_ne!(a.header_value(), b.header_value());
    }
}
