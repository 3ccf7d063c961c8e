//! Header policy for both directions of the proxy.
//!
//! # Responsibilities
//! - Build outbound headers: defaults, caller overrides, stripped identifiers
//! - Filter upstream response headers before they reach the client
//!
//! # Design Decisions
//! - The client's cookies and original address never reach upstream
//! - Upstream cookies never reach the client
//! - Hop-by-hop headers are connection-scoped and never relayed

use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};

use crate::config::UpstreamConfig;

/// Request headers that are removed regardless of who supplied them.
const STRIPPED_REQUEST_HEADERS: &[&str] = &["cookie", "x-forwarded-for"];

/// Headers scoped to a single connection.
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP_HEADERS.contains(&name.as_str())
}

/// Merge caller headers over the configured defaults and strip identifying
/// headers.
pub fn outbound_headers(defaults: &UpstreamConfig, caller: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::new();

    if let Ok(value) = HeaderValue::from_str(&defaults.user_agent) {
        headers.insert(header::USER_AGENT, value);
    }
    if let Ok(value) = HeaderValue::from_str(&defaults.accept) {
        headers.insert(header::ACCEPT, value);
    }

    for name in caller.keys() {
        if STRIPPED_REQUEST_HEADERS.contains(&name.as_str()) || is_hop_by_hop(name) {
            continue;
        }
        headers.remove(name);
        for value in caller.get_all(name) {
            headers.append(name.clone(), value.clone());
        }
    }

    headers
}

/// Copy upstream response headers for relaying on the opaque path.
pub fn relayed_response_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(upstream.len());
    for (name, value) in upstream {
        if name == header::SET_COOKIE || is_hop_by_hop(name) {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers
}
