//! Request handlers for the public HTTP surface.
//!
//! | Path | Method | Pipeline |
//! |---|---|---|
//! | `/search` | GET | fetch `<search endpoint>?q=<q>` |
//! | `/proxy` | GET | fetch `url` |
//! | `/formproxy` | GET | fetch `url` with the remaining query appended |
//! | `/formproxy` | POST | fetch `url`, forwarding the form body |
//! | `/healthz` | GET | liveness only |

use std::collections::HashMap;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{Query, State},
    http::{
        header::{self, HeaderMap, HeaderValue},
        Method, StatusCode,
    },
    response::{IntoResponse, Response},
};

use url::Url;

use crate::error::{ProxyError, Result};
use crate::http::request::forwarded_client_headers;
use crate::observability::metrics;
use crate::security::target::{is_http_url, parse_target};
use crate::upstream::{Fetcher, ProxyRequest};

const DEFAULT_FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub fetcher: Fetcher,
    pub search_endpoint: String,
    pub max_body_size: usize,
}

/// `GET /healthz`
pub async fn healthz() -> &'static str {
    "ok"
}

/// Anything outside the proxy surface.
pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Not Found")
}

/// `GET /search?q=...`
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Response> {
    let query = required(params.get("q").map(String::as_str), "q")?;
    let target = search_target(&state.search_endpoint, query)?;

    let request = ProxyRequest::get(target.as_str()).with_headers(forwarded_client_headers(&headers));
    Ok(relay(&state, request).await)
}

/// `GET /proxy?url=...`
pub async fn proxy(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Response> {
    let target = required(params.get("url").map(String::as_str), "url")?;
    if !is_http_url(target) {
        return Err(ProxyError::InvalidTarget(target.to_string()));
    }

    let request = ProxyRequest::get(target).with_headers(forwarded_client_headers(&headers));
    Ok(relay(&state, request).await)
}

/// `GET|POST /formproxy?url=...`
pub async fn form_proxy(
    State(state): State<AppState>,
    method: Method,
    Query(params): Query<Vec<(String, String)>>,
    headers: HeaderMap,
    body: Body,
) -> Result<Response> {
    if method != Method::GET && method != Method::POST {
        return Err(ProxyError::MethodNotAllowed);
    }

    let target = required(
        params.iter().find(|(k, _)| k == "url").map(|(_, v)| v.as_str()),
        "url",
    )?;
    let mut target = parse_target(target)?;
    let mut outbound = forwarded_client_headers(&headers);

    let request = if method == Method::GET {
        let fields: Vec<_> = params.iter().filter(|(k, _)| k != "url").collect();
        if !fields.is_empty() {
            let mut query = target.query_pairs_mut();
            for (key, value) in fields {
                query.append_pair(key, value);
            }
        }
        ProxyRequest::get(target.as_str())
    } else {
        let form = axum::body::to_bytes(body, state.max_body_size)
            .await
            .map_err(|_| ProxyError::PayloadTooLarge)?;
        let content_type = headers
            .get(header::CONTENT_TYPE)
            .cloned()
            .unwrap_or_else(|| HeaderValue::from_static(DEFAULT_FORM_CONTENT_TYPE));
        outbound.insert(header::CONTENT_TYPE, content_type);
        ProxyRequest::post(target.as_str(), form)
    };

    Ok(relay(&state, request.with_headers(outbound)).await)
}

/// Append `q=<query>` to the search endpoint, keeping any query it already has.
fn search_target(endpoint: &str, query: &str) -> Result<Url> {
    let mut target = parse_target(endpoint)?;
    let q = format!("q={}", urlencoding::encode(query));
    let merged = match target.query() {
        Some(existing) if !existing.is_empty() => format!("{existing}&{q}"),
        _ => q,
    };
    target.set_query(Some(&merged));
    Ok(target)
}

fn required<'a>(value: Option<&'a str>, name: &'static str) -> Result<&'a str> {
    value
        .filter(|v| !v.is_empty())
        .ok_or(ProxyError::MissingParam(name))
}

/// Run the fetch pipeline and turn its outcome into a client response.
async fn relay(state: &AppState, request: ProxyRequest) -> Response {
    let start = Instant::now();
    let method = request.method.to_string();
    let target = request.target.clone();

    match state.fetcher.fetch(request).await {
        Ok(upstream) => {
            let kind = if upstream.is_html() { "html" } else { "stream" };
            let status = upstream.status.as_u16();
            tracing::info!(
                target_url = %target,
                status,
                kind,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Proxied request"
            );
            metrics::record_request(&method, status, kind, start);
            upstream.into_response()
        }
        Err(e) => {
            tracing::warn!(target_url = %target, error = %e, "Proxy request failed");
            metrics::record_request(&method, e.status().as_u16(), "error", start);
            e.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_param() {
        assert_eq!(required(Some("x"), "q").unwrap(), "x");
        assert!(matches!(required(Some(""), "q"), Err(ProxyError::MissingParam("q"))));
        assert!(matches!(required(None, "url"), Err(ProxyError::MissingParam("url"))));
    }

    #[test]
    fn test_search_target() {
        let target = search_target("https://lite.duckduckgo.com/lite/", "rust lang").unwrap();
        assert_eq!(target.as_str(), "https://lite.duckduckgo.com/lite/?q=rust%20lang");

        let target = search_target("https://search.example/s?kl=us-en", "a&b").unwrap();
        assert_eq!(target.as_str(), "https://search.example/s?kl=us-en&q=a%26b");

        let target = search_target("https://search.example/s?", "x").unwrap();
        assert_eq!(target.as_str(), "https://search.example/s?q=x");
    }
}
