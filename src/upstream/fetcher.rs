//! Outbound request execution and response dispatch.
//!
//! # Responsibilities
//! - Build the outbound request (sanitized headers, method, body)
//! - Issue it over plain or TLS transport depending on the target scheme
//! - Buffer and rewrite HTML; stream everything else through unchanged
//!
//! # Design Decisions
//! - One attempt per request, no retries
//! - HTML responses are always reported as 200 to the client
//! - The opaque path never buffers; dropping the client response drops the
//!   upstream connection with it

use std::time::Duration;

use axum::{
    body::Body,
    http::{
        header::{self, HeaderMap, HeaderValue},
        Method, StatusCode,
    },
    response::{IntoResponse, Response},
};
use bytes::{Bytes, BytesMut};
use futures_util::TryStreamExt;
use tokio::time::Instant;
use url::Url;

use crate::config::UpstreamConfig;
use crate::error::{ProxyError, Result};
use crate::resilience::timeouts::{deadline_in, with_deadline};
use crate::rewrite;
use crate::security::{headers, target::parse_target};

/// A request to be fetched on a client's behalf.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub target: String,
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl ProxyRequest {
    pub fn get(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            method: Method::GET,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn post(target: impl Into<String>, body: Bytes) -> Self {
        Self {
            target: target.into(),
            method: Method::POST,
            headers: HeaderMap::new(),
            body: Some(body),
        }
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }
}

/// Body of an upstream response as it will be sent to the client.
pub enum UpstreamBody {
    /// Rewritten HTML document.
    Html(String),
    /// Upstream bytes, relayed as they arrive.
    Stream(Body),
}

/// Response ready to be written to the client.
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub content_type: String,
    pub body: UpstreamBody,
}

impl UpstreamResponse {
    pub fn is_html(&self) -> bool {
        matches!(self.body, UpstreamBody::Html(_))
    }
}

impl IntoResponse for UpstreamResponse {
    fn into_response(self) -> Response {
        let body = match self.body {
            UpstreamBody::Html(text) => Body::from(text),
            UpstreamBody::Stream(body) => body,
        };
        let mut response = Response::new(body);
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// Returns true when a `Content-Type` value denotes an HTML document.
pub fn is_html_content_type(content_type: &str) -> bool {
    content_type.to_ascii_lowercase().contains("text/html")
}

/// Issues outbound requests and classifies their responses.
#[derive(Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    config: UpstreamConfig,
}

impl Fetcher {
    pub fn new(config: UpstreamConfig) -> Result<Self> {
        let redirects = if config.follow_redirects {
            reqwest::redirect::Policy::limited(10)
        } else {
            reqwest::redirect::Policy::none()
        };

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .redirect(redirects)
            .no_proxy()
            .build()
            .map_err(|e| ProxyError::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    fn response_timeout(&self) -> Duration {
        Duration::from_secs(self.config.response_timeout_secs)
    }

    /// Fetch `request.target` and prepare the client-facing response.
    ///
    /// The response timeout is one budget covering the response head and,
    /// on the HTML path, the whole buffered document.
    pub async fn fetch(&self, request: ProxyRequest) -> Result<UpstreamResponse> {
        let url = parse_target(&request.target)?;
        let deadline = deadline_in(self.response_timeout());
        let outbound = headers::outbound_headers(&self.config, &request.headers);

        tracing::debug!(target_url = %url, method = %request.method, "Fetching upstream");

        let mut builder = self
            .client
            .request(request.method, url.clone())
            .headers(outbound);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = with_deadline(deadline, builder.send())
            .await?
            .inspect_err(|e| tracing::warn!(target_url = %url, error = %e, "Upstream request failed"))?;

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        tracing::debug!(
            target_url = %url,
            status = %response.status(),
            content_type = %content_type,
            "Upstream responded"
        );

        if is_html_content_type(&content_type) {
            self.rewritten(url, response, deadline).await
        } else {
            Ok(Self::streamed(url, content_type, response))
        }
    }

    async fn rewritten(
        &self,
        url: Url,
        response: reqwest::Response,
        deadline: Instant,
    ) -> Result<UpstreamResponse> {
        let document = with_deadline(deadline, self.buffer(response)).await??;
        let html = rewrite::rewrite(&String::from_utf8_lossy(&document));

        tracing::debug!(
            target_url = %url,
            original_bytes = document.len(),
            rewritten_bytes = html.len(),
            "Rewrote HTML document"
        );

        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/html; charset=utf-8"),
        );
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));

        Ok(UpstreamResponse {
            status: StatusCode::OK,
            headers,
            content_type: "text/html; charset=utf-8".to_string(),
            body: UpstreamBody::Html(html),
        })
    }

    async fn buffer(&self, mut response: reqwest::Response) -> Result<Bytes> {
        let limit = self.config.max_html_bytes;
        if response.content_length().is_some_and(|len| len > limit as u64) {
            return Err(ProxyError::ResponseTooLarge { limit });
        }

        let mut document = BytesMut::new();
        while let Some(chunk) = response.chunk().await? {
            if document.len() + chunk.len() > limit {
                return Err(ProxyError::ResponseTooLarge { limit });
            }
            document.extend_from_slice(&chunk);
        }
        Ok(document.freeze())
    }

    fn streamed(url: Url, content_type: String, response: reqwest::Response) -> UpstreamResponse {
        let status = response.status();
        let headers = headers::relayed_response_headers(response.headers());
        let stream = response.bytes_stream().inspect_err(move |e| {
            tracing::warn!(target_url = %url, error = %e, "Upstream stream aborted");
        });

        UpstreamResponse {
            status,
            headers,
            content_type,
            body: UpstreamBody::Stream(Body::from_stream(stream)),
        }
    }
}
