//! Sliding-window rate limiting per client identity.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::RateLimitConfig;
use crate::error::ProxyError;
use crate::http::request::client_identity;
use crate::observability::metrics;

/// Per-identity record of recent request timestamps.
///
/// Each identity owns the millisecond timestamps of its requests inside the
/// trailing window. Stale entries are pruned lazily by the next check for
/// that identity; identities that went quiet are dropped by [`sweep`].
///
/// [`sweep`]: RateLimiter::sweep
pub struct RateLimiter {
    windows: DashMap<String, Vec<u64>>,
    max_requests: usize,
    window_ms: u64,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            windows: DashMap::new(),
            max_requests,
            window_ms: window.as_millis() as u64,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_requests, Duration::from_millis(config.window_ms))
    }

    /// Record a request for `identity` and report whether it is admitted.
    pub fn check(&self, identity: &str) -> bool {
        self.check_at(identity, now_ms())
    }

    /// Same as [`check`](Self::check) with an explicit clock reading.
    ///
    /// Rejected requests are recorded too, so a client that keeps hammering
    /// stays limited until it backs off for a full window.
    pub fn check_at(&self, identity: &str, now: u64) -> bool {
        // The entry guard holds the shard lock for the whole read-modify-write.
        let mut window = self.windows.entry(identity.to_string()).or_default();
        window.retain(|&ts| now.saturating_sub(ts) < self.window_ms);
        window.push(now);
        window.len() <= self.max_requests
    }

    /// Drop identities with no timestamp left inside the window.
    pub fn sweep(&self) -> usize {
        self.sweep_at(now_ms())
    }

    pub fn sweep_at(&self, now: u64) -> usize {
        let before = self.windows.len();
        self.windows
            .retain(|_, window| window.iter().any(|&ts| now.saturating_sub(ts) < self.window_ms));
        before.saturating_sub(self.windows.len())
    }

    /// Number of identities currently tracked.
    pub fn tracked_identities(&self) -> usize {
        self.windows.len()
    }

    /// Periodically evict idle identities until shutdown is signalled.
    pub fn spawn_sweeper(
        self: Arc<Self>,
        every: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let evicted = self.sweep();
                        if evicted > 0 {
                            tracing::debug!(
                                evicted,
                                remaining = self.tracked_identities(),
                                "Evicted idle rate limit windows"
                            );
                        }
                    }
                    _ = shutdown.recv() => {
                        tracing::debug!("Rate limit sweeper stopping");
                        break;
                    }
                }
            }
        })
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// State for the rate limiting middleware.
#[derive(Clone)]
pub struct RateLimitState {
    pub limiter: Arc<RateLimiter>,
    pub trust_forwarded_for: bool,
}

/// Middleware function gating every request through the limiter.
pub async fn rate_limit_middleware(
    State(state): State<RateLimitState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let key = client_identity(request.headers(), peer, state.trust_forwarded_for);

    if state.limiter.check(&key) {
        next.run(request).await
    } else {
        tracing::warn!(client = %key, path = %request.uri().path(), "Rate limit exceeded");
        metrics::record_rate_limited();
        ProxyError::RateLimited.into_response()
    }
}
