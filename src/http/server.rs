//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, request ID, timeout, rate limiting)
//! - Bind server to listener
//! - Run the rate limit sweeper alongside the server
//!
//! # Design Decisions
//! - A request that outlives `timeouts.request_secs` is answered with 502,
//!   like any other upstream failure
//! - Draining after shutdown is bounded by `timeouts.shutdown_grace_secs`;
//!   connections still open afterwards are dropped

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware,
    routing::{any, get},
    Router,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ProxyConfig;
use crate::error::Result;
use crate::http::handlers::{self, AppState};
use crate::http::request::{request_id, MakeRequestUuidV4};
use crate::lifecycle::{shutdown, Shutdown};
use crate::security::rate_limit::{rate_limit_middleware, RateLimitState, RateLimiter};
use crate::upstream::Fetcher;

/// HTTP server for the search proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
    limiter: Arc<RateLimiter>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ProxyConfig) -> Result<Self> {
        let fetcher = Fetcher::new(config.upstream.clone())?;
        let limiter = Arc::new(RateLimiter::from_config(&config.rate_limit));

        let state = AppState {
            fetcher,
            search_endpoint: config.search.endpoint.clone(),
            max_body_size: config.security.max_body_size,
        };
        let rate_limit = RateLimitState {
            limiter: limiter.clone(),
            trust_forwarded_for: config.rate_limit.trust_forwarded_for,
        };

        let router = Self::build_router(&config, state, rate_limit);
        Ok(Self {
            router,
            config,
            limiter,
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &ProxyConfig, state: AppState, rate_limit: RateLimitState) -> Router {
        let mut proxied = Router::new()
            .route("/search", get(handlers::search))
            .route("/proxy", get(handlers::proxy))
            .route("/formproxy", any(handlers::form_proxy))
            .fallback(handlers::not_found)
            .with_state(state);

        if config.rate_limit.enabled {
            proxied = proxied.layer(middleware::from_fn_with_state(rate_limit, rate_limit_middleware));
        }

        Router::new()
            .route("/healthz", get(handlers::healthz))
            .merge(proxied)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV4))
                    .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                        tracing::info_span!(
                            "request",
                            request_id = %request_id(request.headers()),
                            method = %request.method(),
                            path = %request.uri().path(),
                        )
                    }))
                    .layer(TimeoutLayer::with_status_code(
                        StatusCode::BAD_GATEWAY,
                        Duration::from_secs(config.timeouts.request_secs),
                    ))
                    .layer(PropagateRequestIdLayer::x_request_id()),
            )
    }

    /// The fully layered router, for driving the server without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Shared rate limiter state.
    pub fn rate_limiter(&self) -> Arc<RateLimiter> {
        self.limiter.clone()
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> std::io::Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            rate_limit = self.config.rate_limit.enabled,
            max_requests = self.config.rate_limit.max_requests,
            window_ms = self.config.rate_limit.window_ms,
            "HTTP server starting"
        );

        let sweeper = self.config.rate_limit.enabled.then(|| {
            self.limiter.clone().spawn_sweeper(
                Duration::from_secs(self.config.rate_limit.sweep_interval_secs),
                shutdown.subscribe(),
            )
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        let grace = Duration::from_secs(self.config.timeouts.shutdown_grace_secs);
        let drain_deadline = shutdown.subscribe();

        let serve = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown::triggered(shutdown.subscribe()))
            .into_future();

        tokio::select! {
            result = serve => result?,
            _ = async {
                shutdown::triggered(drain_deadline).await;
                tokio::time::sleep(grace).await;
            } => {
                tracing::warn!(
                    grace_secs = grace.as_secs(),
                    "Drain deadline reached, dropping open connections"
                );
            }
        }

        if let Some(sweeper) = sweeper {
            sweeper.abort();
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
