//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → security::rate_limit (per-client gate, /healthz exempt)
//!     → handlers.rs (query parsing, ProxyRequest construction)
//!     → upstream::Fetcher (fetch, rewrite or stream)
//!     → Send to client
//! ```

pub mod handlers;
pub mod request;
pub mod server;

pub use request::X_REQUEST_ID;
pub use server::HttpServer;
