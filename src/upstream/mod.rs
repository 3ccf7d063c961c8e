//! Upstream fetching subsystem.
//!
//! # Data Flow
//! ```text
//! ProxyRequest
//!     → fetcher.rs (sanitize headers, send, classify by Content-Type)
//!     → text/html: buffer → rewrite → 200
//!     → anything else: status + filtered headers + streamed body
//! ```

pub mod fetcher;

pub use fetcher::{Fetcher, ProxyRequest, UpstreamBody, UpstreamResponse};
