//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → rate_limit.rs (check per-client sliding window)
//!     → target.rs (only absolute http/https targets)
//!     → headers.rs (sanitize outbound headers, filter relayed headers)
//!     → Pass to upstream fetcher
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any security check failure
//! - No trust in client input

pub mod headers;
pub mod rate_limit;
pub mod target;

pub use rate_limit::{RateLimitState, RateLimiter};
pub use target::is_http_url;
