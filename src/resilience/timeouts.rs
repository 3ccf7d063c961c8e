//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap upstream calls with a deadline
//! - Cancel operations cleanly on timeout
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors are distinct from other errors
//! - Timed-out upstream calls surface as 502 Bad Gateway
//! - Deadlines are absolute instants so several stages of one fetch share
//!   a single budget

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::{ProxyError, Result};

/// Absolute deadline `limit` from now.
pub fn deadline_in(limit: Duration) -> Instant {
    Instant::now() + limit
}

/// Run `fut`, failing with [`ProxyError::UpstreamTimeout`] once `deadline`
/// passes. The inner future is dropped on timeout.
pub async fn with_deadline<F, T>(deadline: Instant, fut: F) -> Result<T>
where
    F: Future<Output = T>,
{
    tokio::time::timeout_at(deadline, fut)
        .await
        .map_err(|_| ProxyError::UpstreamTimeout)
}
