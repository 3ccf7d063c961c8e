//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to upstream:
//!     → timeouts.rs (enforce response deadline)
//!     → On failure: 502 to the client, no retry
//! ```
//!
//! # Design Decisions
//! - Every outbound call has a deadline
//! - A single attempt per client request; retries are the client's call

pub mod timeouts;
