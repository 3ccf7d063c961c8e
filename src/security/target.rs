//! Target URL validation.
//!
//! Only absolute `http` and `https` URLs may be fetched. Validation never
//! errors: anything that fails to parse is simply not a valid target.

use url::Url;

use crate::error::{ProxyError, Result};

/// Returns true iff `candidate` parses as an absolute `http`/`https` URL.
pub fn is_http_url(candidate: &str) -> bool {
    parse_http_url(candidate).is_some()
}

/// Parse `candidate` as a fetchable target.
pub fn parse_target(candidate: &str) -> Result<Url> {
    parse_http_url(candidate).ok_or_else(|| ProxyError::InvalidTarget(candidate.to_string()))
}

fn parse_http_url(candidate: &str) -> Option<Url> {
    let url = Url::parse(candidate).ok()?;
    matches!(url.scheme(), "http" | "https").then_some(url)
}
