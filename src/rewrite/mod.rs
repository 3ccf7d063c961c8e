//! Response body transformation.
//!
//! Only HTML documents are rewritten; every other content type passes
//! through the proxy untouched.

pub mod html;

pub use html::{proxied, rewrite, FORM_PROXY_ENDPOINT, PROXY_ENDPOINT};
