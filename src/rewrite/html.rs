//! Pattern-based HTML rewriting.
//!
//! The rewriter works on raw markup rather than a parsed DOM. Output on
//! well-formed markup is fixed; malformed markup is rewritten on a best
//! effort basis.
//!
//! Passes, in order:
//! 1. `<script>` elements are removed whole.
//! 2. Absolute `href`/`src` values become `/proxy?url=...`.
//! 3. Absolute quoted form actions become `/formproxy?url=...`.
//! 4. Unquoted or irregularly quoted form actions that still name an
//!    absolute URL get the same treatment.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::security::target::is_http_url;

/// Endpoint that re-enters the proxy for links and embedded resources.
pub const PROXY_ENDPOINT: &str = "/proxy";

/// Endpoint that re-enters the proxy for form submissions.
pub const FORM_PROXY_ENDPOINT: &str = "/formproxy";

static SCRIPT_ELEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>").expect("script pattern compiles")
});

static LINK_ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)([\s"'](?:href|src))=(?:"(https?://[^"]*)"|'(https?://[^']*)')"#)
        .expect("link attribute pattern compiles")
});

static FORM_ACTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(<form\b[^>]*?[\s"']action=)(?:"(https?://[^"]*)"|'(https?://[^']*)')"#)
        .expect("form action pattern compiles")
});

static FORM_ACTION_FALLBACK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<form\b([^>]*?[\s"'])action=([^\s>]+)([^>]*)>"#)
        .expect("form action fallback pattern compiles")
});

/// Build a proxy-relative endpoint for `target`.
pub fn proxied(endpoint: &str, target: &str) -> String {
    format!("{}?url={}", endpoint, urlencoding::encode(target))
}

/// Rewrite an HTML document so navigation stays on the proxy.
pub fn rewrite(html: &str) -> String {
    if html.is_empty() {
        return String::new();
    }

    let html = SCRIPT_ELEMENT.replace_all(html, "");

    let html = LINK_ATTRIBUTE.replace_all(&html, |caps: &Captures| {
        let (quote, target) = quoted_target(caps);
        format!("{}={quote}{}{quote}", &caps[1], proxied(PROXY_ENDPOINT, target))
    });

    let html = FORM_ACTION.replace_all(&html, |caps: &Captures| {
        let (quote, target) = quoted_target(caps);
        format!("{}{quote}{}{quote}", &caps[1], proxied(FORM_PROXY_ENDPOINT, target))
    });

    let html = FORM_ACTION_FALLBACK.replace_all(&html, |caps: &Captures| {
        let target = caps[2].replace(['"', '\''], "");
        if is_http_url(&target) {
            format!(
                "<form{}action=\"{}\"{}>",
                &caps[1],
                proxied(FORM_PROXY_ENDPOINT, &target),
                &caps[3]
            )
        } else {
            caps[0].to_string()
        }
    });

    html.into_owned()
}

/// Quote character and value of a `"..."` / `'...'` alternation in groups 2 and 3.
fn quoted_target<'c>(caps: &'c Captures) -> (char, &'c str) {
    match caps.get(2) {
        Some(m) => ('"', m.as_str()),
        None => ('\'', caps.get(3).map_or("", |m| m.as_str())),
    }
}
