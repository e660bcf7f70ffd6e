// src/utils/mod.rs

//! Utility functions and helpers.

pub mod http;

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

/// `/c/<slug>/<numeric id>` profile paths
static PROFILE_PATH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/c/[^/]+/(\d+)/?$").expect("profile path pattern is valid")
});

static TRAILING_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)/?$").expect("trailing id pattern is valid"));

/// Resolve a potentially relative URL against a base URL.
pub fn resolve_url(base: &Url, href: &str) -> String {
    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Resolve a URL string against a base URL string.
pub fn resolve(base_url: &str, href: &str) -> Option<String> {
    Url::parse(base_url)
        .ok()
        .map(|base| resolve_url(&base, href))
}

/// Extract the domain from a URL string.
pub fn get_domain(url_str: &str) -> Option<String> {
    Url::parse(url_str)
        .ok()
        .and_then(|u| u.host_str().map(|s| s.to_lowercase()))
}

/// Registrable-ish host with a leading `www.` removed.
pub fn bare_domain(url_str: &str) -> Option<String> {
    get_domain(url_str).map(|d| d.trim_start_matches("www.").to_string())
}

/// Whether the URL points at a company profile page.
pub fn is_profile_url(url_str: &str) -> bool {
    Url::parse(url_str)
        .map(|u| PROFILE_PATH_RE.is_match(u.path()))
        .unwrap_or(false)
}

/// Numeric company id from a profile URL or an `@id` style identifier.
pub fn extract_company_id(url_str: &str) -> Option<String> {
    if let Ok(parsed) = Url::parse(url_str) {
        if let Some(caps) = PROFILE_PATH_RE.captures(parsed.path()) {
            return caps.get(1).map(|m| m.as_str().to_string());
        }
    }
    let without_fragment = url_str.split(['?', '#']).next().unwrap_or(url_str);
    TRAILING_ID_RE
        .captures(without_fragment)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Absolute `http(s)` URL check.
pub fn is_absolute_http(url_str: &str) -> bool {
    Url::parse(url_str)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
        .unwrap_or(false)
}
