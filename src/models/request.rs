// src/models/request.rs

//! Profile requests and fetched pages.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

/// A profile URL queued for extraction.
///
/// The URL is the request's identity; only the fetch layer touches the
/// attempt counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileRequest {
    url: String,
    attempt_count: u32,
}

impl ProfileRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            attempt_count: 0,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    /// Count one more fetch attempt and return the new total.
    pub fn record_attempt(&mut self) -> u32 {
        self.attempt_count += 1;
        self.attempt_count
    }

    /// Build requests from a plain-text URL list, one per line.
    ///
    /// Blank lines and `#` comments are skipped. A URL listed twice is kept
    /// once, at its first position.
    pub fn from_url_list(text: &str) -> Vec<Self> {
        let mut seen = HashSet::new();
        let mut requests = Vec::new();

        for line in text.lines() {
            let url = line.trim();
            if url.is_empty() || url.starts_with('#') {
                continue;
            }
            if !seen.insert(url.to_string()) {
                log::warn!("Duplicate profile URL skipped: {}", url);
                continue;
            }
            requests.push(Self::new(url));
        }
        requests
    }
}

/// Raw HTML of a fetched profile page. Dropped once parsed.
#[derive(Debug, Clone)]
pub struct RawPage {
    /// URL that was requested
    pub url: String,
    /// URL the page was served from after redirects
    pub final_url: String,
    pub html_content: String,
    pub status: u16,
    pub fetched_at: DateTime<Utc>,
    /// Attempts it took to get this page
    pub attempts: u32,
}

impl RawPage {
    /// Wrap HTML that did not come over the network (saved pages, tests).
    pub fn from_html(url: impl Into<String>, html: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            final_url: url.clone(),
            url,
            html_content: html.into(),
            status: 200,
            fetched_at: Utc::now(),
            attempts: 0,
        }
    }

    /// Whether the server sent us somewhere other than the requested URL.
    pub fn was_redirected(&self) -> bool {
        self.final_url.trim_end_matches('/') != self.url.trim_end_matches('/')
    }
}
