use std::collections::HashMap;

use cookie::Cookie;
use http::HeaderMap;
use serde::Serialize;

/// One hop of the navigation chain.
#[derive(Debug, Clone, Serialize)]
pub struct UrlStatus {
    pub url: String,
    pub status: u16,
}

/// Everything observed about a page, normalized for matching: header,
/// cookie and meta names lower-cased, DNS record types upper-cased.
/// Built by a [`Scraper`](crate::Scraper) implementation, consumed once
/// per analysis.
#[derive(Debug, Clone, Default)]
pub struct Evidence {
    /// Navigation chain, in order.
    pub urls: Vec<UrlStatus>,
    /// Header name → values, one entry per occurrence.
    pub headers: HashMap<String, Vec<String>>,
    /// Cookie name → value, last write wins.
    pub cookies: HashMap<String, String>,
    /// Script source URLs.
    pub scripts: Vec<String>,
    /// Meta name/property → content values.
    pub meta: HashMap<String, Vec<String>>,
    /// DNS record type (`A`, `MX`, ...) → values.
    pub dns: HashMap<String, Vec<String>>,
    /// Serialized HTML of the rendered page.
    pub html: String,
    /// Certificate issuer chain; surfaced in results, not matched.
    pub cert_issuers: Vec<String>,
}

impl Evidence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_url(&mut self, url: impl Into<String>, status: u16) {
        self.urls.push(UrlStatus {
            url: url.into(),
            status,
        });
    }

    /// First URL of the navigation chain, i.e. the page under analysis.
    pub fn primary_url(&self) -> Option<&str> {
        self.urls.first().map(|u| u.url.as_str())
    }

    pub fn add_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push(value.into());
    }

    /// Ingest a response header map. `http` keeps names lower-cased
    /// already; values that are not valid UTF-8 are skipped.
    pub fn add_header_map(&mut self, headers: &HeaderMap) {
        for (name, value) in headers {
            if let Ok(value) = value.to_str() {
                self.add_header(name.as_str(), value);
            }
        }
    }

    pub fn add_cookie(&mut self, name: &str, value: impl Into<String>) {
        self.cookies
            .insert(name.to_ascii_lowercase(), value.into());
    }

    /// Parse one `Set-Cookie` header value. Unparseable values are
    /// dropped.
    pub fn add_set_cookie(&mut self, raw: &str) {
        if let Ok(cookie) = Cookie::parse(raw) {
            self.add_cookie(cookie.name(), cookie.value().to_string());
        }
    }

    pub fn add_script(&mut self, src: impl Into<String>) {
        self.scripts.push(src.into());
    }

    pub fn add_meta(&mut self, name: &str, content: impl Into<String>) {
        self.meta
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push(content.into());
    }

    pub fn add_dns(&mut self, record_type: &str, value: impl Into<String>) {
        self.dns
            .entry(record_type.to_ascii_uppercase())
            .or_default()
            .push(value.into());
    }
}
