use std::collections::HashMap;

use scraper::Html;
use tracing::debug;

use super::{CheckHit, Technology};
use crate::pattern::Pattern;
use crate::scraper::Scraper;

/// Run `pattern` against one candidate value. Empty-body patterns hit
/// on presence alone; everything else needs a regex match. Inert
/// patterns (failed compile) never hit.
fn check_value(pattern: &Pattern, value: &str, hits: &mut Vec<CheckHit>) {
    if pattern.source.is_empty() {
        hits.push(CheckHit {
            confidence: pattern.confidence,
            version: String::new(),
        });
    } else if pattern.matches(value) {
        hits.push(CheckHit {
            confidence: pattern.confidence,
            version: pattern.resolve_version(value),
        });
    }
}

/// Keyed variant: the evidence key is known to be present, so an
/// empty-body pattern hits once even when the value list is empty.
fn check_values(patterns: &[Pattern], values: &[String], hits: &mut Vec<CheckHit>) {
    for pattern in patterns {
        if pattern.source.is_empty() {
            hits.push(CheckHit {
                confidence: pattern.confidence,
                version: String::new(),
            });
            continue;
        }
        for value in values {
            check_value(pattern, value, hits);
        }
    }
}

impl Technology {
    pub fn check_url(&self, url: &str) -> Vec<CheckHit> {
        let mut hits = Vec::new();
        for pattern in &self.url {
            check_value(pattern, url, &mut hits);
        }
        hits
    }

    pub fn check_html(&self, html: &str) -> Vec<CheckHit> {
        let mut hits = Vec::new();
        for pattern in &self.html {
            check_value(pattern, html, &mut hits);
        }
        hits
    }

    pub fn check_scripts(&self, scripts: &[String]) -> Vec<CheckHit> {
        let mut hits = Vec::new();
        for pattern in &self.scripts {
            for src in scripts {
                check_value(pattern, src, &mut hits);
            }
        }
        hits
    }

    pub fn check_headers(&self, headers: &HashMap<String, Vec<String>>) -> Vec<CheckHit> {
        let mut hits = Vec::new();
        for (name, patterns) in &self.headers {
            if let Some(values) = headers.get(name) {
                check_values(patterns, values, &mut hits);
            }
        }
        hits
    }

    pub fn check_cookies(&self, cookies: &HashMap<String, String>) -> Vec<CheckHit> {
        let mut hits = Vec::new();
        for (name, patterns) in &self.cookies {
            if let Some(value) = cookies.get(name) {
                check_values(patterns, std::slice::from_ref(value), &mut hits);
            }
        }
        hits
    }

    pub fn check_meta(&self, meta: &HashMap<String, Vec<String>>) -> Vec<CheckHit> {
        let mut hits = Vec::new();
        for (name, patterns) in &self.meta {
            if let Some(contents) = meta.get(name) {
                check_values(patterns, contents, &mut hits);
            }
        }
        hits
    }

    pub fn check_dns(&self, dns: &HashMap<String, Vec<String>>) -> Vec<CheckHit> {
        let mut hits = Vec::new();
        for (record_type, patterns) in &self.dns {
            if let Some(values) = dns.get(record_type) {
                check_values(patterns, values, &mut hits);
            }
        }
        hits
    }

    /// Probe the rendered DOM. Only the first element matching each
    /// selector is considered. The document is parsed here and dropped
    /// here: `Html` is not `Sync`, so it must not escape the matcher.
    pub fn check_dom(&self, html: &str) -> Vec<CheckHit> {
        if self.dom.is_empty() {
            return Vec::new();
        }

        let document = Html::parse_document(html);
        let mut hits = Vec::new();

        for probe in &self.dom {
            let Some(element) = document.select(&probe.selector).next() else {
                continue;
            };

            if let Some(exists) = &probe.exists {
                hits.push(CheckHit {
                    confidence: exists.confidence,
                    // Presence probes have nothing to capture from; a
                    // version tag only makes sense as a literal.
                    version: if exists.version.contains('\\') {
                        String::new()
                    } else {
                        exists.version.clone()
                    },
                });
            }

            if !probe.text.is_empty() {
                let text = element.text().collect::<String>();
                for pattern in &probe.text {
                    check_value(pattern, &text, &mut hits);
                }
            }

            for (attribute, patterns) in &probe.attributes {
                if let Some(value) = element.attr(attribute) {
                    for pattern in patterns {
                        check_value(pattern, value, &mut hits);
                    }
                }
            }
        }

        hits
    }

    /// Evaluate JS property probes through the scraper. Only string and
    /// number results count as values; evaluation errors are logged and
    /// isolated to this technology.
    pub async fn check_js(&self, scraper: &dyn Scraper) -> Vec<CheckHit> {
        let mut hits = Vec::new();
        for (property, patterns) in &self.js {
            let value = match scraper.eval_js(property).await {
                Ok(value) => value,
                Err(err) => {
                    debug!(technology = %self.name, property = %property, %err, "eval_js failed");
                    continue;
                }
            };
            let Some(value) = value else { continue };
            check_values(patterns, std::slice::from_ref(&value), &mut hits);
        }
        hits
    }
}
