use serde::Deserialize;

use crate::error::{Result, ScanError};

/// Scraper selectors the glue layer knows how to construct. The engine
/// itself only validates the name; concrete implementations live with
/// the caller.
pub const KNOWN_SCRAPERS: &[&str] = &["headless", "http"];

/// Engine options. Timeouts are informational for scraper
/// implementations; the engine does not enforce them.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Path to a fingerprint catalog. Empty means the embedded copy.
    pub apps_json_path: String,
    pub browser_timeout_seconds: u64,
    pub network_timeout_seconds: u64,
    pub page_load_timeout_seconds: u64,
    /// Render the report as a JSON string instead of the structured form.
    pub json: bool,
    /// Which scraper implementation the caller should wire in.
    pub scraper: String,
    /// Crawl depth handed to the scraper; depth > 0 enables robots checks
    /// on the scraper side.
    pub max_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            apps_json_path: String::new(),
            browser_timeout_seconds: 4,
            network_timeout_seconds: 2,
            page_load_timeout_seconds: 2,
            json: true,
            scraper: "headless".to_string(),
            max_depth: 0,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if !KNOWN_SCRAPERS.contains(&self.scraper.as_str()) {
            return Err(ScanError::UnknownScraper(self.scraper.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn unknown_scraper_is_rejected() {
        let config = Config {
            scraper: "carrier-pigeon".to_string(),
            ..Config::default()
        };
        match config.validate() {
            Err(ScanError::UnknownScraper(name)) => assert_eq!(name, "carrier-pigeon"),
            other => panic!("expected UnknownScraper, got {other:?}"),
        }
    }
}
