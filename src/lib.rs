//! Detects the web technologies behind a URL by matching scraped page
//! evidence (headers, cookies, HTML, scripts, meta tags, DNS records,
//! JS globals, DOM) against a Wappalyzer-style fingerprint catalog.
//!
//! The crate is the evaluation engine only. Fetching and rendering live
//! behind the [`Scraper`] trait; wire in a headless-browser or plain
//! HTTP implementation and call [`TechScanner::analyze`].

mod category;
mod config;
mod detect;
mod error;
mod evidence;
mod pattern;
mod post;
mod report;
mod scraper;
mod tech;

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use anyhow::Context;
use regex::Regex;
use tracing::debug;
use url::Url;

pub use category::Category;
pub use config::{Config, KNOWN_SCRAPERS};
pub use detect::{Detection, DetectionSet};
pub use error::{Result, ScanError};
pub use evidence::{Evidence, UrlStatus};
pub use pattern::Pattern;
pub use report::{Report, ReportedTech};
pub use scraper::Scraper;
pub use tech::{CheckHit, DomPattern, Technology};

/// Default fingerprint catalog, compiled in so the engine works with
/// zero configuration.
const EMBEDDED_CATALOG: &str = include_str!("../data/technologies.json");

/// The fingerprint evaluation engine. Loads the catalog once at
/// construction; each [`analyze`](Self::analyze) call scrapes evidence,
/// fans matching out across the catalog and post-processes the result.
pub struct TechScanner {
    config: Config,
    cats: HashMap<i32, Category>,
    techs: HashMap<String, Arc<Technology>>,
    scraper: Arc<dyn Scraper>,
}

impl TechScanner {
    /// Build an engine from `config` and a scraper implementation. The
    /// catalog comes from `config.apps_json_path` when set, the
    /// embedded copy otherwise.
    pub fn new(config: Config, scraper: Arc<dyn Scraper>) -> Result<Self> {
        config.validate()?;

        let catalog = if config.apps_json_path.is_empty() {
            tech::load_catalog(EMBEDDED_CATALOG.as_bytes())
        } else {
            std::fs::read(&config.apps_json_path)
                .with_context(|| format!("Failed to read catalog {}", config.apps_json_path))
                .and_then(|bytes| tech::load_catalog(&bytes))
        }
        .map_err(ScanError::CatalogLoad)?;

        scraper.set_depth(config.max_depth);

        Ok(Self {
            config,
            cats: catalog.cats,
            techs: catalog.techs,
            scraper,
        })
    }

    /// One-time scraper setup. Errors abort analysis.
    pub async fn init(&self) -> Result<()> {
        self.scraper.init().await
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn categories(&self) -> &HashMap<i32, Category> {
        &self.cats
    }

    pub fn technologies(&self) -> impl Iterator<Item = &Technology> {
        self.techs.values().map(Arc::as_ref)
    }

    /// Analyze one URL: scrape, match every catalog technology
    /// concurrently, then apply excludes and the implies closure.
    pub async fn analyze(&self, url: &str) -> Result<Report> {
        let url = normalize_url(url)?;
        debug!(%url, "analyzing");

        let evidence = Arc::new(self.scraper.scrape(&url).await?);

        let mut set =
            detect::run_detection(&self.techs, Arc::clone(&evidence), Arc::clone(&self.scraper))
                .await;
        post::apply_excludes(&mut set);
        post::apply_implies(&mut set, &self.techs);

        debug!(detected = set.len(), "analysis finished");
        Ok(Report::assemble(&evidence, set))
    }

    /// [`analyze`](Self::analyze), rendered as a JSON string for
    /// callers that set [`Config::json`].
    pub async fn analyze_json(&self, url: &str) -> Result<String> {
        let report = self.analyze(url).await?;
        Ok(report.to_json()?)
    }
}

/// Validate the input shape and normalize scheme-less inputs to
/// `https://`.
fn normalize_url(input: &str) -> Result<String> {
    static URL_RE: OnceLock<Regex> = OnceLock::new();
    let re = URL_RE.get_or_init(|| {
        Regex::new(r"^(?:https?://)?[\w.-]+(?:\.[\w.-]+)+(?::\d+)?(?:/\S*)?$")
            .expect("hardcoded regex")
    });

    if !re.is_match(input) {
        return Err(ScanError::InvalidUrl(input.to_string()));
    }

    let with_scheme = if input.starts_with("http://") || input.starts_with("https://") {
        input.to_string()
    } else {
        format!("https://{input}")
    };

    Url::parse(&with_scheme)
        .map(String::from)
        .map_err(|_| ScanError::InvalidUrl(input.to_string()))
}
