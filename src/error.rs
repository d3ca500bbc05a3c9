use thiserror::Error;

/// Errors surfaced by the engine. Malformed catalog *patterns* never show
/// up here: a pattern that fails to compile is inert. Only structural
/// problems (unreadable catalog, unknown scraper, bad input URL, failed
/// scrape) abort.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("failed to load fingerprint catalog")]
    CatalogLoad(#[source] anyhow::Error),

    #[error("unknown scraper {0:?}")]
    UnknownScraper(String),

    #[error("invalid URL {0:?}")]
    InvalidUrl(String),

    #[error("scrape failed: {0}")]
    Scrape(#[source] anyhow::Error),

    #[error("failed to render report")]
    Render(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ScanError>;
