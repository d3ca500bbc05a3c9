use async_trait::async_trait;

use crate::error::Result;
use crate::evidence::Evidence;

/// Contract between the engine and whatever fetches pages. Concrete
/// implementations (headless browser, plain HTTP client) live with the
/// caller; the engine only drives this interface.
///
/// All methods take `&self` because the detection fan-out calls
/// [`eval_js`](Scraper::eval_js) from many tasks at once.
/// Implementations backed by a single browser page must serialize those
/// calls internally (a mutex around the page is enough).
#[async_trait]
pub trait Scraper: Send + Sync {
    /// One-time setup (launch the browser, build the client). Errors
    /// abort analysis.
    async fn init(&self) -> Result<()>;

    /// Fetch `url` and return the observed evidence.
    async fn scrape(&self, url: &str) -> Result<Evidence>;

    /// Evaluate a dotted property chain (e.g. `window.jQuery.fn.jquery`)
    /// in page context. Returns `None` when the property is absent or
    /// is neither a string nor a number.
    async fn eval_js(&self, property_path: &str) -> Result<Option<String>>;

    /// Whether this scraper executes JavaScript and exposes the live
    /// DOM. Gates the `js` and `dom` matchers.
    fn can_render_page(&self) -> bool;

    /// Current recursion depth; depth > 0 enables robots.txt checks on
    /// the scraper side.
    fn set_depth(&self, depth: usize);
}
