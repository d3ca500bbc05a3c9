mod check;
mod parse;

use scraper::Selector;

use crate::pattern::Pattern;

pub(crate) use parse::load_catalog;

/// A technology fingerprint from the catalog, with every pattern group
/// compiled and its category IDs already resolved to names.
#[derive(Debug, Clone)]
pub struct Technology {
    pub name: String,
    /// Category IDs as they appear in the catalog.
    pub cats: Vec<i32>,
    /// Category names, resolved at load time.
    pub categories: Vec<String>,
    /// URL of the technology's website.
    pub website: String,
    pub description: Option<String>,
    /// Icon filename; passthrough metadata.
    pub icon: Option<String>,
    /// [CPE](https://nvd.nist.gov/products/cpe) identifier, if any.
    pub cpe: Option<String>,
    pub saas: Option<bool>,
    pub oss: Option<bool>,

    /// Technologies that must also be reported when this one matches.
    /// The pattern body names the implied technology; `version` and
    /// `confidence` tags carry over to the implied detection.
    pub implies: Vec<Pattern>,
    /// Technologies to drop from the result set when this one matches.
    pub excludes: Vec<Pattern>,

    /// Patterns against the page URL.
    pub url: Vec<Pattern>,
    /// Patterns against the serialized HTML.
    pub html: Vec<Pattern>,
    /// Patterns against script source URLs (`scripts` and `scriptSrc`
    /// catalog spellings both land here).
    pub scripts: Vec<Pattern>,
    /// Header name (lower-case) → patterns against its values.
    pub headers: Vec<(String, Vec<Pattern>)>,
    /// Cookie name (lower-case) → patterns against its value.
    pub cookies: Vec<(String, Vec<Pattern>)>,
    /// Meta name (lower-case) → patterns against its contents.
    pub meta: Vec<(String, Vec<Pattern>)>,
    /// DNS record type (upper-case) → patterns against its values.
    pub dns: Vec<(String, Vec<Pattern>)>,
    /// JavaScript property path (case sensitive) → patterns against the
    /// evaluated value.
    pub js: Vec<(String, Vec<Pattern>)>,
    /// Query-selector probes against the rendered DOM.
    pub dom: Vec<DomPattern>,
}

/// One DOM probe: a selector plus what to read off the first matching
/// element. `properties` in the catalog folds into `attributes` since
/// live-DOM property reads fall back to attribute reads here.
#[derive(Debug, Clone)]
pub struct DomPattern {
    pub selector: Selector,
    /// Presence-only probe (string selector form, or an `exists` key).
    pub exists: Option<Pattern>,
    /// Patterns against the element's text content.
    pub text: Vec<Pattern>,
    /// Attribute name → patterns against the attribute value.
    pub attributes: Vec<(String, Vec<Pattern>)>,
}

/// A single matcher hit: how confident, and which version string the
/// pattern extracted (empty for unversioned hits).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckHit {
    pub confidence: i32,
    pub version: String,
}
