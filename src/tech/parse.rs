use std::{collections::HashMap, sync::Arc};

use anyhow::{anyhow, Context, Error};
use scraper::Selector;
use serde::Deserialize;
use tracing::debug;

use super::{DomPattern, Technology};
use crate::category::Category;
use crate::pattern::Pattern;

/// The loaded fingerprint document: category table plus technology
/// table, both immutable after load.
#[derive(Debug)]
pub(crate) struct Catalog {
    pub cats: HashMap<i32, Category>,
    pub techs: HashMap<String, Arc<Technology>>,
}

#[derive(Debug, Deserialize)]
struct CatalogRaw {
    technologies: HashMap<String, TechnologyRaw>,
    categories: HashMap<String, Category>,
}

/// Serde mirror of a catalog technology record. Pattern-bearing fields
/// stay untyped here because the catalog writes them as a string, a
/// list, or a map interchangeably; fields this engine does not know are
/// dropped by serde without complaint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TechnologyRaw {
    #[serde(default)]
    cats: Vec<i32>,
    #[serde(default)]
    website: String,
    description: Option<String>,
    icon: Option<String>,
    cpe: Option<String>,
    saas: Option<bool>,
    oss: Option<bool>,
    implies: Option<serde_json::Value>,
    excludes: Option<serde_json::Value>,
    url: Option<serde_json::Value>,
    html: Option<serde_json::Value>,
    scripts: Option<serde_json::Value>,
    script_src: Option<serde_json::Value>,
    headers: Option<serde_json::Value>,
    cookies: Option<serde_json::Value>,
    meta: Option<serde_json::Value>,
    dns: Option<serde_json::Value>,
    js: Option<serde_json::Value>,
    dom: Option<serde_json::Value>,
}

/// How pattern-map sub-keys are normalized for lookup.
#[derive(Clone, Copy)]
enum KeyCase {
    Lower,
    Upper,
    /// JS property paths are case sensitive.
    Exact,
}

impl KeyCase {
    fn apply(self, key: String) -> String {
        match self {
            KeyCase::Lower => key.to_ascii_lowercase(),
            KeyCase::Upper => key.to_ascii_uppercase(),
            KeyCase::Exact => key,
        }
    }
}

pub(crate) fn load_catalog(bytes: &[u8]) -> Result<Catalog, Error> {
    let raw = serde_json::from_slice::<CatalogRaw>(bytes)
        .context("Failed to parse fingerprint catalog JSON")?;

    let cats = Category::from_raw(raw.categories)?;

    let mut techs = HashMap::with_capacity(raw.technologies.len());
    for (name, item) in raw.technologies {
        let tech = Technology::from_raw(name.clone(), item, &cats)
            .with_context(|| format!("Loading technology {name}"))?;
        techs.insert(name, Arc::new(tech));
    }

    debug!(
        technologies = techs.len(),
        categories = cats.len(),
        "fingerprint catalog loaded"
    );

    Ok(Catalog { cats, techs })
}

/// Transform an `Option<serde_json::Value>` to a `Vec<T>` with `f`.
///
/// `None` => `vec![]`, `"str"` => `vec![f("str")]`,
/// `[v1, v2, ...]` => `vec![f(v1), f(v2), ...]`; entries `f` rejects
/// are skipped.
fn to_vec<T, F>(value: Option<serde_json::Value>, f: F) -> Vec<T>
where
    F: Fn(serde_json::Value) -> Result<T, Error>,
{
    match value {
        None => Vec::new(),
        Some(serde_json::Value::Array(a)) => a.into_iter().map(f).filter_map(|x| x.ok()).collect(),
        Some(x) => match f(x) {
            Ok(x) => vec![x],
            Err(_) => Vec::new(),
        },
    }
}

fn to_pattern_vec(value: Option<serde_json::Value>) -> Vec<Pattern> {
    to_vec(value, |s| match s {
        serde_json::Value::String(s) => Ok(Pattern::parse(&s)),
        x => Err(anyhow!("Expected a string, found {x}")),
    })
}

#[allow(clippy::type_complexity)]
fn to_pattern_map(
    value: Option<serde_json::Value>,
    case: KeyCase,
) -> Result<Vec<(String, Vec<Pattern>)>, Error> {
    match value {
        None => Ok(Vec::new()),
        Some(serde_json::Value::Object(o)) => Ok(o
            .into_iter()
            .map(|(k, v)| (case.apply(k), to_pattern_vec(Some(v))))
            .collect()),
        Some(x) => Err(anyhow!("Expected an object, found {x}")),
    }
}

impl Technology {
    fn from_raw(
        name: String,
        item: TechnologyRaw,
        cats: &HashMap<i32, Category>,
    ) -> Result<Self, Error> {
        let categories = item
            .cats
            .iter()
            .map(|id| {
                cats.get(id)
                    .map(|c| c.name.clone())
                    .ok_or_else(|| anyhow!("Unknown category ID {id}"))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut scripts = to_pattern_vec(item.scripts);
        scripts.extend(to_pattern_vec(item.script_src));

        Ok(Self {
            name,
            cats: item.cats,
            categories,
            website: item.website,
            description: item.description,
            icon: item.icon,
            cpe: item.cpe,
            saas: item.saas,
            oss: item.oss,
            implies: to_pattern_vec(item.implies),
            excludes: to_pattern_vec(item.excludes),
            url: to_pattern_vec(item.url),
            html: to_pattern_vec(item.html),
            scripts,
            headers: to_pattern_map(item.headers, KeyCase::Lower)?,
            cookies: to_pattern_map(item.cookies, KeyCase::Lower)?,
            meta: to_pattern_map(item.meta, KeyCase::Lower)?,
            dns: to_pattern_map(item.dns, KeyCase::Upper)?,
            js: to_pattern_map(item.js, KeyCase::Exact)?,
            dom: item.dom.map(parse_dom_patterns).unwrap_or_default(),
        })
    }
}

/// Parse the `dom` field. Three shapes: a selector string (presence
/// probe), a list of selector strings, or a map
/// `selector → {exists | text | attributes | properties}`. Selectors
/// that fail to parse are skipped, like any other bad pattern.
fn parse_dom_patterns(value: serde_json::Value) -> Vec<DomPattern> {
    match value {
        serde_json::Value::String(s) => presence_probe(&s).into_iter().collect(),
        serde_json::Value::Array(a) => a
            .into_iter()
            .filter_map(|x| match x {
                serde_json::Value::String(s) => presence_probe(&s),
                _ => None,
            })
            .collect(),
        serde_json::Value::Object(o) => {
            let mut probes = Vec::new();
            for (selector, description) in o {
                let Ok(selector) = Selector::parse(&selector) else {
                    continue;
                };
                let mut probe = DomPattern {
                    selector,
                    exists: None,
                    text: Vec::new(),
                    attributes: Vec::new(),
                };
                let serde_json::Value::Object(description) = description else {
                    continue;
                };
                for (key, value) in description {
                    match key.as_str() {
                        "exists" => {
                            if let serde_json::Value::String(s) = value {
                                probe.exists = Some(Pattern::parse(&s));
                            }
                        }
                        "text" => probe.text.extend(to_pattern_vec(Some(value))),
                        "attributes" | "properties" => {
                            if let Ok(map) = to_pattern_map(Some(value), KeyCase::Exact) {
                                probe.attributes.extend(map);
                            }
                        }
                        _ => {}
                    }
                }
                probes.push(probe);
            }
            probes
        }
        _ => Vec::new(),
    }
}

fn presence_probe(input: &str) -> Option<DomPattern> {
    let pattern = Pattern::parse(input);
    let selector = Selector::parse(&pattern.source).ok()?;
    Some(DomPattern {
        selector,
        exists: Some(Pattern {
            source: String::new(),
            regex: None,
            version: pattern.version,
            confidence: pattern.confidence,
        }),
        text: Vec::new(),
        attributes: Vec::new(),
    })
}

#[cfg(test)]
mod test {
    use anyhow::{anyhow, Error};
    use serde_json::json;

    use super::*;

    #[test]
    fn test_to_vec() {
        assert_eq!(to_vec(None, |_| Ok(())), vec![]);

        assert_eq!(to_vec(Some(json!(1)), |x| Ok(x.as_i64().unwrap())), vec![1]);

        assert_eq!(
            to_vec(Some(json!(1)), |_| Err::<(), Error>(anyhow!("anyhow"))),
            vec![],
        );

        assert_eq!(
            to_vec(Some(json!([1, 2, 3])), |x| Ok(x.as_i64().unwrap())),
            vec![1, 2, 3],
        );
    }

    #[test]
    fn pattern_fields_accept_all_three_shapes() {
        let doc = json!({
            "categories": {"1": {"name": "CMS", "priority": 1}},
            "technologies": {
                "Single": {"cats": [1], "website": "", "url": "example"},
                "List": {"cats": [1], "website": "", "url": ["one", "two"]},
                "Keyed": {
                    "cats": [1],
                    "website": "",
                    "headers": {"Server": "nginx", "X-Powered-By": ["a", "b"]}
                }
            }
        });
        let catalog = load_catalog(serde_json::to_vec(&doc).unwrap().as_slice()).unwrap();

        assert_eq!(catalog.techs["Single"].url.len(), 1);
        assert_eq!(catalog.techs["List"].url.len(), 2);

        let keyed = &catalog.techs["Keyed"];
        let server = keyed.headers.iter().find(|(k, _)| k == "server").unwrap();
        assert_eq!(server.1.len(), 1);
        let powered = keyed
            .headers
            .iter()
            .find(|(k, _)| k == "x-powered-by")
            .unwrap();
        assert_eq!(powered.1.len(), 2);
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let doc = json!({
            "categories": {},
            "technologies": {
                "Odd": {"website": "", "pricing": ["low"], "requires": "Thing", "probe": {"/x": ""}}
            }
        });
        let catalog = load_catalog(serde_json::to_vec(&doc).unwrap().as_slice()).unwrap();
        assert!(catalog.techs.contains_key("Odd"));
    }

    #[test]
    fn unresolved_category_is_fatal() {
        let doc = json!({
            "categories": {"1": {"name": "CMS", "priority": 1}},
            "technologies": {"Ghost": {"cats": [99], "website": ""}}
        });
        assert!(load_catalog(serde_json::to_vec(&doc).unwrap().as_slice()).is_err());
    }

    #[test]
    fn script_src_merges_into_scripts() {
        let doc = json!({
            "categories": {},
            "technologies": {
                "JQ": {"website": "", "scripts": "jquery", "scriptSrc": "jquery-ui"}
            }
        });
        let catalog = load_catalog(serde_json::to_vec(&doc).unwrap().as_slice()).unwrap();
        assert_eq!(catalog.techs["JQ"].scripts.len(), 2);
    }

    #[test]
    fn dns_keys_are_upper_cased() {
        let doc = json!({
            "categories": {},
            "technologies": {"T": {"website": "", "dns": {"mx": "example"}}}
        });
        let catalog = load_catalog(serde_json::to_vec(&doc).unwrap().as_slice()).unwrap();
        assert_eq!(catalog.techs["T"].dns[0].0, "MX");
    }

    #[test]
    fn implies_carry_tags() {
        let doc = json!({
            "categories": {},
            "technologies": {
                "WP": {"website": "", "implies": ["PHP\\;confidence:50", "MySQL"]}
            }
        });
        let catalog = load_catalog(serde_json::to_vec(&doc).unwrap().as_slice()).unwrap();
        let implies = &catalog.techs["WP"].implies;
        assert_eq!(implies[0].source, "PHP");
        assert_eq!(implies[0].confidence, 50);
        assert_eq!(implies[1].source, "MySQL");
        assert_eq!(implies[1].confidence, 100);
    }

    #[test]
    fn dom_shapes_parse() {
        let doc = json!({
            "categories": {},
            "technologies": {
                "A": {"website": "", "dom": "#wpadminbar"},
                "B": {"website": "", "dom": ["#a", "#b\\;confidence:40"]},
                "C": {"website": "", "dom": {
                    "meta[name=generator]": {
                        "attributes": {"content": "WordPress(?: ([\\d.]+))?\\;version:\\1"},
                        "text": "",
                        "exists": ""
                    }
                }}
            }
        });
        let catalog = load_catalog(serde_json::to_vec(&doc).unwrap().as_slice()).unwrap();

        assert_eq!(catalog.techs["A"].dom.len(), 1);
        assert!(catalog.techs["A"].dom[0].exists.is_some());

        assert_eq!(catalog.techs["B"].dom.len(), 2);
        assert_eq!(catalog.techs["B"].dom[1].exists.as_ref().unwrap().confidence, 40);

        let probe = &catalog.techs["C"].dom[0];
        assert!(probe.exists.is_some());
        assert_eq!(probe.attributes[0].0, "content");
    }

    #[test]
    fn bad_selector_is_skipped() {
        let doc = json!({
            "categories": {},
            "technologies": {"T": {"website": "", "dom": ":::not-a-selector"}}
        });
        let catalog = load_catalog(serde_json::to_vec(&doc).unwrap().as_slice()).unwrap();
        assert!(catalog.techs["T"].dom.is_empty());
    }

    #[test]
    fn malformed_document_is_an_error() {
        assert!(load_catalog(b"not json").is_err());
    }
}
