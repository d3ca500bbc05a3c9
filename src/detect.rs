use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, trace, warn};

use crate::evidence::Evidence;
use crate::pattern::Pattern;
use crate::scraper::Scraper;
use crate::tech::{CheckHit, Technology};

/// One detected technology, accumulated across matchers.
#[derive(Debug, Clone)]
pub struct Detection {
    pub name: String,
    pub version: String,
    pub categories: Vec<String>,
    pub confidence: i32,
    /// Carried for post-processing.
    pub(crate) implies: Vec<Pattern>,
    pub(crate) excludes: Vec<Pattern>,
}

/// The shared result of one analysis: at most one entry per technology
/// name. All mutation goes through [`add_app`](DetectionSet::add_app)
/// or the post-processing passes.
#[derive(Debug, Default)]
pub struct DetectionSet {
    entries: HashMap<String, Detection>,
}

impl DetectionSet {
    /// Record a hit. First writer inserts the full entry; later hits
    /// only fill an empty version and raise (never lower) confidence.
    /// Confidence is a maximum, not a sum.
    pub(crate) fn add_app(&mut self, tech: &Technology, hit: &CheckHit) {
        match self.entries.entry(tech.name.clone()) {
            Entry::Vacant(slot) => {
                trace!(technology = %tech.name, confidence = hit.confidence, "detected");
                slot.insert(Detection {
                    name: tech.name.clone(),
                    version: hit.version.clone(),
                    categories: tech.categories.clone(),
                    confidence: hit.confidence,
                    implies: tech.implies.clone(),
                    excludes: tech.excludes.clone(),
                });
            }
            Entry::Occupied(mut slot) => {
                let detection = slot.get_mut();
                if detection.version.is_empty() {
                    detection.version = hit.version.clone();
                }
                if hit.confidence > detection.confidence {
                    detection.confidence = hit.confidence;
                }
            }
        }
    }

    pub(crate) fn insert(&mut self, detection: Detection) {
        self.entries.insert(detection.name.clone(), detection);
    }

    pub(crate) fn remove(&mut self, name: &str) {
        self.entries.remove(name);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn detections(&self) -> impl Iterator<Item = &Detection> {
        self.entries.values()
    }

    pub(crate) fn into_detections(self) -> impl Iterator<Item = Detection> {
        self.entries.into_values()
    }
}

/// Fan out matching across the whole catalog, one task per technology,
/// and collect everything into one detection set. The join below is the
/// barrier between matching and post-processing.
pub(crate) async fn run_detection(
    techs: &HashMap<String, Arc<Technology>>,
    evidence: Arc<Evidence>,
    scraper: Arc<dyn Scraper>,
) -> DetectionSet {
    let set = Arc::new(Mutex::new(DetectionSet::default()));
    let render = scraper.can_render_page();

    debug!(technologies = techs.len(), render, "starting detection");

    let mut tasks = Vec::with_capacity(techs.len());
    for tech in techs.values() {
        let tech = Arc::clone(tech);
        let evidence = Arc::clone(&evidence);
        let scraper = Arc::clone(&scraper);
        let set = Arc::clone(&set);

        tasks.push(tokio::spawn(async move {
            let mut hits = Vec::new();

            if let Some(url) = evidence.primary_url() {
                hits.extend(tech.check_url(url));
            }
            hits.extend(tech.check_scripts(&evidence.scripts));
            hits.extend(tech.check_html(&evidence.html));
            hits.extend(tech.check_headers(&evidence.headers));
            hits.extend(tech.check_cookies(&evidence.cookies));
            hits.extend(tech.check_meta(&evidence.meta));
            hits.extend(tech.check_dns(&evidence.dns));
            if render {
                hits.extend(tech.check_dom(&evidence.html));
                hits.extend(tech.check_js(scraper.as_ref()).await);
            }

            if !hits.is_empty() {
                // Short critical section, never held across an await.
                let mut set = set.lock().unwrap_or_else(PoisonError::into_inner);
                for hit in &hits {
                    set.add_app(&tech, hit);
                }
            }
        }));
    }

    for result in futures::future::join_all(tasks).await {
        if let Err(err) = result {
            warn!(%err, "detection task failed");
        }
    }

    match Arc::try_unwrap(set) {
        Ok(mutex) => mutex.into_inner().unwrap_or_else(PoisonError::into_inner),
        // Unreachable once every task has been joined.
        Err(_) => DetectionSet::default(),
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;
    use crate::tech::load_catalog;

    fn tech(name: &str) -> Technology {
        let doc = json!({
            "categories": {"1": {"name": "CMS", "priority": 1}},
            "technologies": {name: {"cats": [1], "website": ""}}
        });
        let catalog = load_catalog(serde_json::to_vec(&doc).unwrap().as_slice()).unwrap();
        catalog.techs[name].as_ref().clone()
    }

    fn hit(confidence: i32, version: &str) -> CheckHit {
        CheckHit {
            confidence,
            version: version.to_string(),
        }
    }

    #[test]
    fn one_entry_per_technology() {
        let mut set = DetectionSet::default();
        let t = tech("Drupal");
        set.add_app(&t, &hit(50, ""));
        set.add_app(&t, &hit(100, ""));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn confidence_is_a_maximum() {
        let mut set = DetectionSet::default();
        let t = tech("Drupal");
        set.add_app(&t, &hit(50, ""));
        set.add_app(&t, &hit(100, ""));
        set.add_app(&t, &hit(30, ""));
        let detection = set.detections().next().unwrap();
        assert_eq!(detection.confidence, 100);
    }

    #[test]
    fn version_fills_only_when_empty() {
        let mut set = DetectionSet::default();
        let t = tech("nginx");
        set.add_app(&t, &hit(100, ""));
        set.add_app(&t, &hit(50, "1.18.0"));
        set.add_app(&t, &hit(50, "9.9.9"));
        let detection = set.detections().next().unwrap();
        assert_eq!(detection.version, "1.18.0");
        assert_eq!(detection.confidence, 100);
    }

    #[test]
    fn first_writer_keeps_categories() {
        let mut set = DetectionSet::default();
        let t = tech("WordPress");
        set.add_app(&t, &hit(100, ""));
        let detection = set.detections().next().unwrap();
        assert_eq!(detection.categories, vec!["CMS"]);
    }
}
