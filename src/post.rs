use std::collections::HashMap;
use std::sync::Arc;

use tracing::trace;

use crate::detect::{Detection, DetectionSet};
use crate::tech::Technology;

/// Remove every technology named by a detected technology's `excludes`
/// list. Runs over the pre-implies set, so an exclude can veto a
/// technology before its implies ever fire. Idempotent.
pub(crate) fn apply_excludes(set: &mut DetectionSet) {
    let excluded: Vec<String> = set
        .detections()
        .flat_map(|d| d.excludes.iter().map(|p| p.source.clone()))
        .collect();

    for name in excluded {
        trace!(technology = %name, "excluded");
        set.remove(&name);
    }
}

/// Expand the detection set with implied technologies, transitively.
/// The "not already detected" guard makes the closure visit each
/// technology at most once, so implies cycles terminate.
pub(crate) fn apply_implies(set: &mut DetectionSet, techs: &HashMap<String, Arc<Technology>>) {
    let mut pending: Vec<_> = set.detections().flat_map(|d| d.implies.clone()).collect();

    while let Some(pattern) = pending.pop() {
        let Some(tech) = techs.get(&pattern.source) else {
            continue;
        };
        if set.contains(&tech.name) {
            continue;
        }

        trace!(technology = %tech.name, "implied");
        set.insert(Detection {
            name: tech.name.clone(),
            version: pattern.version.clone(),
            categories: tech.categories.clone(),
            confidence: pattern.confidence,
            implies: tech.implies.clone(),
            excludes: tech.excludes.clone(),
        });
        pending.extend(tech.implies.iter().cloned());
    }
}
