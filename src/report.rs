use serde::Serialize;

use crate::detect::DetectionSet;
use crate::evidence::{Evidence, UrlStatus};

/// One technology in the final report.
#[derive(Debug, Clone, Serialize)]
pub struct ReportedTech {
    pub name: String,
    pub confidence: i32,
    pub version: String,
    pub categories: Vec<String>,
}

/// The outcome of one analysis: the navigation chain and every
/// technology that survived post-processing. Ordering of the
/// technologies list is not guaranteed.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub urls: Vec<UrlStatus>,
    pub technologies: Vec<ReportedTech>,
}

impl Report {
    pub(crate) fn assemble(evidence: &Evidence, set: DetectionSet) -> Self {
        Self {
            urls: evidence.urls.clone(),
            technologies: set
                .into_detections()
                .map(|d| ReportedTech {
                    name: d.name,
                    confidence: d.confidence,
                    version: d.version,
                    categories: d.categories,
                })
                .collect(),
        }
    }

    /// Serialize for callers that asked for JSON output
    /// ([`Config::json`](crate::Config)).
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
