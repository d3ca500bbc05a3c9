use std::collections::HashMap;

use anyhow::{Context, Error};
use serde::Deserialize;

/// A technology category, e.g. "CMS" or "Web servers". The catalog keys
/// categories by stringified numeric IDs.
#[derive(Debug, Clone, Deserialize)]
pub struct Category {
    #[serde(skip_deserializing)]
    pub id: i32,
    pub name: String,
    #[serde(default)]
    pub priority: i32,
}

impl Category {
    pub(crate) fn from_raw(raw: HashMap<String, Category>) -> Result<HashMap<i32, Self>, Error> {
        let mut result = HashMap::with_capacity(raw.len());

        for (id, item) in raw {
            let id = id
                .parse::<i32>()
                .with_context(|| format!("Category {} should have an integer ID", item.name))?;
            result.insert(id, Self { id, ..item });
        }

        Ok(result)
    }
}
