//! DetectorPayload — one observed sample for one entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single aggregated measurement for one `(project_id, group)` entity.
///
/// Only `timestamp` and `value` feed the detector. `project_id` and `group`
/// route the payload to its entity; `count` is the sample volume behind
/// `value` and weights trend scores downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorPayload {
    pub project_id: u64,
    pub group: String,
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    #[serde(default)]
    pub count: f64,
}

impl DetectorPayload {
    pub fn entity(&self) -> EntityKey {
        EntityKey {
            project_id: self.project_id,
            group: self.group.clone(),
        }
    }
}

/// Identifies one detector stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey {
    pub project_id: u64,
    pub group: String,
}

impl EntityKey {
    pub fn new(project_id: u64, group: impl Into<String>) -> Self {
        Self {
            project_id,
            group: group.into(),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.project_id, self.group)
    }
}
