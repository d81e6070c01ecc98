//! Trend classification emitted by detectors.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of change detected for an entity's metric.
///
/// Labels assume a cost-like metric (latency, error rate): the short average
/// rising above the long one is a regression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendType {
    Regressed,
    Improved,
    Unchanged,
}

impl TrendType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendType::Regressed => "regressed",
            TrendType::Improved => "improved",
            TrendType::Unchanged => "unchanged",
        }
    }
}

impl fmt::Display for TrendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
