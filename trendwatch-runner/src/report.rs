//! Trend events, scoring, and per-project limiting.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use trendwatch_core::{DetectorPayload, TrendType};

/// A crossover reported for one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendEvent {
    pub project_id: u64,
    pub group: String,
    pub trend: TrendType,
    pub score: f64,
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub moving_avg_short: f64,
    pub moving_avg_long: f64,
}

impl TrendEvent {
    pub fn new(
        payload: &DetectorPayload,
        trend: TrendType,
        moving_avg_short: f64,
        moving_avg_long: f64,
    ) -> Self {
        Self {
            project_id: payload.project_id,
            group: payload.group.clone(),
            trend,
            score: trend_score(moving_avg_short, moving_avg_long, payload.count),
            timestamp: payload.timestamp,
            value: payload.value,
            moving_avg_short,
            moving_avg_long,
        }
    }
}

/// Gap between the averages weighted by sample volume, so a small shift on a
/// busy endpoint outranks the same shift on a rarely hit one. A volume of zero
/// (unknown) counts as one.
pub fn trend_score(moving_avg_short: f64, moving_avg_long: f64, count: f64) -> f64 {
    let volume = if count > 0.0 { count } else { 1.0 };
    (moving_avg_short - moving_avg_long).abs() * volume
}

/// Keep at most `max_per_project` events per project, highest score first.
///
/// Output is ordered by project, then descending score; ties keep input order.
pub fn limit_per_project(events: Vec<TrendEvent>, max_per_project: usize) -> Vec<TrendEvent> {
    let mut by_project: HashMap<u64, Vec<TrendEvent>> = HashMap::new();
    for event in events {
        by_project.entry(event.project_id).or_default().push(event);
    }

    let mut projects: Vec<u64> = by_project.keys().copied().collect();
    projects.sort_unstable();

    let mut limited = Vec::new();
    for project_id in projects {
        if let Some(mut group) = by_project.remove(&project_id) {
            group.sort_by(|a, b| b.score.total_cmp(&a.score));
            group.truncate(max_per_project);
            limited.extend(group);
        }
    }
    limited
}

/// Write events as a pretty-printed JSON array.
pub fn write_report(path: &Path, events: &[TrendEvent]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(events)?;
    fs::write(path, json)
}
