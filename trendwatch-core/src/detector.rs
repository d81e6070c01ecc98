//! Moving average crossover trend detector.
//!
//! Feeds each payload into a short and a long moving average and compares the
//! pair before and after the update:
//!
//! - short crosses above long: `Regressed`
//! - short crosses below long: `Improved`
//! - anything else, or fewer than `min_data_points + 1` samples: `Unchanged`
//!
//! Payloads older than the last accepted one, and payloads with non-finite
//! values, are logged and skipped (`None`) without touching the state.

use chrono::{DateTime, Utc};

use crate::config::DetectorConfig;
use crate::domain::{DetectorPayload, TrendType};
use crate::moving_average::MovingAverage;
use crate::state::DetectorState;

/// A resumable, per-entity trend detector.
pub trait DetectorAlgorithm {
    type State;

    /// Fold one payload. `None` means the payload was rejected and nothing changed.
    fn update(&mut self, payload: &DetectorPayload) -> Option<TrendType>;

    /// Snapshot to persist after a batch of updates.
    fn state(&self) -> Self::State;
}

/// Where a detector is in its lifecycle. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorPhase {
    /// No payload accepted yet.
    Unseeded,
    /// Averages exist but are not trusted (`count <= min_data_points`).
    Accumulating,
    /// Crossovers are reported.
    Stabilized,
}

/// Dual moving average crossover detector.
///
/// Owns the two moving averages it builds from the config's factories. Not
/// meant to be shared across threads; build one per entity.
#[derive(Debug)]
pub struct CrossOverDetector {
    moving_avg_short: Box<dyn MovingAverage>,
    moving_avg_long: Box<dyn MovingAverage>,
    timestamp: Option<DateTime<Utc>>,
    count: u64,
    min_data_points: u64,
}

impl CrossOverDetector {
    /// Resume from `state`. Both averages are seeded with the same count since
    /// they have absorbed the same samples.
    pub fn new(state: &DetectorState, config: &DetectorConfig) -> Self {
        let mut moving_avg_short = config.new_short_moving_avg();
        moving_avg_short.set(state.moving_avg_short, state.count);

        let mut moving_avg_long = config.new_long_moving_avg();
        moving_avg_long.set(state.moving_avg_long, state.count);

        Self {
            moving_avg_short,
            moving_avg_long,
            timestamp: state.timestamp,
            count: state.count,
            min_data_points: config.min_data_points,
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    pub fn moving_avg_short(&self) -> f64 {
        self.moving_avg_short.value()
    }

    pub fn moving_avg_long(&self) -> f64 {
        self.moving_avg_long.value()
    }

    pub fn is_stabilized(&self) -> bool {
        self.count > self.min_data_points
    }

    pub fn phase(&self) -> DetectorPhase {
        if self.count == 0 && self.timestamp.is_none() {
            DetectorPhase::Unseeded
        } else if self.is_stabilized() {
            DetectorPhase::Stabilized
        } else {
            DetectorPhase::Accumulating
        }
    }
}

impl DetectorAlgorithm for CrossOverDetector {
    type State = DetectorState;

    fn update(&mut self, payload: &DetectorPayload) -> Option<TrendType> {
        if let Some(last) = self.timestamp {
            if payload.timestamp < last {
                tracing::warn!(
                    project_id = payload.project_id,
                    group = %payload.group,
                    payload_timestamp = %payload.timestamp.to_rfc3339(),
                    last_timestamp = %last.to_rfc3339(),
                    "trend detection out of order, skipping payload"
                );
                return None;
            }
        }

        if !payload.value.is_finite() {
            tracing::warn!(
                project_id = payload.project_id,
                group = %payload.group,
                value = payload.value,
                "non-finite payload value, skipping payload"
            );
            return None;
        }

        if self.count == u64::MAX {
            tracing::warn!(
                project_id = payload.project_id,
                group = %payload.group,
                "sample count saturated, skipping payload"
            );
            return None;
        }

        let old_short = self.moving_avg_short.value();
        let old_long = self.moving_avg_long.value();

        self.moving_avg_short.update(payload.value);
        self.moving_avg_long.update(payload.value);
        self.timestamp = Some(payload.timestamp);
        self.count += 1;

        // Early averages are noisy; only trust crossovers past the threshold.
        if !self.is_stabilized() {
            return Some(TrendType::Unchanged);
        }

        let new_short = self.moving_avg_short.value();
        let new_long = self.moving_avg_long.value();

        if new_short > new_long && old_short <= old_long {
            Some(TrendType::Regressed)
        } else if new_short < new_long && old_short >= old_long {
            Some(TrendType::Improved)
        } else {
            Some(TrendType::Unchanged)
        }
    }

    fn state(&self) -> DetectorState {
        DetectorState {
            timestamp: self.timestamp,
            count: self.count,
            moving_avg_short: self.moving_avg_short.value(),
            moving_avg_long: self.moving_avg_long.value(),
        }
    }
}
