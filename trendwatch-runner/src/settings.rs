//! Detector settings file (TOML).
//!
//! ```toml
//! kind = "p95_duration"
//! min_data_points = 6
//! max_trends_per_project = 5
//! on_malformed_state = "reset"
//!
//! [short_moving_avg]
//! type = "exponential"
//! weight = 0.5
//!
//! [long_moving_avg]
//! type = "exponential"
//! weight = 0.1
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use trendwatch_core::{ConfigError, DetectorConfig, MovingAverageKind};

/// Errors from loading settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid detector config: {0}")]
    Detector(#[from] ConfigError),
    #[error("detector kind must not be empty")]
    EmptyKind,
}

/// What to do with a stored state that fails to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MalformedStatePolicy {
    /// Log a warning and start the entity over from the empty state.
    #[default]
    Reset,
    /// Abort the batch.
    Fail,
}

/// Everything needed to run one detector kind over a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorSettings {
    /// Detector kind; scopes storage keys so several metrics can share a store.
    #[serde(default = "default_kind")]
    pub kind: String,
    #[serde(default = "default_min_data_points")]
    pub min_data_points: u64,
    #[serde(default = "default_short_moving_avg")]
    pub short_moving_avg: MovingAverageKind,
    #[serde(default = "default_long_moving_avg")]
    pub long_moving_avg: MovingAverageKind,
    /// Per-project cap on reported regressions (and, separately, improvements).
    #[serde(default = "default_max_trends_per_project")]
    pub max_trends_per_project: usize,
    #[serde(default)]
    pub on_malformed_state: MalformedStatePolicy,
}

fn default_kind() -> String {
    "p95_duration".to_string()
}

fn default_min_data_points() -> u64 {
    6
}

fn default_short_moving_avg() -> MovingAverageKind {
    MovingAverageKind::Exponential { weight: 2.0 / 21.0 }
}

fn default_long_moving_avg() -> MovingAverageKind {
    MovingAverageKind::Exponential { weight: 2.0 / 41.0 }
}

fn default_max_trends_per_project() -> usize {
    5
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            kind: default_kind(),
            min_data_points: default_min_data_points(),
            short_moving_avg: default_short_moving_avg(),
            long_moving_avg: default_long_moving_avg(),
            max_trends_per_project: default_max_trends_per_project(),
            on_malformed_state: MalformedStatePolicy::default(),
        }
    }
}

impl DetectorSettings {
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Parse and validate. An invalid detector config is rejected here rather
    /// than on first use.
    pub fn from_toml_str(text: &str) -> Result<Self, SettingsError> {
        let settings: DetectorSettings = toml::from_str(text)?;
        if settings.kind.trim().is_empty() {
            return Err(SettingsError::EmptyKind);
        }
        settings.detector_config()?;
        Ok(settings)
    }

    pub fn detector_config(&self) -> Result<DetectorConfig, ConfigError> {
        DetectorConfig::from_kinds(
            self.min_data_points,
            self.short_moving_avg,
            self.long_moving_avg,
        )
    }

    /// Deterministic hash of the parameters that shape persisted state.
    ///
    /// Reporting limits and policies are excluded: changing them does not
    /// invalidate stored averages.
    pub fn fingerprint(&self) -> String {
        let canonical = serde_json::json!({
            "kind": self.kind,
            "min_data_points": self.min_data_points,
            "short_moving_avg": self.short_moving_avg,
            "long_moving_avg": self.long_moving_avg,
        });
        blake3::hash(canonical.to_string().as_bytes())
            .to_hex()
            .to_string()
    }
}
