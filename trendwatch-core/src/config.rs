//! DetectorConfig — stabilization threshold plus short/long average factories.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::moving_average::{MovingAverage, MovingAverageFactory, MovingAverageKind};

/// Errors from building a detector configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("windowed moving average needs window >= 1, got {0}")]
    InvalidWindow(u64),
    #[error("exponential moving average needs weight in (0, 1], got {0}")]
    InvalidWeight(f64),
    #[error("short moving average memory ({short}) must be shorter than long ({long})")]
    ShortMemoryNotShorter { short: f64, long: f64 },
}

/// Immutable detector configuration.
///
/// Trend signals are suppressed while `count <= min_data_points`. The factories
/// are shared (`Arc`) so a single config can build detectors for many entities.
#[derive(Clone)]
pub struct DetectorConfig {
    pub min_data_points: u64,
    short_moving_avg_factory: Arc<dyn MovingAverageFactory>,
    long_moving_avg_factory: Arc<dyn MovingAverageFactory>,
}

impl DetectorConfig {
    /// Build a config, validating both factories and, when both report an
    /// effective memory, that the short side reacts faster than the long side.
    pub fn new(
        min_data_points: u64,
        short: impl MovingAverageFactory + 'static,
        long: impl MovingAverageFactory + 'static,
    ) -> Result<Self, ConfigError> {
        short.validate()?;
        long.validate()?;

        if let (Some(short_mem), Some(long_mem)) = (short.effective_memory(), long.effective_memory())
        {
            if short_mem.partial_cmp(&long_mem) != Some(Ordering::Less) {
                return Err(ConfigError::ShortMemoryNotShorter {
                    short: short_mem,
                    long: long_mem,
                });
            }
        }

        Ok(Self {
            min_data_points,
            short_moving_avg_factory: Arc::new(short),
            long_moving_avg_factory: Arc::new(long),
        })
    }

    /// Convenience for configuration-driven setups.
    pub fn from_kinds(
        min_data_points: u64,
        short: MovingAverageKind,
        long: MovingAverageKind,
    ) -> Result<Self, ConfigError> {
        Self::new(min_data_points, short, long)
    }

    pub fn new_short_moving_avg(&self) -> Box<dyn MovingAverage> {
        self.short_moving_avg_factory.create()
    }

    pub fn new_long_moving_avg(&self) -> Box<dyn MovingAverage> {
        self.long_moving_avg_factory.create()
    }
}

impl fmt::Debug for DetectorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DetectorConfig")
            .field("min_data_points", &self.min_data_points)
            .field(
                "short_memory",
                &self.short_moving_avg_factory.effective_memory(),
            )
            .field(
                "long_memory",
                &self.long_moving_avg_factory.effective_memory(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moving_average::WindowedMean;

    #[test]
    fn accepts_short_window_against_cumulative() {
        let config = DetectorConfig::from_kinds(
            2,
            MovingAverageKind::Windowed { window: 1 },
            MovingAverageKind::Cumulative,
        )
        .unwrap();
        assert_eq!(config.min_data_points, 2);
    }

    #[test]
    fn rejects_inverted_memory() {
        let err = DetectorConfig::from_kinds(
            2,
            MovingAverageKind::Exponential { weight: 0.1 },
            MovingAverageKind::Exponential { weight: 0.5 },
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::ShortMemoryNotShorter { .. }));
    }

    #[test]
    fn rejects_equal_memory() {
        let err = DetectorConfig::from_kinds(
            0,
            MovingAverageKind::Cumulative,
            MovingAverageKind::Cumulative,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::ShortMemoryNotShorter { .. }));
    }

    #[test]
    fn rejects_invalid_kind() {
        let err = DetectorConfig::from_kinds(
            0,
            MovingAverageKind::Windowed { window: 0 },
            MovingAverageKind::Cumulative,
        )
        .unwrap_err();
        assert_eq!(err, ConfigError::InvalidWindow(0));
    }

    #[test]
    fn closures_skip_memory_check() {
        let config = DetectorConfig::new(
            3,
            || -> Box<dyn MovingAverage> { Box::new(WindowedMean::new(10)) },
            MovingAverageKind::Windowed { window: 2 },
        );
        assert!(config.is_ok());
    }

    #[test]
    fn factories_produce_fresh_instances() {
        let config = DetectorConfig::from_kinds(
            0,
            MovingAverageKind::Windowed { window: 3 },
            MovingAverageKind::Cumulative,
        )
        .unwrap();
        let mut a = config.new_short_moving_avg();
        a.update(5.0);
        let b = config.new_short_moving_avg();
        assert_eq!(b.value(), 0.0);
        assert_eq!(b.count(), 0);
    }
}
