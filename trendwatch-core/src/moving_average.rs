//! Incremental moving averages.
//!
//! Every variant folds samples with the same recurrence:
//!
//! ```text
//! n     = n + 1
//! value = value + weight(n) * (x - value)
//! ```
//!
//! and differs only in `weight(n)`. That keeps `update` O(1) in time and memory
//! and makes `set(value, count)` an exact resume point: the accumulator is fully
//! described by `(value, n)`.
//!
//! Non-finite samples follow IEEE semantics (NaN/Inf propagate). Callers that
//! need a guard apply it before folding; the crossover detector does.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// A running average that can be resumed from a persisted `(value, count)`.
pub trait MovingAverage: Send + fmt::Debug {
    /// Seed the accumulator as the average `value` of `count` prior samples.
    fn set(&mut self, value: f64, count: u64);

    /// Fold one sample into the average.
    fn update(&mut self, value: f64);

    /// Current average.
    fn value(&self) -> f64;

    /// Number of samples the accumulator represents.
    fn count(&self) -> u64;
}

// ─── Cumulative mean ─────────────────────────────────────────────────

/// Plain running mean of every sample seen: `weight(n) = 1 / n`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CumulativeMean {
    value: f64,
    n: u64,
}

impl CumulativeMean {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MovingAverage for CumulativeMean {
    fn set(&mut self, value: f64, count: u64) {
        self.value = value;
        self.n = count;
    }

    fn update(&mut self, value: f64) {
        self.n = self.n.saturating_add(1);
        self.value += (value - self.value) / self.n as f64;
    }

    fn value(&self) -> f64 {
        self.value
    }

    fn count(&self) -> u64 {
        self.n
    }
}

// ─── Windowed mean ───────────────────────────────────────────────────

/// Mean over roughly the last `window` samples: `weight(n) = 1 / min(n, window)`.
///
/// Exact while fewer than `window` samples have been seen. Past that point it
/// behaves like an exponential average with `alpha = 1 / window`, which is
/// what lets it resume from `(value, count)` without keeping the window's
/// samples around. `window = 1` tracks the latest sample exactly.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowedMean {
    window: u64,
    value: f64,
    n: u64,
}

impl WindowedMean {
    pub fn new(window: u64) -> Self {
        assert!(window >= 1, "window must be >= 1");
        Self {
            window,
            value: 0.0,
            n: 0,
        }
    }

    pub fn window(&self) -> u64 {
        self.window
    }
}

impl MovingAverage for WindowedMean {
    fn set(&mut self, value: f64, count: u64) {
        self.value = value;
        self.n = count;
    }

    fn update(&mut self, value: f64) {
        self.n = self.n.saturating_add(1);
        let divisor = self.n.min(self.window) as f64;
        self.value += (value - self.value) / divisor;
    }

    fn value(&self) -> f64 {
        self.value
    }

    fn count(&self) -> u64 {
        self.n
    }
}

// ─── Exponential mean ────────────────────────────────────────────────

/// Exponentially weighted average with a constant smoothing `weight`.
///
/// The first sample seeds the value directly so an empty accumulator does not
/// drag the average towards zero.
#[derive(Debug, Clone, PartialEq)]
pub struct ExponentialMean {
    weight: f64,
    value: f64,
    n: u64,
}

impl ExponentialMean {
    pub fn new(weight: f64) -> Self {
        assert!(
            weight > 0.0 && weight <= 1.0,
            "weight must be in (0, 1]"
        );
        Self {
            weight,
            value: 0.0,
            n: 0,
        }
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }
}

impl MovingAverage for ExponentialMean {
    fn set(&mut self, value: f64, count: u64) {
        self.value = value;
        self.n = count;
    }

    fn update(&mut self, value: f64) {
        self.n = self.n.saturating_add(1);
        if self.n == 1 {
            self.value = value;
        } else {
            self.value += self.weight * (value - self.value);
        }
    }

    fn value(&self) -> f64 {
        self.value
    }

    fn count(&self) -> u64 {
        self.n
    }
}

// ─── Factories ───────────────────────────────────────────────────────

/// Zero-argument constructor of fresh, independent moving averages.
///
/// Implemented by [`MovingAverageKind`] for configuration-driven selection and
/// by any `Fn() -> Box<dyn MovingAverage>` closure for custom strategies.
pub trait MovingAverageFactory: Send + Sync {
    fn create(&self) -> Box<dyn MovingAverage>;

    /// Effective memory length in samples, if known. `None` skips the
    /// short-vs-long ordering check in `DetectorConfig::new`.
    fn effective_memory(&self) -> Option<f64> {
        None
    }

    fn validate(&self) -> Result<(), ConfigError> {
        Ok(())
    }
}

impl<F> MovingAverageFactory for F
where
    F: Fn() -> Box<dyn MovingAverage> + Send + Sync,
{
    fn create(&self) -> Box<dyn MovingAverage> {
        self()
    }
}

/// Serializable moving average selector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MovingAverageKind {
    Cumulative,
    Windowed { window: u64 },
    Exponential { weight: f64 },
}

impl MovingAverageKind {
    pub fn name(&self) -> &'static str {
        match self {
            MovingAverageKind::Cumulative => "cumulative",
            MovingAverageKind::Windowed { .. } => "windowed",
            MovingAverageKind::Exponential { .. } => "exponential",
        }
    }
}

impl MovingAverageFactory for MovingAverageKind {
    fn create(&self) -> Box<dyn MovingAverage> {
        match *self {
            MovingAverageKind::Cumulative => Box::new(CumulativeMean::new()),
            MovingAverageKind::Windowed { window } => Box::new(WindowedMean::new(window)),
            MovingAverageKind::Exponential { weight } => Box::new(ExponentialMean::new(weight)),
        }
    }

    /// Exponential averages report their EMA span equivalent, `2 / weight - 1`.
    fn effective_memory(&self) -> Option<f64> {
        Some(match *self {
            MovingAverageKind::Cumulative => f64::INFINITY,
            MovingAverageKind::Windowed { window } => window as f64,
            MovingAverageKind::Exponential { weight } => 2.0 / weight - 1.0,
        })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            MovingAverageKind::Cumulative => Ok(()),
            MovingAverageKind::Windowed { window } if window == 0 => {
                Err(ConfigError::InvalidWindow(window))
            }
            MovingAverageKind::Windowed { .. } => Ok(()),
            MovingAverageKind::Exponential { weight } if !(weight > 0.0 && weight <= 1.0) => {
                Err(ConfigError::InvalidWeight(weight))
            }
            MovingAverageKind::Exponential { .. } => Ok(()),
        }
    }
}
