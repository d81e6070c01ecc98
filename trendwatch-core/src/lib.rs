//! Trendwatch Core — streaming moving average crossover trend detection.
//!
//! This crate contains the detector and nothing around it:
//! - Incremental moving averages with exact resume from `(value, count)`
//! - Domain types (payloads, entity keys, trend classification)
//! - `DetectorState` and its compact `T/C/S/L` mapping codec
//! - `DetectorConfig` with short/long average factories
//! - `CrossOverDetector`, the stateful crossover decision engine
//!
//! No clocks, no I/O: every instant comes from payloads or persisted state.

pub mod config;
pub mod detector;
pub mod domain;
pub mod moving_average;
pub mod state;

pub use config::{ConfigError, DetectorConfig};
pub use detector::{CrossOverDetector, DetectorAlgorithm, DetectorPhase};
pub use domain::{DetectorPayload, EntityKey, TrendType};
pub use moving_average::{
    CumulativeMean, ExponentialMean, MovingAverage, MovingAverageFactory, MovingAverageKind,
    WindowedMean,
};
pub use state::{DetectorState, MalformedStateError, StateMapping, StateValue};
