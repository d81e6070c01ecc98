//! Domain types for Trendwatch

pub mod payload;
pub mod trend;

pub use payload::{DetectorPayload, EntityKey};
pub use trend::TrendType;
