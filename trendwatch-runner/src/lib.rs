//! Trendwatch Runner — batch orchestration around the crossover detector.
//!
//! This crate builds on `trendwatch-core` to provide:
//! - TOML detector settings with a state fingerprint
//! - Payload ingestion from CSV and JSON Lines
//! - Per-entity batch detection, parallel across entities
//! - Trend scoring and per-project limiting
//! - A JSON state snapshot keyed by entity

pub mod batch;
pub mod input;
pub mod report;
pub mod settings;
pub mod store;

pub use batch::{detect_batch, group_by_entity, resolve_state, BatchOutcome, BatchStats, DetectError};
pub use input::{load_payloads, InputError, PayloadFormat};
pub use report::{limit_per_project, trend_score, write_report, TrendEvent};
pub use settings::{DetectorSettings, MalformedStatePolicy, SettingsError};
pub use store::{state_key, StateSnapshot, StoreError, SCHEMA_VERSION};
