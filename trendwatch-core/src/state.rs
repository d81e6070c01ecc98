//! DetectorState — the resumable snapshot persisted between detector runs.
//!
//! The persisted shape is a flat mapping with single-character keys:
//!
//! | Key | Value                                  | Present            |
//! |-----|----------------------------------------|--------------------|
//! | `T` | Unix seconds of the last sample        | only with a sample |
//! | `C` | samples folded into the averages       | always             |
//! | `S` | short moving average                   | always             |
//! | `L` | long moving average                    | always             |
//!
//! Values are decoded leniently (`"12"` and `12` are both a valid `C`) because
//! hash-based stores hand every field back as a string. Sub-second precision
//! of `T` is dropped on encode.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const FIELD_TIMESTAMP: &str = "T";
pub const FIELD_COUNT: &str = "C";
pub const FIELD_MOVING_AVG_SHORT: &str = "S";
pub const FIELD_MOVING_AVG_LONG: &str = "L";

/// Compact persisted form of a [`DetectorState`].
pub type StateMapping = BTreeMap<String, StateValue>;

/// A scalar as found in a state store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateValue {
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
}

impl fmt::Display for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateValue::Int(v) => write!(f, "{v}"),
            StateValue::UInt(v) => write!(f, "{v}"),
            StateValue::Float(v) => write!(f, "{v}"),
            StateValue::Text(v) => write!(f, "{v:?}"),
        }
    }
}

/// A persisted mapping that cannot be decoded into a [`DetectorState`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MalformedStateError {
    #[error("missing state field '{0}'")]
    MissingField(&'static str),
    #[error("invalid state field '{field}' = {value}: {reason}")]
    InvalidField {
        field: &'static str,
        value: String,
        reason: &'static str,
    },
}

impl MalformedStateError {
    fn invalid(field: &'static str, value: &StateValue, reason: &'static str) -> Self {
        MalformedStateError::InvalidField {
            field,
            value: value.to_string(),
            reason,
        }
    }
}

/// Snapshot of a crossover detector after its last accepted payload.
///
/// `count == 0` exactly when `timestamp` is `None` for states produced by a
/// detector. Never mutated once built; every update yields a new snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "StateMapping", try_from = "StateMapping")]
pub struct DetectorState {
    pub timestamp: Option<DateTime<Utc>>,
    pub count: u64,
    pub moving_avg_short: f64,
    pub moving_avg_long: f64,
}

impl Default for DetectorState {
    fn default() -> Self {
        Self::empty()
    }
}

impl DetectorState {
    /// The state of an entity that has never been seen.
    pub fn empty() -> Self {
        Self {
            timestamp: None,
            count: 0,
            moving_avg_short: 0.0,
            moving_avg_long: 0.0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0 && self.timestamp.is_none()
    }

    /// Encode into the compact `T/C/S/L` mapping. `T` is omitted, never null,
    /// when no payload has been processed.
    pub fn to_mapping(&self) -> StateMapping {
        let mut mapping = StateMapping::new();
        let count = match i64::try_from(self.count) {
            Ok(v) => StateValue::Int(v),
            Err(_) => StateValue::UInt(self.count),
        };
        mapping.insert(FIELD_COUNT.to_string(), count);
        mapping.insert(
            FIELD_MOVING_AVG_SHORT.to_string(),
            StateValue::Float(self.moving_avg_short),
        );
        mapping.insert(
            FIELD_MOVING_AVG_LONG.to_string(),
            StateValue::Float(self.moving_avg_long),
        );
        if let Some(ts) = self.timestamp {
            mapping.insert(FIELD_TIMESTAMP.to_string(), StateValue::Int(ts.timestamp()));
        }
        mapping
    }

    /// Decode a mapping written by [`to_mapping`](Self::to_mapping) or by any
    /// store that returns the same fields as strings.
    pub fn from_mapping(mapping: &StateMapping) -> Result<Self, MalformedStateError> {
        let timestamp = mapping
            .get(FIELD_TIMESTAMP)
            .map(parse_timestamp)
            .transpose()?;
        let count = parse_count(required(mapping, FIELD_COUNT)?)?;
        let moving_avg_short =
            parse_float(FIELD_MOVING_AVG_SHORT, required(mapping, FIELD_MOVING_AVG_SHORT)?)?;
        let moving_avg_long =
            parse_float(FIELD_MOVING_AVG_LONG, required(mapping, FIELD_MOVING_AVG_LONG)?)?;

        Ok(Self {
            timestamp,
            count,
            moving_avg_short,
            moving_avg_long,
        })
    }
}

impl From<DetectorState> for StateMapping {
    fn from(state: DetectorState) -> Self {
        state.to_mapping()
    }
}

impl TryFrom<StateMapping> for DetectorState {
    type Error = MalformedStateError;

    fn try_from(mapping: StateMapping) -> Result<Self, Self::Error> {
        DetectorState::from_mapping(&mapping)
    }
}

// ─── Field decoding ──────────────────────────────────────────────────

fn required<'a>(
    mapping: &'a StateMapping,
    field: &'static str,
) -> Result<&'a StateValue, MalformedStateError> {
    mapping
        .get(field)
        .ok_or(MalformedStateError::MissingField(field))
}

fn parse_count(value: &StateValue) -> Result<u64, MalformedStateError> {
    match value {
        StateValue::Int(v) => u64::try_from(*v)
            .map_err(|_| MalformedStateError::invalid(FIELD_COUNT, value, "negative count")),
        StateValue::UInt(v) => Ok(*v),
        StateValue::Float(v) => {
            // 2^64 itself rounds to u64::MAX on cast, so the bound is exclusive.
            if v.is_finite() && v.fract() == 0.0 && *v >= 0.0 && *v < u64::MAX as f64 {
                Ok(*v as u64)
            } else {
                Err(MalformedStateError::invalid(
                    FIELD_COUNT,
                    value,
                    "not a non-negative integer",
                ))
            }
        }
        StateValue::Text(s) => s
            .trim()
            .parse::<u64>()
            .map_err(|_| MalformedStateError::invalid(FIELD_COUNT, value, "not an integer")),
    }
}

fn parse_float(field: &'static str, value: &StateValue) -> Result<f64, MalformedStateError> {
    let parsed = match value {
        StateValue::Int(v) => *v as f64,
        StateValue::UInt(v) => *v as f64,
        StateValue::Float(v) => *v,
        StateValue::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| MalformedStateError::invalid(field, value, "not a number"))?,
    };
    // A NaN or infinite average never recovers and cannot be written back as JSON.
    if !parsed.is_finite() {
        return Err(MalformedStateError::invalid(
            field,
            value,
            "not a finite number",
        ));
    }
    Ok(parsed)
}

fn parse_timestamp(value: &StateValue) -> Result<DateTime<Utc>, MalformedStateError> {
    let secs = match value {
        StateValue::Int(v) => *v,
        StateValue::UInt(v) => i64::try_from(*v).map_err(|_| {
            MalformedStateError::invalid(FIELD_TIMESTAMP, value, "out of range")
        })?,
        StateValue::Float(v) if v.is_finite() => v.trunc() as i64,
        StateValue::Float(_) => {
            return Err(MalformedStateError::invalid(
                FIELD_TIMESTAMP,
                value,
                "not a finite number",
            ))
        }
        StateValue::Text(s) => s.trim().parse::<i64>().map_err(|_| {
            MalformedStateError::invalid(FIELD_TIMESTAMP, value, "not an integer")
        })?,
    };
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| MalformedStateError::invalid(FIELD_TIMESTAMP, value, "out of range"))
}
