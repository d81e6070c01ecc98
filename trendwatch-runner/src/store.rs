//! JSON state snapshot — the persisted `T/C/S/L` mapping of every entity.
//!
//! States are kept as raw mappings rather than decoded `DetectorState`s so a
//! single corrupt entry does not prevent loading the rest; decoding happens
//! per entity in the batch, under the configured malformed-state policy.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use trendwatch_core::{EntityKey, StateMapping};

/// Current schema version of the snapshot file.
pub const SCHEMA_VERSION: u32 = 1;

const KEY_PREFIX: &str = "trendwatch:v1";

/// Errors from reading or writing snapshots.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("state snapshot I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid state snapshot: {0}")]
    Json(#[from] serde_json::Error),
    #[error(
        "unsupported state snapshot schema version {found} (expected {expected})",
        expected = SCHEMA_VERSION
    )]
    UnsupportedSchema { found: u32 },
}

/// Storage key for one entity under one detector kind.
///
/// Group names can be arbitrarily long, so they are reduced to the first 16
/// hex chars of their BLAKE3 digest.
pub fn state_key(kind: &str, entity: &EntityKey) -> String {
    let digest = blake3::hash(entity.group.as_bytes()).to_hex();
    format!("{KEY_PREFIX}:{kind}:{}:{}", entity.project_id, &digest.as_str()[..16])
}

/// All persisted detector states for one detector kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    /// Fingerprint of the settings that produced these states.
    pub config_fingerprint: String,
    #[serde(default)]
    pub states: BTreeMap<String, StateMapping>,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl StateSnapshot {
    pub fn new(config_fingerprint: impl Into<String>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            config_fingerprint: config_fingerprint.into(),
            states: BTreeMap::new(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let text = fs::read_to_string(path)?;
        let snapshot: StateSnapshot = serde_json::from_str(&text)?;
        if snapshot.schema_version != SCHEMA_VERSION {
            return Err(StoreError::UnsupportedSchema {
                found: snapshot.schema_version,
            });
        }
        Ok(snapshot)
    }

    /// Load `path`, or start empty when it does not exist yet.
    ///
    /// A fingerprint different from `config_fingerprint` is only logged: the
    /// stored averages stay usable, they were just built with other settings.
    pub fn load_or_new(path: &Path, config_fingerprint: &str) -> Result<Self, StoreError> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "no state snapshot found, starting empty");
            return Ok(Self::new(config_fingerprint));
        }
        let snapshot = Self::load(path)?;
        if snapshot.config_fingerprint != config_fingerprint {
            tracing::warn!(
                path = %path.display(),
                stored = %snapshot.config_fingerprint,
                current = %config_fingerprint,
                "state snapshot was written with different detector settings"
            );
        }
        Ok(snapshot)
    }

    /// Write via a temporary sibling file and rename, so readers never see a
    /// half-written snapshot.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(self)?)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&StateMapping> {
        self.states.get(key)
    }

    /// Merge freshly produced states and stamp the snapshot with the settings
    /// that produced them.
    pub fn merge(
        &mut self,
        states: impl IntoIterator<Item = (String, StateMapping)>,
        config_fingerprint: &str,
    ) {
        self.states.extend(states);
        self.config_fingerprint = config_fingerprint.to_string();
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
