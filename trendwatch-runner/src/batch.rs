//! Batch detection — one detector per entity, entities processed in parallel.
//!
//! For every entity in the batch:
//! 1. Decode its stored mapping (or start empty), applying the malformed-state policy
//! 2. Fold its payloads, in input order, into a `CrossOverDetector`
//! 3. Record regressions and improvements as `TrendEvent`s
//! 4. Encode the final state once, after the whole batch
//!
//! Entities share nothing but the immutable `DetectorConfig`.

use std::collections::HashMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use trendwatch_core::{
    ConfigError, CrossOverDetector, DetectorAlgorithm, DetectorConfig, DetectorPayload,
    DetectorState, EntityKey, MalformedStateError, StateMapping, TrendType,
};

use crate::report::{limit_per_project, TrendEvent};
use crate::settings::{DetectorSettings, MalformedStatePolicy};
use crate::store::{state_key, StateSnapshot};

/// Errors from running a batch.
#[derive(Debug, Error)]
pub enum DetectError {
    #[error("invalid detector config: {0}")]
    Config(#[from] ConfigError),
    #[error("malformed state for '{key}': {source}")]
    MalformedState {
        key: String,
        source: MalformedStateError,
    },
}

/// Counters for one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    pub entities: usize,
    pub payloads: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub states_reset: usize,
}

impl BatchStats {
    fn absorb(&mut self, other: &BatchStats) {
        self.entities += other.entities;
        self.payloads += other.payloads;
        self.accepted += other.accepted;
        self.rejected += other.rejected;
        self.states_reset += other.states_reset;
    }
}

/// Result of one batch: new states to persist plus the limited trend reports.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    /// Updated mapping per storage key, for every entity in the batch.
    pub states: Vec<(String, StateMapping)>,
    pub regressions: Vec<TrendEvent>,
    pub improvements: Vec<TrendEvent>,
    pub stats: BatchStats,
}

/// Per-entity work item.
struct EntityOutcome {
    key: String,
    state: DetectorState,
    events: Vec<TrendEvent>,
    stats: BatchStats,
}

/// Group payloads by entity, keeping entities in order of first appearance
/// and each entity's payloads in input order.
pub fn group_by_entity(payloads: Vec<DetectorPayload>) -> Vec<(EntityKey, Vec<DetectorPayload>)> {
    let mut index: HashMap<EntityKey, usize> = HashMap::new();
    let mut groups: Vec<(EntityKey, Vec<DetectorPayload>)> = Vec::new();
    for payload in payloads {
        let entity = payload.entity();
        match index.get(&entity) {
            Some(&i) => groups[i].1.push(payload),
            None => {
                index.insert(entity.clone(), groups.len());
                groups.push((entity, vec![payload]));
            }
        }
    }
    groups
}

/// Resolve the starting state for `key` under `policy`.
///
/// Returns the state and whether it was reset.
pub fn resolve_state(
    key: &str,
    mapping: Option<&StateMapping>,
    policy: MalformedStatePolicy,
) -> Result<(DetectorState, bool), DetectError> {
    let Some(mapping) = mapping else {
        return Ok((DetectorState::empty(), false));
    };
    match DetectorState::from_mapping(mapping) {
        Ok(state) => Ok((state, false)),
        Err(source) => match policy {
            MalformedStatePolicy::Fail => Err(DetectError::MalformedState {
                key: key.to_string(),
                source,
            }),
            MalformedStatePolicy::Reset => {
                tracing::warn!(key, error = %source, "malformed detector state, resetting to empty");
                Ok((DetectorState::empty(), true))
            }
        },
    }
}

fn detect_entity(
    key: String,
    payloads: &[DetectorPayload],
    mapping: Option<&StateMapping>,
    config: &DetectorConfig,
    policy: MalformedStatePolicy,
) -> Result<EntityOutcome, DetectError> {
    let (initial, reset) = resolve_state(&key, mapping, policy)?;
    let mut detector = CrossOverDetector::new(&initial, config);

    let mut stats = BatchStats {
        entities: 1,
        payloads: payloads.len(),
        states_reset: usize::from(reset),
        ..BatchStats::default()
    };
    let mut events = Vec::new();

    for payload in payloads {
        match detector.update(payload) {
            None => stats.rejected += 1,
            Some(trend) => {
                stats.accepted += 1;
                if trend != TrendType::Unchanged {
                    events.push(TrendEvent::new(
                        payload,
                        trend,
                        detector.moving_avg_short(),
                        detector.moving_avg_long(),
                    ));
                }
            }
        }
    }

    Ok(EntityOutcome {
        key,
        state: detector.state(),
        events,
        stats,
    })
}

/// Run one batch of payloads against the stored states in `snapshot`.
///
/// Payloads are not reordered: within an entity, one older than its
/// predecessor is rejected by the detector and counted in `stats.rejected`.
///
/// The snapshot is not modified; merge `outcome.states` into it to persist.
pub fn detect_batch(
    payloads: Vec<DetectorPayload>,
    snapshot: &StateSnapshot,
    settings: &DetectorSettings,
) -> Result<BatchOutcome, DetectError> {
    let config = settings.detector_config()?;
    let groups = group_by_entity(payloads);
    tracing::debug!(entities = groups.len(), kind = %settings.kind, "running trend detection");

    let outcomes: Vec<EntityOutcome> = groups
        .par_iter()
        .map(|(entity, entity_payloads)| {
            let key = state_key(&settings.kind, entity);
            let mapping = snapshot.get(&key);
            detect_entity(
                key,
                entity_payloads,
                mapping,
                &config,
                settings.on_malformed_state,
            )
        })
        .collect::<Result<_, _>>()?;

    let mut outcome = BatchOutcome::default();
    let mut regressions = Vec::new();
    let mut improvements = Vec::new();
    for entity in outcomes {
        outcome.stats.absorb(&entity.stats);
        for event in entity.events {
            match event.trend {
                TrendType::Regressed => regressions.push(event),
                TrendType::Improved => improvements.push(event),
                TrendType::Unchanged => {}
            }
        }
        outcome.states.push((entity.key, entity.state.to_mapping()));
    }

    outcome.regressions = limit_per_project(regressions, settings.max_trends_per_project);
    outcome.improvements = limit_per_project(improvements, settings.max_trends_per_project);

    tracing::info!(
        entities = outcome.stats.entities,
        payloads = outcome.stats.payloads,
        rejected = outcome.stats.rejected,
        states_reset = outcome.stats.states_reset,
        regressions = outcome.regressions.len(),
        improvements = outcome.improvements.len(),
        "trend detection finished"
    );

    Ok(outcome)
}
