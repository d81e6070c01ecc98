//! Integration tests for the crossover detector.
//!
//! Tests:
//! 1. The latest-vs-cumulative regression scenario end to end.
//! 2. Persist/resume through the compact mapping between every update.
//! 3. Independent entities sharing one config.
//! 4. Out-of-order payloads in the middle of a stream.

use chrono::{DateTime, TimeZone, Utc};
use trendwatch_core::{
    CrossOverDetector, DetectorAlgorithm, DetectorConfig, DetectorPayload, DetectorState,
    MovingAverageKind, TrendType,
};

// ──────────────────────────────────────────────
// Helpers
// ──────────────────────────────────────────────

fn ts(minute: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_704_153_600 + minute * 60, 0).unwrap()
}

fn payload(project_id: u64, group: &str, minute: i64, value: f64) -> DetectorPayload {
    DetectorPayload {
        project_id,
        group: group.to_string(),
        timestamp: ts(minute),
        value,
        count: 100.0,
    }
}

fn latest_vs_cumulative() -> DetectorConfig {
    DetectorConfig::from_kinds(
        2,
        MovingAverageKind::Windowed { window: 1 },
        MovingAverageKind::Cumulative,
    )
    .unwrap()
}

fn run(
    detector: &mut CrossOverDetector,
    project_id: u64,
    group: &str,
    values: &[f64],
) -> Vec<Option<TrendType>> {
    values
        .iter()
        .enumerate()
        .map(|(i, &v)| detector.update(&payload(project_id, group, i as i64, v)))
        .collect()
}

// ──────────────────────────────────────────────
// Scenarios
// ──────────────────────────────────────────────

#[test]
fn regression_scenario() {
    let config = latest_vs_cumulative();
    let mut detector = CrossOverDetector::new(&DetectorState::empty(), &config);

    let trends = run(&mut detector, 1, "/api/0/orders", &[10.0, 10.0, 10.0, 100.0, 100.0]);

    let regressed: Vec<usize> = trends
        .iter()
        .enumerate()
        .filter(|(_, t)| **t == Some(TrendType::Regressed))
        .map(|(i, _)| i)
        .collect();
    assert_eq!(regressed, vec![3]);
    assert!(trends
        .iter()
        .enumerate()
        .all(|(i, t)| i == 3 || *t == Some(TrendType::Unchanged)));

    let state = detector.state();
    assert_eq!(state.count, 5);
    assert_eq!(state.timestamp, Some(ts(4)));
}

#[test]
fn persist_between_every_update_matches_single_run() {
    let config = DetectorConfig::from_kinds(
        3,
        MovingAverageKind::Exponential { weight: 0.5 },
        MovingAverageKind::Exponential { weight: 0.1 },
    )
    .unwrap();
    let values = [5.0, 6.0, 5.5, 5.0, 9.0, 12.0, 11.0, 4.0, 3.0, 3.5, 3.0, 8.0];

    let mut uninterrupted = CrossOverDetector::new(&DetectorState::empty(), &config);
    let expected = run(&mut uninterrupted, 1, "g", &values);

    let mut mapping = DetectorState::empty().to_mapping();
    let mut resumed_trends = Vec::new();
    for (i, &v) in values.iter().enumerate() {
        let state = DetectorState::from_mapping(&mapping).unwrap();
        let mut detector = CrossOverDetector::new(&state, &config);
        resumed_trends.push(detector.update(&payload(1, "g", i as i64, v)));
        mapping = detector.state().to_mapping();
    }

    assert_eq!(resumed_trends, expected);
    assert_eq!(
        DetectorState::from_mapping(&mapping).unwrap(),
        uninterrupted.state()
    );
    assert!(expected.contains(&Some(TrendType::Regressed)));
    assert!(expected.contains(&Some(TrendType::Improved)));
}

#[test]
fn independent_entities_do_not_interfere() {
    let config = latest_vs_cumulative();
    let mut a = CrossOverDetector::new(&DetectorState::empty(), &config);
    let mut b = CrossOverDetector::new(&DetectorState::empty(), &config);

    run(&mut a, 1, "a", &[10.0, 10.0, 10.0, 100.0]);
    run(&mut b, 2, "b", &[50.0, 40.0]);

    let state_a = a.state();
    let state_b = b.state();
    assert_eq!(state_a.count, 4);
    assert_eq!(state_a.moving_avg_short, 100.0);
    assert_eq!(state_a.moving_avg_long, 32.5);
    assert_eq!(state_b.count, 2);
    assert_eq!(state_b.moving_avg_short, 40.0);
    assert_eq!(state_b.moving_avg_long, 45.0);

    let mut fresh = CrossOverDetector::new(&DetectorState::empty(), &config);
    assert_eq!(fresh.state(), DetectorState::empty());
    fresh.update(&payload(3, "c", 0, 1.0));
    assert_eq!(a.state(), state_a);
}

#[test]
fn late_payload_mid_stream_is_skipped() {
    let config = latest_vs_cumulative();
    let mut detector = CrossOverDetector::new(&DetectorState::empty(), &config);

    detector.update(&payload(1, "g", 0, 10.0));
    detector.update(&payload(1, "g", 5, 10.0));
    let before = detector.state();
    assert_eq!(detector.update(&payload(1, "g", 3, 1_000.0)), None);
    assert_eq!(detector.state(), before);

    // Retrying deterministically re-rejects.
    assert_eq!(detector.update(&payload(1, "g", 3, 1_000.0)), None);

    assert_eq!(
        detector.update(&payload(1, "g", 6, 10.0)),
        Some(TrendType::Unchanged)
    );
    assert_eq!(detector.state().count, 3);
}

#[test]
fn string_valued_store_resumes() {
    let config = latest_vs_cumulative();
    let mapping = [("T", "1704153720"), ("C", "3"), ("S", "10"), ("L", "10.0")]
        .iter()
        .map(|(k, v)| (k.to_string(), trendwatch_core::StateValue::Text(v.to_string())))
        .collect();
    let state = DetectorState::from_mapping(&mapping).unwrap();
    assert_eq!(state.timestamp, Some(ts(2)));

    let mut detector = CrossOverDetector::new(&state, &config);
    assert_eq!(
        detector.update(&payload(1, "g", 3, 100.0)),
        Some(TrendType::Regressed)
    );
}
