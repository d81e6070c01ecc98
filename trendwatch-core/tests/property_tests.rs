//! Property tests for detector invariants.
//!
//! Uses proptest to verify:
//! 1. Ordering guard: an older payload never changes the state
//! 2. Count monotonicity: count grows by exactly one per accepted payload
//! 3. Stabilization: no crossover is reported while count <= min_data_points
//! 4. Mapping round trip: second-precision states survive encode/decode
//! 5. Resume equivalence: splitting a stream at any point changes nothing
//! 6. Long average: the snapshot reports the long average, not the short one

use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;
use trendwatch_core::{
    CrossOverDetector, DetectorAlgorithm, DetectorConfig, DetectorPayload, DetectorState,
    MovingAverageKind, TrendType,
};

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_value() -> impl Strategy<Value = f64> {
    (0.0..10_000.0_f64).prop_map(|v| (v * 100.0).round() / 100.0)
}

fn arb_values() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(arb_value(), 1..60)
}

fn arb_kind_pair() -> impl Strategy<Value = (MovingAverageKind, MovingAverageKind)> {
    prop_oneof![
        (1..5_u64).prop_map(|w| (
            MovingAverageKind::Windowed { window: w },
            MovingAverageKind::Cumulative
        )),
        (1..5_u64, 6..30_u64).prop_map(|(s, l)| (
            MovingAverageKind::Windowed { window: s },
            MovingAverageKind::Windowed { window: l }
        )),
        (0.3..0.9_f64, 0.01..0.2_f64).prop_map(|(s, l)| (
            MovingAverageKind::Exponential { weight: s },
            MovingAverageKind::Exponential { weight: l }
        )),
    ]
}

fn arb_config() -> impl Strategy<Value = DetectorConfig> {
    (0..10_u64, arb_kind_pair()).prop_map(|(min, (short, long))| {
        DetectorConfig::from_kinds(min, short, long).expect("strategy yields valid configs")
    })
}

fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

fn payload(secs: i64, value: f64) -> DetectorPayload {
    DetectorPayload {
        project_id: 1,
        group: "g".into(),
        timestamp: ts(secs),
        value,
        count: 1.0,
    }
}

fn feed(detector: &mut CrossOverDetector, values: &[f64], start: i64) -> Vec<Option<TrendType>> {
    values
        .iter()
        .enumerate()
        .map(|(i, &v)| detector.update(&payload(start + i as i64 * 10, v)))
        .collect()
}

// ── 1. Ordering guard ────────────────────────────────────────────────

proptest! {
    #[test]
    fn older_payload_never_mutates(
        config in arb_config(),
        values in arb_values(),
        back in 1..1_000_i64,
        late_value in arb_value(),
    ) {
        let mut detector = CrossOverDetector::new(&DetectorState::empty(), &config);
        feed(&mut detector, &values, 0);
        let before = detector.state();
        let last = (values.len() as i64 - 1) * 10;

        prop_assert_eq!(detector.update(&payload(last - back, late_value)), None);
        prop_assert_eq!(detector.state(), before);
    }
}

// ── 2. Count monotonicity ────────────────────────────────────────────

proptest! {
    #[test]
    fn count_grows_by_accepted_updates(
        config in arb_config(),
        initial in 0..1_000_u64,
        values in arb_values(),
    ) {
        let state = DetectorState {
            timestamp: if initial == 0 { None } else { Some(ts(0)) },
            count: initial,
            moving_avg_short: 50.0,
            moving_avg_long: 50.0,
        };
        let mut detector = CrossOverDetector::new(&state, &config);
        let mut previous = initial;
        for (i, &v) in values.iter().enumerate() {
            prop_assert!(detector.update(&payload(i as i64, v)).is_some());
            prop_assert_eq!(detector.count(), previous + 1);
            previous = detector.count();
        }
        prop_assert_eq!(detector.state().count, initial + values.len() as u64);
    }
}

// ── 3. Stabilization ─────────────────────────────────────────────────

proptest! {
    #[test]
    fn no_signal_until_stabilized(config in arb_config(), values in arb_values()) {
        let mut detector = CrossOverDetector::new(&DetectorState::empty(), &config);
        let trends = feed(&mut detector, &values, 0);
        for (i, trend) in trends.iter().enumerate() {
            let count = i as u64 + 1;
            if count <= config.min_data_points {
                prop_assert_eq!(*trend, Some(TrendType::Unchanged));
            }
        }
    }

    #[test]
    fn constant_stream_never_signals(
        config in arb_config(),
        value in arb_value(),
        len in 1..50_usize,
    ) {
        let mut detector = CrossOverDetector::new(&DetectorState::empty(), &config);
        let trends = feed(&mut detector, &vec![value; len], 0);
        prop_assert!(trends.iter().all(|t| *t == Some(TrendType::Unchanged)));
    }
}

// ── 4. Mapping round trip ────────────────────────────────────────────

proptest! {
    #[test]
    fn mapping_round_trip(
        secs in prop::option::of(0..4_000_000_000_i64),
        count in any::<u64>(),
        short in -1e9..1e9_f64,
        long in -1e9..1e9_f64,
    ) {
        let state = DetectorState {
            timestamp: secs.map(|s| Utc.timestamp_opt(s, 0).unwrap()),
            count,
            moving_avg_short: short,
            moving_avg_long: long,
        };
        prop_assert_eq!(DetectorState::from_mapping(&state.to_mapping()).unwrap(), state);
    }
}

// ── 5. Resume equivalence ────────────────────────────────────────────

proptest! {
    #[test]
    fn split_stream_matches_uninterrupted(
        config in arb_config(),
        values in arb_values(),
        split in 0..60_usize,
    ) {
        let split = split.min(values.len());

        let mut whole = CrossOverDetector::new(&DetectorState::empty(), &config);
        let expected = feed(&mut whole, &values, 0);

        let mut head = CrossOverDetector::new(&DetectorState::empty(), &config);
        let mut trends = feed(&mut head, &values[..split], 0);
        let persisted = DetectorState::from_mapping(&head.state().to_mapping()).unwrap();
        let mut tail = CrossOverDetector::new(&persisted, &config);
        trends.extend(feed(&mut tail, &values[split..], split as i64 * 10));

        prop_assert_eq!(trends, expected);
        prop_assert_eq!(tail.state(), whole.state());
    }
}

// ── 6. Long average ──────────────────────────────────────────────────

proptest! {
    #[test]
    fn snapshot_reports_each_average(config in arb_config(), values in arb_values()) {
        let mut detector = CrossOverDetector::new(&DetectorState::empty(), &config);
        feed(&mut detector, &values, 0);
        let state = detector.state();
        prop_assert_eq!(state.moving_avg_short, detector.moving_avg_short());
        prop_assert_eq!(state.moving_avg_long, detector.moving_avg_long());
        prop_assert_eq!(detector.state(), state);
    }
}
