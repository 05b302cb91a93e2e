//! Property tests for the tracking engine over random snapshot sequences.

use livetrack_core::{
    parse_snapshot, EngineConfig, HeadlessSurface, LabelKind, LatLon, PointerEvent, TrackingEngine,
};
use livetrack_sim::Fleet;
use proptest::prelude::*;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::time::Duration;

const POLL_MS: u64 = 3000;

/// One feed record: (vehicle, lat offset, lon offset, trip slot, bearing).
/// Trip slot 6 is not in the trip table.
type Record = (u8, i16, i16, u8, Option<u16>);

#[derive(Debug, Clone)]
enum Step {
    Poll(Vec<Record>),
    Pointer(u8, u8),
}

fn record() -> impl Strategy<Value = Record> {
    (0u8..8, -500i16..500, -500i16..500, 0u8..7, proptest::option::of(0u16..360))
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        3 => proptest::collection::vec(record(), 0..10).prop_map(Step::Poll),
        2 => (0u8..5, 0u8..9).prop_map(|(kind, vehicle)| Step::Pointer(kind, vehicle)),
    ]
}

fn vehicle_id(n: u8) -> String {
    format!("veh-{}", n)
}

fn body(records: &[Record]) -> String {
    let entries: Vec<Value> = records
        .iter()
        .map(|(vehicle, dlat, dlon, trip, bearing)| {
            let mut entry = json!({
                "id": vehicle_id(*vehicle),
                "lat": 55.6 + *dlat as f64 * 1e-5,
                "lon": 13.0 + *dlon as f64 * 1e-5,
                "tripId": format!("trip-{}", trip),
            });
            if let Some(bearing) = bearing {
                entry["bearing"] = json!(bearing);
            }
            entry
        })
        .collect();
    Value::Array(entries).to_string()
}

fn pointer(kind: u8, vehicle: u8) -> PointerEvent {
    let id = vehicle_id(vehicle);
    match kind {
        0 => PointerEvent::Enter(id),
        1 => PointerEvent::Leave(id),
        2 => PointerEvent::Click(id),
        3 => PointerEvent::ClickBackground,
        _ => PointerEvent::Move,
    }
}

fn assert_labels_consistent(engine: &TrackingEngine<HeadlessSurface>) -> Result<(), TestCaseError> {
    let labels = engine.labels();
    let surface = engine.surface();

    if let (Some(h), Some(p)) = (labels.hovered(), labels.pinned()) {
        prop_assert_ne!(h, p);
    }
    for (kind, owner) in [(LabelKind::Hover, labels.hovered()), (LabelKind::Pinned, labels.pinned())] {
        prop_assert_eq!(surface.label(kind).map(|l| l.owner.as_str()), owner);
        if let Some(owner) = owner {
            prop_assert!(engine.registry().contains(owner));
            let marker = surface.marker(owner).map(|m| m.position);
            prop_assert_eq!(marker, surface.label(kind).map(|l| l.position));
        }
    }
    Ok(())
}

proptest! {
    #[test]
    fn registry_always_matches_last_snapshot(steps in proptest::collection::vec(step(), 1..25)) {
        let trips = Fleet::trip_table();
        let mut engine = TrackingEngine::new(EngineConfig::default(), HeadlessSurface::default());
        let mut now = Duration::ZERO;

        for step in steps {
            match step {
                Step::Poll(records) => {
                    now += Duration::from_millis(POLL_MS);
                    let snapshot = parse_snapshot(body(&records).as_bytes()).unwrap();
                    engine.apply_snapshot(snapshot, &trips, now);

                    let expected: HashSet<String> = records
                        .iter()
                        .filter(|r| r.3 < 6)
                        .map(|r| vehicle_id(r.0))
                        .collect();
                    prop_assert_eq!(engine.registry().ids(), expected);
                    prop_assert_eq!(engine.surface().marker_count(), engine.registry().len());
                }
                Step::Pointer(kind, vehicle) => engine.handle_pointer(pointer(kind, vehicle)),
            }
            assert_labels_consistent(&engine)?;
        }
    }

    #[test]
    fn tweens_settle_on_reported_positions(steps in proptest::collection::vec(step(), 1..15)) {
        let trips = Fleet::trip_table();
        let mut engine = TrackingEngine::new(EngineConfig::default(), HeadlessSurface::default());
        let max = Duration::from_millis(engine.config().animation.max_duration_ms as u64);
        let mut now = Duration::ZERO;

        for step in steps {
            match step {
                Step::Poll(records) => {
                    now += Duration::from_millis(POLL_MS);
                    let snapshot = parse_snapshot(body(&records).as_bytes()).unwrap();
                    engine.apply_snapshot(snapshot, &trips, now);
                }
                Step::Pointer(kind, vehicle) => engine.handle_pointer(pointer(kind, vehicle)),
            }

            // Half-way frame, then one past the longest tween
            engine.advance_frame(now + max / 2);
            assert_labels_consistent(&engine)?;
            prop_assert_eq!(engine.advance_frame(now + max), 0);

            for agent in engine.registry().agents() {
                let target: LatLon = agent.state.position;
                prop_assert_eq!(agent.displayed, target);
                prop_assert_eq!(engine.surface().marker(&agent.id).map(|m| m.position), Some(target));
            }
            assert_labels_consistent(&engine)?;
        }
    }

    #[test]
    fn established_heading_never_regresses(
        fixes in proptest::collection::vec((-50i16..50, -50i16..50, proptest::option::of(0u16..360)), 1..20)
    ) {
        let trips = Fleet::trip_table();
        let mut engine = TrackingEngine::new(EngineConfig::default(), HeadlessSurface::default());
        let mut established = false;

        for (i, (dlat, dlon, bearing)) in fixes.into_iter().enumerate() {
            let now = Duration::from_millis(POLL_MS * (i as u64 + 1));
            let records = [(0u8, dlat, dlon, 0u8, bearing)];
            let snapshot = parse_snapshot(body(&records).as_bytes()).unwrap();
            engine.apply_snapshot(snapshot, &trips, now);

            let agent = engine.registry().get(&vehicle_id(0)).unwrap();
            if established {
                prop_assert!(agent.heading_established);
                prop_assert!(agent.heading.is_known());
            }
            established = agent.heading_established;
        }
    }
}
