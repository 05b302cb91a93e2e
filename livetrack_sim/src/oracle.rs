//! Ground truth fleet for simulation.
//!
//! The Fleet maintains the "God's eye view" of the simulated network:
//! - True positions and bearings of every vehicle
//! - Simple kinematics (constant speed, occasional turns)
//! - Feed serialization, including the quirks a real feed exhibits

use livetrack_core::{LatLon, TripInfo, TripTable};
use rand::seq::SliceRandom;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashSet};

/// Meters per degree of latitude.
const METERS_PER_DEG: f64 = 111_320.0;

/// Lines served by the simulated network: (line, headsign, description).
const LINES: &[(&str, &str, &str)] = &[
    ("5", "Centrum", "Stadsbuss"),
    ("3", "Västra hamnen", "Stadsbuss"),
    ("171B", "Helsingborg", "Regionbuss"),
    ("1", "Lund C", "Pågatåg"),
    ("Öresund", "Köpenhamn", "Öresundståg"),
    ("Spårväg 1", "ESS", "Spårvagn"),
];

/// How a vehicle's record deviates from a clean feed entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedQuirk {
    /// Clean record with a true bearing
    None,
    /// Bearing always reported as the 0 sentinel
    ZeroBearing,
    /// Bearing field omitted
    NoBearing,
    /// Trip id the lookup does not know
    UnknownTrip,
    /// Identity field omitted
    NoId,
    /// Latitude is not a number
    BadCoordinates,
}

impl FeedQuirk {
    /// Whether a record with this quirk should end up on the map.
    pub fn renders(&self) -> bool {
        matches!(self, FeedQuirk::None | FeedQuirk::ZeroBearing | FeedQuirk::NoBearing)
    }
}

/// A ground truth vehicle in the simulation.
#[derive(Debug, Clone)]
pub struct SimVehicle {
    pub id: String,
    pub position: LatLon,
    /// True bearing, degrees clockwise from north
    pub bearing_deg: f64,
    pub speed_mps: f64,
    pub trip_id: String,
    pub quirk: FeedQuirk,
}

impl SimVehicle {
    /// The record as the feed would publish it.
    pub fn to_record(&self) -> Value {
        let mut record = Map::new();
        if self.quirk != FeedQuirk::NoId {
            record.insert("id".into(), json!(self.id));
        }
        if self.quirk == FeedQuirk::BadCoordinates {
            record.insert("lat".into(), json!("n/a"));
        } else {
            record.insert("lat".into(), json!(self.position.lat));
        }
        record.insert("lon".into(), json!(self.position.lon));
        match self.quirk {
            FeedQuirk::NoBearing => {}
            FeedQuirk::ZeroBearing => {
                record.insert("bearing".into(), json!(0));
            }
            _ => {
                record.insert("bearing".into(), json!(self.bearing_deg.round()));
            }
        }
        record.insert("speed".into(), json!(self.speed_mps));
        let trip = if self.quirk == FeedQuirk::UnknownTrip {
            format!("ghost-{}", self.trip_id)
        } else {
            self.trip_id.clone()
        };
        record.insert("tripId".into(), json!(trip));
        Value::Object(record)
    }
}

/// The Fleet - maintains ground truth and produces feed snapshots.
pub struct Fleet {
    /// RNG for motion and spawning
    rng: ChaCha8Rng,

    /// All active vehicles, ordered for deterministic iteration
    vehicles: BTreeMap<String, SimVehicle>,

    /// Next vehicle number
    next_id: u64,

    /// Current simulation time (seconds)
    current_time: f64,

    /// Spawn area center
    center: LatLon,

    /// Spawn area radius in degrees
    spread_deg: f64,
}

impl Fleet {
    /// Creates an empty fleet around Malmö.
    pub fn new(seed: u64) -> Self {
        Self::with_rng(ChaCha8Rng::seed_from_u64(seed))
    }

    pub fn with_rng(rng: ChaCha8Rng) -> Self {
        Self {
            rng,
            vehicles: BTreeMap::new(),
            next_id: 0,
            current_time: 0.0,
            center: LatLon::new(55.6050, 13.0038),
            spread_deg: 0.05,
        }
    }

    /// Trip table covering every line the fleet runs.
    pub fn trip_table() -> TripTable {
        let mut table = TripTable::new();
        for (n, (line, headsign, desc)) in LINES.iter().enumerate() {
            table.insert(
                Self::trip_id(n),
                TripInfo {
                    line: Some(line.to_string()),
                    headsign: Some(headsign.to_string()),
                    category: Some(format!("{}", 700 + n)),
                    desc: Some(desc.to_string()),
                },
            );
        }
        table
    }

    fn trip_id(line_index: usize) -> String {
        format!("trip-{}", line_index)
    }

    /// Spawns a vehicle with the given quirk and returns its identity.
    pub fn spawn(&mut self, quirk: FeedQuirk) -> String {
        let id = format!("veh-{:04}", self.next_id);
        self.next_id += 1;

        let line_index = self.rng.gen_range(0..LINES.len());
        let position = LatLon::new(
            self.center.lat + self.rng.gen_range(-self.spread_deg..self.spread_deg),
            self.center.lon + self.rng.gen_range(-self.spread_deg..self.spread_deg),
        );
        let vehicle = SimVehicle {
            id: id.clone(),
            position,
            bearing_deg: self.rng.gen_range(1.0..360.0),
            // Stationary at a stop now and then
            speed_mps: if self.rng.gen_bool(0.15) {
                0.0
            } else {
                self.rng.gen_range(4.0..20.0)
            },
            trip_id: Self::trip_id(line_index),
            quirk,
        };
        self.vehicles.insert(id.clone(), vehicle);
        id
    }

    /// Spawns `count` vehicles, assigning quirks in rotation.
    pub fn spawn_many(&mut self, count: usize, quirks: &[FeedQuirk]) -> Vec<String> {
        (0..count)
            .map(|i| {
                let quirk = if quirks.is_empty() {
                    FeedQuirk::None
                } else {
                    quirks[i % quirks.len()]
                };
                self.spawn(quirk)
            })
            .collect()
    }

    /// Removes a vehicle from service.
    pub fn retire(&mut self, id: &str) -> bool {
        self.vehicles.remove(id).is_some()
    }

    /// Retires a random `fraction` of the fleet. Returns the retired ids.
    pub fn retire_random(&mut self, fraction: f64) -> Vec<String> {
        let count = (self.vehicles.len() as f64 * fraction).round() as usize;
        let ids: Vec<String> = self.vehicles.keys().cloned().collect();
        let chosen: Vec<String> = ids.choose_multiple(&mut self.rng, count).cloned().collect();
        for id in &chosen {
            self.vehicles.remove(id);
        }
        chosen
    }

    /// Advances motion by `dt` seconds.
    pub fn step(&mut self, dt: f64) {
        self.current_time += dt;

        for vehicle in self.vehicles.values_mut() {
            if vehicle.speed_mps == 0.0 {
                continue;
            }
            if self.rng.gen_bool(0.1) {
                let turn = self.rng.gen_range(-45.0..45.0);
                vehicle.bearing_deg = (vehicle.bearing_deg + turn).rem_euclid(360.0);
            }
            let distance = vehicle.speed_mps * dt;
            let rad = vehicle.bearing_deg.to_radians();
            let dlat = distance * rad.cos() / METERS_PER_DEG;
            let dlon = distance * rad.sin() / (METERS_PER_DEG * vehicle.position.lat.to_radians().cos());
            vehicle.position = LatLon::new(vehicle.position.lat + dlat, vehicle.position.lon + dlon);
        }
    }

    /// Returns the current simulation time.
    pub fn time(&self) -> f64 {
        self.current_time
    }

    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }

    pub fn vehicle(&self, id: &str) -> Option<&SimVehicle> {
        self.vehicles.get(id)
    }

    pub fn vehicles(&self) -> impl Iterator<Item = &SimVehicle> {
        self.vehicles.values()
    }

    /// Identities that a correct engine renders for the current snapshot.
    pub fn expected_ids(&self) -> HashSet<String> {
        self.vehicles
            .values()
            .filter(|v| v.quirk.renders())
            .map(|v| v.id.clone())
            .collect()
    }

    /// Serializes the fleet as one feed response body.
    pub fn snapshot_json(&self) -> String {
        let records: Vec<Value> = self.vehicles.values().map(SimVehicle::to_record).collect();
        Value::Array(records).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use livetrack_core::{enrich, parse_snapshot, Enrichment};

    #[test]
    fn test_fleet_deterministic() {
        let mut a = Fleet::new(7);
        let mut b = Fleet::new(7);
        a.spawn_many(10, &[FeedQuirk::None]);
        b.spawn_many(10, &[FeedQuirk::None]);
        a.step(3.0);
        b.step(3.0);
        assert_eq!(a.snapshot_json(), b.snapshot_json());
    }

    #[test]
    fn test_motion_follows_bearing() {
        let mut fleet = Fleet::new(1);
        let id = fleet.spawn(FeedQuirk::None);
        let before = fleet.vehicle(&id).unwrap().clone();
        fleet.step(1.0);
        let after = fleet.vehicle(&id).unwrap();

        if before.speed_mps > 0.0 {
            assert_ne!(before.position, after.position);
        } else {
            assert_eq!(before.position, after.position);
        }
        assert_eq!(fleet.time(), 1.0);
    }

    #[test]
    fn test_quirks_match_expected_set() {
        let mut fleet = Fleet::new(3);
        fleet.spawn_many(
            12,
            &[
                FeedQuirk::None,
                FeedQuirk::ZeroBearing,
                FeedQuirk::NoBearing,
                FeedQuirk::UnknownTrip,
                FeedQuirk::NoId,
                FeedQuirk::BadCoordinates,
            ],
        );
        let trips = Fleet::trip_table();
        let snapshot = parse_snapshot(fleet.snapshot_json().as_bytes()).unwrap();

        let rendered: HashSet<String> = snapshot
            .records
            .iter()
            .filter_map(|raw| match enrich(raw, &trips) {
                Enrichment::Rendered(state) => Some(state.id),
                Enrichment::Skipped(_) => None,
            })
            .collect();

        assert_eq!(rendered, fleet.expected_ids());
        assert_eq!(rendered.len(), 6);
    }

    #[test]
    fn test_retire_random() {
        let mut fleet = Fleet::new(9);
        fleet.spawn_many(10, &[]);
        let retired = fleet.retire_random(0.3);
        assert_eq!(retired.len(), 3);
        assert_eq!(fleet.len(), 7);
        assert!(retired.iter().all(|id| fleet.vehicle(id).is_none()));
    }
}
