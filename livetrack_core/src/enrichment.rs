//! Enrichment - joins a raw feed record with static trip metadata.
//!
//! Enrichment is a hard gate: a vehicle whose trip cannot be resolved to a
//! line designation is not drawn at all.

use crate::geometry::{Heading, LatLon};
use crate::snapshot::RawAgentState;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;
use thiserror::Error;

// ============================================================================
// TRIP LOOKUP
// ============================================================================

/// Static metadata for one trip.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TripInfo {
    /// Line designation as published ("5", "171B", " 3 x")
    #[serde(default)]
    pub line: Option<String>,

    /// Destination shown on the vehicle
    #[serde(default)]
    pub headsign: Option<String>,

    /// Category code
    #[serde(default, rename = "type")]
    pub category: Option<String>,

    /// Human-readable category ("Stadsbuss", "Pågatåg")
    #[serde(default)]
    pub desc: Option<String>,
}

/// Read-only mapping from trip identifier to metadata.
///
/// Missing keys are expected and mean "do not render".
pub trait TripLookup {
    fn lookup(&self, trip_id: &str) -> Option<&TripInfo>;
}

/// Errors loading a trip table.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("Failed to read trip table: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid trip table JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// In-memory trip table, loadable from a JSON object keyed by trip id.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct TripTable {
    trips: HashMap<String, TripInfo>,
}

impl TripTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(json: &str) -> Result<Self, LookupError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, LookupError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn insert(&mut self, trip_id: impl Into<String>, info: TripInfo) {
        self.trips.insert(trip_id.into(), info);
    }

    pub fn len(&self) -> usize {
        self.trips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trips.is_empty()
    }
}

impl TripLookup for TripTable {
    fn lookup(&self, trip_id: &str) -> Option<&TripInfo> {
        self.trips.get(trip_id)
    }
}

impl TripLookup for HashMap<String, TripInfo> {
    fn lookup(&self, trip_id: &str) -> Option<&TripInfo> {
        self.get(trip_id)
    }
}

// ============================================================================
// ENRICHED STATE
// ============================================================================

/// A feed record that passed validation and resolved to a line.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedAgentState {
    pub id: String,
    pub position: LatLon,
    /// Feed bearing, zero sentinel already resolved
    pub heading: Heading,
    pub speed: Option<f64>,
    pub trip_id: String,
    pub timestamp: Option<String>,

    /// Normalized line code ("5X")
    pub line: String,
    pub headsign: String,
    pub category: String,
    pub description: String,
}

/// Why a record was excluded from the render set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    MissingIdentity,
    InvalidCoordinates,
    MissingTrip,
    UnknownTrip,
    MissingLine,
}

impl SkipReason {
    /// Shape failures are rejected before any lookup happens.
    pub fn is_validation_failure(&self) -> bool {
        matches!(self, SkipReason::MissingIdentity | SkipReason::InvalidCoordinates)
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SkipReason::MissingIdentity => "missing identity",
            SkipReason::InvalidCoordinates => "invalid coordinates",
            SkipReason::MissingTrip => "missing trip id",
            SkipReason::UnknownTrip => "trip not in lookup",
            SkipReason::MissingLine => "lookup entry has no line",
        };
        f.write_str(s)
    }
}

/// Outcome of enriching one record.
#[derive(Debug, Clone, PartialEq)]
pub enum Enrichment {
    Rendered(EnrichedAgentState),
    Skipped(SkipReason),
}

/// Basic shape validation: identity present, coordinates numeric.
pub fn validate(raw: &RawAgentState) -> Result<(String, LatLon), SkipReason> {
    let id = raw.id.clone().ok_or(SkipReason::MissingIdentity)?;
    let position = raw.position().ok_or(SkipReason::InvalidCoordinates)?;
    Ok((id, position))
}

/// Joins a raw record with its trip metadata.
pub fn enrich<L: TripLookup + ?Sized>(raw: &RawAgentState, lookup: &L) -> Enrichment {
    let (id, position) = match validate(raw) {
        Ok(valid) => valid,
        Err(reason) => return Enrichment::Skipped(reason),
    };

    let Some(trip_id) = raw.trip_id.as_deref() else {
        return Enrichment::Skipped(SkipReason::MissingTrip);
    };
    let Some(info) = lookup.lookup(trip_id) else {
        return Enrichment::Skipped(SkipReason::UnknownTrip);
    };
    let Some(line) = info.line.as_deref().and_then(normalize_line) else {
        return Enrichment::Skipped(SkipReason::MissingLine);
    };

    Enrichment::Rendered(EnrichedAgentState {
        id,
        position,
        heading: raw.heading(),
        speed: raw.speed,
        trip_id: trip_id.to_string(),
        timestamp: raw.timestamp.clone(),
        line,
        headsign: info.headsign.clone().unwrap_or_default(),
        category: info.category.clone().unwrap_or_default(),
        description: info.desc.clone().unwrap_or_default(),
    })
}

fn line_token() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| Regex::new(r"\d+\p{L}*").expect("static regex"))
}

/// Normalizes a published line designation.
///
/// Whitespace is removed and the text uppercased, then the first
/// digits-followed-by-letters token is kept (`" 5 x "` → `5X`,
/// `"Linje 171b"` → `171B`). Designations with no digits keep their
/// stripped form; blank ones are `None`.
pub fn normalize_line(line: &str) -> Option<String> {
    let compact: String = line
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect();
    if compact.is_empty() {
        return None;
    }
    match line_token().find(&compact) {
        Some(token) => Some(token.as_str().to_string()),
        None => Some(compact),
    }
}
