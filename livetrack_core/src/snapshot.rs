//! Wire format of the live feed.
//!
//! The endpoint returns a JSON array of vehicle states. Real feeds are
//! sloppy: ids arrive as numbers or strings, coordinates occasionally as
//! numeric strings or `null`. Deserialization here is deliberately lenient
//! about representation and leaves the accept/reject decision to
//! [`crate::enrichment::enrich`].

use crate::geometry::{Heading, LatLon};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// One vehicle as reported by the feed. Lives for a single poll cycle.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawAgentState {
    /// Vehicle identity. Absent in degenerate feeds.
    #[serde(default, alias = "vehicleId", deserialize_with = "lenient_string")]
    pub id: Option<String>,

    #[serde(default, alias = "latitude", deserialize_with = "lenient_number")]
    pub lat: Option<f64>,

    #[serde(default, alias = "longitude", alias = "lng", deserialize_with = "lenient_number")]
    pub lon: Option<f64>,

    /// Compass degrees; `0` means "unknown" by feed convention
    #[serde(default, deserialize_with = "lenient_number")]
    pub bearing: Option<f64>,

    #[serde(default, deserialize_with = "lenient_number")]
    pub speed: Option<f64>,

    #[serde(default, rename = "tripId", alias = "trip_id", deserialize_with = "lenient_string")]
    pub trip_id: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub timestamp: Option<String>,
}

impl RawAgentState {
    /// Reported position, if both coordinates are usable.
    pub fn position(&self) -> Option<LatLon> {
        let pos = LatLon::new(self.lat?, self.lon?);
        pos.is_valid().then_some(pos)
    }

    /// Feed bearing with the zero sentinel resolved.
    pub fn heading(&self) -> Heading {
        Heading::from_feed(self.bearing)
    }

    /// Fills a missing id with the coordinate string `"lat,lon"`.
    ///
    /// Lossy: two vehicles reported at the same instantaneous position
    /// collapse into one identity. Only used when explicitly enabled.
    pub fn with_synthesized_id(mut self) -> Self {
        if self.id.is_none() {
            if let Some(pos) = self.position() {
                self.id = Some(format!("{},{}", pos.lat, pos.lon));
            }
        }
        self
    }
}

/// A parsed feed response.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// Entries that deserialized as objects
    pub records: Vec<RawAgentState>,

    /// Array entries that were not agent-shaped at all (strings, numbers...)
    pub malformed: usize,
}

/// Parses a feed body.
///
/// The body must be a JSON array; anything else fails the whole poll.
/// Individual entries that are not objects are counted and dropped.
pub fn parse_snapshot(body: &[u8]) -> Result<Snapshot, serde_json::Error> {
    let entries: Vec<Value> = serde_json::from_slice(body)?;
    let mut snapshot = Snapshot::default();

    for entry in entries {
        if !entry.is_object() {
            snapshot.malformed += 1;
            continue;
        }
        match serde_json::from_value::<RawAgentState>(entry) {
            Ok(record) => snapshot.records.push(record),
            Err(_) => snapshot.malformed += 1,
        }
    }

    Ok(snapshot)
}

fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let number = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(number.filter(|n| n.is_finite()))
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
