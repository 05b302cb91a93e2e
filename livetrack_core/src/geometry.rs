//! Geometry utilities - headings, distances and easing.
//!
//! Everything here is a pure function over WGS84 coordinates or screen
//! pixels. Great-circle math is delegated to the `geo` crate.

use geo::{HaversineBearing, HaversineDistance, Point};
use serde::{Deserialize, Serialize};

// ============================================================================
// COORDINATES
// ============================================================================

/// A WGS84 position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// True when both components are finite and inside WGS84 bounds.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }

    /// Component-wise linear interpolation, `t = 0` → `self`, `t = 1` → `to`.
    pub fn lerp(&self, to: LatLon, t: f64) -> LatLon {
        LatLon {
            lat: self.lat + (to.lat - self.lat) * t,
            lon: self.lon + (to.lon - self.lon) * t,
        }
    }

    /// True when both components differ by less than `epsilon_deg`.
    pub fn approx_eq(&self, other: LatLon, epsilon_deg: f64) -> bool {
        (self.lat - other.lat).abs() < epsilon_deg && (self.lon - other.lon).abs() < epsilon_deg
    }

    /// `geo` uses (x = lon, y = lat).
    fn to_point(self) -> Point<f64> {
        Point::new(self.lon, self.lat)
    }
}

impl std::fmt::Display for LatLon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lon)
    }
}

/// A position in screen pixels, as returned by the map projection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

impl ScreenPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance in pixels.
    pub fn distance_to(&self, other: ScreenPoint) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

// ============================================================================
// HEADING
// ============================================================================

/// Direction of travel.
///
/// The feed encodes "no bearing" as `0`; that convention is resolved once by
/// [`Heading::from_feed`] and nothing downstream ever looks at raw zeros.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum Heading {
    #[default]
    Unknown,
    /// Compass degrees in `[0, 360)`
    Degrees(f64),
}

impl Heading {
    /// Converts a feed bearing. Absent, non-finite and exactly-zero values
    /// are all `Unknown`.
    pub fn from_feed(raw: Option<f64>) -> Self {
        match raw {
            Some(deg) if deg.is_finite() && deg != 0.0 => Heading::Degrees(normalize_degrees(deg)),
            _ => Heading::Unknown,
        }
    }

    pub fn degrees(&self) -> Option<f64> {
        match self {
            Heading::Degrees(d) => Some(*d),
            Heading::Unknown => None,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Heading::Degrees(_))
    }
}

/// Wraps any finite angle into `[0, 360)`.
pub fn normalize_degrees(deg: f64) -> f64 {
    let wrapped = deg.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Great-circle initial bearing from `prev` to `cur`, in `[0, 360)`.
///
/// Only meaningful when the two points are distinct; callers gate on
/// [`distance_m`] first.
pub fn estimate_heading(prev: LatLon, cur: LatLon) -> f64 {
    normalize_degrees(prev.to_point().haversine_bearing(cur.to_point()))
}

/// Haversine distance in meters.
pub fn distance_m(a: LatLon, b: LatLon) -> f64 {
    a.to_point().haversine_distance(&b.to_point())
}

// ============================================================================
// EASING & TIMING
// ============================================================================

/// Standard cubic ease-in-out. Input is clamped to `[0, 1]`.
pub fn ease_in_out_cubic(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        let f = -2.0 * t + 2.0;
        1.0 - f * f * f / 2.0
    }
}

/// Maps an on-screen travel distance to a tween length in milliseconds.
///
/// Linear in `pixel_distance`, clamped to `[min_ms, max_ms]` so that an
/// almost stationary vehicle settles quickly and a long jump still animates.
pub fn animation_duration_ms(pixel_distance: f64, ms_per_pixel: f64, min_ms: f64, max_ms: f64) -> f64 {
    let raw = if pixel_distance.is_finite() {
        pixel_distance.max(0.0) * ms_per_pixel
    } else {
        max_ms
    };
    raw.clamp(min_ms, max_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_heading_zero_is_unknown() {
        assert_eq!(Heading::from_feed(Some(0.0)), Heading::Unknown);
        assert_eq!(Heading::from_feed(None), Heading::Unknown);
        assert_eq!(Heading::from_feed(Some(f64::NAN)), Heading::Unknown);
        assert_eq!(Heading::from_feed(Some(90.0)), Heading::Degrees(90.0));
    }

    #[test]
    fn test_heading_from_feed_normalizes() {
        assert_eq!(Heading::from_feed(Some(-90.0)), Heading::Degrees(270.0));
        assert_eq!(Heading::from_feed(Some(450.0)), Heading::Degrees(90.0));
    }

    #[test]
    fn test_estimate_heading_cardinal() {
        let origin = LatLon::new(55.60, 13.00);
        assert_relative_eq!(estimate_heading(origin, LatLon::new(55.61, 13.00)), 0.0, epsilon = 1e-6);
        assert_relative_eq!(estimate_heading(origin, LatLon::new(55.59, 13.00)), 180.0, epsilon = 1e-6);

        let east = estimate_heading(origin, LatLon::new(55.60, 13.01));
        assert!((east - 90.0).abs() < 0.1, "east bearing was {}", east);

        let west = estimate_heading(origin, LatLon::new(55.60, 12.99));
        assert!((west - 270.0).abs() < 0.1, "west bearing was {}", west);
    }

    #[test]
    fn test_estimate_heading_northeast() {
        // 0.001° lat ≈ 111 m north, 0.002° lon ≈ 126 m east at this latitude
        let heading = estimate_heading(LatLon::new(55.60, 13.00), LatLon::new(55.601, 13.002));
        assert!(heading > 40.0 && heading < 55.0, "heading was {}", heading);
    }

    #[test]
    fn test_distance_m() {
        let d = distance_m(LatLon::new(55.60, 13.00), LatLon::new(55.61, 13.00));
        assert_relative_eq!(d, 1112.0, epsilon = 5.0);
        assert_eq!(distance_m(LatLon::new(1.0, 1.0), LatLon::new(1.0, 1.0)), 0.0);
    }

    #[test]
    fn test_ease_in_out_cubic() {
        assert_eq!(ease_in_out_cubic(0.0), 0.0);
        assert_eq!(ease_in_out_cubic(1.0), 1.0);
        assert_relative_eq!(ease_in_out_cubic(0.5), 0.5);
        assert!(ease_in_out_cubic(0.25) < 0.25);
        assert!(ease_in_out_cubic(0.75) > 0.75);
        // Clamped outside the unit interval
        assert_eq!(ease_in_out_cubic(-1.0), 0.0);
        assert_eq!(ease_in_out_cubic(2.0), 1.0);
    }

    #[test]
    fn test_animation_duration_clamped() {
        assert_eq!(animation_duration_ms(0.0, 8.0, 300.0, 2500.0), 300.0);
        assert_eq!(animation_duration_ms(100.0, 8.0, 300.0, 2500.0), 800.0);
        assert_eq!(animation_duration_ms(10_000.0, 8.0, 300.0, 2500.0), 2500.0);
        assert_eq!(animation_duration_ms(f64::INFINITY, 8.0, 300.0, 2500.0), 2500.0);
    }

    #[test]
    fn test_lerp_and_validity() {
        let a = LatLon::new(0.0, 0.0);
        let b = LatLon::new(10.0, 20.0);
        assert_eq!(a.lerp(b, 0.5), LatLon::new(5.0, 10.0));
        assert!(a.is_valid());
        assert!(!LatLon::new(91.0, 0.0).is_valid());
        assert!(!LatLon::new(f64::NAN, 0.0).is_valid());
    }
}
