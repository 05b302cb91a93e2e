//! Marker styling - category colors and icon signatures.
//!
//! A vehicle's color comes from its human-readable category description
//! ("Stadsbuss", "Pågatåg", ...). Matching is case- and
//! diacritic-insensitive, first keyword wins.

use crate::geometry::Heading;
use serde::{Deserialize, Serialize};

// ============================================================================
// COLORS
// ============================================================================

/// An sRGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Scales every channel towards black by `fraction` (0.25 = 25% darker).
    pub fn darken(&self, fraction: f64) -> Self {
        let keep = (1.0 - fraction).clamp(0.0, 1.0);
        let scale = |c: u8| (c as f64 * keep).round() as u8;
        Self::new(scale(self.r), scale(self.g), scale(self.b))
    }
}

impl std::fmt::Display for Rgb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Fill and stroke for one marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MarkerStyle {
    pub fill: Rgb,
    pub stroke: Rgb,
}

/// Stroke is always this much darker than fill.
pub const STROKE_DARKEN: f64 = 0.25;

/// Color for descriptions that match no keyword.
pub const FALLBACK_FILL: Rgb = Rgb::new(0x7a, 0x7a, 0x7a);

/// Ordered keyword table. Keywords are stored already folded (lowercase, no
/// diacritics). Specific entries must precede the generic ones they contain
/// ("stadsbuss" before "buss", "pagatag" before "tag").
const CATEGORY_COLORS: &[(&str, Rgb)] = &[
    ("sparvagn", Rgb::new(0xe4, 0x00, 0x7c)),
    ("pagatag", Rgb::new(0x8a, 0x2b, 0x8f)),
    ("oresundstag", Rgb::new(0x6b, 0x7b, 0x88)),
    ("expressbuss", Rgb::new(0xe3, 0x06, 0x13)),
    ("regionbuss", Rgb::new(0xff, 0xd2, 0x00)),
    ("stadsbuss", Rgb::new(0x00, 0xa5, 0x4f)),
    ("farja", Rgb::new(0x00, 0x67, 0xa5)),
    ("tag", Rgb::new(0x00, 0x3f, 0x7d)),
    ("buss", Rgb::new(0x00, 0x89, 0xcf)),
];

/// Resolves the marker style for a category description.
pub fn style_for_category(description: &str) -> MarkerStyle {
    let folded = fold_diacritics(description);
    let fill = CATEGORY_COLORS
        .iter()
        .find(|(keyword, _)| folded.contains(keyword))
        .map(|(_, color)| *color)
        .unwrap_or(FALLBACK_FILL);

    MarkerStyle {
        fill,
        stroke: fill.darken(STROKE_DARKEN),
    }
}

/// Lowercases and strips the Latin diacritics that occur in Nordic and
/// Western European transit vocabulary.
pub fn fold_diacritics(text: &str) -> String {
    text.chars()
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'å' | 'ä' | 'à' | 'á' | 'â' | 'ã' => 'a',
            'ö' | 'ø' | 'ó' | 'ò' | 'ô' | 'õ' => 'o',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'ü' | 'ú' | 'ù' | 'û' => 'u',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'ç' => 'c',
            'ñ' => 'n',
            other => other,
        })
        .collect()
}

// ============================================================================
// ICONS
// ============================================================================

/// Marker shape: a plain dot until a heading is known, then a rotated arrow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IconShape {
    Dot,
    /// Rotation in whole compass degrees
    Arrow { rotation_deg: u16 },
}

impl IconShape {
    pub fn for_heading(heading: Heading) -> Self {
        match heading.degrees() {
            Some(deg) => IconShape::Arrow {
                rotation_deg: (deg.round() as u16) % 360,
            },
            None => IconShape::Dot,
        }
    }
}

/// Everything the surface needs to draw one marker.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerIcon {
    pub shape: IconShape,
    pub style: MarkerStyle,
    /// Line designation drawn inside the marker
    pub line: String,
}

impl MarkerIcon {
    pub fn new(heading: Heading, style: MarkerStyle, line: impl Into<String>) -> Self {
        Self {
            shape: IconShape::for_heading(heading),
            style,
            line: line.into(),
        }
    }

    /// Opaque key that changes whenever the rendered icon would change.
    pub fn signature(&self) -> IconSignature {
        let shape = match self.shape {
            IconShape::Dot => "dot".to_string(),
            IconShape::Arrow { rotation_deg } => format!("arrow:{}", rotation_deg),
        };
        IconSignature(format!(
            "{}|{}|{}|{}",
            shape, self.style.fill, self.style.stroke, self.line
        ))
    }
}

/// Icon identity used to skip redundant re-renders.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IconSignature(String);

impl IconSignature {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_match_is_case_and_diacritic_insensitive() {
        let a = style_for_category("Pågatåg");
        let b = style_for_category("PAGATAG mot Helsingborg");
        assert_eq!(a, b);
        assert_eq!(a.fill, Rgb::new(0x8a, 0x2b, 0x8f));
    }

    #[test]
    fn test_first_match_wins() {
        // "Stadsbuss" also contains "buss"
        assert_eq!(style_for_category("Stadsbuss").fill, Rgb::new(0x00, 0xa5, 0x4f));
        assert_eq!(style_for_category("Buss").fill, Rgb::new(0x00, 0x89, 0xcf));
        // "Öresundståg" also contains "tag"
        assert_eq!(style_for_category("Öresundståg").fill, Rgb::new(0x6b, 0x7b, 0x88));
    }

    #[test]
    fn test_fallback_color() {
        let style = style_for_category("Taxi");
        assert_eq!(style.fill, FALLBACK_FILL);
        assert_eq!(style.stroke, FALLBACK_FILL.darken(STROKE_DARKEN));
    }

    #[test]
    fn test_stroke_is_darkened_fill() {
        let style = style_for_category("Regionbuss");
        assert_eq!(style.fill, Rgb::new(0xff, 0xd2, 0x00));
        assert_eq!(style.stroke, Rgb::new(0xbf, 0x9e, 0x00));
    }

    #[test]
    fn test_rgb_displays_as_hex() {
        assert_eq!(Rgb::new(0x00, 0xa5, 0x4f).to_string(), "#00a54f");
        assert_eq!(FALLBACK_FILL.to_string(), "#7a7a7a");
    }

    #[test]
    fn test_icon_shape_from_heading() {
        assert_eq!(IconShape::for_heading(Heading::Unknown), IconShape::Dot);
        assert_eq!(
            IconShape::for_heading(Heading::Degrees(44.6)),
            IconShape::Arrow { rotation_deg: 45 }
        );
        assert_eq!(
            IconShape::for_heading(Heading::Degrees(359.7)),
            IconShape::Arrow { rotation_deg: 0 }
        );
    }

    #[test]
    fn test_signature_tracks_visual_changes() {
        let style = style_for_category("Stadsbuss");
        let a = MarkerIcon::new(Heading::Degrees(90.2), style, "5");
        let b = MarkerIcon::new(Heading::Degrees(89.9), style, "5");
        let c = MarkerIcon::new(Heading::Degrees(120.0), style, "5");
        let d = MarkerIcon::new(Heading::Degrees(90.0), style, "6");

        // Sub-degree jitter does not change the icon
        assert_eq!(a.signature(), b.signature());
        assert_ne!(a.signature(), c.signature());
        assert_ne!(a.signature(), d.signature());
    }
}
