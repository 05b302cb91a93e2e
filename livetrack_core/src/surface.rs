//! Rendering surface abstraction.
//!
//! The map widget (tiles, camera, projection) is an external collaborator.
//! The engine only issues the primitive calls below; it never reads back
//! what is on screen except through [`RenderSurface::project`].
//!
//! [`HeadlessSurface`] implements the trait without drawing anything. It
//! keeps the scene in memory and logs every call, which makes it the test
//! double for the engine and the backing surface of the simulator.

use crate::geometry::{LatLon, ScreenPoint};
use crate::labels::{LabelContent, LabelKind};
use crate::style::MarkerIcon;
use std::collections::HashMap;
use std::f64::consts::PI;

/// Primitives the engine needs from a map widget.
pub trait RenderSurface {
    /// Adds a marker for a vehicle that has no visual yet.
    fn add_marker(&mut self, id: &str, icon: &MarkerIcon, position: LatLon);

    /// Replaces the icon of an existing marker.
    fn set_marker_icon(&mut self, id: &str, icon: &MarkerIcon);

    /// Moves an existing marker. Called once per animation frame.
    fn move_marker(&mut self, id: &str, position: LatLon);

    fn remove_marker(&mut self, id: &str);

    /// Shows the label of the given kind, replacing any label of that kind.
    fn show_label(&mut self, kind: LabelKind, id: &str, content: &LabelContent, position: LatLon);

    fn move_label(&mut self, kind: LabelKind, position: LatLon);

    fn update_label(&mut self, kind: LabelKind, content: &LabelContent);

    fn remove_label(&mut self, kind: LabelKind);

    /// Turns the visible hover label into the pinned label in place.
    fn promote_hover_label(&mut self);

    /// Projects a coordinate to screen pixels at the current camera.
    fn project(&self, position: LatLon) -> ScreenPoint;
}

/// One primitive call, as recorded by [`HeadlessSurface`].
#[derive(Debug, Clone, PartialEq)]
pub enum RenderCall {
    AddMarker(String),
    SetMarkerIcon(String),
    MoveMarker(String),
    RemoveMarker(String),
    ShowLabel(LabelKind, String),
    MoveLabel(LabelKind),
    UpdateLabel(LabelKind),
    RemoveLabel(LabelKind),
    PromoteHoverLabel,
}

/// A marker as currently held by the headless scene.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneMarker {
    pub icon: MarkerIcon,
    pub position: LatLon,
}

/// A label as currently held by the headless scene.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneLabel {
    pub owner: String,
    pub content: LabelContent,
    pub position: LatLon,
}

/// In-memory surface with a Web Mercator projection.
#[derive(Debug, Clone)]
pub struct HeadlessSurface {
    /// Web Mercator zoom level used by `project`
    zoom: f64,

    markers: HashMap<String, SceneMarker>,
    labels: HashMap<LabelKind, SceneLabel>,
    calls: Vec<RenderCall>,
}

impl HeadlessSurface {
    pub fn new(zoom: f64) -> Self {
        Self {
            zoom,
            markers: HashMap::new(),
            labels: HashMap::new(),
            calls: Vec::new(),
        }
    }

    pub fn marker(&self, id: &str) -> Option<&SceneMarker> {
        self.markers.get(id)
    }

    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    pub fn label(&self, kind: LabelKind) -> Option<&SceneLabel> {
        self.labels.get(&kind)
    }

    pub fn label_count(&self) -> usize {
        self.labels.len()
    }

    pub fn calls(&self) -> &[RenderCall] {
        &self.calls
    }

    /// Number of recorded calls matching `pred`.
    pub fn count_calls(&self, pred: impl Fn(&RenderCall) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    /// Icon draws for one vehicle: the initial add plus every icon swap.
    pub fn icon_renders(&self, id: &str) -> usize {
        self.count_calls(|c| match c {
            RenderCall::AddMarker(m) | RenderCall::SetMarkerIcon(m) => m == id,
            _ => false,
        })
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }
}

impl Default for HeadlessSurface {
    fn default() -> Self {
        Self::new(14.0)
    }
}

impl RenderSurface for HeadlessSurface {
    fn add_marker(&mut self, id: &str, icon: &MarkerIcon, position: LatLon) {
        self.calls.push(RenderCall::AddMarker(id.to_string()));
        self.markers.insert(
            id.to_string(),
            SceneMarker {
                icon: icon.clone(),
                position,
            },
        );
    }

    fn set_marker_icon(&mut self, id: &str, icon: &MarkerIcon) {
        self.calls.push(RenderCall::SetMarkerIcon(id.to_string()));
        if let Some(marker) = self.markers.get_mut(id) {
            marker.icon = icon.clone();
        }
    }

    fn move_marker(&mut self, id: &str, position: LatLon) {
        self.calls.push(RenderCall::MoveMarker(id.to_string()));
        if let Some(marker) = self.markers.get_mut(id) {
            marker.position = position;
        }
    }

    fn remove_marker(&mut self, id: &str) {
        self.calls.push(RenderCall::RemoveMarker(id.to_string()));
        self.markers.remove(id);
    }

    fn show_label(&mut self, kind: LabelKind, id: &str, content: &LabelContent, position: LatLon) {
        self.calls.push(RenderCall::ShowLabel(kind, id.to_string()));
        self.labels.insert(
            kind,
            SceneLabel {
                owner: id.to_string(),
                content: content.clone(),
                position,
            },
        );
    }

    fn move_label(&mut self, kind: LabelKind, position: LatLon) {
        self.calls.push(RenderCall::MoveLabel(kind));
        if let Some(label) = self.labels.get_mut(&kind) {
            label.position = position;
        }
    }

    fn update_label(&mut self, kind: LabelKind, content: &LabelContent) {
        self.calls.push(RenderCall::UpdateLabel(kind));
        if let Some(label) = self.labels.get_mut(&kind) {
            label.content = content.clone();
        }
    }

    fn remove_label(&mut self, kind: LabelKind) {
        self.calls.push(RenderCall::RemoveLabel(kind));
        self.labels.remove(&kind);
    }

    fn promote_hover_label(&mut self) {
        self.calls.push(RenderCall::PromoteHoverLabel);
        if let Some(label) = self.labels.remove(&LabelKind::Hover) {
            self.labels.insert(LabelKind::Pinned, label);
        }
    }

    fn project(&self, position: LatLon) -> ScreenPoint {
        let world = 256.0 * 2f64.powf(self.zoom);
        let lat_rad = position.lat.to_radians();
        let x = (position.lon + 180.0) / 360.0 * world;
        let y = (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0 * world;
        ScreenPoint::new(x, y)
    }
}
