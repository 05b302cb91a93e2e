//! The "REGISTRY" - authoritative map from vehicle identity to its visual.
//!
//! Every vehicle on screen has exactly one [`TrackedAgent`] here. The
//! registry owns the marker lifecycle (add, restyle, move, remove) and the
//! per-vehicle tween handle; the label state machine is notified by the
//! engine when a vehicle disappears.
//!
//! Heading resolution per sighting:
//! 1. Feed bearing, if known (the zero sentinel was resolved at ingestion)
//! 2. Derived from the last remembered raw fix, if the vehicle moved far
//!    enough. Fixes are remembered across removal and enrichment misses.
//! 3. The previously established heading, if any
//! 4. Unknown (drawn as a dot)

use crate::animator::{MotionAnimator, Tween};
use crate::enrichment::EnrichedAgentState;
use crate::geometry::{distance_m, estimate_heading, Heading, LatLon};
use crate::labels::LabelContent;
use crate::style::{style_for_category, IconSignature, MarkerIcon};
use crate::surface::RenderSurface;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

// ============================================================================
// TRACKED AGENT
// ============================================================================

/// Tracking state for one vehicle on screen.
#[derive(Debug, Clone)]
pub struct TrackedAgent {
    pub id: String,

    /// Most recent enriched sighting
    pub state: EnrichedAgentState,

    /// Where the marker currently is; lags `state.position` mid-tween
    pub displayed: LatLon,

    /// Last established heading (Unknown until first established)
    pub heading: Heading,

    /// Once true, never reverts
    pub heading_established: bool,

    /// Signature of the icon currently drawn
    pub icon: IconSignature,

    /// At most one in-flight tween; replacing it cancels the old one
    pub tween: Option<Tween>,
}

impl TrackedAgent {
    pub fn is_animating(&self) -> bool {
        self.tween.is_some()
    }

    pub fn label_content(&self) -> LabelContent {
        LabelContent::for_agent(&self.state)
    }

    fn marker_icon(&self) -> MarkerIcon {
        MarkerIcon::new(
            self.heading,
            style_for_category(&self.state.description),
            self.state.line.clone(),
        )
    }
}

/// What a single upsert did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpsertOutcome {
    /// First sighting of this identity
    pub created: bool,

    /// Icon was (re)drawn
    pub icon_rendered: bool,

    /// A tween is now in flight
    pub animating: bool,

    /// Label text differs from the previous sighting
    pub content_changed: bool,
}

/// Counters for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegistryStats {
    pub created: u64,
    pub removed: u64,
    pub icon_renders: u64,
    pub icon_renders_skipped: u64,
}

// ============================================================================
// REGISTRY
// ============================================================================

/// All tracked vehicles, keyed by identity.
#[derive(Debug, Clone)]
pub struct AgentRegistry {
    agents: HashMap<String, TrackedAgent>,

    /// Last validated raw position per identity. Outlives the agent, so a
    /// vehicle that drops out and reappears can derive its first heading.
    last_fixes: HashMap<String, LatLon>,

    /// Minimum travel (meters) before a heading is derived from two fixes
    min_heading_distance_m: f64,

    animator: MotionAnimator,

    stats: RegistryStats,
}

impl AgentRegistry {
    pub fn new(min_heading_distance_m: f64, animator: MotionAnimator) -> Self {
        Self {
            agents: HashMap::new(),
            last_fixes: HashMap::new(),
            min_heading_distance_m,
            animator,
            stats: RegistryStats::default(),
        }
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn get(&self, id: &str) -> Option<&TrackedAgent> {
        self.agents.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.agents.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn ids(&self) -> HashSet<String> {
        self.agents.keys().cloned().collect()
    }

    pub fn agents(&self) -> impl Iterator<Item = &TrackedAgent> {
        self.agents.values()
    }

    pub fn active_tweens(&self) -> usize {
        self.agents.values().filter(|a| a.is_animating()).count()
    }

    pub fn stats(&self) -> RegistryStats {
        self.stats
    }

    pub fn animator(&self) -> &MotionAnimator {
        &self.animator
    }

    /// Last raw position seen for `id`, tracked or not.
    pub fn last_fix(&self, id: &str) -> Option<LatLon> {
        self.last_fixes.get(id).copied()
    }

    /// Records a validated position for an identity that will not be
    /// upserted this poll (enrichment miss).
    pub fn remember_fix(&mut self, id: &str, position: LatLon) {
        self.last_fixes.insert(id.to_string(), position);
    }

    // ========================================================================
    // HEADING
    // ========================================================================

    /// Applies the heading preference order for one sighting.
    ///
    /// `previous` is the last remembered raw fix of the identity and its
    /// established heading (`Unknown` for a vehicle not on screen). `None`
    /// when the identity has never been seen.
    pub fn resolve_heading(
        &self,
        feed: Heading,
        previous: Option<(LatLon, Heading)>,
        reported: LatLon,
    ) -> Heading {
        if feed.is_known() {
            return feed;
        }
        match previous {
            Some((last_fix, _)) if distance_m(last_fix, reported) > self.min_heading_distance_m => {
                Heading::Degrees(estimate_heading(last_fix, reported))
            }
            Some((_, established)) => established,
            None => Heading::Unknown,
        }
    }

    // ========================================================================
    // LIFECYCLE
    // ========================================================================

    /// Creates or updates the vehicle in `state`.
    ///
    /// New vehicles appear at their reported position without animation.
    /// Known vehicles are restyled only when their icon signature changes,
    /// and always tween from the displayed to the reported position.
    /// `on_frame` receives every position the marker is moved to during
    /// this call (the snap position, if the move was negligible).
    pub fn upsert<S, F>(
        &mut self,
        state: EnrichedAgentState,
        now: Duration,
        surface: &mut S,
        mut on_frame: F,
    ) -> UpsertOutcome
    where
        S: RenderSurface,
        F: FnMut(&mut S, &str, LatLon),
    {
        let last_fix = self.last_fixes.insert(state.id.clone(), state.position);
        let established = self
            .agents
            .get(&state.id)
            .map_or(Heading::Unknown, |agent| agent.heading);
        let heading = self.resolve_heading(
            state.heading,
            last_fix.map(|fix| (fix, established)),
            state.position,
        );

        let Some(agent) = self.agents.get_mut(&state.id) else {
            return self.create(state, heading, surface);
        };

        let mut outcome = UpsertOutcome::default();
        let previous_content = agent.label_content();

        if heading.is_known() {
            agent.heading = heading;
            agent.heading_established = true;
        }
        let target = state.position;
        agent.state = state;
        outcome.content_changed = agent.label_content() != previous_content;

        let icon = agent.marker_icon();
        let signature = icon.signature();
        if signature != agent.icon {
            surface.set_marker_icon(&agent.id, &icon);
            agent.icon = signature;
            outcome.icon_rendered = true;
            self.stats.icon_renders += 1;
        } else {
            self.stats.icon_renders_skipped += 1;
        }

        let from = agent.displayed;
        let pixels = surface.project(from).distance_to(surface.project(target));
        let duration = self.animator.config().duration_for(pixels);

        let id = agent.id.clone();
        let displayed = &mut agent.displayed;
        outcome.animating = self.animator.animate(&mut agent.tween, from, target, duration, now, |pos| {
            *displayed = pos;
            surface.move_marker(&id, pos);
            on_frame(&mut *surface, &id, pos);
        });

        outcome
    }

    fn create<S: RenderSurface>(
        &mut self,
        state: EnrichedAgentState,
        heading: Heading,
        surface: &mut S,
    ) -> UpsertOutcome {
        let icon = MarkerIcon::new(
            heading,
            style_for_category(&state.description),
            state.line.clone(),
        );
        let agent = TrackedAgent {
            id: state.id.clone(),
            displayed: state.position,
            heading,
            heading_established: heading.is_known(),
            icon: icon.signature(),
            tween: None,
            state,
        };
        surface.add_marker(&agent.id, &icon, agent.displayed);

        self.stats.created += 1;
        self.stats.icon_renders += 1;
        self.agents.insert(agent.id.clone(), agent);

        UpsertOutcome {
            created: true,
            icon_rendered: true,
            animating: false,
            content_changed: false,
        }
    }

    /// Removes a vehicle, cancelling its tween and deleting its marker.
    pub fn remove<S: RenderSurface>(&mut self, id: &str, surface: &mut S) -> Option<TrackedAgent> {
        let mut agent = self.agents.remove(id)?;
        agent.tween = None;
        surface.remove_marker(id);
        self.stats.removed += 1;
        Some(agent)
    }

    /// Removes every vehicle whose identity is not in `present`.
    ///
    /// Returns the removed vehicles, ordered by identity.
    pub fn reconcile<S: RenderSurface>(
        &mut self,
        present: &HashSet<String>,
        surface: &mut S,
    ) -> Vec<TrackedAgent> {
        let mut stale: Vec<String> = self
            .agents
            .keys()
            .filter(|id| !present.contains(*id))
            .cloned()
            .collect();
        stale.sort();

        stale
            .iter()
            .filter_map(|id| self.remove(id, surface))
            .collect()
    }

    // ========================================================================
    // FRAMES
    // ========================================================================

    /// Advances every in-flight tween to `now`.
    ///
    /// Markers are moved and `on_frame` is invoked for each vehicle that
    /// moved. Returns the number of tweens still in flight.
    pub fn advance_frame<S, F>(&mut self, now: Duration, surface: &mut S, mut on_frame: F) -> usize
    where
        S: RenderSurface,
        F: FnMut(&mut S, &str, LatLon),
    {
        let mut in_flight = 0;
        for agent in self.agents.values_mut() {
            let id = &agent.id;
            let displayed = &mut agent.displayed;
            let moved = self.animator.step(&mut agent.tween, now, |pos| {
                *displayed = pos;
                surface.move_marker(id, pos);
                on_frame(&mut *surface, id, pos);
            });
            if moved.is_some() && agent.tween.is_some() {
                in_flight += 1;
            }
        }
        in_flight
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animator::AnimationConfig;
    use crate::style::IconShape;
    use crate::surface::{HeadlessSurface, RenderCall};

    fn registry() -> AgentRegistry {
        AgentRegistry::new(3.0, MotionAnimator::new(AnimationConfig::default()))
    }

    fn sighting(id: &str, lat: f64, lon: f64, heading: Heading) -> EnrichedAgentState {
        EnrichedAgentState {
            id: id.to_string(),
            position: LatLon::new(lat, lon),
            heading,
            speed: None,
            trip_id: "t1".into(),
            timestamp: None,
            line: "5".into(),
            headsign: "Centrum".into(),
            category: "700".into(),
            description: "Stadsbuss".into(),
        }
    }

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn noop(_: &mut HeadlessSurface, _: &str, _: LatLon) {}

    #[test]
    fn test_first_sighting_is_not_animated() {
        let mut reg = registry();
        let mut surface = HeadlessSurface::default();

        let outcome = reg.upsert(sighting("v1", 55.60, 13.00, Heading::Unknown), ms(0), &mut surface, noop);

        assert!(outcome.created);
        assert!(!outcome.animating);
        assert_eq!(surface.calls(), &[RenderCall::AddMarker("v1".into())]);
        assert_eq!(surface.marker("v1").unwrap().position, LatLon::new(55.60, 13.00));
        assert_eq!(surface.marker("v1").unwrap().icon.shape, IconShape::Dot);
    }

    #[test]
    fn test_feed_heading_used_on_creation() {
        let mut reg = registry();
        let mut surface = HeadlessSurface::default();
        reg.upsert(sighting("v1", 55.60, 13.00, Heading::Degrees(135.0)), ms(0), &mut surface, noop);

        let agent = reg.get("v1").unwrap();
        assert!(agent.heading_established);
        assert_eq!(
            surface.marker("v1").unwrap().icon.shape,
            IconShape::Arrow { rotation_deg: 135 }
        );
    }

    #[test]
    fn test_heading_derived_from_movement() {
        let mut reg = registry();
        let mut surface = HeadlessSurface::default();
        reg.upsert(sighting("v1", 55.60, 13.00, Heading::Unknown), ms(0), &mut surface, noop);
        let outcome = reg.upsert(sighting("v1", 55.601, 13.002, Heading::Unknown), ms(3000), &mut surface, noop);

        assert!(outcome.icon_rendered);
        assert!(outcome.animating);
        let agent = reg.get("v1").unwrap();
        assert!(agent.heading_established);
        let deg = agent.heading.degrees().unwrap();
        assert!(deg > 40.0 && deg < 55.0, "heading {}", deg);
    }

    #[test]
    fn test_heading_is_monotonic() {
        let mut reg = registry();
        let mut surface = HeadlessSurface::default();
        reg.upsert(sighting("v1", 55.60, 13.00, Heading::Degrees(270.0)), ms(0), &mut surface, noop);

        // Same position, no feed bearing: keep the established heading
        reg.upsert(sighting("v1", 55.60, 13.00, Heading::Unknown), ms(3000), &mut surface, noop);
        assert_eq!(reg.get("v1").unwrap().heading, Heading::Degrees(270.0));

        // Sub-threshold jitter: still keep it
        reg.upsert(sighting("v1", 55.600001, 13.00, Heading::Unknown), ms(6000), &mut surface, noop);
        assert_eq!(reg.get("v1").unwrap().heading, Heading::Degrees(270.0));
        assert!(reg.get("v1").unwrap().heading_established);
    }

    #[test]
    fn test_unchanged_signature_skips_render() {
        let mut reg = registry();
        let mut surface = HeadlessSurface::default();
        reg.upsert(sighting("v1", 55.60, 13.00, Heading::Degrees(90.0)), ms(0), &mut surface, noop);
        let outcome = reg.upsert(sighting("v1", 55.60, 13.001, Heading::Degrees(90.0)), ms(3000), &mut surface, noop);

        assert!(!outcome.icon_rendered);
        assert_eq!(surface.icon_renders("v1"), 1);
        assert_eq!(reg.stats().icon_renders_skipped, 1);

        let outcome = reg.upsert(sighting("v1", 55.60, 13.002, Heading::Degrees(180.0)), ms(6000), &mut surface, noop);
        assert!(outcome.icon_rendered);
        assert_eq!(surface.icon_renders("v1"), 2);
    }

    #[test]
    fn test_stationary_update_snaps_and_reports_frame() {
        let mut reg = registry();
        let mut surface = HeadlessSurface::default();
        reg.upsert(sighting("v1", 55.60, 13.00, Heading::Unknown), ms(0), &mut surface, noop);

        let mut frames = Vec::new();
        let outcome = reg.upsert(
            sighting("v1", 55.60, 13.00, Heading::Unknown),
            ms(3000),
            &mut surface,
            |_, id, pos| frames.push((id.to_string(), pos)),
        );

        assert!(!outcome.animating);
        assert_eq!(frames, vec![("v1".to_string(), LatLon::new(55.60, 13.00))]);
    }

    #[test]
    fn test_advance_frame_moves_marker_to_target() {
        let mut reg = registry();
        let mut surface = HeadlessSurface::default();
        reg.upsert(sighting("v1", 55.60, 13.00, Heading::Unknown), ms(0), &mut surface, noop);
        reg.upsert(sighting("v1", 55.601, 13.002, Heading::Unknown), ms(1000), &mut surface, noop);

        let tween = reg.get("v1").unwrap().tween.clone().unwrap();
        assert!(tween.duration >= ms(300) && tween.duration <= ms(2500));

        let in_flight = reg.advance_frame(ms(1000) + tween.duration / 2, &mut surface, noop);
        assert_eq!(in_flight, 1);
        let mid = surface.marker("v1").unwrap().position;
        assert!(mid.lat > 55.60 && mid.lat < 55.601);

        let in_flight = reg.advance_frame(ms(1000) + tween.duration, &mut surface, noop);
        assert_eq!(in_flight, 0);
        assert_eq!(surface.marker("v1").unwrap().position, LatLon::new(55.601, 13.002));
        assert_eq!(reg.get("v1").unwrap().displayed, LatLon::new(55.601, 13.002));
        assert_eq!(reg.active_tweens(), 0);
    }

    #[test]
    fn test_reconcile_removes_absent() {
        let mut reg = registry();
        let mut surface = HeadlessSurface::default();
        for id in ["a", "b", "c"] {
            reg.upsert(sighting(id, 55.60, 13.00, Heading::Unknown), ms(0), &mut surface, noop);
        }
        reg.upsert(sighting("b", 55.61, 13.00, Heading::Unknown), ms(1000), &mut surface, noop);
        assert!(reg.get("b").unwrap().is_animating());

        let present: HashSet<String> = ["a".to_string()].into_iter().collect();
        let removed = reg.reconcile(&present, &mut surface);

        let removed_ids: Vec<&str> = removed.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(removed_ids, vec!["b", "c"]);
        assert!(removed.iter().all(|a| a.tween.is_none()));
        assert_eq!(reg.ids(), present);
        assert_eq!(surface.marker_count(), 1);
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let mut reg = registry();
        let mut surface = HeadlessSurface::default();
        assert!(reg.remove("ghost", &mut surface).is_none());
        assert!(surface.calls().is_empty());
    }

    #[test]
    fn test_reappearing_vehicle_derives_heading_from_remembered_fix() {
        let mut reg = registry();
        let mut surface = HeadlessSurface::default();
        reg.upsert(sighting("v1", 55.60, 13.00, Heading::Unknown), ms(0), &mut surface, noop);
        reg.remove("v1", &mut surface);
        assert_eq!(reg.last_fix("v1"), Some(LatLon::new(55.60, 13.00)));

        let outcome = reg.upsert(sighting("v1", 55.601, 13.002, Heading::Unknown), ms(3000), &mut surface, noop);

        assert!(outcome.created);
        assert!(!outcome.animating);
        let agent = reg.get("v1").unwrap();
        assert!(agent.heading_established);
        let deg = agent.heading.degrees().unwrap();
        assert!(deg > 40.0 && deg < 55.0, "heading {}", deg);
        assert!(matches!(surface.marker("v1").unwrap().icon.shape, IconShape::Arrow { .. }));
    }

    #[test]
    fn test_remembered_fix_within_threshold_stays_unknown() {
        let mut reg = registry();
        let mut surface = HeadlessSurface::default();
        reg.remember_fix("v1", LatLon::new(55.60, 13.00));

        reg.upsert(sighting("v1", 55.600001, 13.00, Heading::Unknown), ms(0), &mut surface, noop);

        assert_eq!(reg.get("v1").unwrap().heading, Heading::Unknown);
        assert_eq!(surface.marker("v1").unwrap().icon.shape, IconShape::Dot);
    }
}
