//! Scenario runner - executes chaos scenarios against the live tracker.
//!
//! Each scenario drives a real [`LiveTracker`] through its step API with a
//! virtual clock: publish a snapshot, poll, then play one poll period of
//! animation frames. After every poll and every frame the scene is checked
//! against the ground truth fleet.

use crate::context::{SimContext, FLEET_STREAM, POINTER_STREAM};
use crate::network::SimFeed;
use crate::oracle::{FeedQuirk, Fleet};
use crate::scenarios::ScenarioId;

use livetrack_core::{
    HeadlessSurface, LabelKind, LiveTracker, PointerEvent, PollReport, TrackerConfig, TripTable,
};
use livetrack_env::FeedController;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Violations kept per run; later ones are only counted.
const MAX_REPORTED_VIOLATIONS: usize = 16;

/// Results from running a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether scenario passed all assertions
    pub passed: bool,

    /// Poll cycles executed
    pub total_polls: u64,

    /// Final simulation time in seconds
    pub final_time_secs: f64,

    /// Vehicles tracked at the end
    pub final_vehicle_count: usize,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Metrics collected during run
    pub metrics: ScenarioMetrics,
}

/// Metrics collected during scenario execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScenarioMetrics {
    pub polls_ok: u64,
    pub polls_failed: u64,
    /// Poll attempts refused while the view was hidden
    pub polls_gated: u64,
    pub frames: u64,
    pub created: u64,
    pub removed: u64,
    pub skipped: u64,
    pub icon_renders: u64,
    pub icon_renders_skipped: u64,
    pub pointer_events: u64,
    pub invariant_checks: u64,
    pub violations: u64,
}

type SimTracker = LiveTracker<SimContext, SimFeed, TripTable, HeadlessSurface>;

/// Runs chaos scenarios.
pub struct ScenarioRunner {
    /// Configuration seed
    seed: u64,

    /// Fleet size at start
    num_vehicles: usize,

    /// Maximum duration in seconds
    max_duration_secs: f64,

    config: TrackerConfig,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64, num_vehicles: usize) -> Self {
        Self {
            seed,
            num_vehicles,
            max_duration_secs: 60.0,
            config: TrackerConfig::default(),
        }
    }

    /// Sets the maximum duration.
    pub fn with_duration(mut self, secs: f64) -> Self {
        self.max_duration_secs = secs;
        self
    }

    /// Replaces the tracker configuration.
    pub fn with_config(mut self, config: TrackerConfig) -> Self {
        self.config = config;
        self
    }

    fn cycles(&self) -> u64 {
        let period_secs = self.config.poll.period().as_secs_f64();
        ((self.max_duration_secs / period_secs).floor() as u64).max(1)
    }

    /// Runs a scenario and returns the result.
    pub async fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);
        debug!("  {}", scenario.description());

        let quirks: &[FeedQuirk] = match scenario {
            ScenarioId::SteadyState => &[
                FeedQuirk::None,
                FeedQuirk::None,
                FeedQuirk::None,
                FeedQuirk::None,
                FeedQuirk::UnknownTrip,
                FeedQuirk::NoId,
            ],
            ScenarioId::BearingDropout => &[FeedQuirk::ZeroBearing, FeedQuirk::NoBearing, FeedQuirk::None],
            ScenarioId::FeedOutage => &[FeedQuirk::None, FeedQuirk::BadCoordinates, FeedQuirk::None],
            _ => &[FeedQuirk::None, FeedQuirk::ZeroBearing, FeedQuirk::UnknownTrip],
        };

        let mut harness = Harness::new(self.seed, self.num_vehicles, quirks, self.config.clone());
        let mut storm_rng = harness.context.rng_stream(POINTER_STREAM);
        let cycles = self.cycles();

        for cycle in 0..cycles {
            if cycle > 0 {
                harness.fleet.step(self.config.poll.period().as_secs_f64());
            }

            match scenario {
                ScenarioId::SteadyState | ScenarioId::BearingDropout => {}
                ScenarioId::Churn => harness.churn(cycle, 0.3, quirks),
                ScenarioId::LabelStorm => harness.churn(cycle, 0.1, quirks),
                ScenarioId::FeedOutage => {
                    harness.inject_faults(cycle);
                    // Ground truth keeps changing under the outage
                    harness.churn(cycle, 0.1, quirks);
                }
                ScenarioId::HiddenTab => {
                    if harness.toggle_visibility(cycle) {
                        harness.poll().await;
                    }
                }
            }

            harness.poll().await;
            let storm = (scenario == ScenarioId::LabelStorm).then_some(&mut storm_rng);
            harness.animate_period(storm);

            debug!(
                "  t={:.1}s | fleet={} | tracked={} | tweens={}",
                harness.fleet.time(),
                harness.fleet.len(),
                harness.tracker.engine().registry().len(),
                harness.tracker.engine().stats().active_tweens,
            );
        }

        // Scenario-level assertions
        let m = harness.metrics.clone();
        match scenario {
            ScenarioId::SteadyState => {
                harness.require(m.removed == 0, "steady fleet lost vehicles".into());
                harness.require(m.skipped > 0, "unrenderable records were not skipped".into());
            }
            ScenarioId::BearingDropout => {
                harness.require(
                    !harness.established.is_empty() || cycles < 2,
                    "no heading was ever established".into(),
                );
            }
            ScenarioId::Churn => {
                harness.require(m.removed > 0 || cycles < 2, "churn removed nothing".into());
            }
            ScenarioId::FeedOutage => {
                harness.require(m.polls_failed > 0 || cycles < 6, "no poll failed during outage".into());
            }
            ScenarioId::HiddenTab => {
                harness.require(m.polls_gated > 0 || cycles < 3, "no poll was gated while hidden".into());
            }
            ScenarioId::LabelStorm => {
                harness.require(m.pointer_events > 0, "storm produced no pointer events".into());
            }
        }

        harness.finish(scenario, self.seed, cycles)
    }
}

// ============================================================================
// HARNESS
// ============================================================================

/// One scenario run: clock, fleet, feed and the tracker under test.
struct Harness {
    context: Arc<SimContext>,
    feed: Arc<SimFeed>,
    fleet: Fleet,
    tracker: SimTracker,
    metrics: ScenarioMetrics,
    violations: Vec<String>,

    /// Identities rendered by the last successful poll
    last_rendered: HashSet<String>,

    /// Vehicles whose heading has been established at least once
    established: HashSet<String>,
}

impl Harness {
    fn new(seed: u64, vehicles: usize, quirks: &[FeedQuirk], config: TrackerConfig) -> Self {
        let context = SimContext::shared(seed);
        let feed = Arc::new(SimFeed::new());
        let mut fleet = Fleet::with_rng(context.rng_stream(FLEET_STREAM));
        fleet.spawn_many(vehicles, quirks);

        let tracker = LiveTracker::new(
            Arc::clone(&context),
            Arc::clone(&feed),
            Arc::new(Fleet::trip_table()),
            HeadlessSurface::default(),
            config,
        );

        Self {
            context,
            feed,
            fleet,
            tracker,
            metrics: ScenarioMetrics::default(),
            violations: Vec::new(),
            last_rendered: HashSet::new(),
            established: HashSet::new(),
        }
    }

    fn require(&mut self, ok: bool, what: String) {
        self.metrics.invariant_checks += 1;
        if ok {
            return;
        }
        self.metrics.violations += 1;
        if self.violations.len() < MAX_REPORTED_VIOLATIONS {
            let at = self.context.now_secs();
            warn!("  ✗ t={:.2}s {}", at, what);
            self.violations.push(format!("t={:.2}s {}", at, what));
        }
    }

    // ========================================================================
    // SCENARIO ACTIONS
    // ========================================================================

    fn churn(&mut self, cycle: u64, fraction: f64, quirks: &[FeedQuirk]) {
        if cycle == 0 {
            return;
        }
        let retired = self.fleet.retire_random(fraction);
        self.fleet.spawn_many(retired.len(), quirks);
    }

    /// Outage, then 503, then an HTML body, then healthy again.
    fn inject_faults(&mut self, cycle: u64) {
        match cycle % 8 {
            2 => {
                info!("  ⚡ Feed outage");
                self.feed.set_outage(true);
            }
            4 => {
                self.feed.set_outage(false);
                self.feed.set_status_override(Some(503));
            }
            5 => {
                self.feed.set_status_override(None);
                self.feed.set_malformed(true);
            }
            6 => {
                info!("  ✓ Feed healed");
                self.feed.heal_all();
            }
            _ => {}
        }
    }

    /// Hides the view for two periods out of six. Returns `true` when the
    /// view just came back and an immediate poll is due.
    fn toggle_visibility(&mut self, cycle: u64) -> bool {
        match cycle % 6 {
            2 => {
                self.tracker.set_visible(false);
                false
            }
            4 => self.tracker.set_visible(true),
            _ => false,
        }
    }

    // ========================================================================
    // POLL + FRAMES
    // ========================================================================

    async fn poll(&mut self) -> Option<PollReport> {
        self.feed.publish(self.fleet.snapshot_json());
        let fetches_before = self.feed.fetches();
        let visible = self.tracker.gate().is_visible();
        let failed_before = self.tracker.stats().polls_failed;

        let report = self.tracker.poll_once().await;

        if !visible {
            self.metrics.polls_gated += 1;
            let fetched = self.feed.fetches() != fetches_before;
            self.require(!fetched, "fetched while hidden".into());
        }

        let tracked = self.tracker.engine().registry().ids();
        match &report {
            Some(report) => {
                self.metrics.polls_ok += 1;
                self.metrics.created += report.created as u64;
                self.metrics.removed += report.removed.len() as u64;
                self.metrics.skipped += report.skipped_total() as u64;

                let expected = self.fleet.expected_ids();
                let missing = expected.difference(&tracked).count();
                let stale = tracked.difference(&expected).count();
                self.require(
                    missing == 0 && stale == 0,
                    format!("registry diverged from feed ({} missing, {} stale)", missing, stale),
                );
                self.last_rendered = tracked;
            }
            None => {
                if self.tracker.stats().polls_failed > failed_before {
                    self.metrics.polls_failed += 1;
                }
                self.require(
                    tracked == self.last_rendered,
                    "tracked set changed without a successful poll".into(),
                );
            }
        }

        self.check_scene();
        report
    }

    /// Plays one poll period of frames, optionally with pointer noise.
    fn animate_period(&mut self, mut storm: Option<&mut ChaCha8Rng>) {
        let period = self.tracker.poll_config().period();
        let frame = self.tracker.engine().config().animation.frame_interval();
        let frames = (period.as_nanos() / frame.as_nanos()) as u32;

        for _ in 0..frames {
            self.context.advance_time(frame);
            if self.tracker.gate().is_visible() {
                self.tracker.frame();
                self.metrics.frames += 1;
            }
            if let Some(rng) = storm.as_deref_mut() {
                self.pointer_noise(rng);
            }
            self.check_labels_follow();
        }
        self.context.advance_time(period.saturating_sub(frame * frames));

        let animation = &self.tracker.engine().config().animation;
        if self.tracker.gate().is_visible() && animation.max_duration_ms < period.as_millis() as f64 {
            let in_flight = self.tracker.engine().stats().active_tweens;
            self.require(in_flight == 0, format!("{} tweens outlived their poll period", in_flight));
        }

        let stats = self.tracker.engine().stats().registry;
        self.metrics.icon_renders = stats.icon_renders;
        self.metrics.icon_renders_skipped = stats.icon_renders_skipped;
    }

    fn pointer_noise(&mut self, rng: &mut ChaCha8Rng) {
        if !rng.gen_bool(0.05) {
            return;
        }
        let mut ids: Vec<String> = self.tracker.engine().registry().ids().into_iter().collect();
        ids.sort();
        ids.push("ghost".to_string());
        let id = ids[rng.gen_range(0..ids.len())].clone();

        let event = match rng.gen_range(0..10) {
            0..=2 => PointerEvent::Enter(id),
            3..=4 => PointerEvent::Leave(id),
            5..=6 => PointerEvent::Click(id),
            7 => PointerEvent::ClickBackground,
            _ => PointerEvent::Move,
        };
        self.tracker.pointer(event);
        self.metrics.pointer_events += 1;
        self.check_scene();
    }

    // ========================================================================
    // INVARIANTS
    // ========================================================================

    /// Registry, surface and label state agree with each other.
    fn check_scene(&mut self) {
        let engine = self.tracker.engine();
        let registry = engine.registry();
        let surface = engine.surface();
        let labels = engine.labels();

        let mut problems = Vec::new();

        if surface.marker_count() != registry.len() {
            problems.push(format!(
                "{} markers for {} tracked vehicles",
                surface.marker_count(),
                registry.len()
            ));
        }
        if let Some(agent) = registry.agents().find(|a| surface.marker(&a.id).is_none()) {
            problems.push(format!("{} tracked without a marker", agent.id));
        }

        let hovered = labels.hovered();
        let pinned = labels.pinned();
        if hovered.is_some() && hovered == pinned {
            problems.push("hover and pin on the same vehicle".to_string());
        }
        for (kind, owner) in [(LabelKind::Hover, hovered), (LabelKind::Pinned, pinned)] {
            let shown = surface.label(kind).map(|l| l.owner.as_str());
            if shown != owner {
                problems.push(format!("{:?} label shows {:?}, state says {:?}", kind, shown, owner));
            }
            if let Some(owner) = owner {
                if !registry.contains(owner) {
                    problems.push(format!("{:?} label owned by untracked {}", kind, owner));
                }
            }
        }

        // Established headings never regress
        let mut regressed = Vec::new();
        for agent in registry.agents() {
            if agent.heading_established {
                self.established.insert(agent.id.clone());
            } else if self.established.contains(&agent.id) {
                regressed.push(agent.id.clone());
            }
        }
        self.established.retain(|id| registry.contains(id));
        for id in regressed {
            problems.push(format!("heading of {} regressed to unknown", id));
        }

        for problem in problems {
            self.require(false, problem);
        }
        self.metrics.invariant_checks += 1;
    }

    /// Every label sits exactly on its owner's marker.
    fn check_labels_follow(&mut self) {
        let surface = self.tracker.engine().surface();
        let mut drift = Vec::new();
        for kind in [LabelKind::Hover, LabelKind::Pinned] {
            if let Some(label) = surface.label(kind) {
                let on_marker = surface
                    .marker(&label.owner)
                    .map(|m| m.position == label.position)
                    .unwrap_or(false);
                if !on_marker {
                    drift.push(format!("{:?} label detached from {}", kind, label.owner));
                }
            }
        }
        for problem in drift {
            self.require(false, problem);
        }
    }

    fn finish(self, scenario: ScenarioId, seed: u64, cycles: u64) -> ScenarioResult {
        let passed = self.violations.is_empty();
        let metrics = self.metrics;

        if passed {
            info!(
                "✓ {} complete: {} polls ({} failed), {} frames, {} created, {} removed",
                scenario.name(),
                metrics.polls_ok + metrics.polls_failed,
                metrics.polls_failed,
                metrics.frames,
                metrics.created,
                metrics.removed
            );
        }

        ScenarioResult {
            scenario,
            seed,
            passed,
            total_polls: cycles,
            final_time_secs: self.context.now_secs(),
            final_vehicle_count: self.tracker.engine().registry().len(),
            failure_reason: if passed {
                None
            } else {
                Some(format!(
                    "{} violation(s): {}",
                    metrics.violations,
                    self.violations.join("; ")
                ))
            },
            metrics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn run(scenario: ScenarioId) -> ScenarioResult {
        ScenarioRunner::new(42, 20).with_duration(30.0).run(scenario).await
    }

    #[tokio::test]
    async fn test_steady_state_scenario() {
        let result = run(ScenarioId::SteadyState).await;
        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.total_polls, 10);
        assert!(result.metrics.frames > 0);
        assert!(result.metrics.icon_renders_skipped > 0);
    }

    #[tokio::test]
    async fn test_bearing_dropout_scenario() {
        let result = run(ScenarioId::BearingDropout).await;
        assert!(result.passed, "{:?}", result.failure_reason);
    }

    #[tokio::test]
    async fn test_churn_scenario() {
        let result = run(ScenarioId::Churn).await;
        assert!(result.passed, "{:?}", result.failure_reason);
        assert!(result.metrics.removed > 0);
        assert!(result.metrics.created > 20);
    }

    #[tokio::test]
    async fn test_feed_outage_scenario() {
        let result = run(ScenarioId::FeedOutage).await;
        assert!(result.passed, "{:?}", result.failure_reason);
        assert!(result.metrics.polls_failed >= 3);
    }

    #[tokio::test]
    async fn test_hidden_tab_scenario() {
        let result = run(ScenarioId::HiddenTab).await;
        assert!(result.passed, "{:?}", result.failure_reason);
        assert!(result.metrics.polls_gated > 0);
    }

    #[tokio::test]
    async fn test_label_storm_scenario() {
        let result = run(ScenarioId::LabelStorm).await;
        assert!(result.passed, "{:?}", result.failure_reason);
        assert!(result.metrics.pointer_events > 0);
    }

    #[tokio::test]
    async fn test_label_storm_deterministic() {
        let result1 = run(ScenarioId::LabelStorm).await;
        let result2 = run(ScenarioId::LabelStorm).await;
        assert_eq!(result1.metrics, result2.metrics);
    }
}
