//! The TrackingEngine - one owned context for everything on screen.
//!
//! Holds the registry, the label state machine and the render surface, and
//! wires them together:
//!
//! ```text
//! Snapshot ─► enrich ─► Registry.upsert ─► Animator ─► on_frame ─► labels follow
//!                              │
//!                              └─► reconcile ─► remove ─► labels force-hide
//! ```
//!
//! Every method runs to completion synchronously, so within one poll all
//! upserts finish before reconcile runs and no vehicle present in both the
//! old and new snapshot is ever transiently removed.

use crate::animator::{AnimationConfig, MotionAnimator};
use crate::enrichment::{enrich, EnrichedAgentState, Enrichment, SkipReason, TripLookup};
use crate::labels::{LabelEffect, LabelState};
use crate::registry::{AgentRegistry, RegistryStats, UpsertOutcome};
use crate::snapshot::Snapshot;
use crate::surface::RenderSurface;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::{debug, trace};

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Configuration for the TrackingEngine
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Minimum travel before a heading is derived from two fixes (default: 3 m)
    pub min_heading_distance_m: f64,

    /// Give id-less records a `"lat,lon"` identity instead of dropping them.
    /// Lossy: vehicles at the same instantaneous position collide.
    pub synthesize_missing_ids: bool,

    /// Tween timing
    pub animation: AnimationConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_heading_distance_m: 3.0,
            synthesize_missing_ids: false,
            animation: AnimationConfig::default(),
        }
    }
}

// ============================================================================
// POINTER EVENTS
// ============================================================================

/// Pointer input forwarded by the host map widget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PointerEvent {
    Enter(String),
    Leave(String),
    Click(String),
    ClickBackground,
    /// Generic movement anywhere on the map
    Move,
}

// ============================================================================
// REPORTS
// ============================================================================

/// What one applied snapshot changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PollReport {
    /// Distinct identities that passed enrichment
    pub rendered: usize,

    /// Vehicles seen for the first time
    pub created: usize,

    /// Records excluded, by reason
    pub skipped: HashMap<SkipReason, usize>,

    /// Array entries that were not objects
    pub malformed: usize,

    /// Identities removed by reconcile, ordered
    pub removed: Vec<String>,
}

impl PollReport {
    pub fn skipped_total(&self) -> usize {
        self.skipped.values().sum()
    }

    pub fn skipped_for(&self, reason: SkipReason) -> usize {
        self.skipped.get(&reason).copied().unwrap_or(0)
    }
}

/// Engine-wide counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EngineStats {
    pub tracked: usize,
    pub active_tweens: usize,
    pub polls_applied: u64,
    pub registry: RegistryStats,
}

// ============================================================================
// ENGINE
// ============================================================================

/// Live tracking state for one viewer.
pub struct TrackingEngine<S: RenderSurface> {
    config: EngineConfig,
    registry: AgentRegistry,
    labels: LabelState,
    surface: S,
    polls_applied: u64,
}

impl<S: RenderSurface> TrackingEngine<S> {
    pub fn new(config: EngineConfig, surface: S) -> Self {
        let animator = MotionAnimator::new(config.animation.clone());
        Self {
            registry: AgentRegistry::new(config.min_heading_distance_m, animator),
            labels: LabelState::new(),
            surface,
            polls_applied: 0,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    pub fn labels(&self) -> &LabelState {
        &self.labels
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            tracked: self.registry.len(),
            active_tweens: self.registry.active_tweens(),
            polls_applied: self.polls_applied,
            registry: self.registry.stats(),
        }
    }

    // ========================================================================
    // SNAPSHOTS
    // ========================================================================

    /// Applies one successfully fetched snapshot.
    ///
    /// Enriches every record, upserts the survivors, then reconciles the
    /// registry against exactly that identity set.
    pub fn apply_snapshot<L>(&mut self, snapshot: Snapshot, lookup: &L, now: Duration) -> PollReport
    where
        L: TripLookup + ?Sized,
    {
        let mut report = PollReport {
            malformed: snapshot.malformed,
            ..Default::default()
        };
        let mut present = HashSet::new();
        let mut accepted = Vec::with_capacity(snapshot.records.len());
        let mut missed = Vec::new();

        for raw in snapshot.records {
            let raw = if self.config.synthesize_missing_ids {
                raw.with_synthesized_id()
            } else {
                raw
            };
            match enrich(&raw, lookup) {
                Enrichment::Rendered(state) => {
                    present.insert(state.id.clone());
                    accepted.push(state);
                }
                Enrichment::Skipped(reason) => {
                    trace!(id = ?raw.id, trip = ?raw.trip_id, %reason, "record skipped");
                    *report.skipped.entry(reason).or_default() += 1;
                    if !reason.is_validation_failure() {
                        if let Some((id, position)) = raw.id.clone().zip(raw.position()) {
                            missed.push((id, position));
                        }
                    }
                }
            }
        }

        // Duplicate identities within one snapshot: the last record wins
        for state in accepted {
            if self.upsert(state, now).created {
                report.created += 1;
            }
        }
        // Misses still count as sightings for later heading derivation
        for (id, position) in missed {
            self.registry.remember_fix(&id, position);
        }

        report.rendered = present.len();
        report.removed = self.reconcile(&present);
        self.polls_applied += 1;

        debug!(
            rendered = report.rendered,
            created = report.created,
            skipped = report.skipped_total(),
            removed = report.removed.len(),
            "snapshot applied"
        );
        report
    }

    /// Creates or updates one vehicle; attached labels follow its marker.
    pub fn upsert(&mut self, state: EnrichedAgentState, now: Duration) -> UpsertOutcome {
        let id = state.id.clone();
        let labels = &self.labels;
        let outcome = self.registry.upsert(state, now, &mut self.surface, |surface, id, pos| {
            for kind in labels.kinds_for(id) {
                surface.move_label(kind, pos);
            }
        });

        if outcome.content_changed {
            if let Some(agent) = self.registry.get(&id) {
                let content = agent.label_content();
                for kind in self.labels.kinds_for(&id) {
                    self.surface.update_label(kind, &content);
                }
            }
        }
        outcome
    }

    /// Removes one vehicle and force-clears any label it owned.
    pub fn remove(&mut self, id: &str) -> bool {
        if self.registry.remove(id, &mut self.surface).is_none() {
            return false;
        }
        let effects = self.labels.agent_removed(id);
        self.apply_label_effects(effects);
        true
    }

    /// Removes every vehicle not in `present`. Returns the removed ids.
    pub fn reconcile(&mut self, present: &HashSet<String>) -> Vec<String> {
        let removed = self.registry.reconcile(present, &mut self.surface);
        let mut ids = Vec::with_capacity(removed.len());
        for agent in removed {
            let effects = self.labels.agent_removed(&agent.id);
            self.apply_label_effects(effects);
            ids.push(agent.id);
        }
        ids
    }

    // ========================================================================
    // FRAMES
    // ========================================================================

    /// Advances all tweens to `now`. Returns the number still in flight.
    pub fn advance_frame(&mut self, now: Duration) -> usize {
        let labels = &self.labels;
        self.registry.advance_frame(now, &mut self.surface, |surface, id, pos| {
            for kind in labels.kinds_for(id) {
                surface.move_label(kind, pos);
            }
        })
    }

    // ========================================================================
    // POINTER
    // ========================================================================

    pub fn handle_pointer(&mut self, event: PointerEvent) {
        let effects = match event {
            PointerEvent::Enter(id) => {
                if !self.registry.contains(&id) {
                    trace!(%id, "enter on untracked vehicle ignored");
                    return;
                }
                self.labels.pointer_enter(&id)
            }
            PointerEvent::Leave(id) => self.labels.pointer_leave(&id),
            PointerEvent::Click(id) => {
                if !self.registry.contains(&id) {
                    trace!(%id, "click on untracked vehicle ignored");
                    return;
                }
                self.labels.click(&id)
            }
            PointerEvent::ClickBackground => self.labels.click_background(),
            PointerEvent::Move => self.labels.pointer_moved(),
        };
        self.apply_label_effects(effects);
    }

    fn apply_label_effects(&mut self, effects: Vec<LabelEffect>) {
        for effect in effects {
            match effect {
                LabelEffect::Show(kind, id) => {
                    if let Some(agent) = self.registry.get(&id) {
                        self.surface
                            .show_label(kind, &id, &agent.label_content(), agent.displayed);
                    }
                }
                LabelEffect::Hide(kind) => self.surface.remove_label(kind),
                LabelEffect::PromoteHover => self.surface.promote_hover_label(),
            }
        }
    }
}
