//! The "MOTION" Engine - eased tweens between reported positions.
//!
//! Each tracked vehicle owns at most one [`Tween`]. Starting a new tween
//! replaces the old one outright (cancel-and-replace); there is no flag to
//! check and nothing to join. The host's frame clock drives every in-flight
//! tween through [`MotionAnimator::step`], and each produced position is
//! handed to an `on_frame` hook so attached labels can follow.

use crate::geometry::{animation_duration_ms, ease_in_out_cubic, LatLon};
use serde::Deserialize;
use std::time::Duration;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Tween timing parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    /// Shortest tween, for near-stationary vehicles (default: 300 ms)
    pub min_duration_ms: f64,

    /// Longest tween, for long jumps (default: 2500 ms)
    pub max_duration_ms: f64,

    /// Tween length per on-screen pixel travelled (default: 8 ms/px)
    pub ms_per_pixel: f64,

    /// Moves smaller than this (degrees, per axis) snap without frames
    pub snap_epsilon_deg: f64,

    /// Frame clock period (default: 16 ms ≈ 60 Hz)
    pub frame_interval_ms: u64,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            min_duration_ms: 300.0,
            max_duration_ms: 2500.0,
            ms_per_pixel: 8.0,
            snap_epsilon_deg: 1e-7,
            frame_interval_ms: 16,
        }
    }
}

impl AnimationConfig {
    /// Tween length for a move of `pixel_distance` on screen.
    pub fn duration_for(&self, pixel_distance: f64) -> Duration {
        let ms = animation_duration_ms(
            pixel_distance,
            self.ms_per_pixel,
            self.min_duration_ms,
            self.max_duration_ms,
        );
        Duration::from_micros((ms * 1000.0).round() as u64)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }
}

// ============================================================================
// TWEEN
// ============================================================================

/// One in-flight interpolation. Owned by the vehicle it moves.
#[derive(Debug, Clone, PartialEq)]
pub struct Tween {
    pub from: LatLon,
    pub to: LatLon,
    pub started_at: Duration,
    pub duration: Duration,
}

/// Result of sampling a tween.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TweenStep {
    InFlight(LatLon),
    /// Exactly `to`, with no accumulated float drift
    Finished(LatLon),
}

impl Tween {
    pub fn new(from: LatLon, to: LatLon, started_at: Duration, duration: Duration) -> Self {
        Self {
            from,
            to,
            started_at,
            duration,
        }
    }

    /// Position at `now` along the eased curve.
    pub fn sample(&self, now: Duration) -> TweenStep {
        let elapsed = now.saturating_sub(self.started_at);
        if elapsed >= self.duration {
            return TweenStep::Finished(self.to);
        }
        let fraction = elapsed.as_secs_f64() / self.duration.as_secs_f64();
        TweenStep::InFlight(self.from.lerp(self.to, ease_in_out_cubic(fraction)))
    }
}

// ============================================================================
// ANIMATOR
// ============================================================================

/// Starts, replaces and advances per-vehicle tweens.
#[derive(Debug, Clone, Default)]
pub struct MotionAnimator {
    config: AnimationConfig,
}

impl MotionAnimator {
    pub fn new(config: AnimationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnimationConfig {
        &self.config
    }

    /// Begins a tween in `slot`, cancelling whatever was there.
    ///
    /// Negligible moves snap: `on_frame(to)` runs once and no tween is
    /// scheduled. Returns `true` when a tween is now in flight.
    pub fn animate<F>(
        &self,
        slot: &mut Option<Tween>,
        from: LatLon,
        to: LatLon,
        duration: Duration,
        now: Duration,
        mut on_frame: F,
    ) -> bool
    where
        F: FnMut(LatLon),
    {
        // Cancel-and-replace
        *slot = None;

        if from.approx_eq(to, self.config.snap_epsilon_deg) || duration.is_zero() {
            on_frame(to);
            return false;
        }

        *slot = Some(Tween::new(from, to, now, duration));
        true
    }

    /// Advances the tween in `slot` to `now`.
    ///
    /// Calls `on_frame` with the new position and clears the slot once the
    /// tween has finished. Returns the position, or `None` when idle.
    pub fn step<F>(&self, slot: &mut Option<Tween>, now: Duration, mut on_frame: F) -> Option<LatLon>
    where
        F: FnMut(LatLon),
    {
        let tween = slot.as_ref()?;
        let position = match tween.sample(now) {
            TweenStep::InFlight(pos) => pos,
            TweenStep::Finished(pos) => {
                *slot = None;
                pos
            }
        };
        on_frame(position);
        Some(position)
    }
}
