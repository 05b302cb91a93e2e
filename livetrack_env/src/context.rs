//! Core environment context trait for the LiveTrack engine.

use async_trait::async_trait;
use std::future::Future;
use std::time::{Duration, SystemTime};

/// The central interface for Environment Interaction.
///
/// This trait abstracts the "real world" clock so that the tracking engine
/// can run against wall time in production and against a virtual clock in
/// simulation.
///
/// # Implementations
///
/// - **Production**: `TokioContext` - wraps `tokio::time`
/// - **Simulation**: `SimContext` - a manually advanced virtual clock
///
/// # Determinism
///
/// Tween progress is computed exclusively from [`LiveContext::now`], so an
/// animation sampled at the same virtual instants always yields the same
/// positions.
#[async_trait]
pub trait LiveContext: Send + Sync + 'static {
    /// Returns the current monotonic time since context creation.
    ///
    /// This is the frame-presentation clock: tween start and sample times
    /// are both measured against it.
    fn now(&self) -> Duration;

    /// Returns the wall-clock time, used to stamp fetched snapshots.
    fn system_time(&self) -> SystemTime;

    /// Suspends execution for the given duration.
    ///
    /// In production: wraps `tokio::time::sleep`
    /// In simulation: advances virtual clock
    async fn sleep(&self, duration: Duration);

    /// Spawns a background task.
    fn spawn<F>(&self, name: &str, future: F)
    where
        F: Future<Output = ()> + Send + 'static;

    /// Returns the context's seed (for logging/debugging).
    ///
    /// In production, returns 0 (not seeded).
    /// In simulation, returns the master seed.
    fn seed(&self) -> u64;
}
