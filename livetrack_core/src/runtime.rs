//! Live Tracker - drives the TrackingEngine from a feed and a host.
//!
//! This module is the integration layer between the synchronous engine and
//! the environment abstraction (LiveContext + FeedSource).
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        LiveTracker                          │
//! │  ┌──────────────────────────────────────────────────────┐   │
//! │  │              Context: LiveContext                    │   │
//! │  │  • now() → tween clock                               │   │
//! │  │  • spawn() → background fetches                      │   │
//! │  └──────────────────────────────────────────────────────┘   │
//! │                              │                              │
//! │  ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌───────────────┐   │
//! │  │   POLL   │ │  FRAME   │ │  HOST    │ │ TrackingEngine│   │
//! │  │  timer   │ │  timer   │ │ events   │ │               │   │
//! │  └──────────┘ └──────────┘ └──────────┘ └───────────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything that touches engine state runs on the loop itself; fetches are
//! the only work handed to a background task, and their results come back
//! through a channel. A poll result is therefore never applied halfway
//! through a pointer event or a frame.
//!
//! # Usage
//!
//! ```ignore
//! use livetrack_core::runtime::{host_channel, LiveTracker, TrackerConfig};
//! use livetrack_env::{HttpFeed, TokioContext};
//!
//! let (host, events) = host_channel();
//! let mut tracker = LiveTracker::new(ctx, feed, trips, surface, TrackerConfig::default());
//! tracker.run(events).await;
//! ```

use crate::engine::{EngineConfig, PointerEvent, PollReport, TrackingEngine};
use crate::enrichment::TripLookup;
use crate::poller::{fetch_snapshot, PollConfig, PollError, PollGate};
use crate::snapshot::Snapshot;
use crate::surface::RenderSurface;
use livetrack_env::{FeedSource, LiveContext};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Errors loading a tracker configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Configuration for a LiveTracker.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub engine: EngineConfig,
    pub poll: PollConfig,
}

impl TrackerConfig {
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let animation = &self.engine.animation;
        if animation.min_duration_ms < 0.0 || animation.min_duration_ms > animation.max_duration_ms {
            return Err(ConfigError::Invalid(format!(
                "animation duration range {}..{} ms",
                animation.min_duration_ms, animation.max_duration_ms
            )));
        }
        if self.poll.period_ms == 0 {
            return Err(ConfigError::Invalid("poll period must be positive".into()));
        }
        if self.engine.min_heading_distance_m < 0.0 {
            return Err(ConfigError::Invalid("heading distance must not be negative".into()));
        }
        Ok(())
    }
}

// ============================================================================
// HOST CHANNEL
// ============================================================================

/// Receiving half of the host connection, consumed by [`LiveTracker::run`].
pub struct HostEvents {
    pub pointer: mpsc::UnboundedReceiver<PointerEvent>,
    pub visibility: watch::Receiver<bool>,
}

/// Sending half, held by the map widget. Dropping it stops the tracker.
#[derive(Clone)]
pub struct HostHandle {
    pointer: mpsc::UnboundedSender<PointerEvent>,
    visibility: Arc<watch::Sender<bool>>,
}

impl HostHandle {
    /// Forwards a pointer event. Returns `false` once the tracker is gone.
    pub fn pointer(&self, event: PointerEvent) -> bool {
        self.pointer.send(event).is_ok()
    }

    pub fn set_visible(&self, visible: bool) {
        self.visibility.send_replace(visible);
    }
}

/// Creates a connected host handle and event stream. The view starts visible.
pub fn host_channel() -> (HostHandle, HostEvents) {
    let (pointer_tx, pointer_rx) = mpsc::unbounded_channel();
    let (visibility_tx, visibility_rx) = watch::channel(true);
    (
        HostHandle {
            pointer: pointer_tx,
            visibility: Arc::new(visibility_tx),
        },
        HostEvents {
            pointer: pointer_rx,
            visibility: visibility_rx,
        },
    )
}

// ============================================================================
// TRACKER
// ============================================================================

/// Poll outcome counters.
#[derive(Debug, Clone, Default)]
pub struct TrackerStats {
    pub polls_ok: u64,
    pub polls_failed: u64,
    /// Failures expected to clear by the next tick (transport, timeout)
    pub transient_failures: u64,
    pub last_report: Option<PollReport>,
}

/// A tracking engine wired to a clock, a feed and a trip lookup.
///
/// Generic over the context and feed implementations, allowing the same
/// tracker to run in production (tokio + HTTP) or in simulation.
pub struct LiveTracker<Ctx, Feed, L, S>
where
    Ctx: LiveContext,
    Feed: FeedSource,
    L: TripLookup + Send + Sync + 'static,
    S: RenderSurface,
{
    context: Arc<Ctx>,
    feed: Arc<Feed>,
    lookup: Arc<L>,
    engine: TrackingEngine<S>,
    poll: PollConfig,
    gate: PollGate,
    stats: TrackerStats,
}

impl<Ctx, Feed, L, S> LiveTracker<Ctx, Feed, L, S>
where
    Ctx: LiveContext,
    Feed: FeedSource,
    L: TripLookup + Send + Sync + 'static,
    S: RenderSurface,
{
    pub fn new(
        context: Arc<Ctx>,
        feed: Arc<Feed>,
        lookup: Arc<L>,
        surface: S,
        config: TrackerConfig,
    ) -> Self {
        Self {
            context,
            feed,
            lookup,
            engine: TrackingEngine::new(config.engine, surface),
            poll: config.poll,
            gate: PollGate::new(),
            stats: TrackerStats::default(),
        }
    }

    pub fn engine(&self) -> &TrackingEngine<S> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut TrackingEngine<S> {
        &mut self.engine
    }

    pub fn poll_config(&self) -> &PollConfig {
        &self.poll
    }

    pub fn gate(&self) -> &PollGate {
        &self.gate
    }

    pub fn stats(&self) -> &TrackerStats {
        &self.stats
    }

    pub fn context(&self) -> &Arc<Ctx> {
        &self.context
    }

    // ========================================================================
    // STEP API
    // ========================================================================

    /// Polls once inline if the gate allows it.
    ///
    /// Returns the report of an applied snapshot, or `None` when the poll
    /// was gated or failed.
    pub async fn poll_once(&mut self) -> Option<PollReport> {
        if !self.gate.try_begin() {
            return None;
        }
        let result = fetch_snapshot(self.feed.as_ref()).await;
        self.complete_poll(result)
    }

    /// Releases the gate and applies a finished fetch.
    ///
    /// Failures leave all tracked state untouched.
    pub fn complete_poll(&mut self, result: Result<Snapshot, PollError>) -> Option<PollReport> {
        self.gate.finish();
        match result {
            Ok(snapshot) => {
                let now = self.context.now();
                let report = self.engine.apply_snapshot(snapshot, self.lookup.as_ref(), now);
                self.stats.polls_ok += 1;
                self.stats.last_report = Some(report.clone());
                Some(report)
            }
            Err(e) => {
                self.stats.polls_failed += 1;
                let transient = e.is_transient();
                if transient {
                    self.stats.transient_failures += 1;
                }
                warn!(feed = %self.feed.describe(), error = %e, transient, "poll failed, keeping current state");
                None
            }
        }
    }

    /// Advances tweens to the context's current time.
    pub fn frame(&mut self) -> usize {
        let now = self.context.now();
        self.engine.advance_frame(now)
    }

    pub fn pointer(&mut self, event: PointerEvent) {
        self.engine.handle_pointer(event);
    }

    /// Returns `true` when the view just became visible.
    pub fn set_visible(&mut self, visible: bool) -> bool {
        debug!(visible, "visibility changed");
        self.gate.set_visible(visible)
    }

    // ========================================================================
    // EVENT LOOP
    // ========================================================================

    /// Starts a background fetch if the gate allows it.
    fn begin_poll(&mut self, results: &mpsc::UnboundedSender<Result<Snapshot, PollError>>) {
        if !self.gate.try_begin() {
            return;
        }
        let feed = Arc::clone(&self.feed);
        let results = results.clone();
        self.context.spawn("snapshot-fetch", async move {
            let result = fetch_snapshot(feed.as_ref()).await;
            // The loop may already have exited
            let _ = results.send(result);
        });
    }

    /// Runs until the host drops its [`HostHandle`].
    pub async fn run(&mut self, mut host: HostEvents) {
        info!(feed = %self.feed.describe(), period_ms = self.poll.period_ms, "live tracker started");

        let (results_tx, mut results_rx) = mpsc::unbounded_channel();

        let mut poll_timer = tokio::time::interval(self.poll.period());
        poll_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        if !self.poll.poll_on_start {
            poll_timer.reset();
        }

        let mut frame_timer = tokio::time::interval(self.engine.config().animation.frame_interval());
        frame_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let initial = *host.visibility.borrow_and_update();
        self.set_visible(initial);
        let mut visibility_open = true;

        loop {
            tokio::select! {
                _ = poll_timer.tick() => {
                    self.begin_poll(&results_tx);
                }
                Some(result) = results_rx.recv() => {
                    self.complete_poll(result);
                }
                _ = frame_timer.tick() => {
                    // Hidden views get no frames; tweens catch up on return
                    if self.gate.is_visible() {
                        self.frame();
                    }
                }
                changed = host.visibility.changed(), if visibility_open => {
                    if changed.is_err() {
                        visibility_open = false;
                        continue;
                    }
                    let visible = *host.visibility.borrow_and_update();
                    if self.set_visible(visible) {
                        self.begin_poll(&results_tx);
                        poll_timer.reset();
                    }
                }
                event = host.pointer.recv() => {
                    match event {
                        Some(event) => self.pointer(event),
                        None => break,
                    }
                }
            }
        }

        info!(
            polls_ok = self.stats.polls_ok,
            polls_failed = self.stats.polls_failed,
            tracked = self.engine.registry().len(),
            "live tracker stopped"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::TripTable;
    use crate::surface::HeadlessSurface;
    use async_trait::async_trait;
    use livetrack_env::{EnvError, FeedBody, TokioContext};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    struct MockFeed {
        body: Mutex<Result<String, u16>>,
        latency: Duration,
        fetches: AtomicUsize,
        active: AtomicUsize,
        max_active: AtomicUsize,
    }

    impl MockFeed {
        fn new(body: &str, latency: Duration) -> Arc<Self> {
            Arc::new(Self {
                body: Mutex::new(Ok(body.to_string())),
                latency,
                fetches: AtomicUsize::new(0),
                active: AtomicUsize::new(0),
                max_active: AtomicUsize::new(0),
            })
        }

        fn fail_with(&self, status: u16) {
            *self.body.lock().unwrap() = Err(status);
        }

        fn disconnect(&self) {
            *self.body.lock().unwrap() = Err(0);
        }

        fn fetches(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl FeedSource for MockFeed {
        async fn fetch(&self) -> Result<FeedBody, EnvError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(active, Ordering::SeqCst);

            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }

            self.active.fetch_sub(1, Ordering::SeqCst);
            let body = self.body.lock().unwrap().clone();
            match body {
                Ok(text) => Ok(FeedBody::from(text.as_str())),
                Err(0) => Err(EnvError::transport("connection reset")),
                Err(status) => Err(EnvError::HttpStatus(status)),
            }
        }

        fn describe(&self) -> String {
            "mock feed".into()
        }
    }

    const ONE_VEHICLE: &str = r#"[{"id":"v1","lat":55.60,"lon":13.00,"tripId":"t1"}]"#;

    fn trips() -> Arc<TripTable> {
        Arc::new(
            TripTable::from_json_str(r#"{"t1": {"line": "5", "headsign": "Centrum", "desc": "Stadsbuss"}}"#)
                .unwrap(),
        )
    }

    type TestTracker = LiveTracker<TokioContext, MockFeed, TripTable, HeadlessSurface>;

    fn tracker(feed: Arc<MockFeed>) -> TestTracker {
        LiveTracker::new(
            TokioContext::shared(),
            feed,
            trips(),
            HeadlessSurface::default(),
            TrackerConfig::default(),
        )
    }

    #[test]
    fn test_config_partial_override() {
        let config = TrackerConfig::from_json_str(
            r#"{"poll": {"period_ms": 5000}, "engine": {"animation": {"max_duration_ms": 1000}}}"#,
        )
        .unwrap();
        assert_eq!(config.poll.period_ms, 5000);
        assert!(config.poll.poll_on_start);
        assert_eq!(config.engine.animation.max_duration_ms, 1000.0);
        assert_eq!(config.engine.animation.min_duration_ms, 300.0);
        assert_eq!(config.engine.min_heading_distance_m, 3.0);
    }

    #[test]
    fn test_config_rejects_invalid() {
        let err = TrackerConfig::from_json_str(r#"{"poll": {"period_ms": 0}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = TrackerConfig::from_json_str(
            r#"{"engine": {"animation": {"min_duration_ms": 900, "max_duration_ms": 100}}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        assert!(matches!(
            TrackerConfig::from_json_str("not json").unwrap_err(),
            ConfigError::Json(_)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_poll_keeps_state() {
        let feed = MockFeed::new(ONE_VEHICLE, Duration::ZERO);
        let mut tracker = tracker(Arc::clone(&feed));

        let report = tracker.poll_once().await.unwrap();
        assert_eq!(report.rendered, 1);

        feed.fail_with(503);
        assert!(tracker.poll_once().await.is_none());

        assert!(tracker.engine().registry().contains("v1"));
        assert_eq!(tracker.engine().surface().marker_count(), 1);
        assert_eq!(tracker.stats().polls_ok, 1);
        assert_eq!(tracker.stats().polls_failed, 1);
        assert_eq!(tracker.stats().transient_failures, 0);
        assert!(!tracker.gate().is_in_flight());

        feed.disconnect();
        assert!(tracker.poll_once().await.is_none());
        assert_eq!(tracker.stats().polls_failed, 2);
        assert_eq!(tracker.stats().transient_failures, 1);
        assert!(tracker.engine().registry().contains("v1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hidden_view_does_not_poll() {
        let feed = MockFeed::new(ONE_VEHICLE, Duration::ZERO);
        let mut tracker = tracker(Arc::clone(&feed));

        tracker.set_visible(false);
        assert!(tracker.poll_once().await.is_none());
        assert_eq!(feed.fetches(), 0);

        assert!(tracker.set_visible(true));
        assert!(tracker.poll_once().await.is_some());
        assert_eq!(feed.fetches(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_loop_polls_on_schedule_and_visibility() {
        let feed = MockFeed::new(ONE_VEHICLE, Duration::ZERO);
        let mut tracker = tracker(Arc::clone(&feed));
        let (host, events) = host_channel();

        let handle = tokio::spawn(async move {
            tracker.run(events).await;
            tracker
        });

        // Immediate first poll
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(feed.fetches(), 1);

        // One more per period
        tokio::time::sleep(Duration::from_millis(3000)).await;
        assert_eq!(feed.fetches(), 2);

        // Hidden: timer ticks are skipped
        host.set_visible(false);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(feed.fetches(), 2);

        // Visible again: poll immediately
        host.set_visible(true);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(feed.fetches(), 3);

        assert!(host.pointer(PointerEvent::Click("v1".into())));
        drop(host);

        let tracker = handle.await.unwrap();
        assert_eq!(tracker.engine().labels().pinned(), Some("v1"));
        assert_eq!(tracker.stats().polls_ok, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_feed_never_overlaps() {
        // Each fetch outlasts the poll period
        let feed = MockFeed::new(ONE_VEHICLE, Duration::from_millis(5000));
        let mut tracker = tracker(Arc::clone(&feed));
        let (host, events) = host_channel();

        let handle = tokio::spawn(async move {
            tracker.run(events).await;
            tracker
        });

        tokio::time::sleep(Duration::from_millis(20_000)).await;
        drop(host);
        let tracker = handle.await.unwrap();

        assert_eq!(feed.max_active.load(Ordering::SeqCst), 1);
        assert!(feed.fetches() < 20_000 / 3000);
        assert!(tracker.gate().skipped().1 > 0);
    }
}
