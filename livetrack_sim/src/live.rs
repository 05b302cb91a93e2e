//! Live mode: the production tracker against a real endpoint.
//!
//! Uses `TokioContext` and `HttpFeed` with a headless surface, so the whole
//! pipeline (fetch, parse, enrich, reconcile, animate) runs exactly as it
//! would behind a map widget, minus the drawing.

use livetrack_core::{
    host_channel, ConfigError, HeadlessSurface, LiveTracker, LookupError, TrackerConfig, TripTable,
};
use livetrack_env::{EnvError, HttpFeed, TokioContext};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Errors preparing a live run.
#[derive(Debug, Error)]
pub enum LiveError {
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    #[error("trip table: {0}")]
    Trips(#[from] LookupError),

    #[error("feed: {0}")]
    Feed(#[from] EnvError),
}

/// Parameters for a live run.
#[derive(Debug, Clone)]
pub struct LiveOptions {
    pub url: String,
    pub trips: PathBuf,
    pub config: TrackerConfig,
    pub duration: Duration,
    pub request_timeout: Duration,
}

/// What a live run saw.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LiveSummary {
    pub polls_ok: u64,
    pub polls_failed: u64,
    pub tracked: usize,
    pub created: u64,
    pub removed: u64,
    pub icon_renders: u64,
    pub icon_renders_skipped: u64,
    /// Records skipped by the last applied snapshot
    pub last_skipped: usize,
}

/// Tracks the live feed for `options.duration`, then reports.
pub async fn run_live(options: LiveOptions) -> Result<LiveSummary, LiveError> {
    options.config.validate()?;
    let trips = Arc::new(TripTable::from_json_file(&options.trips)?);
    info!(trips = trips.len(), path = %options.trips.display(), "trip table loaded");

    let feed = Arc::new(HttpFeed::with_timeout(options.url.clone(), options.request_timeout)?);
    let mut tracker = LiveTracker::new(
        TokioContext::shared(),
        feed,
        trips,
        HeadlessSurface::default(),
        options.config,
    );

    let (host, events) = host_channel();
    let duration = options.duration;
    tokio::spawn(async move {
        tokio::time::sleep(duration).await;
        drop(host);
    });

    tracker.run(events).await;

    let stats = tracker.stats();
    let engine = tracker.engine().stats();
    Ok(LiveSummary {
        polls_ok: stats.polls_ok,
        polls_failed: stats.polls_failed,
        tracked: engine.tracked,
        created: engine.registry.created,
        removed: engine.registry.removed,
        icon_renders: engine.registry.icon_renders,
        icon_renders_skipped: engine.registry.icon_renders_skipped,
        last_skipped: stats
            .last_report
            .as_ref()
            .map(|r| r.skipped_total())
            .unwrap_or(0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(trips: &str) -> LiveOptions {
        LiveOptions {
            url: "http://127.0.0.1:9/vehicles".into(),
            trips: PathBuf::from(trips),
            config: TrackerConfig::default(),
            duration: Duration::from_millis(10),
            request_timeout: Duration::from_millis(100),
        }
    }

    #[tokio::test]
    async fn test_missing_trip_table_is_reported() {
        let err = run_live(options("/nonexistent/trips.json")).await.unwrap_err();
        assert!(matches!(err, LiveError::Trips(LookupError::Io(_))));
    }

    #[tokio::test]
    async fn test_invalid_config_is_reported() {
        let mut opts = options("/nonexistent/trips.json");
        opts.config.poll.period_ms = 0;
        let err = run_live(opts).await.unwrap_err();
        assert!(matches!(err, LiveError::Config(ConfigError::Invalid(_))));
    }
}
