//! Snapshot polling: fetch gating and feed decoding.
//!
//! The poller never overlaps requests and stays quiet while the host view
//! is hidden. [`PollGate`] holds exactly those two bits of state; the
//! runtime loop in [`crate::runtime`] owns the timer.

use crate::snapshot::{parse_snapshot, Snapshot};
use livetrack_env::{EnvError, FeedSource};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Polling cadence.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Time between polls while visible (default: 3000 ms)
    pub period_ms: u64,

    /// Poll once immediately at startup
    pub poll_on_start: bool,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            period_ms: 3000,
            poll_on_start: true,
        }
    }
}

impl PollConfig {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms.max(1))
    }
}

/// Errors from one poll. Neither kind touches tracked state.
#[derive(Debug, Error)]
pub enum PollError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] EnvError),

    #[error("malformed snapshot: {0}")]
    Parse(#[from] serde_json::Error),
}

impl PollError {
    /// Transient failures are expected to clear on the next tick.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PollError::Fetch(EnvError::TransportError(_) | EnvError::Timeout(_))
        )
    }
}

/// In-flight and visibility gate.
#[derive(Debug, Clone)]
pub struct PollGate {
    in_flight: bool,
    visible: bool,
    skipped_hidden: u64,
    skipped_in_flight: u64,
}

impl Default for PollGate {
    fn default() -> Self {
        Self {
            in_flight: false,
            visible: true,
            skipped_hidden: 0,
            skipped_in_flight: 0,
        }
    }
}

impl PollGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Ticks skipped while hidden and while a request was outstanding.
    pub fn skipped(&self) -> (u64, u64) {
        (self.skipped_hidden, self.skipped_in_flight)
    }

    /// Claims the single request slot. Returns `false` if hidden or busy.
    pub fn try_begin(&mut self) -> bool {
        if !self.visible {
            self.skipped_hidden += 1;
            return false;
        }
        if self.in_flight {
            self.skipped_in_flight += 1;
            return false;
        }
        self.in_flight = true;
        true
    }

    /// Releases the request slot after success or failure.
    pub fn finish(&mut self) {
        self.in_flight = false;
    }

    /// Records a visibility change. Returns `true` when the view just became
    /// visible and an immediate poll should be attempted.
    pub fn set_visible(&mut self, visible: bool) -> bool {
        let became_visible = visible && !self.visible;
        self.visible = visible;
        became_visible
    }
}

/// Fetches and decodes one snapshot.
pub async fn fetch_snapshot<F>(feed: &F) -> Result<Snapshot, PollError>
where
    F: FeedSource + ?Sized,
{
    let body = feed.fetch().await?;
    Ok(parse_snapshot(&body.payload)?)
}
