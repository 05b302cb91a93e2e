//! Virtual clock for scenario runs.
//!
//! Tween progress, poll timestamps and fleet motion all read the same
//! clock, which only moves when the runner advances it (or something
//! sleeps on it). Randomness is split into named streams derived from the
//! run's seed.

use async_trait::async_trait;
use livetrack_env::LiveContext;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Stream driving fleet spawns, motion and churn.
pub const FLEET_STREAM: u64 = 1;

/// Stream driving synthetic pointer input.
pub const POINTER_STREAM: u64 = 2;

/// 2024-01-01 00:00:00 UTC, the default wall-clock origin.
const DEFAULT_EPOCH_SECS: u64 = 1_704_067_200;

/// Scenario clock shared by the runner and the tracker under test.
///
/// Clones share the same clock.
#[derive(Debug, Clone)]
pub struct SimContext {
    seed: u64,

    /// Nanoseconds since the start of the run
    elapsed_ns: Arc<AtomicU64>,

    /// Wall-clock time at the start of the run
    epoch: SystemTime,
}

impl SimContext {
    pub fn new(seed: u64) -> Self {
        Self::with_epoch(seed, UNIX_EPOCH + Duration::from_secs(DEFAULT_EPOCH_SECS))
    }

    /// A clock whose `system_time` starts at `epoch`.
    pub fn with_epoch(seed: u64, epoch: SystemTime) -> Self {
        Self {
            seed,
            elapsed_ns: Arc::new(AtomicU64::new(0)),
            epoch,
        }
    }

    pub fn shared(seed: u64) -> Arc<Self> {
        Arc::new(Self::new(seed))
    }

    pub fn advance_time(&self, duration: Duration) {
        self.elapsed_ns
            .fetch_add(duration.as_nanos() as u64, Ordering::SeqCst);
    }

    pub fn time_ns(&self) -> u64 {
        self.elapsed_ns.load(Ordering::SeqCst)
    }

    pub fn now_secs(&self) -> f64 {
        self.time_ns() as f64 / 1e9
    }

    /// Independent RNG for one consumer; extra draws in one stream never
    /// shift another.
    pub fn rng_stream(&self, stream: u64) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.seed.wrapping_mul(0x517c_c1b7_2722_0a95) ^ stream)
    }
}

#[async_trait]
impl LiveContext for SimContext {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.time_ns())
    }

    fn system_time(&self) -> SystemTime {
        self.epoch + self.now()
    }

    async fn sleep(&self, duration: Duration) {
        self.advance_time(duration);
    }

    fn spawn<F>(&self, name: &str, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        tracing::trace!(task = name, at_ns = self.time_ns(), "scenario task spawned");
        tokio::spawn(future);
    }

    fn seed(&self) -> u64 {
        self.seed
    }
}
