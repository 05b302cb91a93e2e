//! Feed transport abstraction for the LiveTrack poller.

use async_trait::async_trait;
use crate::error::EnvError;
use crate::types::FeedBody;

/// Abstraction over the live vehicle-position endpoint.
///
/// # Implementations
///
/// - **Production**: `HttpFeed` - one cache-bypassing HTTP GET per call
/// - **Simulation**: `SimFeed` - serializes a ground-truth fleet, with
///   injectable outages and malformed bodies
///
/// # Poll Flow
///
/// ```text
/// Poller                      Feed                       Endpoint
///   |                           |                            |
///   |-- fetch() --------------->|                            |
///   |                           |-- GET (no-cache) --------->|
///   |                           |<-- 200 + JSON array -------|
///   |<-- Ok(FeedBody) ----------|                            |
/// ```
#[async_trait]
pub trait FeedSource: Send + Sync + 'static {
    /// Fetches the current snapshot body.
    ///
    /// # Returns
    /// * `Ok(FeedBody)` - A 2xx response with its raw body
    /// * `Err(EnvError::HttpStatus)` - The endpoint answered with a non-2xx status
    /// * `Err(EnvError::TransportError)` - The request never completed
    ///
    /// # Note
    /// A successful fetch says nothing about the body's shape; malformed
    /// JSON is detected by the caller.
    async fn fetch(&self) -> Result<FeedBody, EnvError>;

    /// Human-readable description of where snapshots come from (for logging).
    fn describe(&self) -> String;
}

/// Fault injection for simulated feeds.
///
/// Lets scenarios reproduce every failure the poller must survive.
pub trait FeedController: Send + Sync {
    /// Makes subsequent fetches fail at the transport level.
    fn set_outage(&self, down: bool);

    /// Makes subsequent fetches answer with the given status instead of 200.
    fn set_status_override(&self, status: Option<u16>);

    /// Makes subsequent fetches return a body that is not valid JSON.
    fn set_malformed(&self, malformed: bool);

    /// Heals all injected faults.
    fn heal_all(&self);
}
