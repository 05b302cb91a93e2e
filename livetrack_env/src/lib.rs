//! LiveTrack Environment Abstraction Layer
//!
//! This crate provides the "Sans-IO" abstraction allowing the LiveTrack
//! engine to run both against a **Production** feed (tokio + HTTP) and inside
//! a deterministic **Simulation** harness.
//!
//! # Core Concept: The Reactor Pattern
//!
//! Every source of non-determinism the engine touches is intercepted:
//! - Time (`now()`, `sleep()`)
//! - The live feed (`fetch()`)
//!
//! The tracking engine only ever sees durations and raw snapshot bodies, so a
//! simulation can replay an exact sequence of polls against a virtual clock.
//!
//! # Example
//!
//! ```ignore
//! use livetrack_env::{FeedSource, LiveContext};
//!
//! async fn poll_loop<Ctx: LiveContext, Feed: FeedSource>(ctx: &Ctx, feed: &Feed) {
//!     loop {
//!         match feed.fetch().await {
//!             Ok(body) => handle_snapshot(body),
//!             Err(e) => tracing::warn!("poll failed: {}", e),
//!         }
//!         ctx.sleep(Duration::from_secs(3)).await;
//!     }
//! }
//! ```

mod context;
mod error;
mod feed;
mod http_impl;
mod tokio_impl;
mod types;

pub use context::LiveContext;
pub use error::EnvError;
pub use feed::{FeedController, FeedSource};
pub use http_impl::HttpFeed;
pub use tokio_impl::TokioContext;
pub use types::FeedBody;
