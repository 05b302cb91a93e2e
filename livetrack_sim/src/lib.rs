//! LiveTrack Deterministic Simulation Harness
//!
//! This crate provides a controlled environment where the complete tracker
//! (poller, registry, animator, labels) runs against a simulated fleet on a
//! virtual clock.
//!
//! # Core Principle: The Reactor Pattern
//!
//! All sources of non-determinism are intercepted and controlled:
//! - **Time**: Virtual clock advances only when the runner moves it
//! - **Feed**: Snapshots serialized from ground truth, with injectable faults
//! - **Randomness**: All entropy derived from a single 64-bit seed
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      ScenarioRunner                         │
//! │  ┌──────────────────────────────────────────────────────┐   │
//! │  │ SimContext (Virtual Clock + Seeded RNG streams)      │   │
//! │  └──────────────────────────────────────────────────────┘   │
//! │       │                         │                           │
//! │  ┌────▼─────┐   snapshot   ┌────▼────────┐                  │
//! │  │  Fleet   │─────────────►│  SimFeed    │                  │
//! │  │ (truth)  │              │ (faults)    │                  │
//! │  └────┬─────┘              └────┬────────┘                  │
//! │       │ expected ids            │ fetch                     │
//! │  ┌────▼─────────────────────────▼────┐                      │
//! │  │   LiveTracker + HeadlessSurface   │                      │
//! │  │   (invariants checked per frame)  │                      │
//! │  └───────────────────────────────────┘                      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use livetrack_sim::{ScenarioRunner, scenarios::ScenarioId};
//!
//! let runner = ScenarioRunner::new(42, 50).with_duration(60.0);
//! let result = runner.run(ScenarioId::Churn).await;
//! assert!(result.passed);
//! ```

mod context;
mod live;
mod network;
mod oracle;
mod runner;
pub mod scenarios;

pub use context::SimContext;
pub use live::{run_live, LiveError, LiveOptions, LiveSummary};
pub use network::SimFeed;
pub use oracle::{FeedQuirk, Fleet, SimVehicle};
pub use runner::{ScenarioMetrics, ScenarioResult, ScenarioRunner};
