//! LiveTrack Core - Live Vehicle Tracking and Animation Engine
//!
//! This library turns periodic snapshots of a vehicle feed into a smoothly
//! animated map layer. It solves three problems of naive polling front-ends:
//! 1. **Teleporting Markers**: positions tween between fixes on an eased curve,
//!    and a new fix cancels the old tween instead of racing it
//! 2. **Spinning Arrows**: the feed's zero-bearing sentinel is resolved once,
//!    and headings fall back to movement-derived and then established values
//! 3. **Orphaned Labels**: hover and pinned labels follow their marker frame by
//!    frame and are force-cleared when the vehicle leaves the feed
//!
//! The engine is synchronous and owns all tracking state; [`runtime`] drives
//! it from a clock and a feed through the `livetrack_env` abstraction.

pub mod animator;
pub mod engine;
pub mod enrichment;
pub mod geometry;
pub mod labels;
pub mod poller;
pub mod registry;
pub mod runtime;
pub mod snapshot;
pub mod style;
pub mod surface;

// Re-export key types for convenience
pub use animator::{AnimationConfig, MotionAnimator, Tween};
pub use engine::{EngineConfig, EngineStats, PointerEvent, PollReport, TrackingEngine};
pub use enrichment::{enrich, EnrichedAgentState, Enrichment, LookupError, SkipReason, TripInfo, TripLookup, TripTable};
pub use geometry::{Heading, LatLon, ScreenPoint};
pub use labels::{LabelContent, LabelKind, LabelState};
pub use poller::{fetch_snapshot, PollConfig, PollError, PollGate};
pub use registry::{AgentRegistry, TrackedAgent};
pub use runtime::{host_channel, ConfigError, HostEvents, HostHandle, LiveTracker, TrackerConfig};
pub use snapshot::{parse_snapshot, RawAgentState, Snapshot};
pub use style::{style_for_category, IconShape, MarkerIcon, MarkerStyle};
pub use surface::{HeadlessSurface, RenderCall, RenderSurface};
