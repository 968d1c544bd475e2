//! Chunk visibility: graph search, scheduling and per-frame filtering

pub mod config;
pub mod engine;
pub mod frustum_filter;
pub mod node;
pub mod scheduler;
pub mod snapshot;
pub mod stats;
pub mod traversal;

pub use config::CullingConfig;
pub use engine::{DebugCapture, VisibilityEngine};
pub use frustum_filter::FrustumFilter;
pub use node::GraphNode;
pub use scheduler::RebuildScheduler;
pub use snapshot::TraversalSnapshot;
pub use stats::FrameStats;
pub use traversal::{build_snapshot, TraversalContext, Watchdog};
