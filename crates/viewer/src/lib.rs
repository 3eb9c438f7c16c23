//! Globe flow visualization: camera orbit, mode transitions and the per-frame
//! loop that ties the map overlays and flow renderers together.

pub mod backend;
pub mod config;
pub mod mode;
pub mod orbit;
pub mod visualization;

pub use backend::*;
pub use config::*;
pub use mode::*;
pub use orbit::*;
pub use visualization::*;

/// Owners of the pending one-shot timers of a visualization.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TimerKey {
    /// Orbit restarts after the user stops interacting.
    OrbitResume,
    /// The focus fly-to has landed.
    FlyArrival,
    /// The in-flight projection change has settled.
    ProjectionSettled,
}
