pub mod bounds;
pub mod ids;
pub mod math;
pub mod time;
pub mod view;

// Foundation crate: small, well-tested primitives only.
pub use bounds::*;
pub use ids::*;
pub use time::*;
pub use view::*;
