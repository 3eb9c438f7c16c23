//! Wind flow-field rendering.
//!
//! Two renderers share one [`FlowSeries`]: screen-space arrows drawn on a 2D
//! overlay canvas, and a GPU point cloud drawn inside the map's own render pass.
//! [`FlowRendererSlot`] keeps at most one of them alive.

pub mod arrows;
pub mod particles;
pub mod point_cloud;
pub mod renderer;
pub mod series;

pub use arrows::*;
pub use particles::*;
pub use point_cloud::*;
pub use renderer::*;
pub use series::*;
