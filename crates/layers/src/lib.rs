pub mod engine;
pub mod highlight;
pub mod memory;
pub mod registration;
pub mod style_reload;
pub mod symbology;
pub mod terrain;

pub use engine::*;
pub use registration::*;
