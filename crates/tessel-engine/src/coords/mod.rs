//! Geometry helpers shared by the batcher, the scene and the frame buffer.
//!
//! Vector and matrix math comes from `glam`; this module only adds the few
//! aggregate types the engine needs on top of it.
//!
//! Canonical 2D space for sketches:
//! - pixels, origin top-left
//! - +X right, +Y down (the default projection flips Y)

mod bounds;
mod viewport;

pub use bounds::Bounds3;
pub use viewport::Viewport;
