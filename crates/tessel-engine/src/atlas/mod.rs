//! Texture atlas: many small images packed into a few shared texture layers.
//!
//! Allocation only; there is no growth and no eviction. Layer 0 starts with
//! its top-left texel reserved for the opaque white default.

mod block;
mod manager;

pub use block::AtlasBlock;
pub use manager::{AtlasConfig, AtlasError, TextureAtlasManager};
