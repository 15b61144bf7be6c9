//! CPU pixel buffers and references to GPU-resident textures.

mod pixels;
mod texture;

pub use pixels::PixelBuffer;
pub(crate) use pixels::{premultiply, unpremultiply};
pub use texture::{TextureId, TextureRef};
