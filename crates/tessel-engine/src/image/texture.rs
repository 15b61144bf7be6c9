use std::fmt;
use std::sync::Arc;

use glam::Vec2;

use crate::render::GpuImage;

/// Identity of a GPU texture a vertex can sample from.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum TextureId {
    /// One layer of the shared atlas.
    AtlasLayer(u32),
    /// A standalone texture owned by a [`GpuImage`].
    Image(u64),
}

impl TextureId {
    /// Atlas layer 0 holds the opaque white texel used by untextured geometry.
    pub const WHITE: TextureId = TextureId::AtlasLayer(0);
}

/// A texture plus the sub-rectangle of it an image occupies.
///
/// `uv` is `[u0, v0, u1, v1]` in normalized texture space. Shape texture
/// coordinates in `[0, 1]` are mapped into this rectangle when batched.
#[derive(Clone)]
pub struct TextureRef {
    pub id: TextureId,
    pub uv: [f32; 4],
    pub size: (u32, u32),
    /// Keeps a standalone GPU texture alive while anything refers to it.
    pub(crate) owner: Option<Arc<GpuImage>>,
}

impl TextureRef {
    /// The white default: every coordinate maps to texel (0, 0) of layer 0.
    pub fn white() -> Self {
        Self {
            id: TextureId::WHITE,
            uv: [0.0; 4],
            size: (1, 1),
            owner: None,
        }
    }

    pub(crate) fn atlas(layer: u32, uv: [f32; 4], size: (u32, u32)) -> Self {
        Self { id: TextureId::AtlasLayer(layer), uv, size, owner: None }
    }

    pub(crate) fn image(owner: Arc<GpuImage>) -> Self {
        Self {
            id: TextureId::Image(owner.id()),
            uv: [0.0, 0.0, 1.0, 1.0],
            size: owner.size(),
            owner: Some(owner),
        }
    }

    #[inline]
    pub fn is_white(&self) -> bool {
        self.id == TextureId::WHITE && self.uv == [0.0; 4]
    }

    /// Maps a shape-space texture coordinate into this texture.
    #[inline]
    pub fn map_uv(&self, uv: Vec2) -> Vec2 {
        let [u0, v0, u1, v1] = self.uv;
        Vec2::new(u0 + (u1 - u0) * uv.x, v0 + (v1 - v0) * uv.y)
    }
}

impl PartialEq for TextureRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.uv == other.uv
    }
}

impl fmt::Debug for TextureRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextureRef")
            .field("id", &self.id)
            .field("uv", &self.uv)
            .field("size", &self.size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn white_maps_everything_to_origin() {
        let w = TextureRef::white();
        assert_eq!(w.map_uv(Vec2::new(0.7, 0.3)), Vec2::ZERO);
        assert!(w.is_white());
    }

    #[test]
    fn atlas_rect_is_interpolated() {
        let t = TextureRef::atlas(2, [0.5, 0.25, 0.75, 0.5], (16, 16));
        assert_eq!(t.map_uv(Vec2::new(0.0, 0.0)), Vec2::new(0.5, 0.25));
        assert_eq!(t.map_uv(Vec2::new(1.0, 1.0)), Vec2::new(0.75, 0.5));
        assert_eq!(t.map_uv(Vec2::new(0.5, 0.5)), Vec2::new(0.625, 0.375));
    }
}
