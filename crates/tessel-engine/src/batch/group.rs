use glam::Mat4;

use crate::image::TextureRef;
use crate::shape::Vertex;

/// Vertices addressable by a 16-bit index.
pub const MAX_VERTICES: usize = 1 << 16;
pub const MAX_TRANSFORMS: usize = 16;
pub const MAX_TEXTURES: usize = 16;

/// One drawable unit of a batch.
///
/// Invariants: indices only reference this group's vertices, and every
/// vertex's `transform_index` / `texture_unit` is a valid slot here.
#[derive(Debug, Clone, Default)]
pub struct BufferGroup {
    pub(crate) vertices: Vec<Vertex>,
    pub(crate) indices: Vec<u16>,
    pub(crate) transforms: Vec<Mat4>,
    pub(crate) textures: Vec<TextureRef>,
}

impl BufferGroup {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    #[inline]
    pub fn indices(&self) -> &[u16] {
        &self.indices
    }

    #[inline]
    pub fn transforms(&self) -> &[Mat4] {
        &self.transforms
    }

    #[inline]
    pub fn textures(&self) -> &[TextureRef] {
        &self.textures
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// True if `vertex_count` more vertices plus the given slots fit.
    pub fn can_accept(
        &self,
        vertex_count: usize,
        transform: &Mat4,
        textures: &[TextureRef],
    ) -> bool {
        if self.vertices.len() + vertex_count > MAX_VERTICES {
            return false;
        }
        if !self.transforms.contains(transform) && self.transforms.len() >= MAX_TRANSFORMS {
            return false;
        }
        let new_textures = textures
            .iter()
            .enumerate()
            .filter(|(i, t)| {
                self.texture_slot(t).is_none() && !textures[..*i].iter().any(|u| u.id == t.id)
            })
            .count();
        self.textures.len() + new_textures <= MAX_TEXTURES
    }

    /// Slot of `m`, adding it if absent. Caller checks capacity first.
    pub(crate) fn ensure_transform(&mut self, m: Mat4) -> u32 {
        if let Some(i) = self.transforms.iter().position(|t| *t == m) {
            return i as u32;
        }
        debug_assert!(self.transforms.len() < MAX_TRANSFORMS);
        self.transforms.push(m);
        (self.transforms.len() - 1) as u32
    }

    /// Slot of the texture behind `t`, adding it if absent. Slots are keyed by
    /// texture identity; sub-rectangles are resolved into vertex uvs.
    pub(crate) fn ensure_texture(&mut self, t: &TextureRef) -> u32 {
        if let Some(i) = self.texture_slot(t) {
            return i;
        }
        debug_assert!(self.textures.len() < MAX_TEXTURES);
        self.textures.push(t.clone());
        (self.textures.len() - 1) as u32
    }

    fn texture_slot(&self, t: &TextureRef) -> Option<u32> {
        self.textures.iter().position(|u| u.id == t.id).map(|i| i as u32)
    }

    /// Appends vertices and group-local indices. `map` rewrites each vertex.
    pub(crate) fn push_mesh(
        &mut self,
        vertices: &[Vertex],
        indices: &[u32],
        map: impl Fn(Vertex) -> Vertex,
    ) {
        let base = self.vertices.len();
        debug_assert!(base + vertices.len() <= MAX_VERTICES);
        self.vertices.extend(vertices.iter().copied().map(map));
        self.indices.extend(indices.iter().map(|&i| (base + i as usize) as u16));
    }
}

#[cfg(test)]
mod tests {
    use bytemuck::Zeroable;

    use super::*;
    use crate::image::TextureId;

    fn tex(layer: u32) -> TextureRef {
        TextureRef {
            id: TextureId::AtlasLayer(layer),
            uv: [0.0, 0.0, 1.0, 1.0],
            size: (1, 1),
            owner: None,
        }
    }

    #[test]
    fn slots_are_deduplicated() {
        let mut g = BufferGroup::new();
        let t = Mat4::from_translation(glam::Vec3::X);
        assert_eq!(g.ensure_transform(t), 0);
        assert_eq!(g.ensure_transform(Mat4::IDENTITY), 1);
        assert_eq!(g.ensure_transform(t), 0);

        let mut sub = tex(3);
        assert_eq!(g.ensure_texture(&sub), 0);
        sub.uv = [0.5, 0.5, 1.0, 1.0];
        assert_eq!(g.ensure_texture(&sub), 0, "same texture, different rect");
    }

    #[test]
    fn capacity_checks() {
        let mut g = BufferGroup::new();
        for i in 0..MAX_TRANSFORMS {
            g.ensure_transform(Mat4::from_translation(glam::Vec3::splat(i as f32)));
        }
        assert!(g.can_accept(3, &Mat4::from_translation(glam::Vec3::ZERO), &[]));
        assert!(!g.can_accept(3, &Mat4::from_scale(glam::Vec3::splat(2.0)), &[]));
        assert!(!g.can_accept(MAX_VERTICES + 1, &Mat4::ZERO, &[]));

        let mut g = BufferGroup::new();
        for i in 0..MAX_TEXTURES as u32 - 1 {
            g.ensure_texture(&tex(i));
        }
        assert!(g.can_accept(3, &Mat4::IDENTITY, &[tex(100)]));
        assert!(g.can_accept(3, &Mat4::IDENTITY, &[tex(100), tex(100)]));
        assert!(!g.can_accept(3, &Mat4::IDENTITY, &[tex(100), tex(101)]));
    }

    #[test]
    fn indices_are_rebased() {
        let mut g = BufferGroup::new();
        let v = [Vertex::zeroed(); 3];
        g.push_mesh(&v, &[0, 1, 2], |v| v);
        g.push_mesh(&v, &[0, 1, 2], |v| v);
        assert_eq!(g.indices(), &[0, 1, 2, 3, 4, 5]);
    }
}
