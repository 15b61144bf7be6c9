use glam::{Mat3, Mat4, Vec3};

use super::group::{BufferGroup, MAX_VERTICES};
use crate::coords::Bounds3;
use crate::geom::Mesh;
use crate::image::TextureRef;
use crate::shape::{Node, Shape, ShapeNode, Vertex};

/// Ordered set of buffer groups accumulated from shape trees.
///
/// Triangles come out in traversal order; there is no depth sort.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    groups: Vec<BufferGroup>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.groups.clear();
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.groups.iter().all(BufferGroup::is_empty)
    }

    #[inline]
    pub fn groups(&self) -> &[BufferGroup] {
        &self.groups
    }

    #[inline]
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn into_groups(self) -> Vec<BufferGroup> {
        self.groups
    }

    pub fn vertex_count(&self) -> usize {
        self.groups.iter().map(|g| g.vertices.len()).sum()
    }

    pub fn index_count(&self) -> usize {
        self.groups.iter().map(|g| g.indices.len()).sum()
    }

    /// World-space bounds, with each vertex placed by its transform slot.
    pub fn bounds(&self) -> Bounds3 {
        let mut b = Bounds3::empty();
        for g in &self.groups {
            for v in &g.vertices {
                let m = g
                    .transforms
                    .get(v.transform_index as usize)
                    .copied()
                    .unwrap_or(Mat4::IDENTITY);
                b.include(m.transform_point3(v.pos()));
            }
        }
        b
    }

    /// Appends the triangles of `node` and its subtree.
    ///
    /// `parent` is composed with each node's local transform. With `bake`, the
    /// composed transform is applied to positions and normals here and the
    /// vertices use an identity slot; otherwise it is stored in a transform
    /// slot and applied on the GPU.
    pub fn flatten(&mut self, node: &ShapeNode, parent: Mat4, bake: bool) {
        match &*node.read() {
            Node::Shape(shape) => self.push_shape(shape, parent * shape.transform(), bake),
            Node::Group(group) => {
                let m = parent * group.transform();
                for child in group.children() {
                    self.flatten(child, m, bake);
                }
            }
        }
    }

    /// Appends an already built batch, placing it under `transform`.
    ///
    /// Its groups are appended whole, not merged into the current one.
    pub fn append(&mut self, other: &Batch, transform: Mat4) {
        for g in other.groups.iter().filter(|g| !g.is_empty()) {
            let mut g = g.clone();
            if transform != Mat4::IDENTITY {
                for t in &mut g.transforms {
                    *t = transform * *t;
                }
            }
            self.groups.push(g);
        }
    }

    /// Appends one shape's fill and stroke under the world transform `world`.
    ///
    /// Panics if the shape alone needs more vertices than a buffer group holds.
    pub fn push_shape(&mut self, shape: &Shape, world: Mat4, bake: bool) {
        let fill = shape.draws_fill() && shape.kind().has_fill();
        let mut stroke = Mesh::new();
        shape.tessellate_stroke(&mut stroke);

        let fill_count = if fill { shape.vertex_count() } else { 0 };
        let total = fill_count + stroke.vertices.len();
        if total == 0 {
            return;
        }
        assert!(
            total <= MAX_VERTICES,
            "a single shape needs {total} vertices; a buffer group holds at most {MAX_VERTICES}"
        );

        let white = TextureRef::white();
        let fill_tex = shape.texture_ref().cloned().unwrap_or_else(TextureRef::white);
        let mut needed = Vec::with_capacity(2);
        if fill {
            needed.push(fill_tex.clone());
        }
        if !stroke.is_empty() && !needed.iter().any(|t| t.id == white.id) {
            needed.push(white.clone());
        }

        let slot_transform = if bake { Mat4::IDENTITY } else { world };
        let normal_matrix = normal_matrix(world);
        let bake_vertex = |mut v: Vertex| {
            if bake {
                v.position = world.transform_point3(v.pos()).to_array();
                let n = normal_matrix * Vec3::from_array(v.normal);
                v.normal = n.normalize_or(Vec3::Z).to_array();
            }
            v
        };

        let gi = self.reserve_group(total, &slot_transform, &needed);
        let group = &mut self.groups[gi];
        let t_slot = group.ensure_transform(slot_transform);

        if fill {
            let unit = group.ensure_texture(&fill_tex);
            group.push_mesh(shape.vertices(), shape.indices(), |v| {
                let mut v = bake_vertex(v);
                v.uv = fill_tex.map_uv(glam::Vec2::from_array(v.uv)).to_array();
                v.texture_unit = unit;
                v.transform_index = t_slot;
                v
            });
        }
        if !stroke.is_empty() {
            let unit = group.ensure_texture(&white);
            group.push_mesh(&stroke.vertices, &stroke.indices, |v| {
                let mut v = bake_vertex(v);
                v.texture_unit = unit;
                v.transform_index = t_slot;
                v
            });
        }
    }

    /// Index of a group that can take `vertex_count` more vertices and the
    /// given slots, opening a fresh one when the current group is full.
    fn reserve_group(
        &mut self,
        vertex_count: usize,
        transform: &Mat4,
        textures: &[TextureRef],
    ) -> usize {
        if let Some(last) = self.groups.last() {
            if last.can_accept(vertex_count, transform, textures) {
                return self.groups.len() - 1;
            }
            log::debug!(
                "batch: group {} full ({} vertices, {} transforms, {} textures); opening another",
                self.groups.len() - 1,
                last.vertices.len(),
                last.transforms.len(),
                last.textures.len()
            );
        }
        self.groups.push(BufferGroup::new());
        self.groups.len() - 1
    }
}

/// Inverse-transpose of the upper 3x3, falling back to the plain 3x3 for
/// singular transforms.
fn normal_matrix(m: Mat4) -> Mat3 {
    let m3 = Mat3::from_mat4(m);
    if m3.determinant().abs() <= f32::EPSILON {
        m3
    } else {
        m3.inverse().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{MAX_TEXTURES, MAX_TRANSFORMS};
    use crate::image::TextureId;
    use crate::shape::{EndMode, ShapeKind};

    fn filled_only(mut s: Shape) -> Shape {
        s.no_stroke();
        s
    }

    fn disc(vertices: usize) -> Shape {
        let mut s = Shape::new();
        s.no_stroke();
        s.begin(ShapeKind::ConvexPolygon);
        for k in 0..vertices {
            let a = std::f32::consts::TAU * k as f32 / vertices as f32;
            s.vertex(a.cos(), a.sin());
        }
        s.end(EndMode::Close);
        s
    }

    fn assert_local_indices(batch: &Batch) {
        for g in batch.groups() {
            assert!(g.vertices().len() <= MAX_VERTICES);
            assert!(g.transforms().len() <= MAX_TRANSFORMS);
            assert!(g.textures().len() <= MAX_TEXTURES);
            assert!(g.indices().iter().all(|&i| (i as usize) < g.vertices().len()));
            for v in g.vertices() {
                assert!((v.transform_index as usize) < g.transforms().len());
                assert!((v.texture_unit as usize) < g.textures().len());
            }
        }
    }

    // ── capacity ──────────────────────────────────────────────────────────

    #[test]
    fn vertex_overflow_opens_a_new_group() {
        let mut batch = Batch::new();
        let shape = disc(256);
        for _ in 0..300 {
            batch.push_shape(&shape, Mat4::IDENTITY, false);
        }
        assert_eq!(batch.vertex_count(), 300 * 256);
        assert!(batch.group_count() >= 2);
        // 65536 / 256 shapes fit exactly in the first group.
        assert_eq!(batch.groups()[0].vertices().len(), MAX_VERTICES);
        assert_eq!(batch.groups()[1].vertices().len(), (300 - 256) * 256);
        assert_local_indices(&batch);

        // Second group starts from zero again.
        assert_eq!(batch.groups()[1].indices()[0], 0);
    }

    #[test]
    fn seventeenth_transform_opens_a_new_group() {
        let mut batch = Batch::new();
        let shape = filled_only(Shape::rect(0.0, 0.0, 1.0, 1.0));
        for i in 0..=MAX_TRANSFORMS {
            batch.push_shape(&shape, Mat4::from_translation(Vec3::new(i as f32, 0.0, 0.0)), false);
        }
        assert_eq!(batch.group_count(), 2);
        assert_eq!(batch.groups()[0].transforms().len(), MAX_TRANSFORMS);
        // The new group is seeded with the overflowing transform as slot 0.
        let shifted = Mat4::from_translation(Vec3::new(16.0, 0.0, 0.0));
        assert_eq!(batch.groups()[1].transforms()[0], shifted);
        assert_local_indices(&batch);
    }

    #[test]
    fn texture_overflow_opens_a_new_group() {
        let mut batch = Batch::new();
        for layer in 1..=MAX_TEXTURES as u32 {
            let mut s = filled_only(Shape::rect(0.0, 0.0, 1.0, 1.0));
            s.texture(Some(TextureRef::atlas(layer, [0.0, 0.0, 1.0, 1.0], (1, 1))));
            batch.push_shape(&s, Mat4::IDENTITY, true);
        }
        assert_eq!(batch.group_count(), 1);

        let mut s = Shape::rect(0.0, 0.0, 1.0, 1.0);
        s.texture(Some(TextureRef::atlas(99, [0.0, 0.0, 1.0, 1.0], (1, 1))));
        batch.push_shape(&s, Mat4::IDENTITY, true);
        assert_eq!(batch.group_count(), 2);
        assert_eq!(batch.groups()[1].textures()[0].id, TextureId::AtlasLayer(99));
        assert_local_indices(&batch);
    }

    #[test]
    #[should_panic(expected = "a single shape needs")]
    fn oversized_shape_is_fatal() {
        let mut batch = Batch::new();
        batch.push_shape(&disc(MAX_VERTICES + 1), Mat4::IDENTITY, true);
    }

    // ── content ───────────────────────────────────────────────────────────

    #[test]
    fn stroke_uses_the_white_texel() {
        let mut batch = Batch::new();
        let mut s = Shape::rect(0.0, 0.0, 4.0, 4.0);
        s.texture(Some(TextureRef::atlas(2, [0.5, 0.5, 1.0, 1.0], (8, 8))));
        batch.push_shape(&s, Mat4::IDENTITY, true);

        let g = &batch.groups()[0];
        assert_eq!(g.textures().len(), 2);
        let fill = &g.vertices()[..4];
        let stroke = &g.vertices()[4..];
        assert_eq!(fill[2].uv, [1.0, 1.0]);
        assert_eq!(fill[0].uv, [0.5, 0.5]);
        assert!(stroke.iter().all(|v| v.uv == [0.0, 0.0]));
        assert_ne!(fill[0].texture_unit, stroke[0].texture_unit);
    }

    #[test]
    fn baking_moves_vertices() {
        let mut batch = Batch::new();
        let s = filled_only(Shape::rect(0.0, 0.0, 1.0, 1.0));
        batch.push_shape(&s, Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0)), true);
        let g = &batch.groups()[0];
        assert_eq!(g.transforms(), &[Mat4::IDENTITY]);
        assert_eq!(g.vertices()[0].position, [10.0, 0.0, 0.0]);
    }

    #[test]
    fn flatten_composes_group_transforms() {
        let root = ShapeNode::group();
        root.set_transform(Mat4::from_translation(Vec3::new(100.0, 0.0, 0.0)));
        let child = ShapeNode::shape(filled_only(Shape::rect(0.0, 0.0, 1.0, 1.0)));
        child.set_transform(Mat4::from_scale(Vec3::splat(2.0)));
        root.add_child(child);

        let mut batch = Batch::new();
        batch.flatten(&root, Mat4::IDENTITY, false);
        let b = batch.bounds();
        assert_eq!(b.min, Vec3::new(100.0, 0.0, 0.0));
        assert_eq!(b.max, Vec3::new(102.0, 2.0, 0.0));
    }

    #[test]
    fn compiled_and_direct_flatten_agree() {
        let root = ShapeNode::group();
        root.set_transform(Mat4::from_rotation_z(0.3));
        for i in 0..5 {
            let leaf = ShapeNode::shape(Shape::ellipse(i as f32 * 20.0, 5.0, 10.0, 6.0));
            leaf.set_transform(Mat4::from_translation(Vec3::new(0.0, i as f32, 0.0)));
            root.add_child(leaf);
        }

        let mut direct = Batch::new();
        direct.flatten(&root, Mat4::IDENTITY, false);

        let compiled = root.compile().expect("group compiles");
        let mut frame = Batch::new();
        frame.append(compiled.batch(), Mat4::IDENTITY);

        assert_eq!(direct.vertex_count(), frame.vertex_count());
        assert!(direct.bounds().approx_eq(frame.bounds(), 1e-3));
    }

    #[test]
    fn append_applies_the_placement_transform() {
        let root = ShapeNode::group();
        root.add_child(filled_only(Shape::rect(0.0, 0.0, 1.0, 1.0)));
        let compiled = root.compile().expect("group compiles");

        let mut frame = Batch::new();
        frame.append(compiled.batch(), Mat4::from_translation(Vec3::new(0.0, 50.0, 0.0)));
        assert_eq!(frame.bounds().min, Vec3::new(0.0, 50.0, 0.0));
    }
}
