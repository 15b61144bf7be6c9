use std::sync::atomic::{AtomicU64, Ordering};

use glam::{Mat4, Quat, Vec2, Vec3};

use super::{EndMode, ShapeKind, StrokeCap, StrokeExtra, Vertex};
use crate::geom::stroke::{stroke_point, stroke_polyline, stroke_segment, StrokePoint};
use crate::geom::{project_to_plane, triangulate, Mesh};
use crate::image::TextureRef;
use crate::paint::Color;

static REVISION: AtomicU64 = AtomicU64::new(1);

/// Next value of the process-wide mutation stamp. Strictly increasing.
pub(crate) fn next_revision() -> u64 {
    REVISION.fetch_add(1, Ordering::Relaxed)
}

/// Current drawing style, captured into each vertex as it is emitted.
#[derive(Debug, Clone, PartialEq)]
pub struct Style {
    pub fill: Option<Color>,
    pub stroke: Option<Color>,
    pub stroke_weight: f32,
    pub cap: StrokeCap,
    pub normal: Vec3,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            fill: Some(Color::WHITE),
            stroke: Some(Color::BLACK),
            stroke_weight: 1.0,
            cap: StrokeCap::Round,
            normal: Vec3::Z,
        }
    }
}

/// A leaf shape: vertex loop(s), style, and local transform.
///
/// Built with `begin` / `vertex*` / `end`. `end` computes fill indices; stroke
/// geometry is synthesized on demand by [`Shape::tessellate_stroke`].
#[derive(Debug, Clone)]
pub struct Shape {
    kind: ShapeKind,
    end_mode: EndMode,
    vertices: Vec<Vertex>,
    stroke: Vec<StrokeExtra>,
    indices: Vec<u32>,
    transform: Mat4,
    texture: Option<TextureRef>,
    style: Style,
    building: bool,
    in_contour: bool,
    fallbacks: usize,
    revision: u64,
}

impl Default for Shape {
    fn default() -> Self {
        Self {
            kind: ShapeKind::polygon(),
            end_mode: EndMode::Open,
            vertices: Vec::new(),
            stroke: Vec::new(),
            indices: Vec::new(),
            transform: Mat4::IDENTITY,
            texture: None,
            style: Style::default(),
            building: false,
            in_contour: false,
            fallbacks: 0,
            revision: next_revision(),
        }
    }
}

impl Shape {
    pub fn new() -> Self {
        Self::default()
    }

    /// Axis-aligned rectangle as a closed convex polygon.
    pub fn rect(x: f32, y: f32, w: f32, h: f32) -> Self {
        let mut s = Self::new();
        s.begin(ShapeKind::ConvexPolygon);
        s.vertex_uv(x, y, 0.0, 0.0);
        s.vertex_uv(x + w, y, 1.0, 0.0);
        s.vertex_uv(x + w, y + h, 1.0, 1.0);
        s.vertex_uv(x, y + h, 0.0, 1.0);
        s.end(EndMode::Close);
        s
    }

    /// Ellipse centered on `(cx, cy)`, approximated by a closed convex polygon.
    pub fn ellipse(cx: f32, cy: f32, w: f32, h: f32) -> Self {
        let (rx, ry) = (w * 0.5, h * 0.5);
        let segments = crate::geom::stroke::circle_segments(rx.max(ry)).max(16);
        let mut s = Self::new();
        s.begin(ShapeKind::ConvexPolygon);
        for k in 0..segments {
            let a = std::f32::consts::TAU * k as f32 / segments as f32;
            let (sin, cos) = a.sin_cos();
            s.vertex_uv(cx + rx * cos, cy + ry * sin, 0.5 + 0.5 * cos, 0.5 + 0.5 * sin);
        }
        s.end(EndMode::Close);
        s
    }

    // ── building ──────────────────────────────────────────────────────────

    /// Resets geometry and starts a new vertex sequence. Style and transform
    /// are kept.
    pub fn begin(&mut self, kind: ShapeKind) {
        self.kind = kind;
        self.end_mode = EndMode::Open;
        self.vertices.clear();
        self.stroke.clear();
        self.indices.clear();
        self.fallbacks = 0;
        self.in_contour = false;
        self.building = true;
        self.touch();
    }

    pub fn vertex(&mut self, x: f32, y: f32) {
        self.push_vertex(Vec3::new(x, y, 0.0), Vec2::ZERO);
    }

    pub fn vertex_3d(&mut self, x: f32, y: f32, z: f32) {
        self.push_vertex(Vec3::new(x, y, z), Vec2::ZERO);
    }

    pub fn vertex_uv(&mut self, x: f32, y: f32, u: f32, v: f32) {
        self.push_vertex(Vec3::new(x, y, 0.0), Vec2::new(u, v));
    }

    pub fn vertex_3d_uv(&mut self, x: f32, y: f32, z: f32, u: f32, v: f32) {
        self.push_vertex(Vec3::new(x, y, z), Vec2::new(u, v));
    }

    /// Starts a hole contour. Only valid on a `Polygon` under construction.
    pub fn begin_contour(&mut self) {
        assert!(self.building, "begin_contour outside begin/end");
        assert!(!self.in_contour, "begin_contour called twice without end_contour");
        let ShapeKind::Polygon { contours } = &mut self.kind else {
            panic!("contours are only supported on Polygon shapes, not {:?}", self.kind);
        };
        if !self.vertices.is_empty() {
            contours.push(self.vertices.len());
        }
        self.in_contour = true;
    }

    pub fn end_contour(&mut self) {
        assert!(self.in_contour, "end_contour without begin_contour");
        self.in_contour = false;
    }

    /// Finishes the vertex sequence and computes fill indices.
    ///
    /// Panics if a `Triangles` shape has a vertex count that is not a multiple
    /// of 3, or a `Quads` shape one that is not a multiple of 4.
    pub fn end(&mut self, mode: EndMode) {
        assert!(self.building, "end called without begin");
        self.in_contour = false;
        self.building = false;
        self.end_mode = mode;
        self.build_indices();
        if self.fallbacks > 0 {
            log::debug!(
                "shape: {} of {} fill triangles clipped without a valid ear",
                self.fallbacks,
                self.indices.len() / 3
            );
        }
        self.touch();
    }

    fn push_vertex(&mut self, pos: Vec3, uv: Vec2) {
        assert!(self.building, "vertex emitted outside begin/end");
        let fill = self.style.fill.unwrap_or(Color::TRANSPARENT);
        let stroke = self.style.stroke.unwrap_or(Color::TRANSPARENT);
        self.vertices.push(Vertex::new(pos, self.style.normal, uv, fill));
        self.stroke.push(StrokeExtra::new(stroke, self.style.stroke_weight));
    }

    // ── style ─────────────────────────────────────────────────────────────

    pub fn fill(&mut self, color: Color) {
        self.style.fill = Some(color);
        self.touch();
    }

    pub fn no_fill(&mut self) {
        self.style.fill = None;
        self.touch();
    }

    pub fn stroke(&mut self, color: Color) {
        self.style.stroke = Some(color);
        self.touch();
    }

    pub fn no_stroke(&mut self) {
        self.style.stroke = None;
        self.touch();
    }

    pub fn stroke_weight(&mut self, weight: f32) {
        self.style.stroke_weight = weight.max(0.0);
        self.touch();
    }

    pub fn stroke_cap(&mut self, cap: StrokeCap) {
        self.style.cap = cap;
        self.touch();
    }

    /// Normal attached to subsequently emitted vertices.
    pub fn normal(&mut self, n: Vec3) {
        self.style.normal = n.normalize_or(Vec3::Z);
    }

    pub fn texture(&mut self, texture: Option<TextureRef>) {
        self.texture = texture;
        self.touch();
    }

    // ── editing ───────────────────────────────────────────────────────────

    /// Moves vertex `i`. Polygons are re-triangulated.
    pub fn set_vertex(&mut self, i: usize, pos: Vec3) {
        self.vertices[i].position = pos.to_array();
        if !self.building && matches!(self.kind, ShapeKind::Polygon { .. }) {
            self.build_indices();
        }
        self.touch();
    }

    pub fn set_fill_at(&mut self, i: usize, color: Color) {
        self.vertices[i].color = color.to_array();
        self.touch();
    }

    /// Recolors every vertex and makes the shape filled.
    pub fn set_fill_all(&mut self, color: Color) {
        for v in &mut self.vertices {
            v.color = color.to_array();
        }
        self.style.fill = Some(color);
        self.touch();
    }

    /// Recolors every stroke point and makes the shape stroked.
    pub fn set_stroke_all(&mut self, color: Color) {
        for s in &mut self.stroke {
            s.color = color;
        }
        self.style.stroke = Some(color);
        self.touch();
    }

    pub fn set_stroke_weight_all(&mut self, weight: f32) {
        for s in &mut self.stroke {
            s.weight = weight.max(0.0);
        }
        self.style.stroke_weight = weight.max(0.0);
        self.touch();
    }

    pub fn set_transform(&mut self, m: Mat4) {
        self.transform = m;
        self.touch();
    }

    pub fn reset_transform(&mut self) {
        self.set_transform(Mat4::IDENTITY);
    }

    pub fn translate(&mut self, t: Vec3) {
        self.set_transform(self.transform * Mat4::from_translation(t));
    }

    /// Rotation about +Z, the 2D rotation.
    pub fn rotate(&mut self, angle: f32) {
        self.set_transform(self.transform * Mat4::from_rotation_z(angle));
    }

    pub fn rotate_axis(&mut self, axis: Vec3, angle: f32) {
        let q = Quat::from_axis_angle(axis.normalize_or(Vec3::Z), angle);
        self.set_transform(self.transform * Mat4::from_quat(q));
    }

    pub fn scale(&mut self, s: Vec3) {
        self.set_transform(self.transform * Mat4::from_scale(s));
    }

    fn touch(&mut self) {
        self.revision = next_revision();
    }

    // ── accessors ─────────────────────────────────────────────────────────

    #[inline]
    pub fn kind(&self) -> &ShapeKind {
        &self.kind
    }

    #[inline]
    pub fn end_mode(&self) -> EndMode {
        self.end_mode
    }

    #[inline]
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    #[inline]
    pub fn stroke_extras(&self) -> &[StrokeExtra] {
        &self.stroke
    }

    #[inline]
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    pub fn transform(&self) -> Mat4 {
        self.transform
    }

    #[inline]
    pub fn texture_ref(&self) -> Option<&TextureRef> {
        self.texture.as_ref()
    }

    #[inline]
    pub fn style(&self) -> &Style {
        &self.style
    }

    #[inline]
    pub fn is_building(&self) -> bool {
        self.building
    }

    /// Fill triangles emitted without a valid ear during the last build.
    #[inline]
    pub fn fallbacks(&self) -> usize {
        self.fallbacks
    }

    #[inline]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// True if the fill triangles should be drawn.
    pub fn draws_fill(&self) -> bool {
        !self.building && self.style.fill.is_some() && !self.indices.is_empty()
    }

    /// True if the stroke should be drawn.
    pub fn draws_stroke(&self) -> bool {
        !self.building && self.style.stroke.is_some() && !self.vertices.is_empty()
    }

    // ── tessellation ──────────────────────────────────────────────────────

    fn build_indices(&mut self) {
        let n = self.vertices.len();
        self.indices.clear();
        self.fallbacks = 0;

        match &self.kind {
            ShapeKind::Points | ShapeKind::Lines => {}
            ShapeKind::ConvexPolygon | ShapeKind::TriangleFan => {
                for i in 1..n.saturating_sub(1) as u32 {
                    self.indices.extend_from_slice(&[0, i, i + 1]);
                }
            }
            ShapeKind::Triangles => {
                assert!(n % 3 == 0, "Triangles shape has {n} vertices, expected a multiple of 3");
                self.indices.extend(0..n as u32);
            }
            ShapeKind::Quads => {
                assert!(n % 4 == 0, "Quads shape has {n} vertices, expected a multiple of 4");
                for q in (0..n as u32).step_by(4) {
                    self.indices.extend_from_slice(&[q, q + 1, q + 2, q, q + 2, q + 3]);
                }
            }
            ShapeKind::TriangleStrip => strip_indices(n, &mut self.indices),
            ShapeKind::QuadStrip => strip_indices(n & !1, &mut self.indices),
            ShapeKind::Polygon { contours } => {
                let positions: Vec<Vec3> = self.vertices.iter().map(Vertex::pos).collect();
                let t = triangulate(&project_to_plane(&positions), contours);
                self.fallbacks = t.fallbacks;
                self.indices = t.indices;
            }
        }
    }

    /// Appends this shape's stroke geometry, in local space, to `out`.
    pub fn tessellate_stroke(&self, out: &mut Mesh) {
        if !self.draws_stroke() {
            return;
        }

        let pts: Vec<StrokePoint> = self
            .vertices
            .iter()
            .zip(&self.stroke)
            .map(|(v, s)| StrokePoint::new(v.pos(), *s))
            .collect();
        let n = pts.len();
        let cap = self.style.cap;
        let closed = self.end_mode == EndMode::Close;

        match &self.kind {
            ShapeKind::Points => {
                for p in &pts {
                    stroke_point(p, out);
                }
            }
            ShapeKind::Lines => {
                for pair in pts.chunks_exact(2) {
                    stroke_segment(pair[0], pair[1], cap, out);
                }
            }
            ShapeKind::Polygon { contours } => {
                let mut start = 0;
                for &end in contours.iter().chain(std::iter::once(&n)) {
                    if end > start {
                        stroke_polyline(&pts[start..end], closed, cap, out);
                    }
                    start = end;
                }
            }
            ShapeKind::ConvexPolygon | ShapeKind::TriangleFan => {
                stroke_polyline(&pts, closed, cap, out);
            }
            ShapeKind::Triangles => {
                for tri in pts.chunks_exact(3) {
                    stroke_polyline(tri, true, cap, out);
                }
            }
            ShapeKind::Quads => {
                for quad in pts.chunks_exact(4) {
                    stroke_polyline(quad, true, cap, out);
                }
            }
            ShapeKind::TriangleStrip => {
                for i in 0..n.saturating_sub(2) {
                    stroke_polyline(&pts[i..i + 3], true, cap, out);
                }
            }
            ShapeKind::QuadStrip => {
                for i in (0..n.saturating_sub(3)).step_by(2) {
                    let quad = [pts[i], pts[i + 1], pts[i + 3], pts[i + 2]];
                    stroke_polyline(&quad, true, cap, out);
                }
            }
        }
    }
}

/// Triangle-strip indices with alternating winding so every triangle keeps
/// the orientation of the first.
fn strip_indices(n: usize, out: &mut Vec<u32>) {
    for i in 0..n.saturating_sub(2) as u32 {
        if i % 2 == 0 {
            out.extend_from_slice(&[i, i + 1, i + 2]);
        } else {
            out.extend_from_slice(&[i + 1, i, i + 2]);
        }
    }
}
