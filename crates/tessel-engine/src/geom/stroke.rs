//! Stroke synthesis: mitered polylines, end caps, and dots.
//!
//! Strokes are built in the XY plane of their shape; each point keeps its own
//! Z. All output vertices face +Z, use the white texel (uv 0) and carry the
//! stroke color of the point they were derived from.
//!
//! Joins always emit exactly one left/right vertex pair per polyline point, so
//! consecutive segments share their join vertices and closed rings have no
//! gaps.

use std::f32::consts::{PI, TAU};

use glam::{Vec2, Vec3};

use super::Mesh;
use crate::shape::{StrokeCap, StrokeExtra, Vertex};

/// Upper bound on mitre length, in multiples of the half weight.
///
/// Sharper joins are clipped to this length along the mitre direction.
pub const MITER_LIMIT: f32 = 4.0;

/// A polyline point with its stroke attributes.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct StrokePoint {
    pub pos: Vec3,
    pub extra: StrokeExtra,
}

impl StrokePoint {
    #[inline]
    pub const fn new(pos: Vec3, extra: StrokeExtra) -> Self {
        Self { pos, extra }
    }

    #[inline]
    fn xy(&self) -> Vec2 {
        self.pos.truncate()
    }
}

/// Offset from `cur` to the left edge of a stroke of half width `half`
/// joining `prev → cur → next`. The right edge is the negation.
///
/// The length grows as `half / cos(turn / 2)` and is clamped to
/// `[half, half * MITER_LIMIT]`.
pub fn miter_offset(prev: Vec2, cur: Vec2, next: Vec2, half: f32) -> Vec2 {
    let d0 = (cur - prev).normalize_or_zero();
    let d1 = (next - cur).normalize_or_zero();
    if d0 == Vec2::ZERO {
        return d1.perp() * half;
    }
    if d1 == Vec2::ZERO {
        return d0.perp() * half;
    }

    let n0 = d0.perp();
    let sum = n0 + d1.perp();
    if sum.length_squared() < 1e-8 {
        // Full reversal: the mitre direction is undefined.
        return n0 * half;
    }

    let m = sum.normalize();
    let cos = m.dot(n0).max(f32::EPSILON);
    m * (half / cos).clamp(half, half * MITER_LIMIT)
}

/// Appends the stroke of a polyline to `out`.
///
/// One point degrades to a dot, two points (or a two-point loop) to a capped
/// segment. `cap` only applies to open polylines.
pub fn stroke_polyline(points: &[StrokePoint], closed: bool, cap: StrokeCap, out: &mut Mesh) {
    let mut pts: Vec<StrokePoint> = Vec::with_capacity(points.len());
    for p in points {
        if pts.last().is_none_or(|q| q.pos != p.pos) {
            pts.push(*p);
        }
    }
    if closed && pts.len() > 1 && pts[0].pos == pts[pts.len() - 1].pos {
        pts.pop();
    }
    if pts.iter().all(|p| p.extra.half_weight() <= 0.0) {
        return;
    }

    match pts.len() {
        0 => {}
        1 => stroke_point(&pts[0], out),
        2 => stroke_open(&mut pts, cap, out),
        _ if closed => stroke_closed(&pts, out),
        _ => stroke_open(&mut pts, cap, out),
    }
}

/// Appends a single capped segment.
pub fn stroke_segment(a: StrokePoint, b: StrokePoint, cap: StrokeCap, out: &mut Mesh) {
    stroke_polyline(&[a, b], false, cap, out);
}

/// Appends a filled circle of stroke-weight diameter centered on `p`.
pub fn stroke_point(p: &StrokePoint, out: &mut Mesh) {
    let r = p.extra.half_weight();
    if r <= 0.0 {
        return;
    }
    let segments = circle_segments(r);
    let z = p.pos.z;
    let color = p.extra.color;

    let center = out.push_vertex(stroke_vertex(p.xy(), z, color));
    let first = center + 1;
    for k in 0..segments {
        let a = TAU * k as f32 / segments as f32;
        out.push_vertex(stroke_vertex(p.xy() + Vec2::from_angle(a) * r, z, color));
    }
    for k in 0..segments as u32 {
        let next = (k + 1) % segments as u32;
        out.push_triangle(center, first + k, first + next);
    }
}

/// Number of rim segments for a full circle of radius `r` (pixels).
pub fn circle_segments(r: f32) -> usize {
    ((TAU * r / 2.0).ceil() as usize).clamp(8, 64)
}

// ── polylines ─────────────────────────────────────────────────────────────

fn stroke_closed(pts: &[StrokePoint], out: &mut Mesh) {
    let n = pts.len();
    let base = out.vertices.len() as u32;

    for i in 0..n {
        let prev = pts[(i + n - 1) % n].xy();
        let next = pts[(i + 1) % n].xy();
        push_pair(&pts[i], miter_offset(prev, pts[i].xy(), next, pts[i].extra.half_weight()), out);
    }
    for i in 0..n {
        push_quad(out, base, i, (i + 1) % n);
    }
}

fn stroke_open(pts: &mut [StrokePoint], cap: StrokeCap, out: &mut Mesh) {
    let n = pts.len();
    let start_dir = (pts[1].xy() - pts[0].xy()).normalize_or_zero();
    let end_dir = (pts[n - 1].xy() - pts[n - 2].xy()).normalize_or_zero();

    if cap == StrokeCap::Project {
        let h0 = pts[0].extra.half_weight();
        let h1 = pts[n - 1].extra.half_weight();
        pts[0].pos -= (start_dir * h0).extend(0.0);
        pts[n - 1].pos += (end_dir * h1).extend(0.0);
    }

    let base = out.vertices.len() as u32;
    for i in 0..n {
        let half = pts[i].extra.half_weight();
        let offset = if i == 0 {
            start_dir.perp() * half
        } else if i == n - 1 {
            end_dir.perp() * half
        } else {
            miter_offset(pts[i - 1].xy(), pts[i].xy(), pts[i + 1].xy(), half)
        };
        push_pair(&pts[i], offset, out);
    }
    for i in 0..n - 1 {
        push_quad(out, base, i, i + 1);
    }

    if cap == StrokeCap::Round {
        half_disc(&pts[0], -start_dir, out);
        half_disc(&pts[n - 1], end_dir, out);
    }
}

fn push_pair(p: &StrokePoint, offset: Vec2, out: &mut Mesh) {
    let z = p.pos.z;
    out.push_vertex(stroke_vertex(p.xy() + offset, z, p.extra.color));
    out.push_vertex(stroke_vertex(p.xy() - offset, z, p.extra.color));
}

/// Two triangles between the join pairs of points `i` and `j`.
fn push_quad(out: &mut Mesh, base: u32, i: usize, j: usize) {
    let (li, ri) = (base + 2 * i as u32, base + 2 * i as u32 + 1);
    let (lj, rj) = (base + 2 * j as u32, base + 2 * j as u32 + 1);
    out.push_triangle(li, ri, lj);
    out.push_triangle(lj, ri, rj);
}

/// Half disc centered on `p`, bulging towards `outward`.
fn half_disc(p: &StrokePoint, outward: Vec2, out: &mut Mesh) {
    let r = p.extra.half_weight();
    if r <= 0.0 || outward == Vec2::ZERO {
        return;
    }
    let segments = (circle_segments(r) / 2).max(4);
    let side = outward.perp();
    let z = p.pos.z;
    let color = p.extra.color;

    let center = out.push_vertex(stroke_vertex(p.xy(), z, color));
    for k in 0..=segments {
        let (s, c) = (PI * k as f32 / segments as f32).sin_cos();
        out.push_vertex(stroke_vertex(p.xy() + (side * c + outward * s) * r, z, color));
    }
    for k in 0..segments as u32 {
        out.push_triangle(center, center + 1 + k, center + 2 + k);
    }
}

#[inline]
fn stroke_vertex(xy: Vec2, z: f32, color: crate::paint::Color) -> Vertex {
    Vertex::new(xy.extend(z), Vec3::Z, Vec2::ZERO, color)
}
