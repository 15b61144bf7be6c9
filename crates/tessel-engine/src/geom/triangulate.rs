//! Polygon triangulation by ear clipping, with hole bridging.
//!
//! Orientation convention: the shoelace sum runs over every consecutive pair
//! including the closing edge `n-1 → 0`; a negative sum is clockwise in a
//! y-up frame. Emitted triangles keep the loop order of their input, so each
//! one has the same orientation sign as the polygon it came from.

use glam::{Vec2, Vec3};

/// Result of [`triangulate`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Triangulation {
    /// Triangle list indexing the input points.
    pub indices: Vec<u32>,
    /// Triangles emitted after a full sweep found no valid ear.
    pub fallbacks: usize,
}

impl Triangulation {
    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Signed area of a closed loop (positive = counter-clockwise, y-up).
pub fn signed_area(points: &[Vec2]) -> f32 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..n {
        let a = points[i];
        let b = points[(i + 1) % n];
        sum += a.perp_dot(b);
    }
    sum * 0.5
}

#[inline]
pub fn is_clockwise(points: &[Vec2]) -> bool {
    signed_area(points) < 0.0
}

/// Projects a planar (or nearly planar) 3D loop onto 2D by dropping the
/// dominant axis of its Newell normal.
///
/// Axis pairs are chosen so the projected orientation matches the sign of
/// the normal component that was dropped.
pub fn project_to_plane(points: &[Vec3]) -> Vec<Vec2> {
    let n = points.len();
    let mut normal = Vec3::ZERO;
    for i in 0..n {
        let a = points[i];
        let b = points[(i + 1) % n];
        normal.x += (a.y - b.y) * (a.z + b.z);
        normal.y += (a.z - b.z) * (a.x + b.x);
        normal.z += (a.x - b.x) * (a.y + b.y);
    }

    let an = normal.abs();
    if an.z >= an.x && an.z >= an.y {
        points.iter().map(|p| Vec2::new(p.x, p.y)).collect()
    } else if an.x >= an.y {
        points.iter().map(|p| Vec2::new(p.y, p.z)).collect()
    } else {
        points.iter().map(|p| Vec2::new(p.z, p.x)).collect()
    }
}

/// Triangulates an outer loop plus optional holes.
///
/// `contour_starts` lists the offsets at which each hole contour begins;
/// everything before the first offset is the outer loop. Contours with fewer
/// than three points are ignored.
///
/// For n points in total and h usable holes the result holds n + 2h - 2
/// triangles. Degenerate or self-intersecting input never fails: when no ear
/// exists the current vertex is clipped anyway and counted in `fallbacks`.
pub fn triangulate(points: &[Vec2], contour_starts: &[usize]) -> Triangulation {
    let n = points.len();
    let mut starts: Vec<usize> =
        contour_starts.iter().copied().filter(|&s| s > 0 && s < n).collect();
    starts.sort_unstable();
    starts.dedup();

    let outer_end = starts.first().copied().unwrap_or(n);
    let outer: Vec<u32> = (0..outer_end as u32).collect();

    let mut holes = Vec::new();
    for (k, &start) in starts.iter().enumerate() {
        let end = starts.get(k + 1).copied().unwrap_or(n);
        if end - start >= 3 {
            holes.push((start as u32..end as u32).collect::<Vec<_>>());
        }
    }

    let mut out = Triangulation::default();
    if outer.len() < 3 {
        return out;
    }

    let ring = if holes.is_empty() { outer } else { eliminate_holes(points, outer, holes) };
    ear_clip(points, ring, &mut out);

    if out.fallbacks > 0 {
        log::debug!(
            "triangulate: {} of {} triangles emitted without a valid ear",
            out.fallbacks,
            out.triangle_count()
        );
    }
    out
}

// ── ear clipping ──────────────────────────────────────────────────────────

fn ear_clip(points: &[Vec2], mut ring: Vec<u32>, out: &mut Triangulation) {
    if ring.len() < 3 {
        return;
    }

    let orient = if ring_area(points, &ring) < 0.0 { -1.0 } else { 1.0 };
    out.indices.reserve((ring.len() - 2) * 3);

    let mut cursor = 0usize;
    let mut misses = 0usize;

    while ring.len() > 3 {
        let len = ring.len();
        let prev = (cursor + len - 1) % len;
        let next = (cursor + 1) % len;

        let stuck = misses >= len;
        if stuck || is_ear(points, &ring, prev, cursor, next, orient) {
            if stuck {
                out.fallbacks += 1;
            }
            out.indices.extend_from_slice(&[ring[prev], ring[cursor], ring[next]]);
            ring.remove(cursor);
            if cursor >= ring.len() {
                cursor = 0;
            }
            misses = 0;
        } else {
            cursor = next;
            misses += 1;
        }
    }

    out.indices.extend_from_slice(&ring);
}

fn is_ear(
    points: &[Vec2],
    ring: &[u32],
    prev: usize,
    cur: usize,
    next: usize,
    orient: f32,
) -> bool {
    let a = points[ring[prev] as usize];
    let b = points[ring[cur] as usize];
    let c = points[ring[next] as usize];

    // Reflex or collinear corners are never ears.
    if (b - a).perp_dot(c - b) * orient <= 0.0 {
        return false;
    }

    for (k, &idx) in ring.iter().enumerate() {
        if k == prev || k == cur || k == next {
            continue;
        }
        let p = points[idx as usize];
        // Bridges duplicate vertices. A copy sitting on a corner blocks only
        // when one of its edges leaves into the triangle.
        let corner = if p == a {
            Some((b - a, c - a))
        } else if p == b {
            Some((a - b, c - b))
        } else if p == c {
            Some((a - c, b - c))
        } else {
            None
        };
        let blocked = match corner {
            Some((u, w)) => edges_enter(points, ring, k, u, w),
            None => point_in_triangle(p, a, b, c),
        };
        if blocked {
            return false;
        }
    }
    true
}

/// Does an edge at ring position `k` point strictly inside the corner
/// spanned by `u` and `w`?
fn edges_enter(points: &[Vec2], ring: &[u32], k: usize, u: Vec2, w: Vec2) -> bool {
    let len = ring.len();
    let p = points[ring[k] as usize];
    let s = u.perp_dot(w).signum();
    [ring[(k + len - 1) % len], ring[(k + 1) % len]].iter().any(|&n| {
        let d = points[n as usize] - p;
        u.perp_dot(d) * s > 0.0 && d.perp_dot(w) * s > 0.0
    })
}

/// Does the corner at ring position `k` open towards `target`?
fn locally_inside(points: &[Vec2], ring: &[u32], k: usize, target: Vec2, orient: f32) -> bool {
    let len = ring.len();
    let a = points[ring[(k + len - 1) % len] as usize];
    let v = points[ring[k] as usize];
    let c = points[ring[(k + 1) % len] as usize];

    let left_in = (v - a).perp_dot(target - v) * orient;
    let left_out = (c - v).perp_dot(target - v) * orient;
    if (v - a).perp_dot(c - v) * orient >= 0.0 {
        left_in >= 0.0 && left_out >= 0.0
    } else {
        left_in > 0.0 || left_out > 0.0
    }
}

/// Inclusive point-in-triangle test, independent of triangle winding.
fn point_in_triangle(p: Vec2, a: Vec2, b: Vec2, c: Vec2) -> bool {
    let d1 = (b - a).perp_dot(p - a);
    let d2 = (c - b).perp_dot(p - b);
    let d3 = (a - c).perp_dot(p - c);
    let has_neg = d1 < 0.0 || d2 < 0.0 || d3 < 0.0;
    let has_pos = d1 > 0.0 || d2 > 0.0 || d3 > 0.0;
    !(has_neg && has_pos)
}

fn ring_area(points: &[Vec2], ring: &[u32]) -> f32 {
    let n = ring.len();
    let mut sum = 0.0;
    for i in 0..n {
        let a = points[ring[i] as usize];
        let b = points[ring[(i + 1) % n] as usize];
        sum += a.perp_dot(b);
    }
    sum * 0.5
}

// ── hole bridging ─────────────────────────────────────────────────────────

fn eliminate_holes(points: &[Vec2], outer: Vec<u32>, mut holes: Vec<Vec<u32>>) -> Vec<u32> {
    let outer_ccw = ring_area(points, &outer) >= 0.0;
    let orient = if outer_ccw { 1.0 } else { -1.0 };
    for hole in &mut holes {
        if (ring_area(points, hole) >= 0.0) == outer_ccw {
            hole.reverse();
        }
    }

    // Rightmost hole first: its bridge can't cross a hole merged later.
    holes.sort_by(|a, b| max_x(points, b).total_cmp(&max_x(points, a)));

    let mut ring = outer;
    for hole in holes {
        let Some((h, _)) = hole
            .iter()
            .enumerate()
            .max_by(|&(_, &a), &(_, &b)| points[a as usize].x.total_cmp(&points[b as usize].x))
        else {
            continue;
        };

        let anchor = points[hole[h] as usize];
        let Some(b) = find_bridge(points, &ring, anchor, orient) else {
            log::debug!("triangulate: hole at {anchor:?} has no visible outer vertex; ignored");
            continue;
        };

        let mut merged = Vec::with_capacity(ring.len() + hole.len() + 2);
        merged.extend_from_slice(&ring[..=b]);
        merged.extend(hole[h..].iter().chain(hole[..=h].iter()));
        merged.push(ring[b]);
        merged.extend_from_slice(&ring[b + 1..]);
        ring = merged;
    }
    ring
}

fn max_x(points: &[Vec2], ring: &[u32]) -> f32 {
    ring.iter().map(|&i| points[i as usize].x).fold(f32::NEG_INFINITY, f32::max)
}

/// Finds a ring vertex visible from `m` by casting a ray towards +X.
/// Returns its position in `ring`.
///
/// Earlier bridges leave several copies of one point in the ring; only a
/// copy whose corner opens towards `m` can take the new bridge without the
/// ring crossing itself.
fn find_bridge(points: &[Vec2], ring: &[u32], m: Vec2, orient: f32) -> Option<usize> {
    let len = ring.len();
    let mut best_x = f32::INFINITY;
    let mut candidate = None;

    for i in 0..len {
        let j = (i + 1) % len;
        let a = points[ring[i] as usize];
        let b = points[ring[j] as usize];
        if (a.y > m.y) == (b.y > m.y) {
            continue;
        }
        let x = a.x + (m.y - a.y) * (b.x - a.x) / (b.y - a.y);
        if x < m.x || x >= best_x {
            continue;
        }
        best_x = x;
        candidate = Some(if a.x > b.x { i } else { j });
    }

    let c = candidate?;
    let p = points[ring[c] as usize];
    let hit = Vec2::new(best_x, m.y);

    // Any vertex inside (m, hit, p) would occlude p, the candidate's own
    // copies included; take the one closest in angle to the ray.
    let mut best = c;
    let mut best_tan = f32::INFINITY;
    for (k, &idx) in ring.iter().enumerate() {
        let q = points[idx as usize];
        if q.x < m.x || q == m || !point_in_triangle(q, m, hit, p) {
            continue;
        }
        if !locally_inside(points, ring, k, m, orient) {
            continue;
        }
        let tan = (q.y - m.y).abs() / (q.x - m.x).max(f32::EPSILON);
        let closer = tan == best_tan && q.x < points[ring[best] as usize].x;
        if tan < best_tan || closer {
            best_tan = tan;
            best = k;
        }
    }
    Some(best)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(x: f32, y: f32) -> Vec2 { Vec2::new(x, y) }

    fn tri_area(points: &[Vec2], t: &[u32]) -> f32 {
        signed_area(&[points[t[0] as usize], points[t[1] as usize], points[t[2] as usize]])
    }

    fn star(inner: f32, outer: f32) -> Vec<Vec2> {
        (0..10)
            .map(|i| {
                let r = if i % 2 == 0 { outer } else { inner };
                let a = std::f32::consts::PI * i as f32 / 5.0 - std::f32::consts::FRAC_PI_2;
                v(r * a.cos(), r * a.sin())
            })
            .collect()
    }

    /// n-2 triangles, same orientation as the loop, areas summing to the loop area.
    fn assert_simple_triangulation(points: &[Vec2]) {
        let t = triangulate(points, &[]);
        assert_eq!(t.triangle_count(), points.len() - 2);
        assert_eq!(t.fallbacks, 0);

        let area = signed_area(points);
        let mut covered = 0.0;
        for tri in t.indices.chunks_exact(3) {
            let a = tri_area(points, tri);
            assert!(a * area.signum() > 0.0, "triangle {tri:?} has wrong winding ({a})");
            covered += a.abs();
        }
        assert!((covered - area.abs()).abs() < 1e-2 * area.abs().max(1.0));
    }

    // ── orientation ───────────────────────────────────────────────────────

    #[test]
    fn counter_clockwise_square_has_positive_area() {
        let sq = [v(0.0, 0.0), v(1.0, 0.0), v(1.0, 1.0), v(0.0, 1.0)];
        assert_eq!(signed_area(&sq), 1.0);
        assert!(!is_clockwise(&sq));
    }

    #[test]
    fn reversed_square_is_clockwise() {
        let sq = [v(0.0, 1.0), v(1.0, 1.0), v(1.0, 0.0), v(0.0, 0.0)];
        assert!(is_clockwise(&sq));
    }

    #[test]
    fn closing_edge_is_counted() {
        // Without the n-1 → 0 term this right triangle would report 0.
        let tri = [v(0.0, 0.0), v(4.0, 0.0), v(0.0, 3.0)];
        assert_eq!(signed_area(&tri), 6.0);
    }

    // ── simple polygons ───────────────────────────────────────────────────

    #[test]
    fn convex_hexagon() {
        let hex: Vec<Vec2> = (0..6)
            .map(|i| {
                let a = std::f32::consts::TAU * i as f32 / 6.0;
                v(a.cos() * 10.0, a.sin() * 10.0)
            })
            .collect();
        assert_simple_triangulation(&hex);
    }

    #[test]
    fn concave_l_shape_both_windings() {
        let mut l = vec![
            v(0.0, 0.0), v(4.0, 0.0), v(4.0, 1.0), v(1.0, 1.0), v(1.0, 4.0), v(0.0, 4.0),
        ];
        assert_simple_triangulation(&l);
        l.reverse();
        assert_simple_triangulation(&l);
    }

    #[test]
    fn comb_polygon() {
        let comb = vec![
            v(0.0, 0.0), v(7.0, 0.0), v(7.0, 5.0), v(6.0, 5.0), v(6.0, 1.0), v(5.0, 1.0),
            v(5.0, 5.0), v(4.0, 5.0), v(4.0, 1.0), v(3.0, 1.0), v(3.0, 5.0), v(2.0, 5.0),
            v(2.0, 1.0), v(1.0, 1.0), v(1.0, 5.0), v(0.0, 5.0),
        ];
        assert_simple_triangulation(&comb);
    }

    #[test]
    fn five_point_star_yields_eight_positive_triangles() {
        let s = star(30.0, 70.0);
        let t = triangulate(&s, &[]);
        assert_eq!(t.triangle_count(), 8);

        let orient = signed_area(&s).signum();
        for tri in t.indices.chunks_exact(3) {
            assert!(tri_area(&s, tri) * orient > 0.0);
        }
        assert_simple_triangulation(&s);
    }

    // ── holes ─────────────────────────────────────────────────────────────

    #[test]
    fn square_with_square_hole() {
        let pts = vec![
            v(0.0, 0.0), v(10.0, 0.0), v(10.0, 10.0), v(0.0, 10.0),
            // Same winding as the outer loop on purpose; it gets reversed.
            v(3.0, 3.0), v(7.0, 3.0), v(7.0, 7.0), v(3.0, 7.0),
        ];
        let t = triangulate(&pts, &[4]);
        assert_eq!(t.triangle_count(), 8);

        let mut covered = 0.0;
        for tri in t.indices.chunks_exact(3) {
            let a = tri_area(&pts, tri);
            assert!(a >= 0.0);
            covered += a;

            let c = (pts[tri[0] as usize] + pts[tri[1] as usize] + pts[tri[2] as usize]) / 3.0;
            let in_hole = c.x > 3.0 && c.x < 7.0 && c.y > 3.0 && c.y < 7.0;
            assert!(!in_hole, "triangle {tri:?} lies inside the hole");
        }
        assert!((covered - 84.0).abs() < 1e-3);
    }

    #[test]
    fn two_holes() {
        let pts = vec![
            v(0.0, 0.0), v(20.0, 0.0), v(20.0, 10.0), v(0.0, 10.0),
            v(2.0, 2.0), v(2.0, 8.0), v(8.0, 8.0), v(8.0, 2.0),
            v(12.0, 2.0), v(12.0, 8.0), v(18.0, 8.0), v(18.0, 2.0),
        ];
        let t = triangulate(&pts, &[4, 8]);
        assert_eq!(t.triangle_count(), 12 + 2 * 2 - 2);

        let covered: f32 = t.indices.chunks_exact(3).map(|tri| tri_area(&pts, tri).abs()).sum();
        assert!((covered - (200.0 - 72.0)).abs() < 1e-3);
    }

    /// Every triangle shares the outer loop's winding and the covered area
    /// equals the outer area minus the holes.
    fn assert_holes_covered(points: &[Vec2], starts: &[usize]) {
        let t = triangulate(points, starts);
        assert_eq!(t.fallbacks, 0);
        assert_eq!(t.triangle_count(), points.len() + 2 * starts.len() - 2);

        let mut bounds = vec![0];
        bounds.extend_from_slice(starts);
        bounds.push(points.len());
        let outer = signed_area(&points[..starts[0]]);
        let holes: f32 = bounds[1..]
            .windows(2)
            .map(|w| signed_area(&points[w[0]..w[1]]).abs())
            .sum();

        let mut covered = 0.0;
        for tri in t.indices.chunks_exact(3) {
            let a = tri_area(points, tri);
            assert!(a * outer.signum() >= 0.0, "triangle {tri:?} flips winding ({a})");
            covered += a.abs();
        }
        let expected = outer.abs() - holes;
        assert!((covered - expected).abs() < 1e-3 * expected, "{covered} != {expected}");
    }

    #[test]
    fn irregular_holes_sharing_a_bridge_vertex() {
        // Both holes bridge to (84, 0); the second must attach to the copy
        // whose corner faces it.
        let pts = vec![
            v(84.0, 0.0), v(27.0, 84.0), v(-78.0, 57.0), v(-74.0, -53.0), v(28.0, -85.0),
            v(-21.0, 0.0), v(-24.0, 10.0), v(-39.0, 16.0), v(-47.0, 0.0), v(-35.0, -9.0),
            v(-20.0, -17.0),
            v(42.0, 5.0), v(36.0, 15.0), v(22.0, 19.0), v(21.0, 5.0), v(25.0, -4.0),
            v(35.0, -4.0),
        ];
        assert_holes_covered(&pts, &[5, 11]);

        let covered: f32 = triangulate(&pts, &[5, 11])
            .indices
            .chunks_exact(3)
            .map(|tri| tri_area(&pts, tri).abs())
            .sum();
        assert!((covered - 18347.5).abs() < 0.5);
    }

    #[test]
    fn three_irregular_holes() {
        let pts = vec![
            v(84.0, 0.0), v(27.0, 84.0), v(-78.0, 57.0), v(-74.0, -53.0), v(28.0, -85.0),
            v(-21.0, 0.0), v(-24.0, 10.0), v(-39.0, 16.0), v(-47.0, 0.0), v(-35.0, -9.0),
            v(-20.0, -17.0),
            v(42.0, 5.0), v(36.0, 15.0), v(22.0, 19.0), v(21.0, 5.0), v(25.0, -4.0),
            v(35.0, -4.0),
            v(-5.0, -50.0), v(5.0, -50.0), v(0.0, -40.0),
        ];
        assert_holes_covered(&pts, &[5, 11, 17]);
    }

    #[test]
    fn four_holes_in_a_clockwise_outer_loop() {
        let pts = vec![
            v(46.0, -76.0), v(-19.0, -84.0), v(-80.0, -51.0), v(-75.0, 52.0), v(1.0, 95.0),
            v(48.0, 77.0), v(84.0, 3.0),
            v(-5.0, -33.0), v(-9.0, -25.0), v(-20.0, -26.0), v(-26.0, -37.0), v(-19.0, -44.0),
            v(-12.0, -45.0),
            v(46.0, -13.0), v(41.0, -10.0), v(32.0, -5.0), v(27.0, -12.0), v(26.0, -18.0),
            v(33.0, -23.0), v(42.0, -21.0),
            v(24.0, 37.0), v(20.0, 40.0), v(13.0, 42.0), v(5.0, 39.0), v(7.0, 32.0),
            v(14.0, 27.0), v(23.0, 28.0),
            v(-35.0, 3.0), v(-41.0, 21.0), v(-23.0, 14.0),
        ];
        assert!(is_clockwise(&pts[..7]));
        assert_holes_covered(&pts, &[7, 13, 20, 27]);
    }

    #[test]
    fn degenerate_hole_contour_is_ignored() {
        let pts = vec![
            v(0.0, 0.0), v(4.0, 0.0), v(4.0, 4.0), v(0.0, 4.0),
            v(1.0, 1.0), v(2.0, 2.0),
        ];
        let t = triangulate(&pts, &[4]);
        assert_eq!(t.triangle_count(), 2);
    }

    // ── degenerate input ──────────────────────────────────────────────────

    #[test]
    fn collinear_points_fall_back_without_panicking() {
        let line = [v(0.0, 0.0), v(1.0, 0.0), v(2.0, 0.0), v(3.0, 0.0)];
        let t = triangulate(&line, &[]);
        assert_eq!(t.triangle_count(), 2);
        assert!(t.fallbacks > 0);
    }

    #[test]
    fn self_intersecting_bowtie_still_produces_n_minus_2() {
        let bowtie = [v(0.0, 0.0), v(2.0, 2.0), v(2.0, 0.0), v(0.0, 2.0)];
        let t = triangulate(&bowtie, &[]);
        assert_eq!(t.triangle_count(), 2);
    }

    #[test]
    fn fewer_than_three_points_produce_nothing() {
        assert_eq!(triangulate(&[v(0.0, 0.0), v(1.0, 1.0)], &[]).triangle_count(), 0);
    }

    // ── projection ────────────────────────────────────────────────────────

    #[test]
    fn loop_in_xz_plane_projects_to_a_non_degenerate_polygon() {
        let pts = [
            Vec3::new(0.0, 5.0, 0.0),
            Vec3::new(0.0, 5.0, 4.0),
            Vec3::new(3.0, 5.0, 4.0),
            Vec3::new(3.0, 5.0, 0.0),
        ];
        let flat = project_to_plane(&pts);
        assert!((signed_area(&flat).abs() - 12.0).abs() < 1e-4);
        assert_eq!(triangulate(&flat, &[]).triangle_count(), 2);
    }
}
