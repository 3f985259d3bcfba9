//! Planar geometry kernel.
//!
//! Pure, deterministic predicates over `geo` points and polygons. Every
//! boundary or collinearity decision goes through a single [`Tolerance`], so a
//! point that is "on the boundary" for one predicate is on the boundary for
//! all of them.
//!
//! ```rust
//! use geo::{Point, polygon};
//! use zonemap::compute::geometry::{Position, Tolerance, point_in_polygon};
//!
//! let square = polygon![
//!     (x: 0.0, y: 0.0),
//!     (x: 10.0, y: 0.0),
//!     (x: 10.0, y: 10.0),
//!     (x: 0.0, y: 10.0),
//! ];
//! let tol = Tolerance::default();
//! assert_eq!(point_in_polygon(&Point::new(5.0, 5.0), &square, tol), Position::Inside);
//! assert_eq!(point_in_polygon(&Point::new(10.0, 5.0), &square, tol), Position::OnBoundary);
//! assert_eq!(point_in_polygon(&Point::new(11.0, 5.0), &square, tol), Position::Outside);
//! ```

use crate::config::DEFAULT_EPSILON;
use geo::{Area, BoundingRect, Coord, Distance, Euclidean, InteriorPoint, Line, LineString};
use geo::{Point, Polygon};
use smallvec::SmallVec;
use zonemap_types::bbox::BoundingBox2D;

/// Distance tolerance for boundary and collinearity decisions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance(f64);

impl Tolerance {
    pub const DEFAULT: Tolerance = Tolerance(DEFAULT_EPSILON);

    pub fn new(epsilon: f64) -> Self {
        Tolerance(epsilon.abs())
    }

    pub fn epsilon(&self) -> f64 {
        self.0
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Where a point lies relative to a polygon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Position {
    Inside,
    OnBoundary,
    Outside,
}

impl Position {
    /// Inside or on the boundary.
    pub fn is_covered(&self) -> bool {
        !matches!(self, Position::Outside)
    }
}

#[inline]
fn cross(o: Coord, a: Coord, b: Coord) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

#[inline]
fn dot(a: Coord, b: Coord) -> f64 {
    a.x * b.x + a.y * b.y
}

/// Signed perpendicular distance of `p` from the line through `a` and `b`.
/// Positive on the left. Degenerate lines report zero.
fn signed_offset(p: Coord, a: Coord, b: Coord) -> f64 {
    let len = (b - a).x.hypot((b - a).y);
    if len == 0.0 {
        return 0.0;
    }
    cross(a, b, p) / len
}

/// Distance from `p` to the closed segment `ab`.
pub fn point_segment_distance(p: Coord, a: Coord, b: Coord) -> f64 {
    let ab = b - a;
    let len_sq = dot(ab, ab);
    if len_sq == 0.0 {
        return (p - a).x.hypot((p - a).y);
    }
    let t = (dot(p - a, ab) / len_sq).clamp(0.0, 1.0);
    let closest = a + ab * t;
    (p - closest).x.hypot((p - closest).y)
}

#[inline]
fn on_segment(p: Coord, a: Coord, b: Coord, tol: Tolerance) -> bool {
    point_segment_distance(p, a, b) <= tol.epsilon()
}

/// Parameter of the projection of `p` onto `ab`, clamped to `[0, 1]`.
fn projection_param(p: Coord, a: Coord, b: Coord) -> f64 {
    let ab = b - a;
    let len_sq = dot(ab, ab);
    if len_sq == 0.0 {
        return 0.0;
    }
    (dot(p - a, ab) / len_sq).clamp(0.0, 1.0)
}

#[inline]
fn segment_bbox_disjoint(a: &Line, b: &Line, tol: Tolerance) -> bool {
    let eps = tol.epsilon();
    a.start.x.max(a.end.x) + eps < b.start.x.min(b.end.x)
        || b.start.x.max(b.end.x) + eps < a.start.x.min(a.end.x)
        || a.start.y.max(a.end.y) + eps < b.start.y.min(b.end.y)
        || b.start.y.max(b.end.y) + eps < a.start.y.min(a.end.y)
}

/// Parameters along `ab` at which it meets `cd`, including touching and
/// collinear overlap endpoints. Empty when the segments are apart.
fn intersection_params(ab: &Line, cd: &Line, tol: Tolerance) -> SmallVec<[f64; 4]> {
    let mut params = SmallVec::new();
    if segment_bbox_disjoint(ab, cd, tol) {
        return params;
    }
    let (a, b, c, d) = (ab.start, ab.end, cd.start, cd.end);

    if on_segment(c, a, b, tol) {
        params.push(projection_param(c, a, b));
    }
    if on_segment(d, a, b, tol) {
        params.push(projection_param(d, a, b));
    }
    if on_segment(a, c, d, tol) {
        params.push(0.0);
    }
    if on_segment(b, c, d, tol) {
        params.push(1.0);
    }

    let r = b - a;
    let s = d - c;
    let denom = r.x * s.y - r.y * s.x;
    if denom != 0.0 {
        let qp = c - a;
        let t = (qp.x * s.y - qp.y * s.x) / denom;
        let u = (qp.x * r.y - qp.y * r.x) / denom;
        if (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u) {
            params.push(t);
        }
    }
    params
}

/// True when the segments share any point (within tolerance).
pub fn segments_touch(ab: &Line, cd: &Line, tol: Tolerance) -> bool {
    !intersection_params(ab, cd, tol).is_empty()
}

/// True when each segment has its endpoints strictly on opposite sides of the
/// other, i.e. they cross at a single interior point.
pub fn segments_cross(ab: &Line, cd: &Line, tol: Tolerance) -> bool {
    if segment_bbox_disjoint(ab, cd, tol) {
        return false;
    }
    let eps = tol.epsilon();
    let side = |v: f64| {
        if v > eps {
            1
        } else if v < -eps {
            -1
        } else {
            0
        }
    };
    let c = side(signed_offset(cd.start, ab.start, ab.end));
    let d = side(signed_offset(cd.end, ab.start, ab.end));
    let a = side(signed_offset(ab.start, cd.start, cd.end));
    let b = side(signed_offset(ab.end, cd.start, cd.end));
    c * d < 0 && a * b < 0
}

fn point_in_ring(p: Coord, ring: &LineString, tol: Tolerance) -> Position {
    if ring.lines().any(|line| on_segment(p, line.start, line.end, tol)) {
        return Position::OnBoundary;
    }

    let mut inside = false;
    for line in ring.lines() {
        let (a, b) = (line.start, line.end);
        if (a.y > p.y) != (b.y > p.y) {
            let x = a.x + (p.y - a.y) * (b.x - a.x) / (b.y - a.y);
            if p.x < x {
                inside = !inside;
            }
        }
    }
    if inside {
        Position::Inside
    } else {
        Position::Outside
    }
}

/// Classify a point against a polygon, honoring holes.
pub fn point_in_polygon(point: &Point, polygon: &Polygon, tol: Tolerance) -> Position {
    let p = point.0;
    match point_in_ring(p, polygon.exterior(), tol) {
        Position::Inside => {}
        other => return other,
    }
    for hole in polygon.interiors() {
        match point_in_ring(p, hole, tol) {
            Position::Inside => return Position::Outside,
            Position::OnBoundary => return Position::OnBoundary,
            Position::Outside => {}
        }
    }
    Position::Inside
}

fn all_lines(polygon: &Polygon) -> impl Iterator<Item = Line> + '_ {
    std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .flat_map(|ring| ring.lines())
}

/// Midpoints of the pieces `line` is cut into by every edge of `other`.
/// Pieces shorter than the tolerance are skipped.
fn piece_midpoints(line: &Line, other: &Polygon, tol: Tolerance) -> SmallVec<[Point; 8]> {
    let mut cuts: SmallVec<[f64; 8]> = SmallVec::new();
    cuts.push(0.0);
    cuts.push(1.0);
    for edge in all_lines(other) {
        cuts.extend(intersection_params(line, &edge, tol));
    }
    cuts.sort_by(f64::total_cmp);

    let len = Euclidean.distance(line.start_point(), line.end_point());
    let mut mids = SmallVec::new();
    for pair in cuts.windows(2) {
        if (pair[1] - pair[0]) * len <= tol.epsilon() {
            continue;
        }
        let t = (pair[0] + pair[1]) / 2.0;
        mids.push(Point::from(line.start + line.delta() * t));
    }
    mids
}

fn boundary_enters_interior(a: &Polygon, b: &Polygon, tol: Tolerance) -> bool {
    all_lines(a).any(|line| {
        piece_midpoints(&line, b, tol)
            .iter()
            .any(|mid| point_in_polygon(mid, b, tol) == Position::Inside)
    })
}

/// True when the interiors of `a` and `b` share positive area.
///
/// Contact along shared edges or at vertices is not overlap.
pub fn polygons_overlap(a: &Polygon, b: &Polygon, tol: Tolerance) -> bool {
    let (Some(box_a), Some(box_b)) = (bounding_box(a), bounding_box(b)) else {
        return false;
    };
    if !box_a.intersects(&box_b) {
        return false;
    }

    for edge_a in all_lines(a) {
        if all_lines(b).any(|edge_b| segments_cross(&edge_a, &edge_b, tol)) {
            return true;
        }
    }

    if boundary_enters_interior(a, b, tol) || boundary_enters_interior(b, a, tol) {
        return true;
    }

    // Boundaries only touch, so the interiors are either disjoint or coincide.
    a.interior_point()
        .is_some_and(|p| point_in_polygon(&p, b, tol) == Position::Inside)
        || b.interior_point()
            .is_some_and(|p| point_in_polygon(&p, a, tol) == Position::Inside)
}

/// True when `inner` lies entirely within `outer` (boundary contact allowed).
///
/// Checks every vertex, every edge crossing, and the pieces of each inner
/// edge between contacts, so a thin polygon cannot poke out through a notch
/// with all of its vertices still inside.
pub fn polygon_contains(outer: &Polygon, inner: &Polygon, tol: Tolerance) -> bool {
    let (Some(box_outer), Some(box_inner)) = (bounding_box(outer), bounding_box(inner)) else {
        return false;
    };
    if !box_outer.expand(tol.epsilon()).contains_bbox(&box_inner) {
        return false;
    }

    let shell = inner.exterior();
    if shell
        .coords()
        .any(|c| point_in_polygon(&Point::from(*c), outer, tol) == Position::Outside)
    {
        return false;
    }

    for edge in shell.lines() {
        if all_lines(outer).any(|other| segments_cross(&edge, &other, tol)) {
            return false;
        }
        if piece_midpoints(&edge, outer, tol)
            .iter()
            .any(|mid| point_in_polygon(mid, outer, tol) == Position::Outside)
        {
            return false;
        }
    }

    // A hole of `outer` inside `inner`'s shell touches none of the shell's
    // edges. It only matters when `inner` fails to leave the same area out.
    !outer
        .interiors()
        .iter()
        .any(|hole| polygons_overlap(&Polygon::new(hole.clone(), vec![]), inner, tol))
}

/// Planar distance between two points.
pub fn distance(p: &Point, q: &Point) -> f64 {
    Euclidean.distance(*p, *q)
}

/// Envelope of a polygon; `None` for an empty polygon.
pub fn bounding_box(polygon: &Polygon) -> Option<BoundingBox2D> {
    polygon.bounding_rect().map(BoundingBox2D::from_rect)
}

pub fn polygon_area(polygon: &Polygon) -> f64 {
    polygon.unsigned_area()
}

/// Ring vertices without the closing repeat or consecutive near-duplicates.
pub fn distinct_vertices(ring: &LineString, tol: Tolerance) -> Vec<Coord> {
    let mut out: Vec<Coord> = Vec::with_capacity(ring.0.len());
    for c in ring.coords() {
        let duplicate = out
            .last()
            .is_some_and(|last| (*c - *last).x.hypot((*c - *last).y) <= tol.epsilon());
        if !duplicate {
            out.push(*c);
        }
    }
    while out.len() > 1 {
        let (first, last) = (out[0], out[out.len() - 1]);
        if (first - last).x.hypot((first - last).y) <= tol.epsilon() {
            out.pop();
        } else {
            break;
        }
    }
    out
}

/// Shoelace area of an open vertex list.
pub fn ring_area(vertices: &[Coord]) -> f64 {
    if vertices.len() < 3 {
        return 0.0;
    }
    let origin = vertices[0];
    let twice: f64 = vertices
        .windows(2)
        .map(|w| cross(origin, w[0], w[1]))
        .sum();
    (twice / 2.0).abs()
}

/// First self-intersection of a ring given as distinct vertices, if any.
///
/// Adjacent edges may share their common vertex but must not fold back
/// over each other; other edge pairs must not touch at all.
pub fn ring_self_intersection(vertices: &[Coord], tol: Tolerance) -> Option<Coord> {
    let n = vertices.len();
    if n < 3 {
        return None;
    }
    let edge = |i: usize| Line::new(vertices[i], vertices[(i + 1) % n]);

    for i in 0..n {
        let ei = edge(i);
        for j in (i + 1)..n {
            let ej = edge(j);
            let adjacent_after = j == i + 1;
            let adjacent_wrap = i == 0 && j == n - 1;

            if adjacent_after {
                // shared vertex is ei.end == ej.start
                if on_segment(ei.start, ej.start, ej.end, tol)
                    || on_segment(ej.end, ei.start, ei.end, tol)
                {
                    return Some(ei.end);
                }
            } else if adjacent_wrap {
                // shared vertex is ej.end == ei.start
                if on_segment(ei.end, ej.start, ej.end, tol)
                    || on_segment(ej.start, ei.start, ei.end, tol)
                {
                    return Some(ei.start);
                }
            } else if let Some(t) = intersection_params(&ei, &ej, tol).first() {
                return Some(ei.start + ei.delta() * *t);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{coord, polygon};

    fn square(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Polygon {
        polygon![
            (x: min_x, y: min_y),
            (x: max_x, y: min_y),
            (x: max_x, y: max_y),
            (x: min_x, y: max_y),
        ]
    }

    fn tol() -> Tolerance {
        Tolerance::default()
    }

    #[test]
    fn test_point_in_polygon_categories() {
        let poly = square(0.0, 0.0, 100.0, 100.0);

        assert_eq!(point_in_polygon(&Point::new(25.0, 25.0), &poly, tol()), Position::Inside);
        assert_eq!(point_in_polygon(&Point::new(0.0, 50.0), &poly, tol()), Position::OnBoundary);
        assert_eq!(point_in_polygon(&Point::new(100.0, 100.0), &poly, tol()), Position::OnBoundary);
        assert_eq!(point_in_polygon(&Point::new(150.0, 50.0), &poly, tol()), Position::Outside);
        // within epsilon of the edge counts as boundary
        assert_eq!(
            point_in_polygon(&Point::new(100.0 + 1e-12, 50.0), &poly, tol()),
            Position::OnBoundary
        );
    }

    #[test]
    fn test_point_in_polygon_with_hole() {
        let poly = Polygon::new(
            square(0.0, 0.0, 100.0, 100.0).exterior().clone(),
            vec![square(40.0, 40.0, 60.0, 60.0).exterior().clone()],
        );

        assert_eq!(point_in_polygon(&Point::new(50.0, 50.0), &poly, tol()), Position::Outside);
        assert_eq!(point_in_polygon(&Point::new(40.0, 50.0), &poly, tol()), Position::OnBoundary);
        assert_eq!(point_in_polygon(&Point::new(10.0, 10.0), &poly, tol()), Position::Inside);
    }

    #[test]
    fn test_point_on_vertex_ray_is_stable() {
        // ray from (5, 5) passes exactly through the vertex (10, 5)
        let diamond = polygon![
            (x: 5.0, y: 0.0),
            (x: 10.0, y: 5.0),
            (x: 5.0, y: 10.0),
            (x: 0.0, y: 5.0),
        ];
        for _ in 0..3 {
            let inside = point_in_polygon(&Point::new(5.0, 5.0), &diamond, tol());
            let outside = point_in_polygon(&Point::new(-1.0, 5.0), &diamond, tol());
            assert_eq!(inside, Position::Inside);
            assert_eq!(outside, Position::Outside);
        }
    }

    #[test]
    fn test_shared_edge_is_not_overlap() {
        let left = square(0.0, 0.0, 50.0, 100.0);
        let right = square(50.0, 0.0, 100.0, 100.0);
        assert!(!polygons_overlap(&left, &right, tol()));
        assert!(!polygons_overlap(&right, &left, tol()));
    }

    #[test]
    fn test_corner_contact_is_not_overlap() {
        let a = square(0.0, 0.0, 10.0, 10.0);
        let b = square(10.0, 10.0, 20.0, 20.0);
        assert!(!polygons_overlap(&a, &b, tol()));
    }

    #[test]
    fn test_overlap_cases() {
        let a = square(0.0, 0.0, 60.0, 100.0);
        let b = square(50.0, 0.0, 100.0, 100.0);
        assert!(polygons_overlap(&a, &b, tol()));

        // identical polygons coincide entirely
        assert!(polygons_overlap(&a, &a.clone(), tol()));

        // one inside the other sharing three edges
        let lower = square(0.0, 0.0, 60.0, 50.0);
        assert!(polygons_overlap(&a, &lower, tol()));

        // strictly nested
        let nested = square(10.0, 10.0, 20.0, 20.0);
        assert!(polygons_overlap(&a, &nested, tol()));

        let far = square(200.0, 200.0, 300.0, 300.0);
        assert!(!polygons_overlap(&a, &far, tol()));
    }

    #[test]
    fn test_overlap_through_vertex_contact() {
        // triangle whose apex touches the square's edge and whose body
        // crosses into the square through the square's corner
        let sq = square(0.0, 0.0, 10.0, 10.0);
        let tri = polygon![
            (x: 10.0, y: 10.0),
            (x: 20.0, y: 20.0),
            (x: 5.0, y: 20.0),
        ];
        assert!(!polygons_overlap(&sq, &tri, tol()));

        let wedge = polygon![
            (x: 10.0, y: 10.0),
            (x: 0.0, y: 5.0),
            (x: -5.0, y: 20.0),
        ];
        assert!(polygons_overlap(&sq, &wedge, tol()));
    }

    #[test]
    fn test_polygon_contains_shared_boundary() {
        let root = square(0.0, 0.0, 100.0, 100.0);
        let child = square(0.0, 0.0, 50.0, 100.0);
        assert!(polygon_contains(&root, &child, tol()));
        assert!(polygon_contains(&root, &root.clone(), tol()));
    }

    #[test]
    fn test_polygon_contains_rejects_overhang() {
        let root = square(0.0, 0.0, 100.0, 100.0);
        let wide = square(50.0, 0.0, 110.0, 100.0);
        assert!(!polygon_contains(&root, &wide, tol()));
    }

    #[test]
    fn test_polygon_contains_rejects_notch_poke() {
        // U-shaped outer: notch between x=40 and x=60 above y=50
        let outer = polygon![
            (x: 0.0, y: 0.0),
            (x: 100.0, y: 0.0),
            (x: 100.0, y: 100.0),
            (x: 60.0, y: 100.0),
            (x: 60.0, y: 50.0),
            (x: 40.0, y: 50.0),
            (x: 40.0, y: 100.0),
            (x: 0.0, y: 100.0),
        ];
        // thin bar whose vertices all sit inside the arms but spans the notch
        let bar = polygon![
            (x: 20.0, y: 70.0),
            (x: 80.0, y: 70.0),
            (x: 80.0, y: 72.0),
            (x: 20.0, y: 72.0),
        ];
        for c in bar.exterior().coords() {
            assert_ne!(point_in_polygon(&Point::from(*c), &outer, tol()), Position::Outside);
        }
        assert!(!polygon_contains(&outer, &bar, tol()));

        // bar whose edge runs exactly along the notch floor is fine
        let floor_bar = polygon![
            (x: 20.0, y: 40.0),
            (x: 80.0, y: 40.0),
            (x: 80.0, y: 50.0),
            (x: 20.0, y: 50.0),
        ];
        assert!(polygon_contains(&outer, &floor_bar, tol()));
    }

    #[test]
    fn test_polygon_contains_respects_holes() {
        let holed = Polygon::new(
            square(0.0, 0.0, 100.0, 100.0).exterior().clone(),
            vec![square(40.0, 40.0, 60.0, 60.0).exterior().clone()],
        );
        assert!(!polygon_contains(&holed, &square(30.0, 30.0, 70.0, 70.0), tol()));
        assert!(polygon_contains(&holed, &square(0.0, 0.0, 40.0, 100.0), tol()));
    }

    #[test]
    fn test_holed_polygon_contains_holed_polygon() {
        let with_hole = |hole: Polygon| {
            Polygon::new(
                square(0.0, 0.0, 100.0, 100.0).exterior().clone(),
                vec![hole.exterior().clone()],
            )
        };
        let parent = with_hole(square(40.0, 40.0, 60.0, 60.0));

        assert!(polygon_contains(&parent, &parent.clone(), tol()));
        // leaving out more than the parent does is fine
        assert!(polygon_contains(&parent, &with_hole(square(30.0, 30.0, 70.0, 70.0)), tol()));
        // covering part of the parent's hole is not
        assert!(!polygon_contains(&parent, &with_hole(square(45.0, 45.0, 55.0, 55.0)), tol()));
        assert!(!polygon_contains(&parent, &with_hole(square(50.0, 50.0, 70.0, 70.0)), tol()));
    }

    #[test]
    fn test_ring_self_intersection() {
        let bowtie = [
            coord! { x: 0.0, y: 0.0 },
            coord! { x: 10.0, y: 10.0 },
            coord! { x: 10.0, y: 0.0 },
            coord! { x: 0.0, y: 10.0 },
        ];
        let hit = ring_self_intersection(&bowtie, tol()).unwrap();
        assert!((hit.x - 5.0).abs() < 1e-9 && (hit.y - 5.0).abs() < 1e-9);

        let sq = distinct_vertices(square(0.0, 0.0, 10.0, 10.0).exterior(), tol());
        assert_eq!(sq.len(), 4);
        assert!(ring_self_intersection(&sq, tol()).is_none());

        // spike folding back along its own edge
        let spike = [
            coord! { x: 0.0, y: 0.0 },
            coord! { x: 10.0, y: 0.0 },
            coord! { x: 5.0, y: 0.0 },
            coord! { x: 5.0, y: 5.0 },
        ];
        assert!(ring_self_intersection(&spike, tol()).is_some());
    }

    #[test]
    fn test_ring_area_and_distance() {
        let sq = distinct_vertices(square(0.0, 0.0, 10.0, 20.0).exterior(), tol());
        assert_eq!(ring_area(&sq), 200.0);
        assert_eq!(distance(&Point::new(0.0, 0.0), &Point::new(3.0, 4.0)), 5.0);

        let bbox = bounding_box(&square(1.0, 2.0, 3.0, 4.0)).unwrap();
        assert_eq!(bbox, BoundingBox2D::new(1.0, 2.0, 3.0, 4.0));
    }
}
