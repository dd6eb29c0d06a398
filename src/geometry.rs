//! Planar segment math used by graph construction, crossing validation and
//! pole placement. Everything operates on the projected metric plane, so
//! plain Euclidean arithmetic applies throughout.

use geo::{Contains, Polygon};

use crate::Coordinate;

/// Distance under which two points count as the same shared endpoint.
const ENDPOINT_EPS: f64 = 1e-6;

/// Parametric tolerance for segment intersection classification.
const PARAM_EPS: f64 = 1e-9;

/// Result of projecting a point onto a segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentProjection {
    /// Position of the foot along the segment, 0 at `a`, 1 at `b`.
    pub t: f64,
    /// Closest point of the segment (clamped to its extent).
    pub foot: Coordinate,
    /// Distance from the query point to the foot.
    pub distance: f64,
}

/// Projects `p` onto the segment `a`-`b`, clamping to the segment extent.
pub fn project_onto_segment(p: Coordinate, a: Coordinate, b: Coordinate) -> SegmentProjection {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len2 = dx * dx + dy * dy;

    let t = if len2 <= PARAM_EPS {
        0.0
    } else {
        (((p.x - a.x) * dx + (p.y - a.y) * dy) / len2).clamp(0.0, 1.0)
    };

    let foot = Coordinate::new(a.x + t * dx, a.y + t * dy);
    SegmentProjection {
        t,
        foot,
        distance: p.distance(foot),
    }
}

/// Total arc length of a polyline.
pub fn polyline_length(vertices: &[Coordinate]) -> f64 {
    vertices.windows(2).map(|w| w[0].distance(w[1])).sum()
}

/// Point at the given arc-length position along a polyline, interpolated on
/// the enclosing segment. Positions beyond either end clamp to the nearest
/// terminus.
pub fn point_at_arc_length(vertices: &[Coordinate], position: f64) -> Coordinate {
    debug_assert!(vertices.len() >= 2);

    if position <= 0.0 {
        return vertices[0];
    }

    let mut walked = 0.0;
    for w in vertices.windows(2) {
        let segment = w[0].distance(w[1]);
        if walked + segment >= position && segment > 0.0 {
            let t = (position - walked) / segment;
            return Coordinate::new(
                w[0].x + t * (w[1].x - w[0].x),
                w[0].y + t * (w[1].y - w[0].y),
            );
        }
        walked += segment;
    }

    vertices[vertices.len() - 1]
}

/// Interior angle at `p2` formed by `p1`-`p2`-`p3`, in degrees (0..=180).
/// A straight continuation measures 180°; sharper bends measure less.
pub fn interior_angle(p1: Coordinate, p2: Coordinate, p3: Coordinate) -> f64 {
    let v1 = (p1.x - p2.x, p1.y - p2.y);
    let v2 = (p3.x - p2.x, p3.y - p2.y);

    let dot = v1.0 * v2.0 + v1.1 * v2.1;
    let mag1 = v1.0.hypot(v1.1);
    let mag2 = v2.0.hypot(v2.1);

    if mag1 == 0.0 || mag2 == 0.0 {
        return 0.0;
    }

    (dot / (mag1 * mag2)).clamp(-1.0, 1.0).acos().to_degrees()
}

/// Classification of the intersection of two segments.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SegmentIntersection {
    None,
    Point(Coordinate),
    /// Collinear segments sharing a stretch of positive length.
    Overlap(Coordinate, Coordinate),
}

fn cross(ax: f64, ay: f64, bx: f64, by: f64) -> f64 {
    ax * by - ay * bx
}

/// Intersection of segments `a1`-`a2` and `b1`-`b2`.
pub fn segment_intersection(
    a1: Coordinate,
    a2: Coordinate,
    b1: Coordinate,
    b2: Coordinate,
) -> SegmentIntersection {
    let d1 = (a2.x - a1.x, a2.y - a1.y);
    let d2 = (b2.x - b1.x, b2.y - b1.y);
    let offset = (b1.x - a1.x, b1.y - a1.y);

    let denom = cross(d1.0, d1.1, d2.0, d2.1);
    let scale = d1.0.hypot(d1.1).max(d2.0.hypot(d2.1)).max(1.0);

    if denom.abs() <= PARAM_EPS * scale * scale {
        // parallel: either disjoint or collinear
        if cross(offset.0, offset.1, d1.0, d1.1).abs() > ENDPOINT_EPS * scale {
            return SegmentIntersection::None;
        }

        let len2 = d1.0 * d1.0 + d1.1 * d1.1;
        if len2 <= PARAM_EPS {
            // degenerate first segment
            let projection = project_onto_segment(a1, b1, b2);
            return if projection.distance <= ENDPOINT_EPS {
                SegmentIntersection::Point(a1)
            } else {
                SegmentIntersection::None
            };
        }

        let t_of = |p: Coordinate| ((p.x - a1.x) * d1.0 + (p.y - a1.y) * d1.1) / len2;
        let (mut t0, mut t1) = (t_of(b1), t_of(b2));
        if t0 > t1 {
            std::mem::swap(&mut t0, &mut t1);
        }
        let lo = t0.max(0.0);
        let hi = t1.min(1.0);
        if lo > hi {
            return SegmentIntersection::None;
        }

        let at = |t: f64| Coordinate::new(a1.x + t * d1.0, a1.y + t * d1.1);
        let (p, q) = (at(lo), at(hi));
        if p.distance(q) <= ENDPOINT_EPS {
            SegmentIntersection::Point(p)
        } else {
            SegmentIntersection::Overlap(p, q)
        }
    } else {
        let t = cross(offset.0, offset.1, d2.0, d2.1) / denom;
        let u = cross(offset.0, offset.1, d1.0, d1.1) / denom;

        let inside = |v: f64| (-PARAM_EPS..=1.0 + PARAM_EPS).contains(&v);
        if inside(t) && inside(u) {
            SegmentIntersection::Point(Coordinate::new(a1.x + t * d1.0, a1.y + t * d1.1))
        } else {
            SegmentIntersection::None
        }
    }
}

fn is_terminus(p: Coordinate, polyline: &[Coordinate]) -> bool {
    let first = polyline[0];
    let last = polyline[polyline.len() - 1];
    p.distance(first) <= ENDPOINT_EPS || p.distance(last) <= ENDPOINT_EPS
}

/// First point shared by the interiors of `path` and `line`, if any.
///
/// A shared point is interior when it is a terminus of neither polyline;
/// touches at a shared endpoint are permitted. Collinear overlap of
/// positive length always exposes interior points and is reported through
/// a representative point of the overlap.
pub fn strict_crossing(path: &[Coordinate], line: &[Coordinate]) -> Option<Coordinate> {
    if path.len() < 2 || line.len() < 2 {
        return None;
    }

    let interior = |p: Coordinate| !is_terminus(p, path) && !is_terminus(p, line);

    for pw in path.windows(2) {
        for lw in line.windows(2) {
            match segment_intersection(pw[0], pw[1], lw[0], lw[1]) {
                SegmentIntersection::None => {}
                SegmentIntersection::Point(p) => {
                    if interior(p) {
                        return Some(p);
                    }
                }
                SegmentIntersection::Overlap(p, q) => {
                    // any point of a positive-length overlap away from the
                    // termini witnesses the interior sharing
                    for fraction in [0.5, 0.25, 0.75] {
                        let sample = Coordinate::new(
                            p.x + fraction * (q.x - p.x),
                            p.y + fraction * (q.y - p.y),
                        );
                        if interior(sample) {
                            return Some(sample);
                        }
                    }
                }
            }
        }
    }

    None
}

/// Whether `c` lies strictly inside the polygon (boundary excluded).
pub fn point_strictly_inside(polygon: &Polygon, c: Coordinate) -> bool {
    polygon.contains(&c.point())
}

/// Whether the open segment `a`-`b` passes through the polygon interior.
/// Boundary touches alone do not block.
pub fn segment_blocked_by_polygon(a: Coordinate, b: Coordinate, polygon: &Polygon) -> bool {
    if point_strictly_inside(polygon, a) || point_strictly_inside(polygon, b) {
        return true;
    }

    for fraction in [0.25, 0.5, 0.75] {
        let sample = Coordinate::new(a.x + fraction * (b.x - a.x), a.y + fraction * (b.y - a.y));
        if point_strictly_inside(polygon, sample) {
            return true;
        }
    }

    // entering and leaving the interior implies two proper boundary crossings
    let mut crossings = 0usize;
    let mut rings: Vec<&geo::LineString> = vec![polygon.exterior()];
    rings.extend(polygon.interiors());

    for ring in rings {
        let coords: Vec<Coordinate> = ring.coords().map(|c| Coordinate::from(*c)).collect();
        for rw in coords.windows(2) {
            if let SegmentIntersection::Point(p) = segment_intersection(a, b, rw[0], rw[1]) {
                let t = project_onto_segment(p, a, b).t;
                if t > 1e-6 && t < 1.0 - 1e-6 {
                    crossings += 1;
                }
            }
        }
    }

    crossings >= 2
}
