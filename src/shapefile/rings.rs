//! Polygon ring classification.
//!
//! Shapefiles store polygons as a flat list of rings: outer rings wind
//! clockwise and holes counter-clockwise, with nothing linking a hole to
//! its shell. This module rebuilds the nesting.

use crate::geometry::{Geometry, Position, Ring};

/// Group rings into polygons.
///
/// Each clockwise ring starts a polygon. Every other ring is attached to the
/// first polygon whose shell contains it, or becomes a polygon of its own
/// when no shell does.
pub fn polygon(rings: Vec<Ring>) -> Geometry {
    let mut polygons: Vec<Vec<Ring>> = Vec::new();
    let mut holes = Vec::new();

    for ring in rings {
        if is_clockwise(&ring) {
            polygons.push(vec![ring]);
        } else {
            holes.push(ring);
        }
    }

    for hole in holes {
        match polygons
            .iter_mut()
            .find(|polygon| contains_some(&polygon[0], &hole))
        {
            Some(polygon) => polygon.push(hole),
            None => polygons.push(vec![hole]),
        }
    }

    if polygons.len() == 1 {
        Geometry::Polygon(polygons.remove(0))
    } else {
        Geometry::MultiPolygon(polygons)
    }
}

/// Rings with fewer than four positions cannot be closed and count as holes.
pub fn is_clockwise(ring: &[Position]) -> bool {
    let n = ring.len();
    if n < 4 {
        return false;
    }
    let mut area = ring[n - 1].y * ring[0].x - ring[n - 1].x * ring[0].y;
    for pair in ring.windows(2) {
        area += pair[0].y * pair[1].x - pair[0].x * pair[1].y;
    }
    area >= 0.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Containment {
    Outside,
    Boundary,
    Inside,
}

/// Decided by the first hole position that is not on the shell's boundary.
fn contains_some(shell: &[Position], hole: &[Position]) -> bool {
    hole.iter()
        .map(|&p| contains(shell, p))
        .find(|&c| c != Containment::Boundary)
        == Some(Containment::Inside)
}

/// Even-odd ray casting with an explicit on-segment check.
fn contains(ring: &[Position], point: Position) -> Containment {
    let n = ring.len();
    let mut inside = false;
    let mut j = n.wrapping_sub(1);

    for i in 0..n {
        let (pi, pj) = (ring[i], ring[j]);
        if on_segment(pi, pj, point) {
            return Containment::Boundary;
        }
        if (pi.y > point.y) != (pj.y > point.y)
            && point.x < (pj.x - pi.x) * (point.y - pi.y) / (pj.y - pi.y) + pi.x
        {
            inside = !inside;
        }
        j = i;
    }

    if inside {
        Containment::Inside
    } else {
        Containment::Outside
    }
}

fn on_segment(p0: Position, p1: Position, p: Position) -> bool {
    let (x20, y20) = (p.x - p0.x, p.y - p0.y);
    if x20 == 0.0 && y20 == 0.0 {
        return true;
    }
    let (x10, y10) = (p1.x - p0.x, p1.y - p0.y);
    if x10 == 0.0 && y10 == 0.0 {
        return false;
    }
    let t = (x20 * x10 + y20 * y10) / (x10 * x10 + y10 * y10);
    if !(0.0..=1.0).contains(&t) {
        return false;
    }
    if t == 0.0 || t == 1.0 {
        return true;
    }
    t * x10 - x20 == 0.0 && t * y10 - y20 == 0.0
}
