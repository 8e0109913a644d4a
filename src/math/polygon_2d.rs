use super::{Point2, Vector2, TOLERANCE};
use crate::error::{GeometryError, Result};

/// Computes the signed area of a polygon (shoelace formula).
///
/// Positive for counter-clockwise, negative for clockwise.
#[must_use]
pub fn signed_area_2d(points: &[Point2]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        sum += points[i].x * points[j].y - points[j].x * points[i].y;
    }
    sum * 0.5
}

/// Ray-casting point-in-polygon test. Points on the boundary may land on
/// either side.
#[must_use]
pub fn point_in_polygon(p: &Point2, ring: &[Point2]) -> bool {
    let n = ring.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (pi, pj) = (ring[i], ring[j]);
        if (pi.y > p.y) != (pj.y > p.y) {
            let intersect_x = (pj.x - pi.x) * (p.y - pi.y) / (pj.y - pi.y) + pi.x;
            if p.x < intersect_x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Removes a repeated closing vertex and consecutive duplicates from a ring.
#[must_use]
pub fn normalize_ring(points: &[Point2]) -> Vec<Point2> {
    let mut ring: Vec<Point2> = Vec::with_capacity(points.len());
    for &pt in points {
        if ring.last().map_or(true, |last| (pt - last).norm() > TOLERANCE) {
            ring.push(pt);
        }
    }
    while ring.len() > 1 {
        let (first, last) = (ring[0], ring[ring.len() - 1]);
        if (first - last).norm() > TOLERANCE {
            break;
        }
        ring.pop();
    }
    ring
}

/// Returns the ring in counter-clockwise order.
#[must_use]
pub fn to_counter_clockwise(ring: Vec<Point2>) -> Vec<Point2> {
    if signed_area_2d(&ring) < 0.0 {
        ring.into_iter().rev().collect()
    } else {
        ring
    }
}

/// Computes the normalized direction from point `a` to point `b`.
///
/// # Errors
///
/// Returns `GeometryError::Degenerate` if the segment has zero length.
pub fn segment_direction(a: &Point2, b: &Point2) -> Result<Vector2> {
    let d = b - a;
    let len = d.norm();
    if len < TOLERANCE {
        return Err(GeometryError::Degenerate(format!(
            "zero-length segment between ({}, {}) and ({}, {})",
            a.x, a.y, b.x, b.y
        ))
        .into());
    }
    Ok(d / len)
}

/// Returns the left-pointing normal of a direction vector.
#[must_use]
pub fn left_normal(dir: Vector2) -> Vector2 {
    Vector2::new(-dir.y, dir.x)
}
