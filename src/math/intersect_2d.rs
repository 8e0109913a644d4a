use super::{Point2, Vector2, TOLERANCE};

/// Parametric 2D line-line intersection.
///
/// Given lines `p1 + t * d1` and `p2 + u * d2`, returns `(t, u)` if not parallel.
#[must_use]
pub fn line_line_intersect_2d(
    p1: &Point2,
    d1: &Vector2,
    p2: &Point2,
    d2: &Vector2,
) -> Option<(f64, f64)> {
    let cross = d1.x * d2.y - d1.y * d2.x;
    if cross.abs() < TOLERANCE {
        return None;
    }
    let dx = p2.x - p1.x;
    let dy = p2.y - p1.y;
    let t = (dx * d2.y - dy * d2.x) / cross;
    let u = (dx * d1.y - dy * d1.x) / cross;
    Some((t, u))
}

/// Bounded segment-segment intersection in 2D.
///
/// Returns `(intersection_point, t, u)` where `t` and `u` are in `[0, 1]`.
/// Parallel and collinear segments return `None`.
#[must_use]
pub fn segment_segment_intersect_2d(
    a0: &Point2,
    a1: &Point2,
    b0: &Point2,
    b1: &Point2,
) -> Option<(Point2, f64, f64)> {
    let da = a1 - a0;
    let db = b1 - b0;
    let (t, u) = line_line_intersect_2d(a0, &da, b0, &db)?;
    let within = |v: f64| (-TOLERANCE..=1.0 + TOLERANCE).contains(&v);
    if within(t) && within(u) {
        let t = t.clamp(0.0, 1.0);
        Some((point_at(a0, &da, t), t, u.clamp(0.0, 1.0)))
    } else {
        None
    }
}

/// Linear interpolation: `origin + dir * t`.
#[must_use]
pub fn point_at(origin: &Point2, dir: &Vector2, t: f64) -> Point2 {
    Point2::new(origin.x + dir.x * t, origin.y + dir.y * t)
}

/// Parameters `(t, u)` along `a0-a1` and `b0-b1` where `a` crosses or touches
/// the closed segment `b`, away from the endpoints of `a`.
///
/// `contact` is an absolute distance: hits closer than that to `a0` or `a1`
/// are ignored. Hits on the ends of `b` are reported with `u` at 0 or 1.
#[must_use]
pub fn segment_crosses_interior(
    a0: &Point2,
    a1: &Point2,
    b0: &Point2,
    b1: &Point2,
    contact: f64,
) -> Option<(f64, f64)> {
    let len = (a1 - a0).norm();
    if len < TOLERANCE {
        return None;
    }
    let (_, t, u) = segment_segment_intersect_2d(a0, a1, b0, b1)?;
    let t_eps = contact / len;
    (t > t_eps && t < 1.0 - t_eps).then_some((t, u))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn line_line_perpendicular() {
        let p1 = Point2::new(0.0, 0.0);
        let d1 = Vector2::new(1.0, 0.0);
        let p2 = Point2::new(0.5, -1.0);
        let d2 = Vector2::new(0.0, 1.0);
        let (t, u) = line_line_intersect_2d(&p1, &d1, &p2, &d2).unwrap();
        assert!((t - 0.5).abs() < TOLERANCE);
        assert!((u - 1.0).abs() < TOLERANCE);
    }

    #[test]
    fn line_line_parallel_returns_none() {
        let p1 = Point2::new(0.0, 0.0);
        let d1 = Vector2::new(1.0, 0.0);
        let p2 = Point2::new(0.0, 1.0);
        let d2 = Vector2::new(1.0, 0.0);
        assert!(line_line_intersect_2d(&p1, &d1, &p2, &d2).is_none());
    }

    #[test]
    fn segment_segment_crossing() {
        let a0 = Point2::new(0.0, 0.0);
        let a1 = Point2::new(2.0, 2.0);
        let b0 = Point2::new(0.0, 2.0);
        let b1 = Point2::new(2.0, 0.0);
        let (pt, t, u) = segment_segment_intersect_2d(&a0, &a1, &b0, &b1).unwrap();
        assert!((pt.x - 1.0).abs() < TOLERANCE);
        assert!((pt.y - 1.0).abs() < TOLERANCE);
        assert!((t - 0.5).abs() < TOLERANCE);
        assert!((u - 0.5).abs() < TOLERANCE);
    }

    #[test]
    fn segment_segment_no_crossing() {
        let a0 = Point2::new(0.0, 0.0);
        let a1 = Point2::new(1.0, 0.0);
        let b0 = Point2::new(0.0, 1.0);
        let b1 = Point2::new(1.0, 1.0);
        assert!(segment_segment_intersect_2d(&a0, &a1, &b0, &b1).is_none());
    }

    #[test]
    fn endpoint_contact_is_not_interior() {
        // Segment a ends exactly on b.
        let a0 = Point2::new(0.0, 0.0);
        let a1 = Point2::new(1.0, 0.0);
        let b0 = Point2::new(1.0, -1.0);
        let b1 = Point2::new(1.0, 1.0);
        assert!(segment_segment_intersect_2d(&a0, &a1, &b0, &b1).is_some());
        assert!(segment_crosses_interior(&a0, &a1, &b0, &b1, 1e-6).is_none());
    }

    #[test]
    fn interior_crossing_reports_parameter() {
        let a0 = Point2::new(0.0, 0.0);
        let a1 = Point2::new(4.0, 0.0);
        let b0 = Point2::new(1.0, -1.0);
        let b1 = Point2::new(1.0, 1.0);
        let (t, u) = segment_crosses_interior(&a0, &a1, &b0, &b1, 1e-6).unwrap();
        assert!((t - 0.25).abs() < TOLERANCE);
        assert!((u - 0.5).abs() < TOLERANCE);
    }

    #[test]
    fn point_at_interpolation() {
        let origin = Point2::new(1.0, 2.0);
        let dir = Vector2::new(4.0, 6.0);
        let pt = point_at(&origin, &dir, 0.5);
        assert!((pt.x - 3.0).abs() < TOLERANCE);
        assert!((pt.y - 5.0).abs() < TOLERANCE);
    }
}
