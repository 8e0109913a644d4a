use super::Point2;

/// Returns the minimum distance from point `p` to the line segment `a-b`.
#[must_use]
pub fn point_to_segment_dist(p: &Point2, a: &Point2, b: &Point2) -> f64 {
    let (closest, _) = closest_point_on_segment(p, a, b);
    (p - closest).norm()
}

/// Projects `p` onto segment `a-b`, returning the closest point and its
/// parameter clamped to `[0, 1]`.
#[must_use]
pub fn closest_point_on_segment(p: &Point2, a: &Point2, b: &Point2) -> (Point2, f64) {
    let d = b - a;
    let len_sq = d.norm_squared();

    if len_sq < 1e-20 {
        // Degenerate segment (zero length).
        return (*a, 0.0);
    }

    // Project point onto the infinite line, clamp to [0, 1].
    let t = ((p - a).dot(&d) / len_sq).clamp(0.0, 1.0);
    (a + d * t, t)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-10;

    fn p(x: f64, y: f64) -> Point2 {
        Point2::new(x, y)
    }

    #[test]
    fn segment_dist_perpendicular_projection() {
        // Point (1, 1) to segment (0,0)→(2,0). Closest at (1,0), dist = 1.
        let d = point_to_segment_dist(&p(1.0, 1.0), &p(0.0, 0.0), &p(2.0, 0.0));
        assert!((d - 1.0).abs() < TOL, "d={d}");
    }

    #[test]
    fn segment_dist_endpoint_closest() {
        let d = point_to_segment_dist(&p(-1.0, 0.0), &p(0.0, 0.0), &p(2.0, 0.0));
        assert!((d - 1.0).abs() < TOL, "d={d}");
    }

    #[test]
    fn segment_dist_on_segment() {
        let d = point_to_segment_dist(&p(1.0, 0.0), &p(0.0, 0.0), &p(2.0, 0.0));
        assert!(d.abs() < TOL, "d={d}");
    }

    #[test]
    fn segment_dist_degenerate() {
        // Zero-length segment: distance is point-to-point.
        let d = point_to_segment_dist(&p(3.0, 4.0), &p(0.0, 0.0), &p(0.0, 0.0));
        assert!((d - 5.0).abs() < TOL, "d={d}");
    }

    #[test]
    fn closest_point_parameter() {
        let (c, t) = closest_point_on_segment(&p(3.0, 5.0), &p(0.0, 0.0), &p(4.0, 0.0));
        assert!((c.x - 3.0).abs() < TOL);
        assert!((t - 0.75).abs() < TOL);
    }
}
