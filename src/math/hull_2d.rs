use super::{Point2, TOLERANCE};

/// Cross product of `o->a` and `o->b`. Positive when `o, a, b` turn left.
#[must_use]
pub fn cross(o: &Point2, a: &Point2, b: &Point2) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

/// Convex hull (Andrew's monotone chain).
///
/// Returns the hull vertices in counter-clockwise order without repeating the
/// first vertex. Collinear points on hull edges are dropped.
#[must_use]
pub fn convex_hull(points: &[Point2]) -> Vec<Point2> {
    let mut pts: Vec<Point2> = points.to_vec();
    pts.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    pts.dedup_by(|a, b| (*a - *b).norm() < TOLERANCE);

    if pts.len() < 3 {
        return pts;
    }

    let mut lower: Vec<Point2> = Vec::with_capacity(pts.len());
    for p in &pts {
        while lower.len() >= 2 && cross(&lower[lower.len() - 2], &lower[lower.len() - 1], p) <= TOLERANCE {
            lower.pop();
        }
        lower.push(*p);
    }

    let mut upper: Vec<Point2> = Vec::with_capacity(pts.len());
    for p in pts.iter().rev() {
        while upper.len() >= 2 && cross(&upper[upper.len() - 2], &upper[upper.len() - 1], p) <= TOLERANCE {
            upper.pop();
        }
        upper.push(*p);
    }

    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

/// Indices of the upper convex hull of points already sorted by increasing X.
///
/// The first and last indices are always included. Points lying on a hull
/// edge are dropped.
#[must_use]
pub fn upper_hull_indices(points: &[Point2]) -> Vec<usize> {
    let mut hull: Vec<usize> = Vec::with_capacity(points.len());
    for (i, p) in points.iter().enumerate() {
        while hull.len() >= 2 {
            let a = &points[hull[hull.len() - 2]];
            let b = &points[hull[hull.len() - 1]];
            // Pop while the turn a -> b -> p is not clockwise.
            if cross(a, b, p) >= -TOLERANCE {
                hull.pop();
            } else {
                break;
            }
        }
        hull.push(i);
    }
    hull
}
