use super::polygon_2d::{left_normal, segment_direction};
use super::{Point2, Point3, Vector2};
use crate::error::Result;

/// A vertical mirror plane, seen from above as an infinite line.
///
/// Reflection keeps the Z coordinate, which is what reflecting across a
/// vertical wall does in 3D.
#[derive(Debug, Clone, Copy)]
pub struct MirrorLine {
    origin: Point2,
    normal: Vector2,
}

impl MirrorLine {
    /// Creates the mirror line through `a` and `b`.
    ///
    /// The normal points to the left of `a -> b`.
    ///
    /// # Errors
    ///
    /// Returns an error if `a` and `b` coincide.
    pub fn through(a: &Point2, b: &Point2) -> Result<Self> {
        let dir = segment_direction(a, b)?;
        Ok(Self {
            origin: *a,
            normal: left_normal(dir),
        })
    }

    /// Unit normal of the line (left of the defining direction).
    #[must_use]
    pub fn normal(&self) -> &Vector2 {
        &self.normal
    }

    /// Signed distance of `p` from the line, positive on the normal side.
    #[must_use]
    pub fn signed_distance(&self, p: &Point2) -> f64 {
        (p - self.origin).dot(&self.normal)
    }

    /// Reflects a 3D point across the vertical plane of this line.
    #[must_use]
    pub fn reflect(&self, p: &Point3) -> Point3 {
        let d = self.signed_distance(&Point2::new(p.x, p.y));
        Point3::new(
            p.x - 2.0 * d * self.normal.x,
            p.y - 2.0 * d * self.normal.y,
            p.z,
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn reflect_across_axis() {
        let line = MirrorLine::through(&Point2::new(0.0, 0.0), &Point2::new(1.0, 0.0)).unwrap();
        let img = line.reflect(&Point3::new(3.0, 2.0, 5.0));
        assert_relative_eq!(img.x, 3.0);
        assert_relative_eq!(img.y, -2.0);
        assert_relative_eq!(img.z, 5.0);
    }

    #[test]
    fn reflect_twice_is_identity() {
        let line = MirrorLine::through(&Point2::new(1.0, -4.0), &Point2::new(7.5, 3.25)).unwrap();
        for p in [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(-12.3, 44.1, 4.0),
            Point3::new(1e4, -3e3, 1.5),
        ] {
            let back = line.reflect(&line.reflect(&p));
            assert_relative_eq!(back, p, epsilon = 1e-9);
        }
    }

    #[test]
    fn reflected_point_is_equidistant() {
        let line = MirrorLine::through(&Point2::new(0.0, 0.0), &Point2::new(1.0, 1.0)).unwrap();
        let p = Point3::new(4.0, 1.0, 0.0);
        let img = line.reflect(&p);
        let d0 = line.signed_distance(&Point2::new(p.x, p.y));
        let d1 = line.signed_distance(&Point2::new(img.x, img.y));
        assert_relative_eq!(d0, -d1, epsilon = 1e-12);
    }

    #[test]
    fn degenerate_line_is_rejected() {
        let a = Point2::new(2.0, 2.0);
        assert!(MirrorLine::through(&a, &a).is_err());
    }
}
