pub mod distance_2d;
pub mod envelope;
pub mod hull_2d;
pub mod intersect_2d;
pub mod mirror_2d;
pub mod polygon_2d;

pub use envelope::Envelope;

/// 2D point type.
pub type Point2 = nalgebra::Point2<f64>;

/// 3D point type.
pub type Point3 = nalgebra::Point3<f64>;

/// 2D vector type.
pub type Vector2 = nalgebra::Vector2<f64>;

/// 3D vector type.
pub type Vector3 = nalgebra::Vector3<f64>;

/// Global geometric tolerance for floating-point comparisons.
pub const TOLERANCE: f64 = 1e-10;

/// Contacts closer than this (in metres) to a segment's own endpoints are not
/// counted as obstructions.
pub const CONTACT_TOLERANCE: f64 = 1e-6;

/// Distance (in metres) a reflection point is pushed off its wall, toward the
/// incoming side, before the adjoining legs are tested for visibility.
pub const REFLECTION_OFFSET: f64 = 1e-3;

/// Drops the Z coordinate.
#[must_use]
pub fn to_2d(p: &Point3) -> Point2 {
    Point2::new(p.x, p.y)
}

/// Horizontal (XY) distance between two 3D points.
#[must_use]
pub fn distance_2d(a: &Point3, b: &Point3) -> f64 {
    (a.x - b.x).hypot(a.y - b.y)
}

/// Returns `true` when all coordinates are finite.
#[must_use]
pub fn is_finite_3d(p: &Point3) -> bool {
    p.x.is_finite() && p.y.is_finite() && p.z.is_finite()
}

/// Returns `true` when both coordinates are finite.
#[must_use]
pub fn is_finite_2d(p: &Point2) -> bool {
    p.x.is_finite() && p.y.is_finite()
}

/// Converts a level in decibels to relative power.
#[must_use]
pub fn db_to_power(level: f64) -> f64 {
    10f64.powf(level / 10.0)
}

/// Converts relative power to a level in decibels (`-inf` for zero power).
#[must_use]
pub fn power_to_db(power: f64) -> f64 {
    if power > 0.0 {
        10.0 * power.log10()
    } else {
        f64::NEG_INFINITY
    }
}

/// Energetic sum of levels in decibels.
#[must_use]
pub fn energetic_sum(levels: impl IntoIterator<Item = f64>) -> f64 {
    power_to_db(levels.into_iter().map(db_to_power).sum())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_equal_levels_add_three_db() {
        let sum = energetic_sum([60.0, 60.0]);
        assert!((sum - 63.0103).abs() < 1e-3, "sum={sum}");
    }

    #[test]
    fn empty_sum_is_silence() {
        assert!(energetic_sum(std::iter::empty()).is_infinite());
        assert!(power_to_db(0.0) < 0.0);
    }

    #[test]
    fn horizontal_distance_ignores_z() {
        let d = distance_2d(&Point3::new(0.0, 0.0, 0.0), &Point3::new(3.0, 4.0, 100.0));
        assert!((d - 5.0).abs() < TOLERANCE);
    }
}
