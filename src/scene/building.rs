use crate::error::{Result, SceneError};
use crate::math::polygon_2d::{normalize_ring, point_in_polygon, signed_area_2d, to_counter_clockwise};
use crate::math::{is_finite_2d, Envelope, Point2, TOLERANCE};

use super::wall::WallId;

slotmap::new_key_type! {
    /// Unique identifier for a building in a scene.
    pub struct BuildingId;
}

/// A building: a closed footprint extruded to a flat roof.
#[derive(Debug, Clone)]
pub struct Building {
    footprint: Vec<Point2>,
    height: f64,
    base: f64,
    envelope: Envelope,
    walls: Vec<WallId>,
}

impl Building {
    /// Creates a building from a footprint ring and a height above its base.
    ///
    /// The ring may be open or closed and in either orientation; it is
    /// stored counter-clockwise without the closing vertex.
    ///
    /// # Errors
    ///
    /// Returns `SceneError::InvalidFootprint` if the ring has fewer than
    /// three distinct vertices, zero area or non-finite coordinates, or if
    /// the height is not strictly positive.
    pub fn new(footprint: &[Point2], height: f64, base: f64) -> Result<Self> {
        if footprint.iter().any(|p| !is_finite_2d(p)) || !base.is_finite() {
            return Err(SceneError::InvalidFootprint("non-finite coordinate".into()).into());
        }
        if !height.is_finite() || height <= 0.0 {
            return Err(SceneError::InvalidFootprint(format!("height {height} must be positive")).into());
        }
        let ring = normalize_ring(footprint);
        if ring.len() < 3 {
            return Err(SceneError::InvalidFootprint(format!(
                "{} distinct vertices, at least 3 required",
                ring.len()
            ))
            .into());
        }
        if signed_area_2d(&ring).abs() < TOLERANCE {
            return Err(SceneError::InvalidFootprint("zero-area footprint".into()).into());
        }
        let ring = to_counter_clockwise(ring);
        let envelope = Envelope::of_points(&ring)
            .ok_or_else(|| SceneError::InvalidFootprint("empty footprint".into()))?;
        Ok(Self {
            footprint: ring,
            height,
            base,
            envelope,
            walls: Vec::new(),
        })
    }

    /// Counter-clockwise footprint ring (not closed).
    #[must_use]
    pub fn footprint(&self) -> &[Point2] {
        &self.footprint
    }

    /// Height above the base.
    #[must_use]
    pub fn height(&self) -> f64 {
        self.height
    }

    /// Absolute elevation of the footprint.
    #[must_use]
    pub fn base(&self) -> f64 {
        self.base
    }

    /// Absolute roof elevation.
    #[must_use]
    pub fn top(&self) -> f64 {
        self.base + self.height
    }

    /// Footprint bounding box.
    #[must_use]
    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    /// Walls generated from this footprint.
    #[must_use]
    pub fn walls(&self) -> &[WallId] {
        &self.walls
    }

    /// Returns `true` if `p` lies inside the footprint.
    #[must_use]
    pub fn contains(&self, p: &Point2) -> bool {
        self.envelope.contains(p) && point_in_polygon(p, &self.footprint)
    }

    /// Footprint edges as `(start, end)` pairs, closing edge included.
    pub fn edges(&self) -> impl Iterator<Item = (Point2, Point2)> + '_ {
        let n = self.footprint.len();
        (0..n).map(move |i| (self.footprint[i], self.footprint[(i + 1) % n]))
    }

    pub(crate) fn set_walls(&mut self, walls: Vec<WallId>) {
        self.walls = walls;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64) -> Point2 {
        Point2::new(x, y)
    }

    #[test]
    fn clockwise_closed_ring_is_normalized() {
        let ring = [p(0.0, 0.0), p(0.0, 5.0), p(5.0, 5.0), p(5.0, 0.0), p(0.0, 0.0)];
        let b = Building::new(&ring, 10.0, 2.0).unwrap();
        assert_eq!(b.footprint().len(), 4);
        assert!(signed_area_2d(b.footprint()) > 0.0);
        assert!((b.top() - 12.0).abs() < TOLERANCE);
        assert_eq!(b.edges().count(), 4);
    }

    #[test]
    fn contains_interior_points_only() {
        let b = Building::new(&[p(0.0, 0.0), p(5.0, 0.0), p(5.0, 5.0), p(0.0, 5.0)], 3.0, 0.0).unwrap();
        assert!(b.contains(&p(2.0, 2.0)));
        assert!(!b.contains(&p(6.0, 2.0)));
    }

    #[test]
    fn degenerate_footprints_are_rejected() {
        assert!(Building::new(&[p(0.0, 0.0), p(1.0, 0.0)], 3.0, 0.0).is_err());
        assert!(Building::new(&[p(0.0, 0.0), p(1.0, 0.0), p(2.0, 0.0)], 3.0, 0.0).is_err());
        assert!(Building::new(&[p(0.0, 0.0), p(1.0, 0.0), p(1.0, 1.0)], 0.0, 0.0).is_err());
        assert!(Building::new(&[p(0.0, f64::NAN), p(1.0, 0.0), p(1.0, 1.0)], 3.0, 0.0).is_err());
    }
}
