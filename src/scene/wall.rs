use crate::error::{Result, SceneError};
use crate::math::distance_2d::point_to_segment_dist;
use crate::math::mirror_2d::MirrorLine;
use crate::math::{is_finite_2d, Envelope, Point2, Vector2, TOLERANCE};

use super::building::BuildingId;

/// Stable identifier of a wall within one scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WallId(pub usize);

/// A vertical wall: a footprint segment extruded from `base` to `top`.
///
/// Building walls are one-sided: their left normal (`p0 -> p1`) points out of
/// the building and only that side reflects. Standalone walls reflect on both
/// sides.
#[derive(Debug, Clone)]
pub struct Wall {
    id: WallId,
    p0: Point2,
    p1: Point2,
    base: f64,
    top: f64,
    building: Option<BuildingId>,
    mirror: MirrorLine,
}

impl Wall {
    /// Creates a wall.
    ///
    /// # Errors
    ///
    /// Returns `SceneError::InvalidWall` for non-finite coordinates, a
    /// zero-length footprint or a top not above the base.
    pub fn new(
        id: WallId,
        p0: Point2,
        p1: Point2,
        base: f64,
        top: f64,
        building: Option<BuildingId>,
    ) -> Result<Self> {
        if !is_finite_2d(&p0) || !is_finite_2d(&p1) || !base.is_finite() || !top.is_finite() {
            return Err(SceneError::InvalidWall(format!("wall {} has non-finite coordinates", id.0)).into());
        }
        if top - base <= TOLERANCE {
            return Err(SceneError::InvalidWall(format!(
                "wall {} top {top} is not above its base {base}",
                id.0
            ))
            .into());
        }
        let mirror = MirrorLine::through(&p0, &p1)
            .map_err(|_| SceneError::InvalidWall(format!("wall {} has zero length", id.0)))?;
        Ok(Self {
            id,
            p0,
            p1,
            base,
            top,
            building,
            mirror,
        })
    }

    /// Identifier of this wall.
    #[must_use]
    pub fn id(&self) -> WallId {
        self.id
    }

    /// Footprint start point.
    #[must_use]
    pub fn p0(&self) -> &Point2 {
        &self.p0
    }

    /// Footprint end point.
    #[must_use]
    pub fn p1(&self) -> &Point2 {
        &self.p1
    }

    /// Absolute elevation of the wall foot.
    #[must_use]
    pub fn base(&self) -> f64 {
        self.base
    }

    /// Absolute elevation of the wall top.
    #[must_use]
    pub fn top(&self) -> f64 {
        self.top
    }

    /// Owning building, if any.
    #[must_use]
    pub fn building(&self) -> Option<BuildingId> {
        self.building
    }

    /// Returns `true` for walls that reflect on one side only.
    #[must_use]
    pub fn is_one_sided(&self) -> bool {
        self.building.is_some()
    }

    /// Vertical mirror plane of this wall.
    #[must_use]
    pub fn mirror(&self) -> &MirrorLine {
        &self.mirror
    }

    /// Footprint length.
    #[must_use]
    pub fn length(&self) -> f64 {
        (self.p1 - self.p0).norm()
    }

    /// Horizontal bounding box.
    #[must_use]
    pub fn envelope(&self) -> Envelope {
        Envelope::new(self.p0, self.p1)
    }

    /// Horizontal distance from `p` to the footprint segment.
    #[must_use]
    pub fn distance_to(&self, p: &Point2) -> f64 {
        point_to_segment_dist(p, &self.p0, &self.p1)
    }

    /// Returns `true` if `p` lies strictly on a reflecting side of the wall.
    #[must_use]
    pub fn faces(&self, p: &Point2) -> bool {
        let d = self.mirror.signed_distance(p);
        if self.is_one_sided() {
            d > TOLERANCE
        } else {
            d.abs() > TOLERANCE
        }
    }

    /// Unit normal pointing toward the side of the wall that contains `p`.
    #[must_use]
    pub fn normal_towards(&self, p: &Point2) -> Vector2 {
        let n = *self.mirror.normal();
        if self.mirror.signed_distance(p) >= 0.0 {
            n
        } else {
            -n
        }
    }
}
