use crate::math::hull_2d::cross;
use crate::math::intersect_2d::{segment_crosses_interior, segment_segment_intersect_2d};
use crate::math::{to_2d, Envelope, Point2, Point3, CONTACT_TOLERANCE};
use crate::scene::{BuildingId, Scene, WallId};

/// Distance (m) from a corner contact at which the segment is checked for
/// entering the building.
const CORNER_STEP: f64 = 1e-3;

/// Line-of-sight queries against the walls and terrain of a scene.
///
/// Contacts within [`CONTACT_TOLERANCE`] of a segment's own endpoints are not
/// obstructions, so legs may start or end exactly on an edge.
#[derive(Debug, Clone, Copy)]
pub struct ObstructionTester<'a> {
    scene: &'a Scene,
}

impl<'a> ObstructionTester<'a> {
    #[must_use]
    pub fn new(scene: &'a Scene) -> Self {
        Self { scene }
    }

    /// Returns `true` if nothing in the scene obstructs the segment `a-b`.
    ///
    /// Walls listed in `exclude` are ignored; a reflection leg excludes the
    /// wall it reflects on.
    #[must_use]
    pub fn is_free_field(&self, a: &Point3, b: &Point3, exclude: &[WallId]) -> bool {
        let candidates = self.scene.index().walls(&Envelope::of_segment(a, b));
        !candidates
            .into_iter()
            .any(|id| !exclude.contains(&id) && self.wall_blocks(id, a, b))
            && !self.terrain_blocks(a, b)
    }

    /// Walls blocking `a-b`, in index order.
    #[must_use]
    pub fn blocking_walls(&self, a: &Point3, b: &Point3, exclude: &[WallId]) -> Vec<WallId> {
        self.scene
            .index()
            .walls(&Envelope::of_segment(a, b))
            .into_iter()
            .filter(|id| !exclude.contains(id) && self.wall_blocks(*id, a, b))
            .collect()
    }

    /// A wall blocks when the segment crosses it between its base and top.
    /// Touching only an end of the wall blocks when the segment enters the
    /// building there, or slips between two barriers joined at that end.
    fn wall_blocks(&self, id: WallId, a: &Point3, b: &Point3) -> bool {
        let Some(wall) = self.scene.wall(id) else {
            return false;
        };
        let (a2, b2) = (to_2d(a), to_2d(b));
        let Some((t, u)) = segment_crosses_interior(&a2, &b2, wall.p0(), wall.p1(), CONTACT_TOLERANCE) else {
            return false;
        };
        let z = a.z + (b.z - a.z) * t;
        if z >= wall.top() - CONTACT_TOLERANCE || z <= wall.base() - CONTACT_TOLERANCE {
            return false;
        }
        let u_eps = CONTACT_TOLERANCE / wall.length().max(CONTACT_TOLERANCE);
        if u > u_eps && u < 1.0 - u_eps {
            return true;
        }
        let (vertex, far) = if u <= u_eps {
            (wall.p0(), wall.p1())
        } else {
            (wall.p1(), wall.p0())
        };
        match wall.building() {
            Some(building) => self.enters_building(building, &a2, &b2, t),
            None => self.passes_between_barriers(id, vertex, far, &a2, &b2),
        }
    }

    fn enters_building(&self, id: BuildingId, a: &Point2, b: &Point2, t: f64) -> bool {
        let Some(building) = self.scene.building(id) else {
            return false;
        };
        let d = b - a;
        let dt = CORNER_STEP / d.norm();
        [t - dt, t + dt]
            .into_iter()
            .any(|s| building.contains(&(a + d * s.clamp(0.0, 1.0))))
    }

    /// `true` if another barrier ends at `vertex` on the other side of `a-b`
    /// than `far`, the opposite end of barrier `id`.
    fn passes_between_barriers(&self, id: WallId, vertex: &Point2, far: &Point2, a: &Point2, b: &Point2) -> bool {
        let side = cross(a, b, far);
        self.scene
            .index()
            .walls(&Envelope::of_point(*vertex).expanded(CONTACT_TOLERANCE))
            .into_iter()
            .filter(|other| *other != id)
            .filter_map(|other| self.scene.wall(other))
            .filter(|w| w.building().is_none())
            .filter_map(|w| {
                if (w.p0() - vertex).norm() <= CONTACT_TOLERANCE {
                    Some(*w.p1())
                } else if (w.p1() - vertex).norm() <= CONTACT_TOLERANCE {
                    Some(*w.p0())
                } else {
                    None
                }
            })
            .any(|other_far| side * cross(a, b, &other_far) < 0.0)
    }

    /// Returns `true` if the terrain rises above `a-b` somewhere between its
    /// ends.
    ///
    /// Along a straight line the terrain is linear between triangle edges, so
    /// testing the edge crossings is exact.
    #[must_use]
    pub fn terrain_blocks(&self, a: &Point3, b: &Point3) -> bool {
        let (a2, b2) = (to_2d(a), to_2d(b));
        let length = (b2 - a2).norm();
        if length < CONTACT_TOLERANCE {
            return false;
        }
        let t_min = CONTACT_TOLERANCE / length;
        let triangles = self.scene.terrain().triangles();
        self.scene
            .index()
            .triangles(&Envelope::of_segment(a, b))
            .into_iter()
            .filter_map(|i| triangles.get(i))
            .flat_map(|t| t.edges())
            .any(|(e0, e1)| {
                let Some((_, t, u)) = segment_segment_intersect_2d(&a2, &b2, &to_2d(&e0), &to_2d(&e1)) else {
                    return false;
                };
                if t <= t_min || t >= 1.0 - t_min {
                    return false;
                }
                let line_z = a.z + (b.z - a.z) * t;
                let ground = e0.z + (e1.z - e0.z) * u;
                line_z < ground - CONTACT_TOLERANCE
            })
    }
}
