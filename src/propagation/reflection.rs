use crate::math::intersect_2d::segment_segment_intersect_2d;
use crate::math::{to_2d, Point2, Point3, Vector2, REFLECTION_OFFSET, TOLERANCE};
use crate::scene::{Scene, WallId};

use super::mirror_receivers::MirrorReceiverArena;
use super::obstruction::ObstructionTester;
use super::path::PropagationPath;

/// Turns receiver images into validated reflection paths.
///
/// Every image of the arena is tried, not only the deepest ones, so the
/// lower-order reflections sharing a prefix are found as well.
pub struct ValidateReflections<'a> {
    source: Point3,
    receiver: Point3,
    arena: &'a MirrorReceiverArena,
    max_path_length: f64,
}

impl<'a> ValidateReflections<'a> {
    #[must_use]
    pub fn new(source: Point3, receiver: Point3, arena: &'a MirrorReceiverArena, max_path_length: f64) -> Self {
        Self {
            source,
            receiver,
            arena,
            max_path_length,
        }
    }

    /// Validates every image chain, returning the accepted paths in arena
    /// order.
    #[must_use]
    pub fn execute(&self, scene: &Scene) -> Vec<PropagationPath> {
        let tester = ObstructionTester::new(scene);
        (0..self.arena.len())
            .filter_map(|i| self.validate_chain(scene, &tester, i))
            .collect()
    }

    /// Walks from the source through the walls of the chain ending at
    /// `index`, aborting at the first invalid reflection or blocked leg.
    fn validate_chain(&self, scene: &Scene, tester: &ObstructionTester<'_>, index: usize) -> Option<PropagationPath> {
        let leaf = self.arena.get(index)?;
        let unfolded = (leaf.position - self.source).norm();
        if unfolded > self.max_path_length {
            return None;
        }
        let unfolded_2d = (to_2d(&leaf.position) - to_2d(&self.source)).norm();
        if unfolded_2d < TOLERANCE {
            return None;
        }

        let chain = self.arena.chain(index);
        let mut reflections: Vec<Point3> = Vec::with_capacity(chain.len());
        let mut walls: Vec<WallId> = Vec::with_capacity(chain.len());

        let mut previous = self.source;
        let mut previous_test = self.source;
        let mut previous_wall: Option<WallId> = None;
        let mut travelled_2d = 0.0;

        for &i in &chain {
            let node = self.arena.get(i)?;
            let wall = scene.wall(node.wall)?;
            let from = to_2d(&previous);
            let (hit, _, _) = segment_segment_intersect_2d(&from, &to_2d(&node.position), wall.p0(), wall.p1())?;
            let step = (hit - from).norm();
            if step < TOLERANCE {
                return None;
            }
            travelled_2d += step;
            let z = self.source.z + (self.receiver.z - self.source.z) * travelled_2d / unfolded_2d;
            if z > wall.top() || z < wall.base() {
                return None;
            }
            let point = Point3::new(hit.x, hit.y, z);
            let test = offset_point(&hit, &wall.normal_towards(&from), z);

            let exclude = exclusions(previous_wall, node.wall);
            if !tester.is_free_field(&previous_test, &test, &exclude) {
                return None;
            }

            reflections.push(point);
            walls.push(node.wall);
            previous = point;
            previous_test = test;
            previous_wall = Some(node.wall);
        }

        let exclude = exclusions(None, previous_wall?);
        if !tester.is_free_field(&previous_test, &self.receiver, &exclude) {
            return None;
        }
        let path = PropagationPath::reflected(self.source, &reflections, self.receiver, walls);
        (path.length() <= self.max_path_length).then_some(path)
    }
}

fn offset_point(hit: &Point2, normal: &Vector2, z: f64) -> Point3 {
    Point3::new(hit.x + normal.x * REFLECTION_OFFSET, hit.y + normal.y * REFLECTION_OFFSET, z)
}

fn exclusions(previous: Option<WallId>, current: WallId) -> Vec<WallId> {
    previous.into_iter().chain(std::iter::once(current)).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::propagation::mirror_receivers::GenerateMirrorReceivers;

    fn p(x: f64, y: f64) -> Point2 {
        Point2::new(x, y)
    }

    fn paths(scene: &Scene, s: Point3, r: Point3, order: usize) -> Vec<PropagationPath> {
        let arena = GenerateMirrorReceivers::new(s, r, order, 50.0, 750.0).execute(scene);
        ValidateReflections::new(s, r, &arena, 750.0).execute(scene)
    }

    #[test]
    fn single_wall_reflection_point() {
        let scene = Scene::builder().add_wall(p(0.0, 10.0), p(20.0, 10.0), 8.0).build();
        let s = Point3::new(2.0, 0.0, 1.0);
        let r = Point3::new(12.0, 0.0, 3.0);
        let found = paths(&scene, s, r, 1);
        assert_eq!(found.len(), 1);
        let points = found[0].points();
        assert_relative_eq!(points[1].x, 7.0, epsilon = 1e-9);
        assert_relative_eq!(points[1].y, 10.0, epsilon = 1e-9);
        assert_relative_eq!(points[1].z, 2.0, epsilon = 1e-9);
        // Unfolded length equals the distance to the image.
        assert_relative_eq!(found[0].length(), (Point3::new(12.0, 20.0, 3.0) - s).norm(), epsilon = 1e-9);
    }

    #[test]
    fn reflection_missing_the_wall_is_rejected() {
        let scene = Scene::builder().add_wall(p(0.0, 10.0), p(4.0, 10.0), 8.0).build();
        let found = paths(&scene, Point3::new(10.0, 0.0, 1.0), Point3::new(20.0, 0.0, 1.0), 1);
        assert!(found.is_empty());
    }

    #[test]
    fn reflection_above_wall_top_is_rejected() {
        let scene = Scene::builder().add_wall(p(0.0, 10.0), p(20.0, 10.0), 2.0).build();
        let found = paths(&scene, Point3::new(2.0, 0.0, 4.0), Point3::new(12.0, 0.0, 4.0), 1);
        assert!(found.is_empty());
    }

    #[test]
    fn blocked_leg_rejects_the_chain() {
        // The barrier at y = 4 cuts the source leg of the reflection at (7, 10).
        let scene = Scene::builder()
            .add_wall(p(0.0, 10.0), p(20.0, 10.0), 8.0)
            .add_wall(p(3.0, 4.0), p(6.0, 4.0), 8.0)
            .build();
        let found = paths(&scene, Point3::new(2.0, 0.0, 1.0), Point3::new(12.0, 0.0, 3.0), 1);
        assert!(found.is_empty());
    }
}
