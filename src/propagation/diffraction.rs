use std::collections::HashSet;

use tracing::trace;

use crate::math::hull_2d::{convex_hull, upper_hull_indices};
use crate::math::{to_2d, Point2, Point3, TOLERANCE};
use crate::scene::{BuildingId, Scene, WallId};

use super::obstruction::ObstructionTester;
use super::path::{DiffractionKind, PropagationPath};
use super::profile::Profile;

/// Number of times the horizontal hull may grow around obstacles found on
/// its own sides.
const MAX_HULL_ITERATIONS: usize = 8;

/// Builds diffraction paths for a blocked source-receiver pair.
///
/// The vertical path follows the upper convex hull of the profile, which
/// passes over the tallest obstacle relative to the direct line. Horizontal
/// paths follow the two sides of the convex hull of the source, the receiver
/// and the footprints of the blocking obstacles.
pub struct BuildDiffractionPaths<'a> {
    profile: &'a Profile,
    vertical: bool,
    horizontal: bool,
    max_path_length: f64,
}

impl<'a> BuildDiffractionPaths<'a> {
    #[must_use]
    pub fn new(profile: &'a Profile, vertical: bool, horizontal: bool, max_path_length: f64) -> Self {
        Self {
            profile,
            vertical,
            horizontal,
            max_path_length,
        }
    }

    /// Returns the vertical path first, then the left and right paths.
    #[must_use]
    pub fn execute(&self, scene: &Scene) -> Vec<PropagationPath> {
        let tester = ObstructionTester::new(scene);
        let mut paths = Vec::new();
        if self.vertical {
            paths.extend(self.vertical_path(&tester));
        }
        if self.horizontal {
            paths.extend(self.horizontal_paths(scene, &tester));
        }
        trace!(paths = paths.len(), "diffraction");
        paths
    }

    fn vertical_path(&self, tester: &ObstructionTester<'_>) -> Option<PropagationPath> {
        let profile = self.profile;
        if !profile.is_blocked() {
            return None;
        }
        let (source, receiver) = (*profile.source(), *profile.receiver());
        let mut cut: Vec<Point2> = Vec::with_capacity(profile.samples().len() + 2);
        cut.push(Point2::new(0.0, source.z));
        cut.extend(profile.interior().map(|s| Point2::new(s.distance, s.obstacle_top)));
        cut.push(Point2::new(profile.length_2d(), receiver.z));

        let hull = upper_hull_indices(&cut);
        if hull.len() < 3 {
            return None;
        }
        let edges: Vec<Point3> = hull[1..hull.len() - 1]
            .iter()
            .map(|&i| profile.point_at(cut[i].x, cut[i].y))
            .collect();
        self.accept(
            PropagationPath::diffracted(source, edges, receiver, DiffractionKind::Vertical),
            tester,
        )
    }

    fn horizontal_paths(&self, scene: &Scene, tester: &ObstructionTester<'_>) -> Vec<PropagationPath> {
        let (source, receiver) = (*self.profile.source(), *self.profile.receiver());
        let (s2, r2) = (to_2d(&source), to_2d(&receiver));
        if (r2 - s2).norm() < TOLERANCE {
            return Vec::new();
        }

        let mut obstacles = Obstacles::default();
        obstacles.add(scene, &tester.blocking_walls(&source, &receiver, &[]));
        if obstacles.points.is_empty() {
            return Vec::new();
        }

        let sides = [DiffractionKind::HorizontalLeft, DiffractionKind::HorizontalRight];
        let mut resolved = [false; 2];
        let mut found: Vec<PropagationPath> = Vec::new();

        for _ in 0..MAX_HULL_ITERATIONS {
            let mut points = Vec::with_capacity(obstacles.points.len() + 2);
            points.push(s2);
            points.push(r2);
            points.extend_from_slice(&obstacles.points);
            let hull = convex_hull(&points);
            let (Some(si), Some(ri)) = (vertex_index(&hull, &s2), vertex_index(&hull, &r2)) else {
                break;
            };

            let mut grew = false;
            for (side, kind) in sides.iter().enumerate() {
                if resolved[side] {
                    continue;
                }
                let corners = hull_chain(&hull, si, ri, *kind);
                let path = unfolded_path(&source, &corners, &receiver, *kind);
                let blockers: Vec<WallId> = path
                    .points()
                    .windows(2)
                    .flat_map(|leg| tester.blocking_walls(&leg[0], &leg[1], &[]))
                    .collect();
                if blockers.is_empty() {
                    resolved[side] = true;
                    found.extend(self.accept(path, tester));
                } else {
                    grew |= obstacles.add(scene, &blockers);
                }
            }
            if resolved.iter().all(|r| *r) || !grew {
                break;
            }
        }
        found.sort_by_key(|p| match p {
            PropagationPath::Diffracted { kind, .. } => *kind == DiffractionKind::HorizontalRight,
            _ => true,
        });
        found
    }

    /// Keeps `path` if every leg is clear and it is short enough.
    fn accept(&self, path: PropagationPath, tester: &ObstructionTester<'_>) -> Option<PropagationPath> {
        if path.length() > self.max_path_length {
            return None;
        }
        path.points()
            .windows(2)
            .all(|leg| tester.is_free_field(&leg[0], &leg[1], &[]))
            .then_some(path)
    }
}

/// Corner points of the obstacles considered by the horizontal search.
#[derive(Default)]
struct Obstacles {
    points: Vec<Point2>,
    walls: HashSet<WallId>,
    buildings: HashSet<BuildingId>,
}

impl Obstacles {
    /// Adds the corners of `walls`, or of their whole building. Returns
    /// `true` if anything new was added.
    fn add(&mut self, scene: &Scene, walls: &[WallId]) -> bool {
        let mut grew = false;
        for &id in walls {
            if !self.walls.insert(id) {
                continue;
            }
            let Some(wall) = scene.wall(id) else {
                continue;
            };
            match wall.building() {
                Some(building) => {
                    if self.buildings.insert(building) {
                        if let Some(b) = scene.building(building) {
                            self.points.extend_from_slice(b.footprint());
                            grew = true;
                        }
                    }
                }
                None => {
                    self.points.push(*wall.p0());
                    self.points.push(*wall.p1());
                    grew = true;
                }
            }
        }
        grew
    }
}

fn vertex_index(hull: &[Point2], p: &Point2) -> Option<usize> {
    hull.iter().position(|q| (q - p).norm() < TOLERANCE)
}

/// Hull vertices strictly between the source and the receiver on one side.
///
/// The hull is counter-clockwise, so walking forward from the source passes
/// on the right of the source-receiver direction.
fn hull_chain(hull: &[Point2], source: usize, receiver: usize, kind: DiffractionKind) -> Vec<Point2> {
    let n = hull.len();
    let step = if kind == DiffractionKind::HorizontalRight { 1 } else { n - 1 };
    let mut corners = Vec::new();
    let mut i = (source + step) % n;
    while i != receiver && corners.len() < n {
        corners.push(hull[i]);
        i = (i + step) % n;
    }
    corners
}

/// Path through horizontal corners, with elevations interpolated along the
/// unfolded horizontal length.
fn unfolded_path(source: &Point3, corners: &[Point2], receiver: &Point3, kind: DiffractionKind) -> PropagationPath {
    let mut plan: Vec<Point2> = Vec::with_capacity(corners.len() + 2);
    plan.push(to_2d(source));
    plan.extend_from_slice(corners);
    plan.push(to_2d(receiver));
    let total: f64 = plan.windows(2).map(|w| (w[1] - w[0]).norm()).sum();

    let mut travelled = 0.0;
    let mut edges = Vec::with_capacity(corners.len());
    for w in plan.windows(2).take(corners.len()) {
        travelled += (w[1] - w[0]).norm();
        let z = source.z + (receiver.z - source.z) * travelled / total;
        edges.push(Point3::new(w[1].x, w[1].y, z));
    }
    PropagationPath::diffracted(*source, edges, *receiver, kind)
}
