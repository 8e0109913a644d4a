use crate::error::{GeometryError, Result};
use crate::math::intersect_2d::segment_segment_intersect_2d;
use crate::math::{to_2d, Envelope, Point3, CONTACT_TOLERANCE, TOLERANCE};
use crate::scene::{Scene, WallId};

/// Samples closer than this along the profile (m) are merged.
const MERGE_DISTANCE: f64 = 1e-6;

/// One sample of a vertical cut between a source and a receiver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProfileSample {
    /// Horizontal distance from the source.
    pub distance: f64,
    /// Ground elevation.
    pub ground: f64,
    /// Highest obstacle elevation: the wall top on a wall, else the ground.
    pub obstacle_top: f64,
    /// Wall crossed at this sample, if any.
    pub wall: Option<WallId>,
}

/// Vertical cross-section of terrain and obstacles along the horizontal
/// projection of a source-receiver segment.
///
/// Samples are ordered by distance and include both ends. Between two
/// consecutive samples the ground is linear.
#[derive(Debug, Clone)]
pub struct Profile {
    source: Point3,
    receiver: Point3,
    length_2d: f64,
    samples: Vec<ProfileSample>,
    source_in_building: bool,
    receiver_in_building: bool,
    source_below_ground: bool,
    receiver_below_ground: bool,
}

impl Profile {
    #[must_use]
    pub fn source(&self) -> &Point3 {
        &self.source
    }

    #[must_use]
    pub fn receiver(&self) -> &Point3 {
        &self.receiver
    }

    /// Horizontal source-receiver distance.
    #[must_use]
    pub fn length_2d(&self) -> f64 {
        self.length_2d
    }

    #[must_use]
    pub fn samples(&self) -> &[ProfileSample] {
        &self.samples
    }

    #[must_use]
    pub fn source_in_building(&self) -> bool {
        self.source_in_building
    }

    #[must_use]
    pub fn receiver_in_building(&self) -> bool {
        self.receiver_in_building
    }

    #[must_use]
    pub fn source_below_ground(&self) -> bool {
        self.source_below_ground
    }

    #[must_use]
    pub fn receiver_below_ground(&self) -> bool {
        self.receiver_below_ground
    }

    /// Returns `true` if either end is inside a building or under the
    /// ground, in which case no path can exist.
    #[must_use]
    pub fn has_enclosed_endpoint(&self) -> bool {
        self.source_in_building || self.receiver_in_building || self.source_below_ground || self.receiver_below_ground
    }

    /// Elevation of the straight source-receiver line above `distance`.
    #[must_use]
    pub fn line_height_at(&self, distance: f64) -> f64 {
        if self.length_2d < TOLERANCE {
            return self.source.z;
        }
        self.source.z + (self.receiver.z - self.source.z) * distance / self.length_2d
    }

    /// 3D point above `distance` at elevation `z`.
    #[must_use]
    pub fn point_at(&self, distance: f64, z: f64) -> Point3 {
        let (s, r) = (to_2d(&self.source), to_2d(&self.receiver));
        let p = if self.length_2d < TOLERANCE {
            s
        } else {
            s + (r - s) * (distance / self.length_2d)
        };
        Point3::new(p.x, p.y, z)
    }

    /// Returns `true` if an obstacle rises above the direct line.
    #[must_use]
    pub fn is_blocked(&self) -> bool {
        self.interior()
            .any(|s| s.obstacle_top > self.line_height_at(s.distance) + CONTACT_TOLERANCE)
    }

    /// Samples strictly between the two ends.
    pub fn interior(&self) -> impl Iterator<Item = &ProfileSample> + '_ {
        let end = self.length_2d - CONTACT_TOLERANCE;
        self.samples
            .iter()
            .filter(move |s| s.distance > CONTACT_TOLERANCE && s.distance < end)
    }

    /// Highest obstacle sample relative to the direct line, if any rises
    /// above it.
    #[must_use]
    pub fn highest_obstruction(&self) -> Option<&ProfileSample> {
        self.interior()
            .map(|s| (s, s.obstacle_top - self.line_height_at(s.distance)))
            .filter(|(_, clearance)| *clearance > CONTACT_TOLERANCE)
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(s, _)| s)
    }
}

/// Cuts the scene along the vertical plane through a source and a receiver.
pub struct BuildProfile {
    source: Point3,
    receiver: Point3,
}

impl BuildProfile {
    #[must_use]
    pub fn new(source: Point3, receiver: Point3) -> Self {
        Self { source, receiver }
    }

    /// Builds the profile from terrain edge crossings, wall crossings and
    /// both ends.
    ///
    /// # Errors
    ///
    /// Returns `GeometryError::Degenerate` when source and receiver coincide.
    pub fn execute(&self, scene: &Scene) -> Result<Profile> {
        if (self.receiver - self.source).norm() < TOLERANCE {
            return Err(GeometryError::Degenerate("source and receiver coincide".into()).into());
        }
        let s2 = to_2d(&self.source);
        let r2 = to_2d(&self.receiver);
        let length_2d = (r2 - s2).norm();
        let env = Envelope::of_segment(&self.source, &self.receiver);

        let ground_s = scene.ground_elevation(&s2);
        let ground_r = scene.ground_elevation(&r2);
        let mut samples = vec![
            ProfileSample {
                distance: 0.0,
                ground: ground_s,
                obstacle_top: ground_s,
                wall: None,
            },
            ProfileSample {
                distance: length_2d,
                ground: ground_r,
                obstacle_top: ground_r,
                wall: None,
            },
        ];

        if length_2d >= TOLERANCE {
            let triangles = scene.terrain().triangles();
            for i in scene.index().triangles(&env) {
                let Some(triangle) = triangles.get(i) else {
                    continue;
                };
                for (a, b) in triangle.edges() {
                    if let Some((_, t, u)) = segment_segment_intersect_2d(&s2, &r2, &to_2d(&a), &to_2d(&b)) {
                        let ground = a.z + (b.z - a.z) * u;
                        samples.push(ProfileSample {
                            distance: t * length_2d,
                            ground,
                            obstacle_top: ground,
                            wall: None,
                        });
                    }
                }
            }

            for id in scene.index().walls(&env) {
                let Some(wall) = scene.wall(id) else {
                    continue;
                };
                if let Some((p, t, _)) = segment_segment_intersect_2d(&s2, &r2, wall.p0(), wall.p1()) {
                    let ground = scene.ground_elevation(&p);
                    samples.push(ProfileSample {
                        distance: t * length_2d,
                        ground,
                        obstacle_top: wall.top().max(ground),
                        wall: Some(id),
                    });
                }
            }
        }

        let samples = merge_samples(samples);

        Ok(Profile {
            source: self.source,
            receiver: self.receiver,
            length_2d,
            samples,
            source_in_building: scene.building_containing(&s2).is_some(),
            receiver_in_building: scene.building_containing(&r2).is_some(),
            source_below_ground: self.source.z < ground_s - CONTACT_TOLERANCE,
            receiver_below_ground: self.receiver.z < ground_r - CONTACT_TOLERANCE,
        })
    }
}

/// Sorts samples by distance and merges those at the same place, keeping
/// the highest obstacle.
fn merge_samples(mut samples: Vec<ProfileSample>) -> Vec<ProfileSample> {
    samples.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    let mut merged: Vec<ProfileSample> = Vec::with_capacity(samples.len());
    for sample in samples {
        match merged.last_mut() {
            Some(last) if sample.distance - last.distance < MERGE_DISTANCE => {
                if sample.obstacle_top > last.obstacle_top {
                    last.obstacle_top = sample.obstacle_top;
                    last.wall = sample.wall.or(last.wall);
                }
            }
            _ => merged.push(sample),
        }
    }
    merged
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::math::Point2;

    fn ridge_scene() -> Scene {
        let mut pts = Vec::new();
        for y in [-100.0, 100.0] {
            for (x, z) in [(-50.0, 0.0), (90.0, 0.0), (100.0, 22.0), (110.0, 0.0), (250.0, 0.0)] {
                pts.push(Point3::new(x, y, z));
            }
        }
        Scene::builder().add_terrain_points(pts).build()
    }

    #[test]
    fn coincident_points_are_rejected() {
        let p = Point3::new(1.0, 1.0, 1.0);
        assert!(BuildProfile::new(p, p).execute(&Scene::empty()).is_err());
    }

    #[test]
    fn open_field_profile_has_only_ends() {
        let profile = BuildProfile::new(Point3::new(0.0, 0.0, 1.0), Point3::new(30.0, 40.0, 4.0))
            .execute(&Scene::empty())
            .unwrap();
        assert_eq!(profile.samples().len(), 2);
        assert_relative_eq!(profile.length_2d(), 50.0);
        assert!(!profile.is_blocked());
        assert!(!profile.has_enclosed_endpoint());
    }

    #[test]
    fn ridge_blocks_the_line() {
        let scene = ridge_scene();
        let profile = BuildProfile::new(Point3::new(0.0, 0.0, 1.0), Point3::new(200.0, 0.0, 4.0))
            .execute(&scene)
            .unwrap();
        assert!(profile.is_blocked());
        let top = profile.highest_obstruction().unwrap();
        assert_relative_eq!(top.distance, 100.0, epsilon = 1e-6);
        assert_relative_eq!(top.obstacle_top, 22.0, epsilon = 1e-6);
        assert!(profile.samples().windows(2).all(|w| w[0].distance < w[1].distance));
    }

    #[test]
    fn building_crossing_is_sampled_with_wall_top() {
        let scene = Scene::builder()
            .add_building(
                vec![
                    Point2::new(10.0, -5.0),
                    Point2::new(20.0, -5.0),
                    Point2::new(20.0, 5.0),
                    Point2::new(10.0, 5.0),
                ],
                12.0,
            )
            .build();
        let profile = BuildProfile::new(Point3::new(0.0, 0.0, 1.0), Point3::new(30.0, 0.0, 1.0))
            .execute(&scene)
            .unwrap();
        let walls: Vec<_> = profile.samples().iter().filter(|s| s.wall.is_some()).collect();
        assert_eq!(walls.len(), 2);
        assert_relative_eq!(walls[0].distance, 10.0, epsilon = 1e-9);
        assert_relative_eq!(walls[1].obstacle_top, 12.0);
        assert!(profile.is_blocked());
        let p = profile.point_at(walls[1].distance, walls[1].obstacle_top);
        assert_relative_eq!(p.x, 20.0, epsilon = 1e-9);
    }

    #[test]
    fn endpoint_inside_building_is_flagged() {
        let scene = Scene::builder()
            .add_building(
                vec![Point2::new(0.0, 0.0), Point2::new(10.0, 0.0), Point2::new(10.0, 10.0), Point2::new(0.0, 10.0)],
                5.0,
            )
            .build();
        let profile = BuildProfile::new(Point3::new(5.0, 5.0, 1.0), Point3::new(50.0, 5.0, 1.0))
            .execute(&scene)
            .unwrap();
        assert!(profile.source_in_building());
        assert!(profile.has_enclosed_endpoint());
    }
}
