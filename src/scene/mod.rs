pub mod building;
pub mod index;
pub mod source;
pub mod terrain;
pub mod wall;

pub use building::{Building, BuildingId};
pub use index::{GridIndex, SceneCandidates, SceneIndex};
pub use source::{Emission, Emitter, Receiver, ReceiverId, Source, SourceGeometry, SourceId};
pub use terrain::{Terrain, TerrainTriangle};
pub use wall::{Wall, WallId};

use slotmap::SlotMap;
use tracing::{debug, warn};

use crate::math::{Envelope, Point2, Point3};

/// Immutable propagation scene: buildings, walls and terrain with their
/// spatial index.
///
/// Built once by [`SceneBuilder`] and shared read-only by every worker.
#[derive(Debug, Clone)]
pub struct Scene {
    buildings: SlotMap<BuildingId, Building>,
    walls: Vec<Wall>,
    terrain: Terrain,
    index: SceneIndex,
    skipped: usize,
}

impl Default for Scene {
    fn default() -> Self {
        SceneBuilder::new().build()
    }
}

impl Scene {
    /// An open field: no obstacle, flat ground at elevation 0.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Starts a new scene.
    #[must_use]
    pub fn builder() -> SceneBuilder {
        SceneBuilder::new()
    }

    /// All walls, indexed by `WallId`.
    #[must_use]
    pub fn walls(&self) -> &[Wall] {
        &self.walls
    }

    /// Wall by identifier.
    #[must_use]
    pub fn wall(&self, id: WallId) -> Option<&Wall> {
        self.walls.get(id.0)
    }

    /// Building by identifier.
    #[must_use]
    pub fn building(&self, id: BuildingId) -> Option<&Building> {
        self.buildings.get(id)
    }

    /// All buildings.
    pub fn buildings(&self) -> impl Iterator<Item = (BuildingId, &Building)> {
        self.buildings.iter()
    }

    #[must_use]
    pub fn terrain(&self) -> &Terrain {
        &self.terrain
    }

    #[must_use]
    pub fn index(&self) -> &SceneIndex {
        &self.index
    }

    /// Number of input items dropped as malformed while building.
    #[must_use]
    pub fn skipped_geometry(&self) -> usize {
        self.skipped
    }

    /// Ground elevation at `p`; 0 outside the terrain.
    #[must_use]
    pub fn ground_elevation(&self, p: &Point2) -> f64 {
        self.index
            .triangles(&Envelope::of_point(*p))
            .into_iter()
            .find_map(|i| self.terrain.triangles().get(i)?.elevation_at(p))
            .unwrap_or(0.0)
    }

    /// Point `height` metres above the ground at `p`.
    #[must_use]
    pub fn lift(&self, p: &Point2, height: f64) -> Point3 {
        Point3::new(p.x, p.y, self.ground_elevation(p) + height)
    }

    /// Building whose footprint contains `p`, if any.
    #[must_use]
    pub fn building_containing(&self, p: &Point2) -> Option<BuildingId> {
        self.index
            .buildings(&Envelope::of_point(*p))
            .into_iter()
            .find(|id| self.buildings.get(*id).is_some_and(|b| b.contains(p)))
    }

    /// Horizontal extent of all scene content.
    #[must_use]
    pub fn envelope(&self) -> Option<Envelope> {
        let walls = self.walls.iter().map(Wall::envelope);
        let triangles = self.terrain.triangles().iter().map(|t| *t.envelope());
        walls.chain(triangles).reduce(|acc, env| acc.union(&env))
    }
}

/// Collects raw scene input and assembles a [`Scene`].
///
/// Malformed items are dropped with a warning and counted rather than
/// failing the whole build.
#[derive(Debug, Clone, Default)]
pub struct SceneBuilder {
    buildings: Vec<(Vec<Point2>, f64)>,
    walls: Vec<(Point2, Point2, f64)>,
    terrain_points: Vec<Point3>,
}

impl SceneBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a building given its footprint ring and its height above ground.
    #[must_use]
    pub fn add_building(mut self, footprint: Vec<Point2>, height: f64) -> Self {
        self.buildings.push((footprint, height));
        self
    }

    /// Adds a standalone wall (a barrier) of `height` above ground.
    #[must_use]
    pub fn add_wall(mut self, p0: Point2, p1: Point2, height: f64) -> Self {
        self.walls.push((p0, p1, height));
        self
    }

    /// Adds terrain elevation samples.
    #[must_use]
    pub fn add_terrain_points(mut self, points: impl IntoIterator<Item = Point3>) -> Self {
        self.terrain_points.extend(points);
        self
    }

    /// Triangulates the terrain, places buildings and walls on it and builds
    /// the spatial index.
    #[must_use]
    pub fn build(self) -> Scene {
        let mut skipped = 0;

        let terrain = match Terrain::from_points(&self.terrain_points) {
            Ok(terrain) => terrain,
            Err(e) => {
                warn!(error = %e, "terrain triangulation failed, using flat ground");
                skipped += 1;
                Terrain::default()
            }
        };
        let triangle_index = index::triangle_index(terrain.triangles());
        let ground = |p: &Point2| terrain::elevation_at(terrain.triangles(), &triangle_index, p).unwrap_or(0.0);

        let mut buildings: SlotMap<BuildingId, Building> = SlotMap::with_key();
        let mut walls: Vec<Wall> = Vec::new();

        for (footprint, height) in &self.buildings {
            let base = footprint.iter().map(&ground).fold(f64::INFINITY, f64::min);
            let base = if base.is_finite() { base } else { 0.0 };
            let building = match Building::new(footprint, *height, base) {
                Ok(b) => b,
                Err(e) => {
                    warn!(error = %e, "skipping building");
                    skipped += 1;
                    continue;
                }
            };
            let top = building.top();
            // Walls run against the counter-clockwise ring so that their left
            // normal points out of the building.
            let edges: Vec<(Point2, Point2)> = building.edges().collect();
            let id = buildings.insert(building);
            let mut ids = Vec::with_capacity(edges.len());
            for (a, b) in edges {
                let wall_id = WallId(walls.len());
                match Wall::new(wall_id, b, a, base, top, Some(id)) {
                    Ok(w) => {
                        walls.push(w);
                        ids.push(wall_id);
                    }
                    Err(e) => {
                        warn!(error = %e, "skipping building wall");
                        skipped += 1;
                    }
                }
            }
            if let Some(b) = buildings.get_mut(id) {
                b.set_walls(ids);
            }
        }

        for (p0, p1, height) in &self.walls {
            let wall_id = WallId(walls.len());
            let base = ground(p0).min(ground(p1));
            match Wall::new(wall_id, *p0, *p1, base, base + height, None) {
                Ok(w) => walls.push(w),
                Err(e) => {
                    warn!(error = %e, "skipping wall");
                    skipped += 1;
                }
            }
        }

        let index = SceneIndex::with_triangle_index(&walls, buildings.iter(), triangle_index);
        debug!(
            buildings = buildings.len(),
            walls = walls.len(),
            triangles = terrain.triangles().len(),
            skipped,
            "scene built"
        );
        Scene {
            buildings,
            walls,
            terrain,
            index,
            skipped,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn p(x: f64, y: f64) -> Point2 {
        Point2::new(x, y)
    }

    fn square(x0: f64, y0: f64, size: f64) -> Vec<Point2> {
        vec![p(x0, y0), p(x0 + size, y0), p(x0 + size, y0 + size), p(x0, y0 + size)]
    }

    #[test]
    fn building_walls_face_outward() {
        let scene = Scene::builder().add_building(square(0.0, 0.0, 10.0), 8.0).build();
        assert_eq!(scene.walls().len(), 4);
        let outside = [p(5.0, -5.0), p(15.0, 5.0), p(5.0, 15.0), p(-5.0, 5.0)];
        for wall in scene.walls() {
            assert!(wall.is_one_sided());
            assert!(!wall.faces(&p(5.0, 5.0)));
            assert!(outside.iter().any(|q| wall.faces(q)));
        }
        let (id, b) = scene.buildings().next().unwrap();
        assert_eq!(b.walls().len(), 4);
        assert_eq!(scene.building_containing(&p(3.0, 3.0)), Some(id));
        assert_eq!(scene.building_containing(&p(13.0, 3.0)), None);
    }

    #[test]
    fn malformed_input_is_skipped() {
        let scene = Scene::builder()
            .add_building(vec![p(0.0, 0.0), p(1.0, 0.0)], 5.0)
            .add_building(square(20.0, 0.0, 5.0), -1.0)
            .add_wall(p(3.0, 3.0), p(3.0, 3.0), 2.0)
            .add_wall(p(30.0, 0.0), p(40.0, 0.0), 3.0)
            .build();
        assert_eq!(scene.skipped_geometry(), 3);
        assert_eq!(scene.walls().len(), 1);
        assert!(!scene.walls()[0].is_one_sided());
    }

    #[test]
    fn buildings_sit_on_lowest_ground() {
        let scene = Scene::builder()
            .add_terrain_points([
                Point3::new(-100.0, -100.0, 0.0),
                Point3::new(100.0, -100.0, 20.0),
                Point3::new(100.0, 100.0, 20.0),
                Point3::new(-100.0, 100.0, 0.0),
            ])
            .add_building(square(0.0, 0.0, 10.0), 6.0)
            .build();
        let (_, b) = scene.buildings().next().unwrap();
        assert_relative_eq!(b.base(), 10.0, epsilon = 1e-9);
        assert_relative_eq!(b.top(), 16.0, epsilon = 1e-9);
        assert_relative_eq!(scene.lift(&p(50.0, 0.0), 4.0).z, 19.0, epsilon = 1e-9);
        assert_relative_eq!(scene.ground_elevation(&p(500.0, 0.0)), 0.0);
    }

    #[test]
    fn empty_scene_is_open_field() {
        let scene = Scene::empty();
        assert!(scene.walls().is_empty());
        assert!(scene.envelope().is_none());
        assert_relative_eq!(scene.ground_elevation(&p(1.0, 2.0)), 0.0);
    }
}
