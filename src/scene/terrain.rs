use spade::{DelaunayTriangulation, HasPosition, InsertionError, Point2 as SpadePoint2, Triangulation};

use crate::error::{Result, SceneError};
use crate::math::{is_finite_3d, Envelope, Point2, Point3, TOLERANCE};

use super::index::GridIndex;

/// Elevation sample fed to the Delaunay triangulation.
#[derive(Debug, Clone, Copy)]
struct TerrainVertex {
    position: SpadePoint2<f64>,
    z: f64,
}

impl HasPosition for TerrainVertex {
    type Scalar = f64;

    fn position(&self) -> SpadePoint2<f64> {
        self.position
    }
}

/// One triangle of the terrain surface.
#[derive(Debug, Clone)]
pub struct TerrainTriangle {
    vertices: [Point3; 3],
    envelope: Envelope,
}

impl TerrainTriangle {
    /// Creates a triangle from three 3D vertices.
    #[must_use]
    pub fn new(vertices: [Point3; 3]) -> Self {
        let envelope = Envelope::of_point(Point2::new(vertices[0].x, vertices[0].y))
            .including(&Point2::new(vertices[1].x, vertices[1].y))
            .including(&Point2::new(vertices[2].x, vertices[2].y));
        Self { vertices, envelope }
    }

    /// The three vertices.
    #[must_use]
    pub fn vertices(&self) -> &[Point3; 3] {
        &self.vertices
    }

    /// Horizontal bounding box.
    #[must_use]
    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    /// The three edges as vertex pairs.
    #[must_use]
    pub fn edges(&self) -> [(Point3, Point3); 3] {
        let [a, b, c] = self.vertices;
        [(a, b), (b, c), (c, a)]
    }

    /// Barycentric coordinates of `p` (projected on XY), or `None` if `p` is
    /// outside the triangle.
    #[must_use]
    pub fn barycentric(&self, p: &Point2) -> Option<[f64; 3]> {
        let [a, b, c] = &self.vertices;
        let det = (b.y - c.y) * (a.x - c.x) + (c.x - b.x) * (a.y - c.y);
        if det.abs() < TOLERANCE {
            return None;
        }
        let l0 = ((b.y - c.y) * (p.x - c.x) + (c.x - b.x) * (p.y - c.y)) / det;
        let l1 = ((c.y - a.y) * (p.x - c.x) + (a.x - c.x) * (p.y - c.y)) / det;
        let l2 = 1.0 - l0 - l1;
        let eps = 1e-9;
        (l0 >= -eps && l1 >= -eps && l2 >= -eps).then_some([l0, l1, l2])
    }

    /// Interpolated elevation at `p`, or `None` outside the triangle.
    #[must_use]
    pub fn elevation_at(&self, p: &Point2) -> Option<f64> {
        let [l0, l1, l2] = self.barycentric(p)?;
        let [a, b, c] = &self.vertices;
        Some(l0 * a.z + l1 * b.z + l2 * c.z)
    }
}

/// Terrain surface: the Delaunay triangulation of elevation samples.
#[derive(Debug, Clone, Default)]
pub struct Terrain {
    triangles: Vec<TerrainTriangle>,
}

impl Terrain {
    /// Triangulates elevation samples.
    ///
    /// Non-finite samples are dropped. Fewer than three usable samples yield
    /// an empty (flat) terrain.
    ///
    /// # Errors
    ///
    /// Returns `SceneError::Terrain` if the triangulation rejects a sample.
    pub fn from_points(points: &[Point3]) -> Result<Self> {
        let vertices: Vec<TerrainVertex> = points
            .iter()
            .filter(|p| is_finite_3d(p))
            .map(|p| TerrainVertex {
                position: SpadePoint2::new(p.x, p.y),
                z: p.z,
            })
            .collect();
        if vertices.len() < 3 {
            return Ok(Self::default());
        }

        let triangulation = DelaunayTriangulation::<TerrainVertex>::bulk_load(vertices)
            .map_err(|e: InsertionError| SceneError::Terrain(format!("insert: {e:?}")))?;

        let triangles = triangulation
            .inner_faces()
            .map(|face| {
                let [a, b, c] = face.vertices();
                let to_point = |v: &TerrainVertex| Point3::new(v.position.x, v.position.y, v.z);
                TerrainTriangle::new([to_point(a.data()), to_point(b.data()), to_point(c.data())])
            })
            .collect();

        Ok(Self { triangles })
    }

    /// Builds a terrain from already triangulated geometry.
    #[must_use]
    pub fn from_triangles(triangles: Vec<TerrainTriangle>) -> Self {
        Self { triangles }
    }

    /// All triangles.
    #[must_use]
    pub fn triangles(&self) -> &[TerrainTriangle] {
        &self.triangles
    }

    /// Returns `true` when there is no terrain surface.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }
}

/// Elevation at `p` using a triangle index, or `None` outside the terrain.
#[must_use]
pub fn elevation_at(triangles: &[TerrainTriangle], index: &GridIndex<usize>, p: &Point2) -> Option<f64> {
    index
        .query(&Envelope::of_point(*p))
        .into_iter()
        .find_map(|i| triangles.get(i)?.elevation_at(p))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::scene::index::triangle_index;

    fn ramp() -> Terrain {
        // z = x / 10 over a 100 x 100 square.
        let pts = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(100.0, 0.0, 10.0),
            Point3::new(100.0, 100.0, 10.0),
            Point3::new(0.0, 100.0, 0.0),
            Point3::new(50.0, 50.0, 5.0),
        ];
        Terrain::from_points(&pts).unwrap()
    }

    #[test]
    fn triangulates_samples() {
        let t = ramp();
        assert_eq!(t.triangles().len(), 4);
    }

    #[test]
    fn interpolates_planar_ramp() {
        let t = ramp();
        let index = triangle_index(t.triangles());
        let z = elevation_at(t.triangles(), &index, &Point2::new(37.0, 81.0)).unwrap();
        assert_relative_eq!(z, 3.7, epsilon = 1e-9);
    }

    #[test]
    fn outside_terrain_has_no_elevation() {
        let t = ramp();
        let index = triangle_index(t.triangles());
        assert!(elevation_at(t.triangles(), &index, &Point2::new(-5.0, 50.0)).is_none());
    }

    #[test]
    fn too_few_samples_is_flat() {
        let t = Terrain::from_points(&[Point3::new(0.0, 0.0, 1.0), Point3::new(1.0, 0.0, 1.0)]).unwrap();
        assert!(t.is_empty());
    }

    #[test]
    fn barycentric_weights_sum_to_one() {
        let tri = TerrainTriangle::new([
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(4.0, 0.0, 0.0),
            Point3::new(0.0, 4.0, 0.0),
        ]);
        let w = tri.barycentric(&Point2::new(1.0, 1.0)).unwrap();
        assert_relative_eq!(w[0] + w[1] + w[2], 1.0, epsilon = 1e-12);
        assert!(tri.barycentric(&Point2::new(3.0, 3.0)).is_none());
    }
}
