use std::collections::HashMap;

use crate::math::Envelope;

use super::building::{Building, BuildingId};
use super::terrain::TerrainTriangle;
use super::wall::{Wall, WallId};

/// Upper bound on the number of grid cells a single query or insertion walks
/// before falling back to scanning the occupied cells.
const MAX_CELL_WALK: usize = 4096;

/// Grid-bucket spatial index over items with a 2D envelope.
///
/// Each item is registered in every cell its envelope overlaps. Queries
/// collect the candidates of the overlapped cells, deduplicate them and keep
/// those whose envelope actually intersects the query.
#[derive(Debug, Clone)]
pub struct GridIndex<T> {
    cell_size: f64,
    cells: HashMap<(i64, i64), Vec<usize>>,
    // Items spanning too many cells; checked by every query.
    oversized: Vec<usize>,
    entries: Vec<(Envelope, T)>,
}

impl<T: Copy> GridIndex<T> {
    /// Creates an empty index with the given cell size.
    #[must_use]
    pub fn new(cell_size: f64) -> Self {
        let cell_size = if cell_size.is_finite() && cell_size > 0.0 {
            cell_size
        } else {
            1.0
        };
        Self {
            cell_size,
            cells: HashMap::new(),
            oversized: Vec::new(),
            entries: Vec::new(),
        }
    }

    /// Builds an index with a cell size derived from the item envelopes.
    #[must_use]
    pub fn from_items(items: Vec<(Envelope, T)>) -> Self {
        let mut index = Self::new(auto_cell_size(&items));
        for (env, item) in items {
            index.insert(env, item);
        }
        index
    }

    /// Number of indexed items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cell edge length in metres.
    #[must_use]
    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Registers `item` under `env`.
    pub fn insert(&mut self, env: Envelope, item: T) {
        let slot = self.entries.len();
        self.entries.push((env, item));
        let (i0, j0, i1, j1) = self.cell_range(&env);
        if cell_count(i0, i1).saturating_mul(cell_count(j0, j1)) > MAX_CELL_WALK {
            self.oversized.push(slot);
            return;
        }
        for i in i0..=i1 {
            for j in j0..=j1 {
                self.cells.entry((i, j)).or_default().push(slot);
            }
        }
    }

    /// Returns every item whose envelope intersects `env`, in insertion order.
    #[must_use]
    pub fn query(&self, env: &Envelope) -> Vec<T> {
        let (i0, j0, i1, j1) = self.cell_range(env);
        let walk = cell_count(i0, i1).saturating_mul(cell_count(j0, j1));

        let mut slots: Vec<usize> = self.oversized.clone();
        if walk > MAX_CELL_WALK.max(self.cells.len()) {
            for (&(i, j), cell) in &self.cells {
                if i >= i0 && i <= i1 && j >= j0 && j <= j1 {
                    slots.extend_from_slice(cell);
                }
            }
        } else {
            for i in i0..=i1 {
                for j in j0..=j1 {
                    if let Some(cell) = self.cells.get(&(i, j)) {
                        slots.extend_from_slice(cell);
                    }
                }
            }
        }
        slots.sort_unstable();
        slots.dedup();
        slots
            .into_iter()
            .filter_map(|slot| {
                let (item_env, item) = &self.entries[slot];
                item_env.intersects(env).then_some(*item)
            })
            .collect()
    }

    #[allow(clippy::cast_possible_truncation)]
    fn cell_range(&self, env: &Envelope) -> (i64, i64, i64, i64) {
        let to_cell = |v: f64| -> i64 {
            // Saturating float-to-int conversion keeps huge envelopes finite.
            (v / self.cell_size).floor().clamp(-1e15, 1e15) as i64
        };
        (
            to_cell(env.min.x),
            to_cell(env.min.y),
            to_cell(env.max.x),
            to_cell(env.max.y),
        )
    }
}

fn cell_count(lo: i64, hi: i64) -> usize {
    usize::try_from(hi.saturating_sub(lo).saturating_add(1)).unwrap_or(usize::MAX)
}

/// Picks a cell size close to the typical item size, bounded below by the
/// density of the whole set.
#[allow(clippy::cast_precision_loss)]
fn auto_cell_size<T>(items: &[(Envelope, T)]) -> f64 {
    let Some(total) = items
        .iter()
        .map(|(env, _)| *env)
        .reduce(|acc, env| acc.union(&env))
    else {
        return 1.0;
    };
    let n = items.len() as f64;
    let mean_extent = items
        .iter()
        .map(|(env, _)| env.width().max(env.height()))
        .sum::<f64>()
        / n;
    let density = (total.width().max(1.0) * total.height().max(1.0) / n).sqrt();
    mean_extent.max(density * 0.5).max(1.0)
}

/// Candidates returned by [`SceneIndex::query`].
#[derive(Debug, Clone, Default)]
pub struct SceneCandidates {
    /// Walls whose envelope overlaps the query.
    pub walls: Vec<WallId>,
    /// Buildings whose footprint envelope overlaps the query.
    pub buildings: Vec<BuildingId>,
    /// Terrain triangles whose envelope overlaps the query.
    pub triangles: Vec<usize>,
}

/// Spatial index over the obstructing content of a scene.
///
/// Built once, read-only afterwards.
#[derive(Debug, Clone)]
pub struct SceneIndex {
    walls: GridIndex<WallId>,
    buildings: GridIndex<BuildingId>,
    triangles: GridIndex<usize>,
}

impl SceneIndex {
    /// Indexes walls, building footprints and terrain triangles.
    #[must_use]
    pub fn build<'a>(
        walls: &[Wall],
        buildings: impl IntoIterator<Item = (BuildingId, &'a Building)>,
        triangles: &[TerrainTriangle],
    ) -> Self {
        Self::with_triangle_index(walls, buildings, triangle_index(triangles))
    }

    /// Like [`SceneIndex::build`] with an already built triangle index.
    #[must_use]
    pub fn with_triangle_index<'a>(
        walls: &[Wall],
        buildings: impl IntoIterator<Item = (BuildingId, &'a Building)>,
        triangles: GridIndex<usize>,
    ) -> Self {
        let walls = GridIndex::from_items(walls.iter().map(|w| (w.envelope(), w.id())).collect());
        let buildings = GridIndex::from_items(
            buildings
                .into_iter()
                .map(|(id, b)| (*b.envelope(), id))
                .collect(),
        );
        Self {
            walls,
            buildings,
            triangles,
        }
    }

    /// All candidates overlapping `env`.
    #[must_use]
    pub fn query(&self, env: &Envelope) -> SceneCandidates {
        SceneCandidates {
            walls: self.walls(env),
            buildings: self.buildings(env),
            triangles: self.triangles(env),
        }
    }

    /// Walls overlapping `env`.
    #[must_use]
    pub fn walls(&self, env: &Envelope) -> Vec<WallId> {
        self.walls.query(env)
    }

    /// Buildings overlapping `env`.
    #[must_use]
    pub fn buildings(&self, env: &Envelope) -> Vec<BuildingId> {
        self.buildings.query(env)
    }

    /// Terrain triangle indices overlapping `env`.
    #[must_use]
    pub fn triangles(&self, env: &Envelope) -> Vec<usize> {
        self.triangles.query(env)
    }
}

/// Builds the triangle part of the scene index on its own.
#[must_use]
pub fn triangle_index(triangles: &[TerrainTriangle]) -> GridIndex<usize> {
    GridIndex::from_items(
        triangles
            .iter()
            .enumerate()
            .map(|(i, t)| (*t.envelope(), i))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Point2;

    fn env(x0: f64, y0: f64, x1: f64, y1: f64) -> Envelope {
        Envelope::new(Point2::new(x0, y0), Point2::new(x1, y1))
    }

    #[test]
    fn query_returns_overlapping_items_once() {
        let mut index = GridIndex::new(1.0);
        index.insert(env(0.0, 0.0, 5.0, 5.0), 'a');
        index.insert(env(10.0, 10.0, 11.0, 11.0), 'b');
        let hits = index.query(&env(2.0, 2.0, 3.0, 3.0));
        assert_eq!(hits, vec!['a']);
        let all = index.query(&env(-1.0, -1.0, 20.0, 20.0));
        assert_eq!(all, vec!['a', 'b']);
    }

    #[test]
    fn envelope_filter_is_exact() {
        let mut index = GridIndex::new(10.0);
        index.insert(env(0.0, 0.0, 1.0, 1.0), 1);
        // Same cell, but no overlap.
        assert!(index.query(&env(5.0, 5.0, 6.0, 6.0)).is_empty());
    }

    #[test]
    fn huge_query_scans_occupied_cells() {
        let mut index = GridIndex::new(0.5);
        for k in 0..10 {
            let x = f64::from(k) * 100.0;
            index.insert(env(x, 0.0, x + 1.0, 1.0), k);
        }
        let hits = index.query(&env(-1e6, -1e6, 1e6, 1e6));
        assert_eq!(hits.len(), 10);
    }

    #[test]
    fn oversized_items_are_always_candidates() {
        let mut index = GridIndex::new(1.0);
        index.insert(env(0.0, 0.0, 10_000.0, 10_000.0), "long");
        index.insert(env(3.0, 3.0, 4.0, 4.0), "small");
        assert_eq!(index.query(&env(9_000.0, 9_000.0, 9_001.0, 9_001.0)), vec!["long"]);
        assert_eq!(index.query(&env(3.5, 3.5, 3.6, 3.6)), vec!["long", "small"]);
    }

    #[test]
    fn auto_cell_size_follows_items() {
        let items = vec![(env(0.0, 0.0, 20.0, 20.0), 0), (env(100.0, 0.0, 120.0, 20.0), 1)];
        let index = GridIndex::from_items(items);
        assert!(index.cell_size() >= 20.0);
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn empty_index_is_usable() {
        let index: GridIndex<u32> = GridIndex::from_items(Vec::new());
        assert!(index.is_empty());
        assert!(index.query(&env(0.0, 0.0, 1.0, 1.0)).is_empty());
    }
}
