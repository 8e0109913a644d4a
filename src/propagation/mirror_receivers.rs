use tracing::trace;

use crate::math::{to_2d, Envelope, Point2, Point3};
use crate::scene::{Scene, WallId};

/// One receiver image, produced by mirroring its parent across a wall.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MirrorReceiverResult {
    /// Mirrored receiver position.
    pub position: Point3,
    /// Index of the image this one was mirrored from; `None` for images of
    /// the receiver itself.
    pub parent: Option<usize>,
    /// Wall producing this image.
    pub wall: WallId,
    /// Number of reflections, starting at 1.
    pub depth: usize,
}

/// Append-only store of receiver images.
///
/// Nodes refer to their parent by index, so walking from any image back to
/// the receiver is an index walk.
#[derive(Debug, Clone, Default)]
pub struct MirrorReceiverArena {
    nodes: Vec<MirrorReceiverResult>,
}

impl MirrorReceiverArena {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a node and returns its index.
    pub fn push(&mut self, node: MirrorReceiverResult) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&MirrorReceiverResult> {
        self.nodes.get(index)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MirrorReceiverResult> {
        self.nodes.iter()
    }

    /// Indices from `index` up to its depth-1 ancestor.
    ///
    /// In that order the walls are met from the source side to the receiver
    /// side.
    #[must_use]
    pub fn chain(&self, index: usize) -> Vec<usize> {
        let mut chain = Vec::new();
        let mut current = Some(index);
        while let Some(i) = current {
            let Some(node) = self.nodes.get(i) else {
                break;
            };
            chain.push(i);
            current = node.parent;
        }
        chain
    }
}

/// Walls within `wall_distance` of `receiver`: the only walls its images
/// are ever mirrored across.
#[must_use]
pub fn reflection_candidates(scene: &Scene, receiver: &Point2, wall_distance: f64) -> Vec<WallId> {
    scene
        .index()
        .walls(&Envelope::of_point(*receiver).expanded(wall_distance))
        .into_iter()
        .filter(|id| scene.wall(*id).is_some_and(|w| w.distance_to(receiver) <= wall_distance))
        .collect()
}

/// Builds the tree of receiver images across the walls near a receiver.
///
/// An image is mirrored again across every wall it faces, except the wall
/// that produced it, until `max_order` reflections. Walls farther than
/// `wall_distance` from the receiver are never used, and a wall farther than
/// that from the image being mirrored is skipped. Images farther than
/// `max_path_length` from the source are dropped together with their
/// subtree: the unfolded path through them is already too long.
pub struct GenerateMirrorReceivers {
    source: Point3,
    receiver: Point3,
    max_order: usize,
    wall_distance: f64,
    max_path_length: f64,
}

impl GenerateMirrorReceivers {
    #[must_use]
    pub fn new(source: Point3, receiver: Point3, max_order: usize, wall_distance: f64, max_path_length: f64) -> Self {
        Self {
            source,
            receiver,
            max_order,
            wall_distance,
            max_path_length,
        }
    }

    /// Generates the images.
    #[must_use]
    pub fn execute(&self, scene: &Scene) -> MirrorReceiverArena {
        let mut arena = MirrorReceiverArena::new();
        if self.max_order == 0 {
            return arena;
        }
        let candidates = reflection_candidates(scene, &to_2d(&self.receiver), self.wall_distance);
        self.expand(scene, &candidates, &mut arena, None, &self.receiver, None, 1);
        trace!(walls = candidates.len(), images = arena.len(), "mirror receivers");
        arena
    }

    #[allow(clippy::too_many_arguments)]
    fn expand(
        &self,
        scene: &Scene,
        candidates: &[WallId],
        arena: &mut MirrorReceiverArena,
        parent: Option<usize>,
        image: &Point3,
        generating_wall: Option<WallId>,
        depth: usize,
    ) {
        let image_2d = to_2d(image);
        for &id in candidates {
            if Some(id) == generating_wall {
                continue;
            }
            let Some(wall) = scene.wall(id) else {
                continue;
            };
            if !wall.faces(&image_2d) || wall.distance_to(&image_2d) > self.wall_distance {
                continue;
            }
            let position = wall.mirror().reflect(image);
            if (position - self.source).norm() > self.max_path_length {
                continue;
            }
            let index = arena.push(MirrorReceiverResult {
                position,
                parent,
                wall: id,
                depth,
            });
            if depth < self.max_order {
                self.expand(scene, candidates, arena, Some(index), &position, Some(id), depth + 1);
            }
        }
    }
}
