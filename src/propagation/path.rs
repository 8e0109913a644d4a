use crate::math::Point3;
use crate::scene::WallId;

/// How a diffracted path bends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiffractionKind {
    /// Over the top of obstacles, in the vertical plane of the direct line.
    Vertical,
    /// Around vertical edges, on the left of the source-receiver direction.
    HorizontalLeft,
    /// Around vertical edges, on the right of the source-receiver direction.
    HorizontalRight,
}

/// One geometrically valid propagation path from a source to a receiver.
///
/// Waypoints always start at the source and end at the receiver. Every leg
/// between consecutive waypoints has been checked to be unobstructed.
#[derive(Debug, Clone, PartialEq)]
pub enum PropagationPath {
    /// Straight line of sight.
    Direct { points: Vec<Point3>, length: f64 },
    /// Specular reflections on walls, in source-to-receiver order.
    Reflected {
        points: Vec<Point3>,
        length: f64,
        walls: Vec<WallId>,
    },
    /// Diffraction over or around edges.
    Diffracted {
        points: Vec<Point3>,
        length: f64,
        /// Diffraction edge points, in source-to-receiver order.
        edges: Vec<Point3>,
        /// Path length minus the direct source-receiver distance.
        excess: f64,
        kind: DiffractionKind,
    },
}

impl PropagationPath {
    /// Builds a direct path.
    #[must_use]
    pub fn direct(source: Point3, receiver: Point3) -> Self {
        let points = vec![source, receiver];
        let length = polyline_length(&points);
        Self::Direct { points, length }
    }

    /// Builds a reflected path through `reflections`.
    #[must_use]
    pub fn reflected(source: Point3, reflections: &[Point3], receiver: Point3, walls: Vec<WallId>) -> Self {
        let points = chain(source, reflections, receiver);
        let length = polyline_length(&points);
        Self::Reflected { points, length, walls }
    }

    /// Builds a diffracted path over `edges`.
    #[must_use]
    pub fn diffracted(source: Point3, edges: Vec<Point3>, receiver: Point3, kind: DiffractionKind) -> Self {
        let points = chain(source, &edges, receiver);
        let length = polyline_length(&points);
        let excess = length - (receiver - source).norm();
        Self::Diffracted {
            points,
            length,
            edges,
            excess,
            kind,
        }
    }

    /// Ordered waypoints, source first.
    #[must_use]
    pub fn points(&self) -> &[Point3] {
        match self {
            Self::Direct { points, .. } | Self::Reflected { points, .. } | Self::Diffracted { points, .. } => points,
        }
    }

    /// Total length along the waypoints.
    #[must_use]
    pub fn length(&self) -> f64 {
        match self {
            Self::Direct { length, .. } | Self::Reflected { length, .. } | Self::Diffracted { length, .. } => *length,
        }
    }

    /// Number of wall reflections.
    #[must_use]
    pub fn reflection_count(&self) -> usize {
        match self {
            Self::Reflected { walls, .. } => walls.len(),
            _ => 0,
        }
    }

    #[must_use]
    pub fn is_direct(&self) -> bool {
        matches!(self, Self::Direct { .. })
    }

    #[must_use]
    pub fn is_reflected(&self) -> bool {
        matches!(self, Self::Reflected { .. })
    }

    #[must_use]
    pub fn is_diffracted(&self) -> bool {
        matches!(self, Self::Diffracted { .. })
    }
}

fn chain(source: Point3, middle: &[Point3], receiver: Point3) -> Vec<Point3> {
    let mut points = Vec::with_capacity(middle.len() + 2);
    points.push(source);
    points.extend_from_slice(middle);
    points.push(receiver);
    points
}

/// Sum of the segment lengths of `points`.
#[must_use]
pub fn polyline_length(points: &[Point3]) -> f64 {
    points.windows(2).map(|w| (w[1] - w[0]).norm()).sum()
}
