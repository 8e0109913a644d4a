use super::{Point2, Point3};

/// An axis-aligned bounding box in the XY plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    /// Minimum corner of the bounding box.
    pub min: Point2,
    /// Maximum corner of the bounding box.
    pub max: Point2,
}

impl Envelope {
    /// Creates an envelope from two opposite corners in any order.
    #[must_use]
    pub fn new(a: Point2, b: Point2) -> Self {
        Self {
            min: Point2::new(a.x.min(b.x), a.y.min(b.y)),
            max: Point2::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    /// Envelope of a single point.
    #[must_use]
    pub fn of_point(p: Point2) -> Self {
        Self { min: p, max: p }
    }

    /// Horizontal envelope of a 3D segment.
    #[must_use]
    pub fn of_segment(a: &Point3, b: &Point3) -> Self {
        Self::new(Point2::new(a.x, a.y), Point2::new(b.x, b.y))
    }

    /// Envelope of a point set, or `None` if it is empty.
    #[must_use]
    pub fn of_points<'a>(points: impl IntoIterator<Item = &'a Point2>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = Self::of_point(*iter.next()?);
        Some(iter.fold(first, |env, p| env.including(p)))
    }

    /// Returns a copy grown to include `p`.
    #[must_use]
    pub fn including(self, p: &Point2) -> Self {
        Self {
            min: Point2::new(self.min.x.min(p.x), self.min.y.min(p.y)),
            max: Point2::new(self.max.x.max(p.x), self.max.y.max(p.y)),
        }
    }

    /// Returns the smallest envelope covering both.
    #[must_use]
    pub fn union(self, other: &Self) -> Self {
        self.including(&other.min).including(&other.max)
    }

    /// Returns a copy expanded by `distance` on every side.
    #[must_use]
    pub fn expanded(self, distance: f64) -> Self {
        Self {
            min: Point2::new(self.min.x - distance, self.min.y - distance),
            max: Point2::new(self.max.x + distance, self.max.y + distance),
        }
    }

    /// Width along X.
    #[must_use]
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    /// Height along Y.
    #[must_use]
    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    /// Closed containment test (boundary points are inside).
    #[must_use]
    pub fn contains(&self, p: &Point2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    /// Closed overlap test.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    /// Distance from `p` to the envelope (zero inside).
    #[must_use]
    pub fn distance_to(&self, p: &Point2) -> f64 {
        let dx = (self.min.x - p.x).max(0.0).max(p.x - self.max.x);
        let dy = (self.min.y - p.y).max(0.0).max(p.y - self.max.y);
        dx.hypot(dy)
    }
}
