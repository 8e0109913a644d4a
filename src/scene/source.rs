use std::collections::BTreeMap;

use crate::error::{Result, SceneError};
use crate::math::distance_2d::point_to_segment_dist;
use crate::math::{energetic_sum, is_finite_3d, to_2d, Envelope, Point2, Point3, TOLERANCE};
use crate::propagation::config::{ComputationScope, TimePeriod};

/// Identifier of a sound source, as supplied by the data provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(pub u64);

/// Identifier of a receiver, as supplied by the data provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReceiverId(pub u64);

/// Sound power spectra of a source, one per time period.
///
/// Point sources carry levels in dB; line sources carry levels per metre.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Emission {
    spectra: BTreeMap<TimePeriod, Vec<f64>>,
}

impl Emission {
    /// An emission without any period (silent).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the spectrum of `period`, replacing any previous one.
    #[must_use]
    pub fn with_period(mut self, period: TimePeriod, spectrum: Vec<f64>) -> Self {
        self.spectra.insert(period, spectrum);
        self
    }

    /// Spectrum of `period`, if any.
    #[must_use]
    pub fn spectrum(&self, period: TimePeriod) -> Option<&[f64]> {
        self.spectra.get(&period).map(Vec::as_slice)
    }

    /// Periods that carry a spectrum.
    pub fn periods(&self) -> impl Iterator<Item = TimePeriod> + '_ {
        self.spectra.keys().copied()
    }

    /// Energetic sum over all bands of `period` (`-inf` when absent).
    #[must_use]
    pub fn total_level(&self, period: TimePeriod) -> f64 {
        self.spectrum(period)
            .map_or(f64::NEG_INFINITY, |s| energetic_sum(s.iter().copied()))
    }
}

/// Geometry of a source.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceGeometry {
    /// A single emitting point.
    Point(Point3),
    /// A polyline emitting uniformly along its length.
    Line(Vec<Point3>),
}

/// A sound source.
#[derive(Debug, Clone)]
pub struct Source {
    id: SourceId,
    geometry: SourceGeometry,
    emission: Emission,
}

impl Source {
    /// A point source.
    #[must_use]
    pub fn point(id: SourceId, position: Point3, emission: Emission) -> Self {
        Self {
            id,
            geometry: SourceGeometry::Point(position),
            emission,
        }
    }

    /// A line source. `emission` holds levels per metre.
    #[must_use]
    pub fn line(id: SourceId, vertices: Vec<Point3>, emission: Emission) -> Self {
        Self {
            id,
            geometry: SourceGeometry::Line(vertices),
            emission,
        }
    }

    #[must_use]
    pub fn id(&self) -> SourceId {
        self.id
    }

    #[must_use]
    pub fn geometry(&self) -> &SourceGeometry {
        &self.geometry
    }

    #[must_use]
    pub fn emission(&self) -> &Emission {
        &self.emission
    }

    fn vertices(&self) -> &[Point3] {
        match &self.geometry {
            SourceGeometry::Point(p) => std::slice::from_ref(p),
            SourceGeometry::Line(v) => v,
        }
    }

    /// Horizontal bounding box of the geometry.
    #[must_use]
    pub fn envelope(&self) -> Option<Envelope> {
        let pts: Vec<Point2> = self.vertices().iter().map(to_2d).collect();
        Envelope::of_points(&pts)
    }

    /// Smallest horizontal distance from the geometry to `p`.
    #[must_use]
    pub fn distance_2d_to(&self, p: &Point2) -> f64 {
        match &self.geometry {
            SourceGeometry::Point(q) => (to_2d(q) - p).norm(),
            SourceGeometry::Line(v) => v
                .windows(2)
                .map(|w| point_to_segment_dist(p, &to_2d(&w[0]), &to_2d(&w[1])))
                .fold(f64::INFINITY, f64::min),
        }
    }

    /// Checks geometry and spectra against the computation scope.
    ///
    /// # Errors
    ///
    /// Returns `SceneError::InvalidSource` for non-finite coordinates, a line
    /// with fewer than two vertices or no length, or a spectrum whose length
    /// differs from the number of configured bands.
    pub fn validate(&self, scope: &ComputationScope) -> Result<()> {
        let invalid = |reason: String| SceneError::InvalidSource { id: self.id.0, reason };
        if self.vertices().iter().any(|p| !is_finite_3d(p)) {
            return Err(invalid("non-finite coordinate".into()).into());
        }
        if let SourceGeometry::Line(v) = &self.geometry {
            if v.len() < 2 {
                return Err(invalid(format!("line with {} vertices", v.len())).into());
            }
            let length: f64 = v.windows(2).map(|w| (w[1] - w[0]).norm()).sum();
            if length < TOLERANCE {
                return Err(invalid("zero-length line".into()).into());
            }
        }
        for period in &scope.periods {
            if let Some(spectrum) = self.emission.spectrum(*period) {
                if spectrum.len() != scope.bands.len() {
                    return Err(invalid(format!(
                        "{period:?} spectrum has {} bands, {} expected",
                        spectrum.len(),
                        scope.bands.len()
                    ))
                    .into());
                }
                if spectrum.iter().any(|l| l.is_nan()) {
                    return Err(invalid(format!("{period:?} spectrum contains NaN")).into());
                }
            }
        }
        Ok(())
    }

    /// Point emitters representing this source as seen from `receiver`.
    ///
    /// A point source yields itself. Each line segment is cut into equal
    /// pieces no longer than `max(min_step, d / 2)`, `d` being the distance
    /// from the segment midpoint to the receiver; every piece emits from its
    /// centre with `10 log10(piece_length)` added to the per-metre levels.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    pub fn emitters(&self, receiver: &Point3, min_step: f64) -> Vec<Emitter<'_>> {
        match &self.geometry {
            SourceGeometry::Point(p) => vec![Emitter {
                source: self,
                position: *p,
                level_offset: 0.0,
            }],
            SourceGeometry::Line(vertices) => {
                let mut out = Vec::new();
                for w in vertices.windows(2) {
                    let (a, b) = (w[0], w[1]);
                    let length = (b - a).norm();
                    if length < TOLERANCE {
                        continue;
                    }
                    let mid = a + (b - a) * 0.5;
                    let max_piece = min_step.max((mid - receiver).norm() * 0.5);
                    let count = (length / max_piece).ceil().max(1.0) as usize;
                    let piece = length / count as f64;
                    let level_offset = 10.0 * piece.log10();
                    for k in 0..count {
                        let t = (k as f64 + 0.5) / count as f64;
                        out.push(Emitter {
                            source: self,
                            position: a + (b - a) * t,
                            level_offset,
                        });
                    }
                }
                out
            }
        }
    }
}

/// A point emitter derived from a source.
#[derive(Debug, Clone, Copy)]
pub struct Emitter<'a> {
    /// Originating source.
    pub source: &'a Source,
    /// Emission point.
    pub position: Point3,
    /// Level correction added to every band (dB).
    pub level_offset: f64,
}

impl Emitter<'_> {
    /// Emitted spectrum of `period`, corrected by the level offset.
    #[must_use]
    pub fn spectrum(&self, period: TimePeriod) -> Option<Vec<f64>> {
        self.source
            .emission()
            .spectrum(period)
            .map(|s| s.iter().map(|l| l + self.level_offset).collect())
    }

    /// Total emitted level of `period`, corrected by the level offset.
    #[must_use]
    pub fn total_level(&self, period: TimePeriod) -> f64 {
        self.source.emission().total_level(period) + self.level_offset
    }
}

/// A receiver point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Receiver {
    pub id: ReceiverId,
    pub position: Point3,
}

impl Receiver {
    #[must_use]
    pub fn new(id: ReceiverId, position: Point3) -> Self {
        Self { id, position }
    }
}
