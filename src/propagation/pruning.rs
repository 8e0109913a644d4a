use std::collections::BTreeMap;

use crate::math::{db_to_power, power_to_db};

use super::config::{PropagationConfig, TimePeriod};

/// Minimum loss over `distance` metres for any path: spherical spreading
/// from a point source, `20 log10(d) + 11` dB.
#[must_use]
pub fn spreading_loss(distance: f64) -> f64 {
    20.0 * distance.max(1.0).log10() + 11.0
}

/// Most paths one source point can reach a receiver by, when
/// `reflection_walls` walls are close enough to mirror it across.
///
/// The direct path and the diffraction paths exclude each other. Each
/// receiver image adds at most one reflected path; an image is never
/// mirrored back across the wall that produced it.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn max_path_count(config: &PropagationConfig, reflection_walls: usize) -> f64 {
    let diffracted =
        usize::from(config.compute_vertical_diffraction) + 2 * usize::from(config.compute_horizontal_diffraction);
    let mut count = diffracted.max(1) as f64;
    let walls = reflection_walls as f64;
    let mut images = walls;
    for _ in 0..config.maximum_reflection_order {
        count += images;
        images *= (walls - 1.0).max(0.0);
    }
    count
}

/// Decides when the remaining emitters of a receiver can be skipped.
///
/// Emitters are visited in a fixed order, nearest first. Each one has an
/// upper bound per period on the power it can deliver; once, in every
/// period, the bounds of all remaining emitters together would raise the
/// total already received by less than `maximum_error` dB, the rest is
/// skipped.
///
/// The bounds hold as long as the attenuation of every path is at least
/// [`spreading_loss`] over its length.
#[derive(Debug, Clone)]
pub struct ContributionPruner {
    maximum_error: f64,
    // remaining[period][i]: summed bound power of emitters i.. in visiting order.
    remaining: BTreeMap<TimePeriod, Vec<f64>>,
}

impl ContributionPruner {
    /// `bounds` holds, per emitter in visiting order, the upper-bound total
    /// level (dB) of each period it emits in.
    #[must_use]
    pub fn new(maximum_error: f64, bounds: impl IntoIterator<Item = BTreeMap<TimePeriod, f64>>) -> Self {
        let bounds: Vec<BTreeMap<TimePeriod, f64>> = bounds.into_iter().collect();
        let count = bounds.len();
        let mut remaining: BTreeMap<TimePeriod, Vec<f64>> = BTreeMap::new();
        for (i, emitter) in bounds.iter().enumerate() {
            for (period, level) in emitter {
                let sums = remaining.entry(*period).or_insert_with(|| vec![0.0; count + 1]);
                sums[i] += db_to_power(*level);
            }
        }
        for sums in remaining.values_mut() {
            for i in (0..count).rev() {
                sums[i] += sums[i + 1];
            }
        }
        Self {
            maximum_error,
            remaining,
        }
    }

    /// Upper bound (dB) of what an emitter of total power `level` can
    /// deliver at `distance` over at most `paths` paths.
    #[must_use]
    pub fn upper_bound(level: f64, distance: f64, paths: f64) -> f64 {
        level - spreading_loss(distance) + 10.0 * paths.max(1.0).log10()
    }

    /// Returns `true` if emitters from `index` on can be skipped, given the
    /// total power already received in each period.
    #[must_use]
    pub fn can_skip_from(&self, index: usize, received: impl Fn(TimePeriod) -> f64) -> bool {
        if self.maximum_error <= 0.0 {
            return false;
        }
        self.remaining.iter().all(|(period, sums)| {
            let remaining = sums.get(index).copied().unwrap_or(0.0);
            if remaining <= 0.0 {
                return true;
            }
            let received = received(*period);
            received > 0.0 && power_to_db(1.0 + remaining / received) < self.maximum_error
        })
    }
}
