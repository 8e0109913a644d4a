use std::collections::BTreeMap;

use tracing::{trace, warn};

use crate::error::{ComputationError, Result};
use crate::math::{db_to_power, power_to_db, to_2d, Point3};
use crate::propagation::pruning::max_path_count;
use crate::propagation::{
    reflection_candidates, AttenuationParameters, ContributionPruner, PropagationConfig, PropagationPath,
    PropagationProcess, TimePeriod,
};
use crate::scene::{Emitter, Receiver, Scene, Source, SourceId};

use super::evaluator::AttenuationEvaluator;
use super::sink::{PeriodLevels, ReceiverLevels, ResultSink, SourceContribution};

/// Counters of one receiver computation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiverOutcome {
    /// Emitters whose paths were searched.
    pub emitters: usize,
    /// Emitters skipped by the low-contribution pruning.
    pub pruned: usize,
    /// Emitters dropped after a path search or evaluator failure.
    pub failed_pairs: usize,
    /// Valid paths found.
    pub paths: usize,
}

/// Received power per period and band.
#[derive(Debug, Clone, Default)]
struct PowerSpectra(BTreeMap<TimePeriod, Vec<f64>>);

impl PowerSpectra {
    fn add(&mut self, period: TimePeriod, band_count: usize, band: usize, power: f64) {
        let bands = self.0.entry(period).or_insert_with(|| vec![0.0; band_count]);
        if let Some(slot) = bands.get_mut(band) {
            *slot += power;
        }
    }

    fn merge(&mut self, other: &Self, band_count: usize) {
        for (period, bands) in &other.0 {
            for (band, power) in bands.iter().enumerate() {
                self.add(*period, band_count, band, *power);
            }
        }
    }

    /// Total power of `period` over all bands.
    fn total(&self, period: TimePeriod) -> f64 {
        self.0.get(&period).map_or(0.0, |bands| bands.iter().sum())
    }

    fn to_levels(&self, periods: &[TimePeriod], band_count: usize) -> PeriodLevels {
        periods
            .iter()
            .map(|period| {
                let levels = match self.0.get(period) {
                    Some(bands) => bands.iter().map(|p| power_to_db(*p)).collect(),
                    None => vec![f64::NEG_INFINITY; band_count],
                };
                (*period, levels)
            })
            .collect()
    }
}

#[derive(Default)]
struct SourceAccumulator {
    power: PowerSpectra,
    paths: Vec<PropagationPath>,
}

/// Computes the levels at one receiver from a set of nearby sources and
/// streams them to a sink.
pub struct ComputeReceiver<'a> {
    scene: &'a Scene,
    config: &'a PropagationConfig,
    parameters: &'a AttenuationParameters,
    evaluator: &'a dyn AttenuationEvaluator,
}

impl<'a> ComputeReceiver<'a> {
    #[must_use]
    pub fn new(
        scene: &'a Scene,
        config: &'a PropagationConfig,
        parameters: &'a AttenuationParameters,
        evaluator: &'a dyn AttenuationEvaluator,
    ) -> Self {
        Self {
            scene,
            config,
            parameters,
            evaluator,
        }
    }

    /// Searches paths from every emitter of `sources` within range, nearest
    /// first, and sends one [`SourceContribution`] per reached source followed
    /// by the receiver's [`ReceiverLevels`].
    ///
    /// A failing source-receiver pair is logged and left out.
    ///
    /// # Errors
    ///
    /// Returns the sink's error if a result cannot be stored.
    pub fn execute(&self, receiver: &Receiver, sources: &[&Source], sink: &dyn ResultSink) -> Result<ReceiverOutcome> {
        let config = self.config;
        let scope = &config.scope;
        let band_count = scope.bands.len();
        let max_distance = config.maximum_propagation_distance;
        let position = receiver.position;
        let position_2d = to_2d(&position);

        let mut emitters: Vec<(f64, Emitter<'_>)> = sources
            .iter()
            .filter(|s| s.distance_2d_to(&position_2d) <= max_distance)
            .flat_map(|s| s.emitters(&position, config.line_source_step))
            .map(|e| ((e.position - position).norm(), e))
            .filter(|(d, _)| *d <= max_distance)
            .collect();
        emitters.sort_by(|a, b| a.0.total_cmp(&b.0));

        let reflection_walls = if config.maximum_reflection_order > 0 {
            reflection_candidates(self.scene, &position_2d, config.reflection_distance_limit()).len()
        } else {
            0
        };
        let paths_per_emitter = max_path_count(config, reflection_walls);
        let pruner = ContributionPruner::new(
            config.maximum_error,
            emitters.iter().map(|(d, e)| {
                scope
                    .periods
                    .iter()
                    .map(|p| (*p, e.total_level(*p)))
                    .filter(|(_, level)| level.is_finite())
                    .map(|(p, level)| (p, ContributionPruner::upper_bound(level, *d, paths_per_emitter)))
                    .collect::<BTreeMap<_, _>>()
            }),
        );
        let process = PropagationProcess::new(self.scene, config);

        let mut outcome = ReceiverOutcome::default();
        let mut total = PowerSpectra::default();
        let mut per_source: BTreeMap<SourceId, SourceAccumulator> = BTreeMap::new();

        for (i, (_, emitter)) in emitters.iter().enumerate() {
            if pruner.can_skip_from(i, |period| total.total(period)) {
                outcome.pruned = emitters.len() - i;
                trace!(receiver = receiver.id.0, skipped = outcome.pruned, "remaining emitters pruned");
                break;
            }
            outcome.emitters += 1;
            let (power, paths) = match self.emitter_power(&process, emitter, &position) {
                Ok(found) => found,
                Err(e) => {
                    warn!(
                        receiver = receiver.id.0,
                        source = emitter.source.id().0,
                        error = %e,
                        "dropping source-receiver pair"
                    );
                    outcome.failed_pairs += 1;
                    continue;
                }
            };
            if paths.is_empty() {
                continue;
            }
            outcome.paths += paths.len();
            total.merge(&power, band_count);
            let entry = per_source.entry(emitter.source.id()).or_default();
            entry.power.merge(&power, band_count);
            entry.paths.extend(paths);
        }

        for (source, acc) in per_source {
            sink.append(SourceContribution {
                receiver: receiver.id,
                source,
                paths: acc.paths,
                levels: acc.power.to_levels(&scope.periods, band_count),
            })?;
        }
        sink.finish_receiver(ReceiverLevels {
            receiver: receiver.id,
            position,
            levels: total.to_levels(&scope.periods, band_count),
        })?;
        Ok(outcome)
    }

    /// Paths from one emitter and the power they deliver.
    fn emitter_power(
        &self,
        process: &PropagationProcess<'_>,
        emitter: &Emitter<'_>,
        receiver: &Point3,
    ) -> Result<(PowerSpectra, Vec<PropagationPath>)> {
        let scope = &self.config.scope;
        let band_count = scope.bands.len();
        let paths = process.run(&emitter.position, receiver)?;

        let mut power = PowerSpectra::default();
        for path in &paths {
            let attenuation = self.evaluator.attenuation(path, self.parameters, &scope.bands)?;
            if attenuation.len() != band_count {
                return Err(ComputationError::Evaluator(format!(
                    "{} attenuation values for {band_count} bands",
                    attenuation.len()
                ))
                .into());
            }
            for period in &scope.periods {
                let Some(emitted) = emitter.spectrum(*period) else {
                    continue;
                };
                for (band, (lw, a)) in emitted.iter().zip(&attenuation).enumerate() {
                    power.add(*period, band_count, band, db_to_power(lw - a));
                }
            }
        }
        Ok((power, paths))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::compute::evaluator::SphericalSpreading;
    use crate::compute::sink::MemorySink;
    use crate::math::Point2;
    use crate::propagation::pruning::spreading_loss;
    use crate::scene::{Emission, ReceiverId};

    fn day_config() -> PropagationConfig {
        let mut config = PropagationConfig {
            maximum_reflection_order: 0,
            ..PropagationConfig::default()
        };
        config.scope.periods = vec![TimePeriod::Day];
        config
    }

    fn point_source(id: u64, x: f64, level: f64) -> Source {
        Source::point(
            SourceId(id),
            Point3::new(x, 0.0, 1.0),
            Emission::new().with_period(TimePeriod::Day, vec![level; 8]),
        )
    }

    #[test]
    fn single_source_level_is_emission_minus_spreading() {
        let scene = Scene::empty();
        let config = day_config();
        let params = AttenuationParameters::default();
        let evaluator = SphericalSpreading::default();
        let sink = MemorySink::with_paths();
        let source = point_source(1, 0.0, 90.0);
        let receiver = Receiver::new(ReceiverId(1), Point3::new(100.0, 0.0, 1.0));

        let outcome = ComputeReceiver::new(&scene, &config, &params, &evaluator)
            .execute(&receiver, &[&source], &sink)
            .unwrap();
        assert_eq!(outcome.paths, 1);

        let levels = sink.receiver(ReceiverId(1)).unwrap();
        assert_relative_eq!(levels.levels[&TimePeriod::Day][0], 90.0 - spreading_loss(100.0), epsilon = 1e-9);
        assert_eq!(sink.contributions().len(), 1);
        assert!(!levels.levels.contains_key(&TimePeriod::Night));
    }

    #[test]
    fn out_of_range_sources_contribute_nothing() {
        let scene = Scene::empty();
        let config = PropagationConfig {
            maximum_propagation_distance: 50.0,
            ..day_config()
        };
        let params = AttenuationParameters::default();
        let evaluator = SphericalSpreading::default();
        let sink = MemorySink::new();
        let source = point_source(1, 0.0, 90.0);
        let receiver = Receiver::new(ReceiverId(2), Point3::new(100.0, 0.0, 1.0));

        let outcome = ComputeReceiver::new(&scene, &config, &params, &evaluator)
            .execute(&receiver, &[&source], &sink)
            .unwrap();
        assert_eq!(outcome.emitters, 0);
        assert!(sink.contributions().is_empty());
        let levels = sink.receiver(ReceiverId(2)).unwrap();
        assert!(levels.total(TimePeriod::Day).is_infinite());
    }

    #[test]
    fn weak_far_sources_are_pruned() {
        let scene = Scene::empty();
        let config = PropagationConfig {
            maximum_error: 0.1,
            ..day_config()
        };
        let params = AttenuationParameters::default();
        let evaluator = SphericalSpreading::default();
        let sink = MemorySink::new();
        let loud = point_source(1, 90.0, 100.0);
        let faint = point_source(2, -300.0, 30.0);
        let receiver = Receiver::new(ReceiverId(3), Point3::new(100.0, 0.0, 1.0));

        let outcome = ComputeReceiver::new(&scene, &config, &params, &evaluator)
            .execute(&receiver, &[&faint, &loud], &sink)
            .unwrap();
        assert_eq!(outcome.emitters, 1);
        assert_eq!(outcome.pruned, 1);
    }

    #[test]
    fn pruning_stays_within_maximum_error_between_reflecting_walls() {
        // A corridor multiplies the paths each source reaches the receiver by.
        let scene = Scene::builder()
            .add_wall(Point2::new(0.0, 0.0), Point2::new(30.0, 0.0), 10.0)
            .add_wall(Point2::new(30.0, 6.0), Point2::new(0.0, 6.0), 10.0)
            .build();
        let exact = PropagationConfig {
            maximum_reflection_order: 2,
            maximum_error: 0.0,
            ..day_config()
        };
        let pruned = PropagationConfig {
            maximum_error: 0.1,
            ..exact.clone()
        };
        let params = AttenuationParameters::default();
        let evaluator = SphericalSpreading::default();
        let receiver = Receiver::new(ReceiverId(5), Point3::new(15.0, 3.0, 1.5));
        let near = Source::point(
            SourceId(1),
            Point3::new(25.0, 3.0, 1.5),
            Emission::new().with_period(TimePeriod::Day, vec![60.0; 8]),
        );

        let level = |config: &PropagationConfig, far: &Source| {
            let sink = MemorySink::new();
            let outcome = ComputeReceiver::new(&scene, config, &params, &evaluator)
                .execute(&receiver, &[&near, far], &sink)
                .unwrap();
            (sink.receiver(ReceiverId(5)).unwrap().total(TimePeriod::Day), outcome.pruned)
        };

        let mut skipped = 0;
        for far_level in 50..=119 {
            let far = Source::point(
                SourceId(2),
                Point3::new(215.0, 3.0, 1.5),
                Emission::new().with_period(TimePeriod::Day, vec![f64::from(far_level); 8]),
            );
            let (reference, _) = level(&exact, &far);
            let (approximate, pruned_count) = level(&pruned, &far);
            assert!(
                (reference - approximate).abs() <= 0.1,
                "far source at {far_level} dB: {reference} vs {approximate}"
            );
            skipped += pruned_count;
        }
        assert!(skipped > 0);
    }

    #[test]
    fn coincident_pair_is_dropped_not_fatal() {
        let scene = Scene::empty();
        let config = day_config();
        let params = AttenuationParameters::default();
        let evaluator = SphericalSpreading::default();
        let sink = MemorySink::new();
        let on_top = point_source(1, 100.0, 90.0);
        let other = point_source(2, 0.0, 90.0);
        let receiver = Receiver::new(ReceiverId(4), Point3::new(100.0, 0.0, 1.0));

        let outcome = ComputeReceiver::new(&scene, &config, &params, &evaluator)
            .execute(&receiver, &[&on_top, &other], &sink)
            .unwrap();
        assert_eq!(outcome.failed_pairs, 1);
        assert_eq!(outcome.paths, 1);
        assert_eq!(sink.receiver_count(), 1);
    }
}
