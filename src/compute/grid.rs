use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::error::{ComputationError, Result};
use crate::math::{to_2d, Envelope, Point2};
use crate::propagation::{AttenuationParameters, PropagationConfig};
use crate::scene::{GridIndex, Receiver, Scene, Source};

use super::dedup::ReceiverDedupSet;
use super::evaluator::AttenuationEvaluator;
use super::progress::ProgressVisitor;
use super::receiver::ComputeReceiver;
use super::sink::ResultSink;

/// Lifecycle of a grid run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Indexes not built yet.
    Init,
    /// Cells are being processed.
    Processing,
    /// Every cell was processed.
    Complete,
    /// Stopped on request; results already streamed stay valid.
    Cancelled,
}

/// Lifecycle of one grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellState {
    Queued,
    Running,
    Done,
}

/// Summary of one cell.
#[derive(Debug, Clone)]
pub struct CellReport {
    /// Column and row of the cell.
    pub index: (usize, usize),
    pub envelope: Envelope,
    pub state: CellState,
    /// Receivers inside the cell, boundaries included.
    pub receivers: usize,
    /// Sources within range of the cell.
    pub sources: usize,
}

/// Summary of a grid run.
#[derive(Debug, Clone)]
pub struct GridRunReport {
    /// `Complete` or `Cancelled`.
    pub state: RunState,
    pub cells: Vec<CellReport>,
    /// Receivers computed and streamed by this run.
    pub processed: usize,
    /// Receivers skipped because another cell or an earlier run took them.
    pub skipped: usize,
    /// Receivers whose results could not be stored.
    pub failed: usize,
    /// Source-receiver pairs dropped after an error.
    pub failed_pairs: usize,
}

enum ReceiverResult {
    Processed { failed_pairs: usize },
    Skipped,
    Failed,
    Canceled,
}

/// Runs the propagation over a receiver set split into a square grid.
///
/// Cells are processed one after the other in row-major order; the receivers
/// of a cell are processed in parallel on a dedicated worker pool. Results go
/// to the sink as soon as each receiver is finished.
pub struct GridComputationManager<'a> {
    scene: &'a Scene,
    config: &'a PropagationConfig,
    parameters: AttenuationParameters,
    sources: Vec<&'a Source>,
    receivers: &'a [Receiver],
    dedup: Arc<ReceiverDedupSet>,
    state: RunState,
}

impl<'a> GridComputationManager<'a> {
    /// Prepares a run. Sources failing validation are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the configuration is invalid.
    pub fn new(
        scene: &'a Scene,
        config: &'a PropagationConfig,
        sources: &'a [Source],
        receivers: &'a [Receiver],
    ) -> Result<Self> {
        config.validate()?;
        let sources = sources
            .iter()
            .filter(|s| match s.validate(&config.scope) {
                Ok(()) => true,
                Err(e) => {
                    warn!(error = %e, "skipping source");
                    false
                }
            })
            .collect();
        Ok(Self {
            scene,
            config,
            parameters: AttenuationParameters::default(),
            sources,
            receivers,
            dedup: Arc::new(ReceiverDedupSet::new()),
            state: RunState::Init,
        })
    }

    /// Uses `parameters` for the attenuation evaluator.
    #[must_use]
    pub fn with_attenuation_parameters(mut self, parameters: AttenuationParameters) -> Self {
        self.parameters = parameters;
        self
    }

    /// Shares a dedup set, typically with an earlier cancelled run.
    #[must_use]
    pub fn with_dedup_set(mut self, dedup: Arc<ReceiverDedupSet>) -> Self {
        self.dedup = dedup;
        self
    }

    #[must_use]
    pub fn state(&self) -> RunState {
        self.state
    }

    #[must_use]
    pub fn dedup_set(&self) -> &Arc<ReceiverDedupSet> {
        &self.dedup
    }

    /// Processes every cell, or stops at the first cancellation check that
    /// sees a request. A receiver that fails is not retried within the run;
    /// the next run on the same dedup set retries it.
    ///
    /// # Errors
    ///
    /// Returns `ComputationError::WorkerPool` if the worker pool cannot be
    /// created.
    pub fn run(
        &mut self,
        evaluator: &dyn AttenuationEvaluator,
        sink: &dyn ResultSink,
        progress: &dyn ProgressVisitor,
    ) -> Result<GridRunReport> {
        self.state = RunState::Init;
        let retried = self.dedup.release_failed();
        if retried > 0 {
            debug!(retried, "retrying receivers that failed in an earlier run");
        }
        let mut builder = rayon::ThreadPoolBuilder::new();
        if let Some(threads) = self.config.threads {
            builder = builder.num_threads(threads);
        }
        let pool = builder
            .build()
            .map_err(|e| ComputationError::WorkerPool(e.to_string()))?;

        let source_index: GridIndex<usize> = GridIndex::from_items(
            self.sources
                .iter()
                .enumerate()
                .filter_map(|(i, s)| Some((s.envelope()?, i)))
                .collect(),
        );
        let receiver_points: Vec<Point2> = self.receivers.iter().map(|r| to_2d(&r.position)).collect();
        let receiver_index: GridIndex<usize> = GridIndex::from_items(
            receiver_points
                .iter()
                .enumerate()
                .map(|(i, p)| (Envelope::of_point(*p), i))
                .collect(),
        );

        let mut cells = Envelope::of_points(&receiver_points)
            .map(|env| grid_cells(&env, self.config.grid_dim))
            .unwrap_or_default();
        info!(
            receivers = self.receivers.len(),
            sources = self.sources.len(),
            cells = cells.len(),
            threads = pool.current_num_threads(),
            "grid run started"
        );

        self.state = RunState::Processing;
        let cell_progress = progress.sub_process(cells.len().max(1));
        let mut report = GridRunReport {
            state: RunState::Processing,
            cells: Vec::new(),
            processed: 0,
            skipped: 0,
            failed: 0,
            failed_pairs: 0,
        };
        let compute = ComputeReceiver::new(self.scene, self.config, &self.parameters, evaluator);
        let max_distance = self.config.maximum_propagation_distance;

        for cell in &mut cells {
            if progress.is_canceled() {
                break;
            }
            cell.state = CellState::Running;

            let members: Vec<&Receiver> = receiver_index
                .query(&cell.envelope)
                .into_iter()
                .filter_map(|i| self.receivers.get(i))
                .collect();
            let nearby: Vec<&Source> = source_index
                .query(&cell.envelope.expanded(max_distance))
                .into_iter()
                .filter_map(|i| self.sources.get(i).copied())
                .collect();
            cell.receivers = members.len();
            cell.sources = nearby.len();

            let scheduled: Vec<&Receiver> = members.into_iter().filter(|r| !self.dedup.contains(r.id)).collect();
            let already = cell.receivers - scheduled.len();
            report.skipped += already;
            debug!(
                cell = ?cell.index,
                scheduled = scheduled.len(),
                skipped = already,
                sources = nearby.len(),
                "processing cell"
            );

            let receiver_progress = cell_progress.sub_process(scheduled.len().max(1));
            let dedup = &self.dedup;
            let results: Vec<ReceiverResult> = pool.install(|| {
                scheduled
                    .par_iter()
                    .map(|receiver| {
                        if progress.is_canceled() {
                            return ReceiverResult::Canceled;
                        }
                        if !dedup.try_claim(receiver.id) {
                            receiver_progress.end_step();
                            return ReceiverResult::Skipped;
                        }
                        let result = match compute.execute(receiver, &nearby, sink) {
                            Ok(outcome) => {
                                dedup.mark_done(receiver.id);
                                ReceiverResult::Processed {
                                    failed_pairs: outcome.failed_pairs,
                                }
                            }
                            Err(e) => {
                                warn!(receiver = receiver.id.0, error = %e, "receiver failed");
                                dedup.mark_failed(receiver.id);
                                ReceiverResult::Failed
                            }
                        };
                        receiver_progress.end_step();
                        result
                    })
                    .collect()
            });
            if scheduled.is_empty() {
                receiver_progress.end_step();
            }

            let mut canceled = false;
            for result in results {
                match result {
                    ReceiverResult::Processed { failed_pairs } => {
                        report.processed += 1;
                        report.failed_pairs += failed_pairs;
                    }
                    ReceiverResult::Skipped => report.skipped += 1,
                    ReceiverResult::Failed => report.failed += 1,
                    ReceiverResult::Canceled => canceled = true,
                }
            }
            if canceled {
                // In-flight receivers finished; the cell stays unfinished.
                break;
            }
            cell.state = CellState::Done;
        }

        if cells.is_empty() {
            cell_progress.end_step();
        }

        let state = if progress.is_canceled() && cells.iter().any(|c| c.state != CellState::Done) {
            RunState::Cancelled
        } else {
            RunState::Complete
        };
        self.state = state;
        report.state = state;
        report.cells = cells;
        info!(
            state = ?state,
            processed = report.processed,
            skipped = report.skipped,
            failed = report.failed,
            "grid run finished"
        );
        Ok(report)
    }
}

/// Splits `env` into `dim` x `dim` closed cells in row-major order.
///
/// Neighbouring cells share their boundary, so a receiver on it belongs to
/// both; the dedup set keeps it from being computed twice.
#[allow(clippy::cast_precision_loss)]
fn grid_cells(env: &Envelope, dim: usize) -> Vec<CellReport> {
    let dim = dim.max(1);
    let width = env.width() / dim as f64;
    let height = env.height() / dim as f64;
    let coordinate = |origin: f64, step: f64, k: usize, end: f64| {
        if k == dim {
            end
        } else {
            origin + step * k as f64
        }
    };
    let mut cells = Vec::with_capacity(dim * dim);
    for row in 0..dim {
        for col in 0..dim {
            let min = Point2::new(
                coordinate(env.min.x, width, col, env.max.x),
                coordinate(env.min.y, height, row, env.max.y),
            );
            let max = Point2::new(
                coordinate(env.min.x, width, col + 1, env.max.x),
                coordinate(env.min.y, height, row + 1, env.max.y),
            );
            cells.push(CellReport {
                index: (col, row),
                envelope: Envelope::new(min, max),
                state: CellState::Queued,
                receivers: 0,
                sources: 0,
            });
        }
    }
    cells
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::compute::evaluator::SphericalSpreading;
    use crate::compute::progress::ProgressTracker;
    use crate::compute::sink::MemorySink;
    use crate::math::Point3;
    use crate::propagation::TimePeriod;
    use crate::scene::{Emission, ReceiverId, SourceId};

    fn day_config(grid_dim: usize) -> PropagationConfig {
        let mut config = PropagationConfig {
            grid_dim,
            threads: Some(2),
            maximum_reflection_order: 0,
            ..PropagationConfig::default()
        };
        config.scope.periods = vec![TimePeriod::Day];
        config
    }

    fn source() -> Source {
        Source::point(
            SourceId(1),
            Point3::new(50.0, -20.0, 1.0),
            Emission::new().with_period(TimePeriod::Day, vec![90.0; 8]),
        )
    }

    #[test]
    fn cells_cover_the_envelope_exactly() {
        let env = Envelope::new(Point2::new(0.0, 0.0), Point2::new(30.0, 10.0));
        let cells = grid_cells(&env, 3);
        assert_eq!(cells.len(), 9);
        assert_eq!(cells[0].envelope.max.x, 10.0);
        assert_eq!(cells[8].envelope.max, env.max);
        assert_eq!(cells[3].index, (0, 1));
    }

    #[test]
    fn every_receiver_is_streamed_once() {
        let scene = Scene::empty();
        let config = day_config(2);
        let sources = vec![source()];
        // x = 50 lies on the boundary between the two columns.
        let receivers: Vec<Receiver> = (0..=10u32)
            .map(|k| Receiver::new(ReceiverId(u64::from(k)), Point3::new(f64::from(k) * 10.0, 0.0, 4.0)))
            .collect();
        let sink = MemorySink::new();
        let progress = ProgressTracker::new(1);
        let mut manager = GridComputationManager::new(&scene, &config, &sources, &receivers).unwrap();
        let report = manager
            .run(&SphericalSpreading::default(), &sink, &progress)
            .unwrap();
        assert_eq!(report.state, RunState::Complete);
        assert_eq!(manager.state(), RunState::Complete);
        assert_eq!(report.processed, 11);
        assert_eq!(sink.receiver_count(), 11);
        assert!(report.skipped >= 1);
        assert!((progress.progress() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cancelled_before_start_processes_nothing() {
        let scene = Scene::empty();
        let config = day_config(2);
        let sources = vec![source()];
        let receivers = vec![Receiver::new(ReceiverId(0), Point3::new(0.0, 0.0, 4.0))];
        let sink = MemorySink::new();
        let progress = ProgressTracker::new(1);
        progress.cancel();
        let mut manager = GridComputationManager::new(&scene, &config, &sources, &receivers).unwrap();
        let report = manager
            .run(&SphericalSpreading::default(), &sink, &progress)
            .unwrap();
        assert_eq!(report.state, RunState::Cancelled);
        assert_eq!(report.processed, 0);
        assert_eq!(sink.receiver_count(), 0);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let scene = Scene::empty();
        let config = PropagationConfig {
            grid_dim: 0,
            ..PropagationConfig::default()
        };
        assert!(GridComputationManager::new(&scene, &config, &[], &[]).is_err());
    }
}
