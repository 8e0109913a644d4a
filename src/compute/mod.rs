pub mod dedup;
pub mod evaluator;
pub mod grid;
pub mod progress;
pub mod receiver;
pub mod sink;

pub use dedup::ReceiverDedupSet;
pub use evaluator::{AttenuationEvaluator, SphericalSpreading};
pub use grid::{CellReport, CellState, GridComputationManager, GridRunReport, RunState};
pub use progress::{ProgressTracker, ProgressVisitor};
pub use receiver::{ComputeReceiver, ReceiverOutcome};
pub use sink::{MemorySink, PeriodLevels, ReceiverLevels, ResultSink, SourceContribution};
