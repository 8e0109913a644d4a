use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::Result;
use crate::math::{energetic_sum, Point3};
use crate::propagation::{PropagationPath, TimePeriod};
use crate::scene::{ReceiverId, SourceId};

/// Per-period spectra in dB, one value per configured band.
pub type PeriodLevels = BTreeMap<TimePeriod, Vec<f64>>;

/// What one source delivers to one receiver.
#[derive(Debug, Clone)]
pub struct SourceContribution {
    pub receiver: ReceiverId,
    pub source: SourceId,
    /// Every valid path from the source's emitters to the receiver.
    pub paths: Vec<PropagationPath>,
    /// Received levels; `-inf` in bands nothing reaches.
    pub levels: PeriodLevels,
}

/// Final levels at one receiver, all sources together.
#[derive(Debug, Clone)]
pub struct ReceiverLevels {
    pub receiver: ReceiverId,
    pub position: Point3,
    pub levels: PeriodLevels,
}

impl ReceiverLevels {
    /// Energetic sum over the bands of `period` (`-inf` if silent or absent).
    #[must_use]
    pub fn total(&self, period: TimePeriod) -> f64 {
        self.levels
            .get(&period)
            .map_or(f64::NEG_INFINITY, |bands| energetic_sum(bands.iter().copied()))
    }
}

/// Destination of computed results.
///
/// Called from worker threads as soon as a receiver is finished: first one
/// `append` per contributing source, then exactly one `finish_receiver`.
pub trait ResultSink: Send + Sync {
    /// Stores one source contribution.
    ///
    /// # Errors
    ///
    /// Implementations report storage failures as `ComputationError::Sink`.
    fn append(&self, contribution: SourceContribution) -> Result<()>;

    /// Stores the final levels of a receiver.
    ///
    /// # Errors
    ///
    /// Implementations report storage failures as `ComputationError::Sink`.
    fn finish_receiver(&self, levels: ReceiverLevels) -> Result<()>;
}

/// Keeps every result in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    keep_paths: bool,
    contributions: Mutex<Vec<SourceContribution>>,
    receivers: Mutex<Vec<ReceiverLevels>>,
}

impl MemorySink {
    /// A sink dropping path geometry from contributions.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink keeping path geometry.
    #[must_use]
    pub fn with_paths() -> Self {
        Self {
            keep_paths: true,
            ..Self::default()
        }
    }

    fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
        mutex.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the stored contributions.
    #[must_use]
    pub fn contributions(&self) -> Vec<SourceContribution> {
        Self::lock(&self.contributions).clone()
    }

    /// Snapshot of the stored receiver levels, in completion order.
    #[must_use]
    pub fn receivers(&self) -> Vec<ReceiverLevels> {
        Self::lock(&self.receivers).clone()
    }

    /// Levels of one receiver, if finished.
    #[must_use]
    pub fn receiver(&self, id: ReceiverId) -> Option<ReceiverLevels> {
        Self::lock(&self.receivers).iter().find(|r| r.receiver == id).cloned()
    }

    /// Number of finished receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        Self::lock(&self.receivers).len()
    }
}

impl ResultSink for MemorySink {
    fn append(&self, mut contribution: SourceContribution) -> Result<()> {
        if !self.keep_paths {
            contribution.paths.clear();
        }
        Self::lock(&self.contributions).push(contribution);
        Ok(())
    }

    fn finish_receiver(&self, levels: ReceiverLevels) -> Result<()> {
        Self::lock(&self.receivers).push(levels);
        Ok(())
    }
}
