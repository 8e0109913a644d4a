use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Progress is accumulated as an integer fraction of this scale.
const SCALE: f64 = 1e12;

/// Hierarchical progress reporting with cooperative cancellation.
///
/// A visitor covers a number of steps. `sub_process(n)` hands one of those
/// steps to a child visitor split into `n` steps; the child's steps then make
/// up that parent step, which must not be ended on the parent as well.
pub trait ProgressVisitor: Send + Sync {
    /// Splits one step of this visitor into `steps` child steps.
    fn sub_process(&self, steps: usize) -> Box<dyn ProgressVisitor>;

    /// Marks one step as finished.
    fn end_step(&self);

    /// Returns `true` once cancellation has been requested.
    fn is_canceled(&self) -> bool;

    /// Requests cancellation of the whole hierarchy.
    fn cancel(&self);
}

#[derive(Debug, Default)]
struct Shared {
    progress: AtomicU64,
    canceled: AtomicBool,
}

/// Thread-safe [`ProgressVisitor`] sharing one progress counter and one
/// cancellation flag across its whole hierarchy.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    shared: Arc<Shared>,
    // Fraction of the root represented by one step of this visitor.
    step_weight: f64,
}

impl ProgressTracker {
    /// Root tracker of `steps` steps.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn new(steps: usize) -> Self {
        Self {
            shared: Arc::new(Shared::default()),
            step_weight: 1.0 / steps.max(1) as f64,
        }
    }

    /// Overall completion in `[0, 1]`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn progress(&self) -> f64 {
        (self.shared.progress.load(Ordering::Relaxed) as f64 / SCALE).min(1.0)
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new(1)
    }
}

impl ProgressVisitor for ProgressTracker {
    #[allow(clippy::cast_precision_loss)]
    fn sub_process(&self, steps: usize) -> Box<dyn ProgressVisitor> {
        Box::new(Self {
            shared: Arc::clone(&self.shared),
            step_weight: self.step_weight / steps.max(1) as f64,
        })
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn end_step(&self) {
        let increment = (self.step_weight * SCALE).round() as u64;
        self.shared.progress.fetch_add(increment, Ordering::Relaxed);
    }

    fn is_canceled(&self) -> bool {
        self.shared.canceled.load(Ordering::Relaxed)
    }

    fn cancel(&self) {
        self.shared.canceled.store(true, Ordering::Relaxed);
    }
}
