//! Time-triggered sweeps.
//!
//! Each sweep is a scan-and-act batch with no state of its own: the
//! selection predicates are pure functions of the entities and the
//! injected clock. Failures are isolated per entity; only a failing
//! initial scan aborts a sweep.

mod runner;
mod sweeps;

pub use runner::SweepRunner;
pub use sweeps::ReminderScheduler;

/// Outcome of one sweep execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    /// Entities examined by the selection predicate.
    pub scanned: usize,
    /// Notifications dispatched or successors generated.
    pub dispatched: usize,
    /// Entities whose processing failed and was skipped.
    pub failed: usize,
}
