//! # Worker state snapshots.
//!
//! [`WorkerReport`] is one row of [`Coordinator::report_states`](crate::Coordinator::report_states):
//! the worker's name, a coarse [`WorkerStatus`], and the number of references
//! the registry currently accounts for. Reports are plain data — taking one
//! never blocks a worker.

use std::fmt;

/// Coarse liveness of a single registered worker.
///
/// Derived from the reference ledger, not from stop flags: a flag only *asks*
/// a worker to stop, the ledger shows whether it actually *has*.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WorkerStatus {
    /// The ledger shows zero references. Not expected while the worker is
    /// still registered; reported as-is rather than papered over.
    Unknown,
    /// Only the registry's own reference remains — every activity holding
    /// this worker's handle has released it.
    Finished,
    /// At least one handle is still held outside the registry.
    Active,
}

impl WorkerStatus {
    pub(crate) fn from_refs(refs: usize) -> Self {
        match refs {
            0 => WorkerStatus::Unknown,
            1 => WorkerStatus::Finished,
            _ => WorkerStatus::Active,
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            WorkerStatus::Unknown => "unknown",
            WorkerStatus::Finished => "finished",
            WorkerStatus::Active => "active",
        }
    }
}

impl fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Diagnostic snapshot of one registered worker.
///
/// # Example
/// ```
/// use workgate::{WorkerReport, WorkerStatus};
///
/// let report = WorkerReport {
///     name: "poller".into(),
///     status: WorkerStatus::Active,
///     refs: 3,
/// };
/// assert_eq!(report.to_string(), "poller - active (refs: 3)");
/// ```
#[derive(Clone, Debug)]
pub struct WorkerReport {
    /// Worker name given at registration.
    pub name: String,
    /// Coarse liveness derived from `refs`.
    pub status: WorkerStatus,
    /// References accounted for: the registry's own plus one per live handle.
    pub refs: usize,
}

impl fmt::Display for WorkerReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {} (refs: {})", self.name, self.status, self.refs)
    }
}
