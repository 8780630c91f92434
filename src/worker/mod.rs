//! # Worker handles, sleep/wake signaling, and state snapshots.
//!
//! A worker is one unit of asynchronous activity participating in the
//! stop/wait protocol: it carries a [`WorkerHandle`], polls
//! [`WorkerHandle::is_stop_requested`], and may doze on
//! [`WorkerHandle::sleep`] between units of work. [`WorkerReport`] /
//! [`WorkerStatus`] describe a worker from the outside for diagnostics.

mod handle;
mod report;

pub use handle::{Finalizer, SleepOutcome, SleepPermit, WorkerHandle};
pub use report::{WorkerReport, WorkerStatus};

pub(crate) use handle::WorkerShared;
