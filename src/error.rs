//! Error types raised by the coordination protocol.
//!
//! There is exactly one structured error: [`CoordinatorError::DrainTimeout`],
//! raised by the bounded drain when workers fail to release their handles in
//! time. Every other operation communicates through return values (booleans,
//! snapshots). It carries the full per-worker snapshot so the caller can see
//! *which* worker is stuck, not just that one is.

use std::time::{Duration, SystemTime};

use thiserror::Error;

use crate::worker::WorkerReport;

/// # Errors produced by the coordinator.
///
/// Recoverable by the caller: on a drain timeout it may retry with a longer
/// timeout, keep servicing its dispatch loop, or escalate.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum CoordinatorError {
    /// The bounded drain expired with workers still holding handles.
    #[error("drain timeout in {context:?} after {timeout:?}; outstanding: {workers:?}")]
    DrainTimeout {
        /// Caller-supplied description of the wait site.
        context: String,
        /// Wall-clock time the wait began.
        started: SystemTime,
        /// Wall-clock time the timeout was detected.
        now: SystemTime,
        /// The configured bound that was exceeded.
        timeout: Duration,
        /// Snapshot of every registered worker at expiry.
        workers: Vec<WorkerReport>,
    },
}

impl CoordinatorError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use std::time::{Duration, SystemTime};
    /// use workgate::CoordinatorError;
    ///
    /// let err = CoordinatorError::DrainTimeout {
    ///     context: "teardown".into(),
    ///     started: SystemTime::now(),
    ///     now: SystemTime::now(),
    ///     timeout: Duration::from_millis(200),
    ///     workers: vec![],
    /// };
    /// assert_eq!(err.as_label(), "coordinator_drain_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            CoordinatorError::DrainTimeout { .. } => "coordinator_drain_timeout",
        }
    }

    /// Returns a human-readable message with details about the error,
    /// one line per still-outstanding worker.
    pub fn as_message(&self) -> String {
        match self {
            CoordinatorError::DrainTimeout {
                context,
                timeout,
                workers,
                ..
            } => {
                let mut msg = format!("drain timeout in {context:?} after {timeout:?}");
                for report in workers {
                    msg.push_str("\n  ");
                    msg.push_str(&report.to_string());
                }
                msg
            }
        }
    }
}
