//! # Coordinator configuration.
//!
//! [`CoordinatorConfig`] holds the few knobs the protocol exposes. Today that
//! is the polling cadence of the bounded drain
//! ([`Coordinator::wait_for_all_bounded`](crate::Coordinator::wait_for_all_bounded));
//! the unbounded barrier needs no tuning.
//!
//! # Example
//! ```
//! use std::time::Duration;
//! use workgate::CoordinatorConfig;
//!
//! let mut cfg = CoordinatorConfig::default();
//! cfg.poll_interval = Duration::from_millis(25);
//!
//! assert_eq!(cfg.poll_interval, Duration::from_millis(25));
//! ```

use std::time::Duration;

/// Tuning for a [`Coordinator`](crate::Coordinator).
#[derive(Clone, Copy, Debug)]
pub struct CoordinatorConfig {
    /// How often the bounded drain re-checks whether all workers finished.
    /// Smaller values tighten drain latency at the cost of more wakeups of
    /// the waiting task.
    pub poll_interval: Duration,
}

impl Default for CoordinatorConfig {
    /// Provides a default configuration:
    /// - `poll_interval = 10ms`
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(10),
        }
    }
}
