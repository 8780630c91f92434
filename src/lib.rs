//! # workgate
//!
//! **workgate** is a lifecycle-coordination primitive for asynchronous
//! workers — spawned tasks, timer loops, I/O callback chains — owned
//! indirectly by a controlling object.
//!
//! It solves one problem and solves it completely: let the controller request
//! shutdown, guarantee no worker touches the controller's state afterwards,
//! and let teardown block exactly until every worker has *genuinely* stopped —
//! without deadlocking against a dispatch loop a worker may be mid-round-trip
//! with. It is not a thread pool, not a scheduler, not an actor framework: it
//! manages the existence and termination of worker activity, never its work.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────────────────────────────────────────────────┐
//!     │  Controller (your object)                                │
//!     │  owns a Coordinator                                      │
//!     └───────┬──────────────────────────────────────────────────┘
//!             │ new_worker("name") before starting each activity
//!             ▼
//!     ┌──────────────────────────────────────────────────────────┐
//!     │  Coordinator                                             │
//!     │  - global stop flag (CancellationToken, one-way)         │
//!     │  - registry: one slot per worker (name, refs, finalizer) │
//!     │  - live counter (watch): outstanding handles, all workers│
//!     └───┬─────────────────┬─────────────────┬──────────────────┘
//!         ▼                 ▼                 ▼
//!     WorkerHandle      WorkerHandle      WorkerHandle
//!     (task loop)       (timer)           (callback chain,
//!         │                 │              handle cloned per hop)
//!         │  carried for the whole activity; dropped at its end  │
//!         ▼                 ▼                 ▼
//!     every clone/drop updates the slot ledger + the live counter
//! ```
//!
//! ### Lifecycle
//! ```text
//! per worker:   created → {running ⇄ sleeping} → stop_requested
//!                       → (finalizer run) → released (all handles dropped)
//!
//! coordinator:  active → stopping (request_stop_all)
//!                      → drained (wait_for_all returns; not reversible)
//! ```
//!
//! Shutdown is cooperative-first, forced-second: flags ask workers to stop
//! ([`WorkerHandle::is_stop_requested`]), wakes pull sleepers out of
//! [`WorkerHandle::sleep`], and per-worker finalizers (cancel the timer,
//! close the socket) break workers that cannot see flags until their next
//! callback. The teardown barrier then counts handles, not promises:
//! [`Coordinator::wait_for_all`] releases only when the last handle is gone.
//!
//! ## Features
//! | Area              | Description                                                      | Key types                                  |
//! |-------------------|------------------------------------------------------------------|--------------------------------------------|
//! | **Handles**       | Per-activity token: stop flag, sleep/wake, finalizer.            | [`WorkerHandle`], [`SleepPermit`]          |
//! | **Coordination**  | Registry, global stop, per-worker stop, liveness accounting.     | [`Coordinator`]                            |
//! | **Teardown**      | Blocking barrier and bounded diagnostic drain.                   | [`Coordinator::wait_for_all`], [`Coordinator::wait_for_all_bounded`] |
//! | **Diagnostics**   | Worker snapshots, structured drain-timeout error, thread names.  | [`WorkerReport`], [`CoordinatorError`], [`diag::ThreadNameRegistry`] |
//! | **Configuration** | Bounded-drain polling cadence.                                   | [`CoordinatorConfig`]                      |
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use workgate::Coordinator;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let coordinator = Coordinator::new("downloader");
//!
//!     // Mint a handle, thread it through the activity.
//!     let worker = coordinator.new_worker("poller");
//!     let activity = tokio::spawn({
//!         let worker = worker.clone();
//!         async move {
//!             while !worker.is_stop_requested() {
//!                 // one unit of work, then doze until woken or stopped
//!                 worker.timed_sleep(Duration::from_millis(50)).await;
//!             }
//!         }
//!     });
//!
//!     // Teardown: flip flags + wake sleepers, release our copy, drain.
//!     coordinator.request_stop_all();
//!     drop(worker);
//!     activity.await.unwrap();
//!     coordinator.wait_for_all().await;
//! }
//! ```
//!
//! ## The two waits
//! [`Coordinator::wait_for_all`] parks the caller until the live-handle count
//! reaches zero — the right call for a plain teardown path. But a task that
//! must keep servicing a dispatch mechanism (so a worker can complete a
//! pending round-trip into that same task) must never park there: that is the
//! classic mutual block. Such callers use
//! [`Coordinator::wait_for_all_bounded`], which polls and, on expiry, returns
//! a [`CoordinatorError::DrainTimeout`] naming every still-outstanding worker
//! instead of hanging.

mod config;
mod core;
mod error;
mod worker;

pub mod diag;

// ---- Public re-exports ----

pub use config::CoordinatorConfig;
pub use core::Coordinator;
pub use error::CoordinatorError;
pub use worker::{Finalizer, SleepOutcome, SleepPermit, WorkerHandle, WorkerReport, WorkerStatus};
