//! # Coordinator: worker registry plus the stop/teardown protocol.
//!
//! The [`Coordinator`] is what a controller object owns. It mints
//! [`WorkerHandle`]s before starting each asynchronous activity, flips the
//! stop flags at shutdown, and lets teardown block (or poll, bounded) until
//! every activity has genuinely released its handle.
//!
//! ## Shutdown path
//! ```text
//! controller teardown:
//!   request_stop_all()
//!     ├─ cancel global token            (every is_stop_requested turns true)
//!     ├─ wake every registered worker   (sleepers return immediately)
//!     └─ run every finalizer            (break workers stuck in I/O)
//!   dismiss(&mut kept_handle)           (release controller-kept handles!)
//!   wait_for_all().await                (block until the last handle drops)
//!         — or —
//!   wait_for_all_bounded("teardown", timeout).await
//!     └─ Err(DrainTimeout { workers, .. }) names whoever is stuck
//! ```
//!
//! ## Rules
//! - **Liveness is counted, not assumed**: [`Coordinator::is_finished`]
//!   inspects the reference ledger. Stop flags only *ask* workers to stop;
//!   the ledger shows that they actually *have*.
//! - **Bounded critical sections**: every registry lock is a short sync
//!   section; the only long waits are the barrier awaits themselves.
//! - **Kept handles block teardown**: a handle the controller retains (to
//!   [`Coordinator::wake_up`] a sleeper later) counts like any other — it
//!   must be dismissed before [`Coordinator::wait_for_all`], or the barrier
//!   never releases.
//! - **Prefer the bounded drain** on any task that must keep servicing a
//!   dispatch mechanism a worker may be mid-round-trip with; parking that
//!   task on the unbounded barrier is how the classic mutual block happens.

use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::config::CoordinatorConfig;
use crate::error::CoordinatorError;
use crate::worker::{
    Finalizer, SleepOutcome, WorkerHandle, WorkerReport, WorkerShared, WorkerStatus,
};

/// Registry of outstanding workers plus the stop/teardown protocol.
///
/// # Example
/// ```
/// use workgate::Coordinator;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let coordinator = Coordinator::new("downloader");
/// let worker = coordinator.new_worker("poller");
///
/// let activity = tokio::spawn({
///     let worker = worker.clone();
///     async move {
///         while !worker.is_stop_requested() {
///             // one unit of work, then doze until woken or stopped
///             worker.sleep().await;
///         }
///     }
/// });
///
/// coordinator.request_stop_all();
/// drop(worker);
/// activity.await.unwrap();
/// coordinator.wait_for_all().await; // returns: no handles remain
/// # }
/// ```
pub struct Coordinator {
    name: String,
    cfg: CoordinatorConfig,
    /// Coordinator-wide stop flag. One-way: never cleared once cancelled.
    stop: CancellationToken,
    /// Gates the wake/finalizer sweep of `request_stop_all` to the first call.
    stop_latch: AtomicBool,
    /// Ordered slot list; short sync critical sections only.
    registry: Mutex<Vec<Arc<WorkerShared>>>,
    /// Count of outstanding handles across all workers. The drain barrier
    /// awaits zero; handle drops decrement it from `Drop`, hence `watch`
    /// (sync-notifiable) rather than an async-only primitive.
    live: Arc<watch::Sender<usize>>,
}

impl Coordinator {
    /// Creates a coordinator with default configuration. The name appears in
    /// log output only.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, CoordinatorConfig::default())
    }

    /// Creates a coordinator with explicit configuration.
    pub fn with_config(name: impl Into<String>, cfg: CoordinatorConfig) -> Self {
        let (live, _) = watch::channel(0usize);
        Self {
            name: name.into(),
            cfg,
            stop: CancellationToken::new(),
            stop_latch: AtomicBool::new(false),
            registry: Mutex::new(Vec::new()),
            live: Arc::new(live),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registers a worker and returns its first handle.
    ///
    /// The caller keeps the handle (cloning it through successive callback
    /// invocations) for the full duration of the activity; the coordinator
    /// counts the activity as running until every clone is dropped.
    pub fn new_worker(&self, name: impl Into<String>) -> WorkerHandle {
        self.register(name.into(), None)
    }

    /// Registers a worker with a forced-cancellation finalizer.
    ///
    /// The finalizer is the escape hatch for activities that cannot observe
    /// flags promptly: it should cancel the timer, close the socket — make
    /// the activity's next callback fire soon so it sees the flag.
    pub fn new_worker_with_finalizer(
        &self,
        name: impl Into<String>,
        finalizer: impl Fn() + Send + Sync + 'static,
    ) -> WorkerHandle {
        self.register(name.into(), Some(Box::new(finalizer)))
    }

    fn register(&self, name: String, finalizer: Option<Finalizer>) -> WorkerHandle {
        let shared = WorkerShared::new(
            name,
            finalizer,
            self.stop.clone(),
            Arc::clone(&self.live),
        );
        self.registry.lock().push(Arc::clone(&shared));
        log::debug!(
            "coordinator {:?}: registered worker {:?}",
            self.name,
            shared.name()
        );
        WorkerHandle::from_shared(shared)
    }

    /// Pass-through to [`WorkerHandle::sleep`]. The handle already consults
    /// the coordinator-wide stop flag shared with it at registration.
    pub async fn sleep(&self, handle: &WorkerHandle) -> bool {
        handle.sleep().await
    }

    /// Pass-through to [`WorkerHandle::timed_sleep`].
    pub async fn timed_sleep(&self, handle: &WorkerHandle, timeout: Duration) -> SleepOutcome {
        handle.timed_sleep(timeout).await
    }

    /// Pass-through to [`WorkerHandle::wake_up`].
    pub fn wake_up(&self, handle: &WorkerHandle) {
        handle.wake_up();
    }

    /// Releases a controller-kept handle. No-op on `None`.
    ///
    /// Dismissing tells the worker nothing — it only drops the caller's own
    /// reference so the drain barrier can eventually release.
    pub fn dismiss(&self, slot: &mut Option<WorkerHandle>) {
        if let Some(handle) = slot.take() {
            log::trace!(
                "coordinator {:?}: dismissed handle for {:?}",
                self.name,
                handle.name()
            );
        }
    }

    /// Primary shutdown trigger: flips the coordinator-wide flag, wakes every
    /// registered worker, then runs every finalizer (in that order).
    ///
    /// Safe to call repeatedly; the wake/finalizer sweep runs on the first
    /// call only.
    pub fn request_stop_all(&self) {
        self.stop.cancel();
        if self.stop_latch.swap(true, Ordering::AcqRel) {
            return;
        }
        log::debug!("coordinator {:?}: stop requested for all workers", self.name);

        // Sweep a snapshot outside the registry lock: finalizers are foreign
        // code and must not run under it.
        let slots: Vec<Arc<WorkerShared>> = self.registry.lock().clone();
        for slot in &slots {
            slot.wake();
        }
        for slot in &slots {
            slot.run_finalizer();
        }
    }

    /// Per-worker stop: sets only that worker's flag, wakes it, and runs its
    /// finalizer once per not-stopped → stopped transition.
    pub fn request_stop(&self, handle: &WorkerHandle) {
        handle.request_stop();
    }

    /// Undoes [`Coordinator::request_stop`] for one worker. Does not touch
    /// the coordinator-wide flag.
    pub fn cancel_stop(&self, handle: &WorkerHandle) {
        handle.cancel_stop();
    }

    /// True once [`Coordinator::request_stop_all`] has been called.
    pub fn is_stop_requested(&self) -> bool {
        self.stop.is_cancelled()
    }

    /// Non-blocking liveness poll: true iff every registered worker is down
    /// to the registry's own reference — all activities have released theirs.
    pub fn is_finished(&self) -> bool {
        self.registry.lock().iter().all(|slot| slot.refs() <= 1)
    }

    /// True iff someone besides the registry and the calling holder still
    /// references this worker — i.e. the activity itself is still running.
    ///
    /// Meant for a controller holding its own kept handle, to distinguish
    /// "worker still running" from "worker finished but not yet dismissed".
    pub fn is_active(&self, handle: &WorkerHandle) -> bool {
        handle.shared().refs() > 2
    }

    /// Diagnostic snapshot of every registered worker.
    pub fn report_states(&self) -> Vec<WorkerReport> {
        self.registry
            .lock()
            .iter()
            .map(|slot| {
                let refs = slot.refs();
                WorkerReport {
                    name: slot.name().to_string(),
                    status: WorkerStatus::from_refs(refs),
                    refs,
                }
            })
            .collect()
    }

    /// Teardown barrier: blocks until every handle of every worker has been
    /// dropped, then returns.
    ///
    /// Clears the registry first (dropping the registry's own references), so
    /// only activity-held and controller-kept handles remain to account for.
    /// A worker that never honors its stop flag and has no usable finalizer
    /// keeps this barrier blocked forever — by design, "never touch destroyed
    /// state" wins over "always terminate". Use
    /// [`Coordinator::wait_for_all_bounded`] where that is unacceptable.
    pub async fn wait_for_all(&self) {
        let slots = mem::take(&mut *self.registry.lock());
        for slot in &slots {
            slot.release_registry_ref();
        }
        drop(slots);

        let mut rx = self.live.subscribe();
        // Cannot fail: the coordinator itself keeps a sender alive.
        let _ = rx.wait_for(|outstanding| *outstanding == 0).await;
        log::debug!("coordinator {:?}: drained", self.name);
    }

    /// Bounded, diagnostic variant of the teardown barrier.
    ///
    /// Polls [`Coordinator::is_finished`] every
    /// [`CoordinatorConfig::poll_interval`] instead of parking on the
    /// barrier, so the calling task stays responsive (it can keep driving a
    /// dispatch loop between calls). On expiry, returns
    /// [`CoordinatorError::DrainTimeout`] with the start time, the bound, the
    /// detection time, and a full [`Coordinator::report_states`] snapshot.
    ///
    /// Does not clear the registry: a later retry, or a final
    /// [`Coordinator::wait_for_all`], still sees every worker.
    pub async fn wait_for_all_bounded(
        &self,
        context: &str,
        timeout: Duration,
    ) -> Result<(), CoordinatorError> {
        let started = SystemTime::now();
        let begun = tokio::time::Instant::now();
        let mut tick = tokio::time::interval(self.cfg.poll_interval);

        loop {
            if self.is_finished() {
                return Ok(());
            }
            if begun.elapsed() >= timeout {
                let workers = self.report_states();
                log::warn!(
                    "coordinator {:?}: drain timeout in {:?} after {:?}; {} worker(s) outstanding",
                    self.name,
                    context,
                    timeout,
                    workers
                        .iter()
                        .filter(|w| w.status == WorkerStatus::Active)
                        .count()
                );
                return Err(CoordinatorError::DrainTimeout {
                    context: context.to_string(),
                    started,
                    now: SystemTime::now(),
                    timeout,
                    workers,
                });
            }
            tick.tick().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_worker_wakes_on_stop_all_and_barrier_releases() {
        let coordinator = Arc::new(Coordinator::new("test"));
        let worker = coordinator.new_worker("worker-1");

        let activity = tokio::spawn({
            let worker = worker.clone();
            async move {
                while !worker.is_stop_requested() {
                    worker.sleep().await;
                }
                worker.is_stop_requested()
            }
        });

        // Give the activity a chance to fall asleep first.
        tokio::time::sleep(Duration::from_millis(20)).await;
        coordinator.request_stop_all();

        assert!(activity.await.unwrap());
        drop(worker);

        timeout(Duration::from_secs(2), coordinator.wait_for_all())
            .await
            .expect("barrier should release once the last handle drops");
    }

    #[tokio::test]
    async fn test_bounded_drain_names_the_keeper() {
        let coordinator = Coordinator::new("test");
        let keeper = coordinator.new_worker("keeper");
        let worker = coordinator.new_worker("worker");
        drop(worker);

        let begun = tokio::time::Instant::now();
        let err = coordinator
            .wait_for_all_bounded("test", Duration::from_millis(200))
            .await
            .expect_err("keeper handle is still held");

        // Not before the bound.
        assert!(begun.elapsed() >= Duration::from_millis(200));

        match &err {
            CoordinatorError::DrainTimeout { workers, .. } => {
                let keeper_row = workers
                    .iter()
                    .find(|w| w.name == "keeper")
                    .expect("snapshot lists the keeper");
                assert_eq!(keeper_row.status, WorkerStatus::Active);
                let worker_row = workers.iter().find(|w| w.name == "worker").unwrap();
                assert_eq!(worker_row.status, WorkerStatus::Finished);
            }
        }
        drop(keeper);
    }

    #[tokio::test]
    async fn test_bounded_drain_ok_when_already_finished() {
        let coordinator = Coordinator::new("test");
        let worker = coordinator.new_worker("w");
        drop(worker);

        coordinator
            .wait_for_all_bounded("test", Duration::from_millis(50))
            .await
            .expect("no handles outstanding");
    }

    #[tokio::test]
    async fn test_is_finished_tracks_clones() {
        let coordinator = Coordinator::new("test");
        assert!(coordinator.is_finished()); // empty registry

        let worker = coordinator.new_worker("w");
        assert!(!coordinator.is_finished());

        let extra = worker.clone();
        assert!(!coordinator.is_finished());

        drop(worker);
        assert!(!coordinator.is_finished());
        drop(extra);
        assert!(coordinator.is_finished());
    }

    #[tokio::test]
    async fn test_is_active_distinguishes_running_from_undismissed() {
        let coordinator = Coordinator::new("test");
        let kept = coordinator.new_worker("w");

        let running = kept.clone(); // the "activity's" copy
        assert!(coordinator.is_active(&kept));

        drop(running); // activity finished, controller still holds `kept`
        assert!(!coordinator.is_active(&kept));
        assert!(!coordinator.is_finished()); // but not dismissed yet

        let mut slot = Some(kept);
        coordinator.dismiss(&mut slot);
        assert!(slot.is_none());
        assert!(coordinator.is_finished());
    }

    #[tokio::test]
    async fn test_dismiss_none_is_noop() {
        let coordinator = Coordinator::new("test");
        let mut slot: Option<WorkerHandle> = None;
        coordinator.dismiss(&mut slot);
        assert!(slot.is_none());
    }

    #[tokio::test]
    async fn test_stop_all_sweep_runs_once() {
        let runs = Arc::new(AtomicUsize::new(0));
        let coordinator = Coordinator::new("test");
        let worker = coordinator.new_worker_with_finalizer("w", {
            let runs = Arc::clone(&runs);
            move || {
                runs.fetch_add(1, Ordering::SeqCst);
            }
        });

        coordinator.request_stop_all();
        coordinator.request_stop_all();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(coordinator.is_stop_requested());
        drop(worker);
    }

    #[tokio::test]
    async fn test_per_worker_stop_leaves_others_alone() {
        let coordinator = Coordinator::new("test");
        let first = coordinator.new_worker("first");
        let second = coordinator.new_worker("second");

        coordinator.request_stop(&first);
        assert!(first.is_stop_requested());
        assert!(!second.is_stop_requested());
        assert!(!coordinator.is_stop_requested());

        coordinator.cancel_stop(&first);
        assert!(!first.is_stop_requested());
    }

    #[tokio::test]
    async fn test_barrier_waits_for_activity_held_clone() {
        let coordinator = Arc::new(Coordinator::new("test"));
        let worker = coordinator.new_worker("w");

        let activity = tokio::spawn({
            let worker = worker.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                drop(worker);
            }
        });
        drop(worker);

        timeout(Duration::from_secs(2), coordinator.wait_for_all())
            .await
            .expect("barrier releases after the activity drops its clone");
        activity.await.unwrap();

        // Drained: registry cleared, later reports are empty.
        assert!(coordinator.report_states().is_empty());
    }

    #[tokio::test]
    async fn test_report_states_rows() {
        let coordinator = Coordinator::new("test");
        let kept = coordinator.new_worker("kept");
        let gone = coordinator.new_worker("gone");
        drop(gone);

        let reports = coordinator.report_states();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].name, "kept");
        assert_eq!(reports[0].status, WorkerStatus::Active);
        assert_eq!(reports[0].refs, 2);
        assert_eq!(reports[1].name, "gone");
        assert_eq!(reports[1].status, WorkerStatus::Finished);
        assert_eq!(reports[1].refs, 1);
        drop(kept);
    }
}
