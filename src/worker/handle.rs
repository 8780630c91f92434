//! # Worker handles: the per-activity stop/sleep/wake contract.
//!
//! A [`WorkerHandle`] is the token one asynchronous activity (a spawned task,
//! a timer loop, a callback chain) carries for its entire duration. The
//! activity clones the handle into every re-invocation; the coordinator
//! considers the activity finished only once every clone has been dropped.
//!
//! ## Architecture
//! ```text
//! Coordinator::new_worker("poller")
//!        │ registers a slot, hands out the first handle
//!        ▼
//! WorkerHandle ── clone ──► callback #1 ── clone ──► callback #2 ── drop
//!        │                                                            │
//!        │ every clone/drop updates the reference ledger              │
//!        ▼                                                            ▼
//! slot refs: 1 (registry) + live handles        refs back to 1 = finished
//! ```
//!
//! ## Rules
//! - **Arm before check**: [`WorkerHandle::sleep`] registers its waiter
//!   *before* reading the stop flags, so a wake issued between the flag check
//!   and the suspension is never lost.
//! - **Wakes are not queued**: [`WorkerHandle::wake_up`] reaches only current
//!   sleepers. A wake with nobody listening is dropped, not accumulated.
//! - **Woken ≠ ready**: returning from a sleep means "somebody woke you",
//!   not "the condition you wanted holds". Re-check your own predicate (and
//!   [`WorkerHandle::is_stop_requested`]) after every return.

use std::fmt;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::futures::Notified;
use tokio::sync::{watch, Notify};
use tokio_util::sync::CancellationToken;

/// Forced-cancellation callback attached to a worker at registration.
///
/// Run when a stop is requested, for workers that cannot observe flags
/// promptly (blocked in I/O, waiting on a timer): typically it cancels the
/// timer or closes the socket so the activity's next callback fires soon and
/// sees the flag.
pub type Finalizer = Box<dyn Fn() + Send + Sync>;

/// Shared per-worker state: one slot in the coordinator's registry plus the
/// signaling primitives every handle clone points at.
pub(crate) struct WorkerShared {
    name: String,
    /// Per-worker stop flag; clearable via `cancel_stop`.
    stopped: AtomicBool,
    /// Voluntary sleep/wake of the activity holding this worker's handles.
    notify: Notify,
    finalizer: Option<Finalizer>,
    /// Reference ledger: 1 for the registry entry + 1 per live handle.
    refs: AtomicUsize,
    /// Coordinator-wide stop flag (one-way).
    global_stop: CancellationToken,
    /// Coordinator-wide count of outstanding handles; the drain barrier
    /// awaits this reaching zero.
    live: Arc<watch::Sender<usize>>,
}

impl WorkerShared {
    pub(crate) fn new(
        name: String,
        finalizer: Option<Finalizer>,
        global_stop: CancellationToken,
        live: Arc<watch::Sender<usize>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            name,
            stopped: AtomicBool::new(false),
            notify: Notify::new(),
            finalizer,
            refs: AtomicUsize::new(1),
            global_stop,
            live,
        })
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    /// Current ledger value (registry reference included while registered).
    pub(crate) fn refs(&self) -> usize {
        self.refs.load(Ordering::Acquire)
    }

    /// Drops the registry's own reference from the ledger. Called once, when
    /// the coordinator clears its registry at teardown.
    pub(crate) fn release_registry_ref(&self) {
        self.refs.fetch_sub(1, Ordering::AcqRel);
    }

    /// Broadcasts to whoever is currently sleeping on this worker.
    pub(crate) fn wake(&self) {
        self.notify.notify_waiters();
    }

    pub(crate) fn run_finalizer(&self) {
        if let Some(finalizer) = &self.finalizer {
            finalizer();
        }
    }

    /// Sets the local stop flag. Wake and finalizer fire only on the
    /// not-stopped → stopped transition, so repeated calls stay idempotent.
    pub(crate) fn request_stop(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        log::debug!("worker {:?}: stop requested", self.name);
        self.wake();
        self.run_finalizer();
    }

    pub(crate) fn cancel_stop(&self) {
        self.stopped.store(false, Ordering::Release);
    }

    pub(crate) fn is_stop_requested(&self) -> bool {
        self.global_stop.is_cancelled() || self.stopped.load(Ordering::Acquire)
    }
}

/// Outcome of a bounded sleep.
///
/// The original protocol conflated "notified" and "deadline hit" into one
/// boolean; here the outcomes stay distinct and the caller decides whether
/// the distinction matters.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SleepOutcome {
    /// A stop was already requested; the call returned without suspending.
    Stopping,
    /// Woken by [`WorkerHandle::wake_up`] (or a stop request) before the
    /// deadline. Re-check your predicate: woken does not mean ready.
    Woken,
    /// The deadline elapsed with no wake.
    TimedOut,
}

impl SleepOutcome {
    /// True unless the sleep was refused outright ([`SleepOutcome::Stopping`]).
    pub fn slept(&self) -> bool {
        !matches!(self, SleepOutcome::Stopping)
    }

    /// True if the sleep ended because somebody called wake.
    pub fn is_woken(&self) -> bool {
        matches!(self, SleepOutcome::Woken)
    }
}

/// Cloneable token for one asynchronous activity.
///
/// Created by [`Coordinator::new_worker`](crate::Coordinator::new_worker).
/// The activity keeps (a clone of) the handle alive for its whole duration;
/// the coordinator's teardown barrier releases only when every handle of
/// every worker has been dropped.
///
/// # Example
/// ```
/// use workgate::Coordinator;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let coordinator = Coordinator::new("demo");
/// let worker = coordinator.new_worker("loop");
///
/// worker.request_stop();
/// assert!(worker.is_stop_requested());
/// assert!(!worker.sleep().await); // refuses to suspend once stopping
///
/// worker.cancel_stop();
/// assert!(!worker.is_stop_requested());
/// # }
/// ```
pub struct WorkerHandle {
    shared: Arc<WorkerShared>,
}

impl WorkerHandle {
    /// Mints a handle against an already-registered slot, accounting for it
    /// in both the slot ledger and the coordinator-wide live counter.
    pub(crate) fn from_shared(shared: Arc<WorkerShared>) -> Self {
        shared.refs.fetch_add(1, Ordering::AcqRel);
        shared.live.send_modify(|outstanding| *outstanding += 1);
        Self { shared }
    }

    pub(crate) fn shared(&self) -> &Arc<WorkerShared> {
        &self.shared
    }

    /// Worker name given at registration.
    pub fn name(&self) -> &str {
        self.shared.name()
    }

    /// Asks this worker (only) to stop. Idempotent: the wake and the
    /// finalizer fire once per actual not-stopped → stopped transition.
    pub fn request_stop(&self) {
        self.shared.request_stop();
    }

    /// Clears this worker's stop flag (resumable/restartable workers).
    /// The coordinator-wide flag, once set, still wins.
    pub fn cancel_stop(&self) {
        self.shared.cancel_stop();
    }

    /// True if this worker, or the whole coordinator, was asked to stop.
    pub fn is_stop_requested(&self) -> bool {
        self.shared.is_stop_requested()
    }

    /// Arms a waiter without suspending yet.
    ///
    /// Two-phase form of [`WorkerHandle::sleep`] for callers with their own
    /// predicate: arm, re-check the predicate, then await. Wakes issued after
    /// arming are observed even if the caller has not reached the await yet.
    ///
    /// # Example
    /// ```
    /// use workgate::Coordinator;
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let coordinator = Coordinator::new("demo");
    /// let worker = coordinator.new_worker("queue");
    ///
    /// let permit = worker.prepare_sleep();
    /// worker.wake_up(); // lands between arming and awaiting
    /// assert!(permit.wait().await); // still observed: not lost
    /// # }
    /// ```
    pub fn prepare_sleep(&self) -> SleepPermit<'_> {
        let mut notified = Box::pin(self.shared.notify.notified());
        notified.as_mut().enable();
        SleepPermit {
            handle: self,
            notified,
        }
    }

    /// Suspends the calling activity until woken.
    ///
    /// Returns `false` immediately, without suspending, if a stop was already
    /// requested (locally or coordinator-wide). Returns `true` after a wake.
    /// Does **not** loop on any predicate: `true` means "woke up", nothing
    /// more — re-check your own condition and the stop flag.
    pub async fn sleep(&self) -> bool {
        self.prepare_sleep().wait().await
    }

    /// Bounded [`WorkerHandle::sleep`]; see [`SleepOutcome`] for the three
    /// distinct results.
    pub async fn timed_sleep(&self, timeout: Duration) -> SleepOutcome {
        self.prepare_sleep().wait_timeout(timeout).await
    }

    /// Wakes this worker's current sleepers (broadcast).
    ///
    /// Safe against the checked-but-not-yet-slept race: sleepers arm their
    /// waiter before checking flags, so a wake between their check and their
    /// suspension still lands. A wake with no sleeper is dropped.
    pub fn wake_up(&self) {
        self.shared.wake();
    }

    /// Runs the worker's finalizer, if any.
    ///
    /// The stop paths invoke it once per stop transition already; this is for
    /// controllers that drive forced cancellation themselves.
    pub fn run_finalizer(&self) {
        self.shared.run_finalizer();
    }
}

impl Clone for WorkerHandle {
    fn clone(&self) -> Self {
        WorkerHandle::from_shared(Arc::clone(&self.shared))
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.shared.refs.fetch_sub(1, Ordering::AcqRel);
        // Notifies the drain barrier when the last outstanding handle goes.
        self.shared
            .live
            .send_modify(|outstanding| *outstanding = outstanding.saturating_sub(1));
    }
}

impl fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("name", &self.shared.name)
            .field("refs", &self.shared.refs())
            .finish()
    }
}

/// An armed, not-yet-suspended sleep.
///
/// Produced by [`WorkerHandle::prepare_sleep`]. Consumed by
/// [`SleepPermit::wait`] or [`SleepPermit::wait_timeout`]; dropping it
/// unarmed simply discards the waiter.
pub struct SleepPermit<'a> {
    handle: &'a WorkerHandle,
    notified: Pin<Box<Notified<'a>>>,
}

impl SleepPermit<'_> {
    /// Suspends until woken. Returns `false` without suspending if a stop is
    /// already requested, `true` after a wake.
    pub async fn wait(self) -> bool {
        if self.handle.is_stop_requested() {
            return false;
        }
        self.notified.await;
        true
    }

    /// Bounded [`SleepPermit::wait`].
    pub async fn wait_timeout(self, timeout: Duration) -> SleepOutcome {
        if self.handle.is_stop_requested() {
            return SleepOutcome::Stopping;
        }
        match tokio::time::timeout(timeout, self.notified).await {
            Ok(()) => SleepOutcome::Woken,
            Err(_) => SleepOutcome::TimedOut,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Coordinator;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn test_sleep_refuses_when_stop_already_requested() {
        let coordinator = Coordinator::new("test");
        let worker = coordinator.new_worker("w");

        worker.request_stop();
        assert!(!worker.sleep().await);
        assert_eq!(
            worker.timed_sleep(Duration::from_secs(5)).await,
            SleepOutcome::Stopping
        );
    }

    #[tokio::test]
    async fn test_sleep_refuses_on_global_stop() {
        let coordinator = Coordinator::new("test");
        let worker = coordinator.new_worker("w");

        coordinator.request_stop_all();
        assert!(worker.is_stop_requested());
        assert!(!worker.sleep().await);
    }

    #[tokio::test]
    async fn test_wake_between_arm_and_await_is_not_lost() {
        let coordinator = Coordinator::new("test");
        let worker = coordinator.new_worker("w");

        let permit = worker.prepare_sleep();
        worker.wake_up();
        assert!(permit.wait().await);
    }

    #[tokio::test]
    async fn test_wake_up_wakes_sleeper() {
        let coordinator = Coordinator::new("test");
        let worker = coordinator.new_worker("w");

        let sleeper = tokio::spawn({
            let worker = worker.clone();
            async move { worker.sleep().await }
        });

        // Keep waking until the sleeper has armed, suspended, and returned;
        // a wake landing before it arms is dropped, not queued.
        while !sleeper.is_finished() {
            worker.wake_up();
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert!(sleeper.await.unwrap());
    }

    #[tokio::test]
    async fn test_timed_sleep_outcomes_are_distinct() {
        let coordinator = Coordinator::new("test");
        let worker = coordinator.new_worker("w");

        let timed_out = worker.timed_sleep(Duration::from_millis(20)).await;
        assert_eq!(timed_out, SleepOutcome::TimedOut);
        assert!(timed_out.slept());
        assert!(!timed_out.is_woken());

        let sleeper = tokio::spawn({
            let worker = worker.clone();
            async move { worker.timed_sleep(Duration::from_secs(5)).await }
        });
        while !sleeper.is_finished() {
            worker.wake_up();
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(sleeper.await.unwrap(), SleepOutcome::Woken);
    }

    #[tokio::test]
    async fn test_finalizer_runs_once_per_transition() {
        let runs = Arc::new(AtomicUsize::new(0));
        let coordinator = Coordinator::new("test");
        let worker = coordinator.new_worker_with_finalizer("w", {
            let runs = Arc::clone(&runs);
            move || {
                runs.fetch_add(1, Ordering::SeqCst);
            }
        });

        worker.request_stop();
        worker.request_stop();
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        // A new transition after cancel_stop is a new forced-stop event.
        worker.cancel_stop();
        worker.request_stop();
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cancel_stop_restores_sleep() {
        let coordinator = Coordinator::new("test");
        let worker = coordinator.new_worker("w");

        worker.request_stop();
        assert!(!worker.sleep().await);

        worker.cancel_stop();
        assert_eq!(
            worker.timed_sleep(Duration::from_millis(10)).await,
            SleepOutcome::TimedOut
        );
    }
}
