//! # Example: bounded_drain
//!
//! Demonstrates the diagnostic drain against a worker that is slow to stop,
//! and a finalizer breaking a worker out of an indefinite wait.
//!
//! Shows how to:
//! - Attach a finalizer with [`Coordinator::new_worker_with_finalizer`]
//! - Use [`Coordinator::wait_for_all_bounded`] where parking on the
//!   unbounded barrier could wedge the calling task
//! - Read the [`CoordinatorError::DrainTimeout`] snapshot to see who is stuck
//!
//! ## Flow
//! ```text
//! main()
//!   ├─► new_worker_with_finalizer("fetcher", || data_ready.notify_one())
//!   │     activity: awaits data_ready (simulated blocking I/O, ignores
//!   │     flags), then "processes" for ~600ms before exiting
//!   ├─► request_stop_all()
//!   │     └─► finalizer fires → fetcher unblocks, starts slow processing
//!   ├─► wait_for_all_bounded("teardown", 200ms)
//!   │     └─► Err(DrainTimeout): snapshot names "fetcher" as active
//!   └─► wait_for_all().await → returns once the fetcher finally exits
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example bounded_drain
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use workgate::Coordinator;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    println!("=== bounded_drain example ===\n");

    let coordinator = Arc::new(Coordinator::new("demo"));
    let data_ready = Arc::new(Notify::new());

    let worker = coordinator.new_worker_with_finalizer("fetcher", {
        let data_ready = Arc::clone(&data_ready);
        move || {
            println!("[finalizer] breaking the fetcher's wait");
            data_ready.notify_one();
        }
    });

    let activity = tokio::spawn(async move {
        println!("[fetcher] waiting for data (ignores flags while blocked)");
        data_ready.notified().await;
        println!("[fetcher] unblocked; flushing before exit (slow)");
        tokio::time::sleep(Duration::from_millis(600)).await;
        println!("[fetcher] done, releasing handle");
        drop(worker);
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    println!("[controller] tearing down");
    coordinator.request_stop_all(); // runs the finalizer

    match coordinator
        .wait_for_all_bounded("teardown", Duration::from_millis(200))
        .await
    {
        Ok(()) => println!("[controller] drained within the bound"),
        Err(err) => {
            println!("[controller] {}", err.as_message());
            println!("[controller] staying responsive; falling back to the barrier");
        }
    }

    coordinator.wait_for_all().await;
    activity.await?;
    println!("[controller] drained");

    Ok(())
}
