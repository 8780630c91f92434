//! # Example: sleepy_worker
//!
//! Demonstrates the cooperative stop/sleep/wake contract and a clean drain.
//!
//! Shows how to:
//! - Run a worker that dozes between units of work with [`WorkerHandle::sleep`]
//! - Keep a handle on the controller side to [`Coordinator::wake_up`] it
//! - Tear down: `request_stop_all` → `dismiss` kept handles → `wait_for_all`
//!
//! ## Flow
//! ```text
//! main()
//!   ├─► new_worker("ticker")  → activity: work, then sleep() until woken
//!   ├─► keep a clone of the handle (the "keeper") to wake it on demand
//!   ├─► wake_up(keeper) a few times (each wake = one unit of work)
//!   └─► teardown
//!         ├─► request_stop_all()   → sleeper wakes, sees the flag, exits
//!         ├─► dismiss(&mut keeper) → releases the controller's extra copy
//!         └─► wait_for_all().await → returns once the last handle drops
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example sleepy_worker
//! ```

use std::sync::Arc;
use std::time::Duration;

use workgate::Coordinator;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    println!("=== sleepy_worker example ===\n");

    let coordinator = Arc::new(Coordinator::new("demo"));

    let worker = coordinator.new_worker("ticker");
    let mut keeper = Some(worker.clone());

    let activity = tokio::spawn(async move {
        let mut units = 0u32;
        loop {
            if worker.is_stop_requested() {
                println!("[ticker] stop observed, exiting after {units} unit(s)");
                return units;
            }
            units += 1;
            println!("[ticker] unit of work #{units}, going back to sleep");
            // Woken means "try again", not "ready" - the loop re-checks the flag.
            worker.sleep().await;
        }
    });

    // Drive a few units of work by waking the sleeper.
    for _ in 0..3 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        if let Some(handle) = &keeper {
            coordinator.wake_up(handle);
        }
    }
    tokio::time::sleep(Duration::from_millis(100)).await;

    println!("\n[controller] tearing down");
    coordinator.request_stop_all();
    coordinator.dismiss(&mut keeper); // without this, the barrier never releases

    let units = activity.await?;
    coordinator.wait_for_all().await;
    println!("[controller] drained cleanly after {units} unit(s) of work");

    Ok(())
}
