//! # Coordinator core.
//!
//! Houses the [`Coordinator`]: the registry of outstanding workers and the
//! stop/teardown protocol a controller drives.

mod coordinator;

pub use coordinator::Coordinator;
