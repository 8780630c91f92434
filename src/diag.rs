//! # Thread-name diagnostics.
//!
//! [`ThreadNameRegistry`] maps OS thread ids to human-readable names for log
//! output ("which thread is wedged in teardown?"). It is an explicit value —
//! create one, share it (`Arc`) with whoever formats diagnostics — not a
//! process-wide singleton.

use std::collections::HashMap;
use std::thread::{self, ThreadId};

use parking_lot::RwLock;

/// Explicit thread-id → name table for diagnostics.
///
/// Lookups for unregistered threads fall back to the thread's own name if it
/// has one, then to the formatted thread id, so output is always printable.
///
/// # Example
/// ```
/// use workgate::diag::ThreadNameRegistry;
///
/// let names = ThreadNameRegistry::new();
/// names.register_current("controller");
/// assert_eq!(names.name_of_current(), "controller");
/// ```
#[derive(Default)]
pub struct ThreadNameRegistry {
    names: RwLock<HashMap<ThreadId, String>>,
}

impl ThreadNameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associates a name with the calling thread, replacing any previous one.
    pub fn register_current(&self, name: impl Into<String>) {
        self.names
            .write()
            .insert(thread::current().id(), name.into());
    }

    /// Name registered for the calling thread, with printable fallbacks.
    pub fn name_of_current(&self) -> String {
        let current = thread::current();
        self.name_of(current.id()).unwrap_or_else(|| {
            current
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("{:?}", current.id()))
        })
    }

    /// Name registered for an arbitrary thread id, if any.
    pub fn name_of(&self, id: ThreadId) -> Option<String> {
        self.names.read().get(&id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_lookup() {
        let names = ThreadNameRegistry::new();
        names.register_current("worker-a");
        assert_eq!(names.name_of_current(), "worker-a");
        assert_eq!(
            names.name_of(thread::current().id()),
            Some("worker-a".to_string())
        );
    }

    #[test]
    fn test_fallback_is_printable() {
        let names = ThreadNameRegistry::new();
        // Nothing registered: still produces something usable in a log line.
        assert!(!names.name_of_current().is_empty());
        assert!(names.name_of(thread::current().id()).is_none());
    }

    #[test]
    fn test_names_are_per_thread() {
        let names = std::sync::Arc::new(ThreadNameRegistry::new());
        names.register_current("main");

        let names_clone = std::sync::Arc::clone(&names);
        let other = thread::spawn(move || {
            names_clone.register_current("other");
            names_clone.name_of_current()
        })
        .join()
        .unwrap();

        assert_eq!(other, "other");
        assert_eq!(names.name_of_current(), "main");
    }
}
