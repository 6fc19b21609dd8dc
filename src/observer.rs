//! Diagnostic observers for resolution traceability.
//!
//! Observers receive hooks around every resolution a container performs.
//! Calls are made synchronously under the resolution lock; keep
//! implementations lightweight, or queue events for later processing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::key::FactoryKey;

/// Observer of resolution events.
///
/// # Examples
///
/// ```rust
/// use forge_di::{Container, FactoryKey, ResolutionObserver};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// struct TracingObserver;
///
/// impl ResolutionObserver for TracingObserver {
///     fn resolving(&self, key: &FactoryKey) {
///         eprintln!("resolving {}", key.display_name());
///     }
///
///     fn resolved(&self, key: &FactoryKey, duration: Duration) {
///         eprintln!("resolved {} in {:?}", key.display_name(), duration);
///     }
/// }
///
/// let container = Container::new();
/// container.add_observer(Arc::new(TracingObserver));
/// ```
pub trait ResolutionObserver: Send + Sync {
    /// Called before the effective recipe (or cache) produces an instance.
    fn resolving(&self, key: &FactoryKey);

    /// Called after an instance is produced, with the elapsed time from
    /// `resolving`.
    fn resolved(&self, key: &FactoryKey, duration: Duration);
}

/// Fan-out holder for a container's observers, with a lock-free fast path
/// for the common no-observer case.
#[derive(Default)]
pub(crate) struct Observers {
    list: Mutex<Vec<Arc<dyn ResolutionObserver>>>,
    active: AtomicBool,
}

impl Observers {
    pub(crate) fn add(&self, observer: Arc<dyn ResolutionObserver>) {
        self.list.lock().push(observer);
        self.active.store(true, Ordering::Release);
    }

    #[inline(always)]
    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    // The list is cloned before fan-out so an observer may itself trigger
    // nested resolutions without re-entering the list lock.
    pub(crate) fn resolving(&self, key: &FactoryKey) {
        let observers = self.list.lock().clone();
        for observer in &observers {
            observer.resolving(key);
        }
    }

    pub(crate) fn resolved(&self, key: &FactoryKey, duration: Duration) {
        let observers = self.list.lock().clone();
        for observer in &observers {
            observer.resolved(key, duration);
        }
    }
}

/// Built-in observer that logs events to stderr.
///
/// Useful for development; production integrations should implement
/// [`ResolutionObserver`] against their own tracing infrastructure.
pub struct LoggingObserver {
    prefix: String,
}

impl LoggingObserver {
    /// Creates a logging observer with the default prefix.
    pub fn new() -> Self {
        Self {
            prefix: "[forge-di]".to_string(),
        }
    }

    /// Creates a logging observer with a custom prefix.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Default for LoggingObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl ResolutionObserver for LoggingObserver {
    fn resolving(&self, key: &FactoryKey) {
        eprintln!("{} Resolving: {}", self.prefix, key.display_name());
    }

    fn resolved(&self, key: &FactoryKey, duration: Duration) {
        eprintln!(
            "{} Resolved: {} in {:?}",
            self.prefix,
            key.display_name(),
            duration
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct Counting {
        calls: AtomicUsize,
    }

    impl ResolutionObserver for Counting {
        fn resolving(&self, _key: &FactoryKey) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }

        fn resolved(&self, _key: &FactoryKey, _duration: Duration) {}
    }

    #[test]
    fn inactive_until_first_observer() {
        let observers = Observers::default();
        assert!(!observers.is_active());

        let counting = Arc::new(Counting {
            calls: AtomicUsize::new(0),
        });
        observers.add(counting.clone());
        assert!(observers.is_active());

        let key = FactoryKey::new::<u32>("t", "v");
        observers.resolving(&key);
        assert_eq!(counting.calls.load(Ordering::SeqCst), 1);
    }
}
