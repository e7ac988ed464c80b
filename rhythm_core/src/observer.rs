//! Observer registry for current-resource changes.
//!
//! Observers are dynamic: UI layers attach and detach while the client
//! runs, possibly during a notification. Dispatch therefore snapshots the
//! observer set before iterating, so membership churn mid-dispatch can
//! never crash or deadlock the notifier.

use std::sync::{Arc, RwLock};

/// Receives the new current resource after every committed switch.
pub trait ResourceObserver<W>: Send + Sync {
    /// Called with the new current resource, or `None` when nothing is
    /// selected. The value always matches what the manager's `current`
    /// reports at notification time.
    fn on_current_changed(&self, current: Option<Arc<W>>);
}

/// Concurrency-safe set of observers.
pub struct ObserverRegistry<W> {
    observers: RwLock<Vec<Arc<dyn ResourceObserver<W>>>>,
}

impl<W> Default for ObserverRegistry<W> {
    fn default() -> Self {
        Self {
            observers: RwLock::new(Vec::new()),
        }
    }
}

impl<W> ObserverRegistry<W> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an observer. Attaching the same observer twice is a no-op, so
    /// it will still be notified exactly once per change.
    pub fn attach(&self, observer: Arc<dyn ResourceObserver<W>>) {
        let mut observers = self.observers.write().unwrap_or_else(|e| e.into_inner());
        if !observers.iter().any(|o| Arc::ptr_eq(o, &observer)) {
            observers.push(observer);
        }
    }

    /// Removes an observer. Unknown observers are ignored.
    pub fn detach(&self, observer: &Arc<dyn ResourceObserver<W>>) {
        let mut observers = self.observers.write().unwrap_or_else(|e| e.into_inner());
        observers.retain(|o| !Arc::ptr_eq(o, observer));
    }

    /// Number of attached observers.
    pub fn len(&self) -> usize {
        self.observers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Notifies every observer attached at call time with the same value.
    ///
    /// The set is snapshotted before iterating; observers attached or
    /// detached by a callback take effect from the next notification.
    pub fn notify_all(&self, current: Option<Arc<W>>) {
        let snapshot: Vec<_> = self
            .observers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        for observer in snapshot {
            observer.on_current_changed(current.clone());
        }
    }
}
