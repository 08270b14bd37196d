//! Change notification from a [`super::Recurrence`] to external listeners.
//!
//! A rule never talks to the outside world directly: its mutations
//! invalidate the owning `Recurrence`'s cache and fan out through this
//! registry. Registration is idempotent and de-registration tolerates
//! unknown listeners, so callers never need to track whether they are
//! already registered.

use std::sync::{Arc, Weak};

/// Something that wants to know when a [`super::Recurrence`] changes.
pub trait ChangeListener: Send + Sync {
    /// Called once per mutating operation on the recurrence that was
    /// observed, after its cache has been invalidated.
    fn recurrence_changed(&self);
}

/// Holds weak references to registered listeners so a listener's
/// lifetime is never extended by being observed.
#[derive(Default)]
pub struct ObserverRegistry {
    listeners: Vec<Weak<dyn ChangeListener>>,
}

impl ObserverRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `listener`. No-op if an equivalent (pointer-equal)
    /// listener is already registered.
    pub fn register(&mut self, listener: &Arc<dyn ChangeListener>) {
        let already_registered = self.listeners.iter().any(|existing| {
            existing
                .upgrade()
                .is_some_and(|existing| Arc::ptr_eq(&existing, listener))
        });
        if !already_registered {
            self.listeners.push(Arc::downgrade(listener));
        }
    }

    /// De-registers `listener`. No-op if it was never registered or has
    /// already been dropped.
    pub fn unregister(&mut self, listener: &Arc<dyn ChangeListener>) {
        self.listeners.retain(|existing| {
            existing
                .upgrade()
                .is_none_or(|existing| !Arc::ptr_eq(&existing, listener))
        });
    }

    /// Notifies every live listener, by index, tolerant of a listener
    /// de-registering itself (or being dropped) mid-notification: the
    /// index walk re-reads `self.listeners` each iteration rather than
    /// holding a separate snapshot, so a shrinking list during
    /// notification never panics or skips a still-live listener.
    pub fn notify(&mut self) {
        self.listeners.retain(|l| l.strong_count() > 0);
        let mut index = 0;
        while index < self.listeners.len() {
            if let Some(listener) = self.listeners[index].upgrade() {
                listener.recurrence_changed();
            }
            index += 1;
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.iter().filter(|l| l.strong_count() > 0).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for ObserverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverRegistry")
            .field("listener_count", &self.len())
            .finish()
    }
}

impl Clone for ObserverRegistry {
    /// A clone starts with no listeners: re-registration is the
    /// caller's responsibility, per the engine's deep-copy contract
    /// (cloning a Recurrence re-registers observers rather than
    /// sharing the original's listener list).
    fn clone(&self) -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter(Arc<AtomicUsize>);

    impl ChangeListener for Counter {
        fn recurrence_changed(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn register_is_idempotent() {
        let mut registry = ObserverRegistry::new();
        let listener: Arc<dyn ChangeListener> =
            Arc::new(Counter(Arc::new(AtomicUsize::new(0))));
        registry.register(&listener);
        registry.register(&listener);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn unregister_unknown_listener_is_a_no_op() {
        let mut registry = ObserverRegistry::new();
        let listener: Arc<dyn ChangeListener> =
            Arc::new(Counter(Arc::new(AtomicUsize::new(0))));
        registry.unregister(&listener);
        assert!(registry.is_empty());
    }

    #[test]
    fn notify_reaches_every_live_listener() {
        let mut registry = ObserverRegistry::new();
        let count_a = Arc::new(AtomicUsize::new(0));
        let count_b = Arc::new(AtomicUsize::new(0));
        let a: Arc<dyn ChangeListener> = Arc::new(Counter(count_a.clone()));
        let b: Arc<dyn ChangeListener> = Arc::new(Counter(count_b.clone()));
        registry.register(&a);
        registry.register(&b);
        registry.notify();
        registry.notify();

        assert_eq!(count_a.load(Ordering::SeqCst), 2);
        assert_eq!(count_b.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn dropped_listener_is_pruned_on_next_notify() {
        let mut registry = ObserverRegistry::new();
        let listener: Arc<dyn ChangeListener> =
            Arc::new(Counter(Arc::new(AtomicUsize::new(0))));
        registry.register(&listener);
        drop(listener);
        registry.notify();
        assert!(registry.is_empty());
    }
}
