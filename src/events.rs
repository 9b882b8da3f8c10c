//! Synchronous event callback lists.
//!
//! Each publisher owns a small list of callbacks; there is no global
//! subscription registry. Handlers run synchronously, in subscription
//! order, on the thread that raised the event.

use std::sync::{Arc, Mutex};

/// A thread-safe callback list for publisher-owned events.
pub(crate) struct Callbacks<A> {
    handlers: Mutex<Vec<Arc<dyn Fn(&A) + Send + Sync>>>,
}

impl<A> Default for Callbacks<A> {
    fn default() -> Self {
        Self {
            handlers: Mutex::new(Vec::new()),
        }
    }
}

impl<A> Callbacks<A> {
    pub(crate) fn subscribe(&self, handler: impl Fn(&A) + Send + Sync + 'static) {
        self.handlers.lock().unwrap().push(Arc::new(handler));
    }

    /// Invokes every handler with `arg`, in subscription order.
    ///
    /// The list is snapshotted before invocation so a handler may
    /// subscribe further handlers without deadlocking; late additions
    /// fire on the next event.
    pub(crate) fn fire(&self, arg: &A) {
        let snapshot: Vec<_> = self.handlers.lock().unwrap().clone();
        for handler in snapshot {
            handler(arg);
        }
    }
}

/// A single-threaded callback list for resolve-operation events.
///
/// Operations never cross threads, so handlers need not be `Send`.
pub(crate) struct LocalCallbacks<A> {
    handlers: std::cell::RefCell<Vec<std::rc::Rc<dyn Fn(&A)>>>,
}

impl<A> Default for LocalCallbacks<A> {
    fn default() -> Self {
        Self {
            handlers: std::cell::RefCell::new(Vec::new()),
        }
    }
}

impl<A> LocalCallbacks<A> {
    pub(crate) fn subscribe(&self, handler: impl Fn(&A) + 'static) {
        self.handlers.borrow_mut().push(std::rc::Rc::new(handler));
    }

    pub(crate) fn fire(&self, arg: &A) {
        let snapshot: Vec<_> = self.handlers.borrow().clone();
        for handler in snapshot {
            handler(arg);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn handlers_fire_in_subscription_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let callbacks = Callbacks::<u32>::default();
        for i in 0..3 {
            let seen = seen.clone();
            callbacks.subscribe(move |arg: &u32| seen.lock().unwrap().push((i, *arg)));
        }
        callbacks.fire(&7);
        assert_eq!(*seen.lock().unwrap(), vec![(0, 7), (1, 7), (2, 7)]);
    }

    #[test]
    fn handler_may_subscribe_during_fire() {
        let callbacks = Arc::new(Callbacks::<()>::default());
        let fired = Arc::new(AtomicUsize::new(0));
        let inner = callbacks.clone();
        let inner_fired = fired.clone();
        callbacks.subscribe(move |_| {
            let inner_fired = inner_fired.clone();
            inner.subscribe(move |_| {
                inner_fired.fetch_add(1, Ordering::SeqCst);
            });
        });
        callbacks.fire(&());
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        callbacks.fire(&());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
