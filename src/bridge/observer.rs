//! Fixed-identity observer with a swappable handler.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

type Handler<T> = Rc<dyn Fn(T)>;

/// A mutable indirection cell between a subscription and a callback.
///
/// The observer is subscribed once; the callback behind it can be replaced
/// on every render without resubscribing. [`receive`](Self::receive) always
/// calls the handler installed at the moment it runs: no buffering, no
/// transitional window. Handler panics propagate to the caller.
pub struct StableObserver<T> {
    handler: Rc<RefCell<Handler<T>>>,
}

impl<T> Clone for StableObserver<T> {
    fn clone(&self) -> Self {
        Self {
            handler: Rc::clone(&self.handler),
        }
    }
}

impl<T: 'static> StableObserver<T> {
    /// Create an observer whose handler is a no-op.
    pub fn new() -> Self {
        Self {
            handler: Rc::new(RefCell::new(Rc::new(|_| {}))),
        }
    }

    /// Replace the active handler.
    pub fn set_handler(&self, handler: impl Fn(T) + 'static) {
        *self.handler.borrow_mut() = Rc::new(handler);
    }

    /// Forward `value` to the active handler.
    pub fn receive(&self, value: T) {
        // Clone the handler out so it may call `set_handler` re-entrantly.
        let handler = Rc::clone(&self.handler.borrow());
        handler(value)
    }

    /// A callback with this observer's identity, suitable for subscribing.
    pub fn as_callback(&self) -> impl Fn(T) + 'static {
        let this = self.clone();
        move |value| this.receive(value)
    }

    /// True if both handles are the same observer.
    pub fn ptr_eq(&self, other: &StableObserver<T>) -> bool {
        Rc::ptr_eq(&self.handler, &other.handler)
    }
}

impl<T: 'static> Default for StableObserver<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for StableObserver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StableObserver").finish_non_exhaustive()
    }
}
