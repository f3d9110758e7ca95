//! Disposable subscription handles.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

type Teardown = Box<dyn FnOnce()>;

struct SubscriptionInner {
    teardown: RefCell<Option<Teardown>>,
}

impl SubscriptionInner {
    fn run_teardown(&self) {
        // Take before calling: the teardown may re-enter this subscription.
        let teardown = self.teardown.borrow_mut().take();
        if let Some(teardown) = teardown {
            teardown();
        }
    }
}

impl Drop for SubscriptionInner {
    fn drop(&mut self) {
        if let Some(teardown) = self.teardown.get_mut().take() {
            teardown();
        }
    }
}

/// Handle owning exactly one disposal action.
///
/// Cloning shares the same action. [`dispose`](Self::dispose) runs it at
/// most once no matter how many times or through how many clones it is
/// called. Dropping the last handle disposes as well, so a subscription
/// that is not stored is released immediately.
#[derive(Clone)]
#[must_use = "dropping a Subscription disposes it"]
pub struct Subscription {
    inner: Rc<SubscriptionInner>,
}

impl Subscription {
    /// Create a subscription that runs `teardown` on disposal.
    pub fn new(teardown: impl FnOnce() + 'static) -> Self {
        Self {
            inner: Rc::new(SubscriptionInner {
                teardown: RefCell::new(Some(Box::new(teardown))),
            }),
        }
    }

    /// An already-disposed subscription.
    pub fn closed() -> Self {
        Self {
            inner: Rc::new(SubscriptionInner {
                teardown: RefCell::new(None),
            }),
        }
    }

    /// A subscription that disposes every child, in order.
    pub fn all(children: Vec<Subscription>) -> Self {
        Self::new(move || {
            for child in children {
                child.dispose();
            }
        })
    }

    /// Run the disposal action if it has not run yet.
    pub fn dispose(&self) {
        self.inner.run_teardown();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.teardown.borrow().is_none()
    }

    /// True if both handles share the same disposal action.
    pub fn ptr_eq(&self, other: &Subscription) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// A handle that does not keep the subscription alive.
    pub fn downgrade(&self) -> WeakSubscription {
        WeakSubscription {
            inner: Rc::downgrade(&self.inner),
        }
    }
}

/// Non-owning counterpart of [`Subscription`].
///
/// Lets a producer close its subscriber's handle on termination without
/// keeping it alive.
#[derive(Clone)]
pub struct WeakSubscription {
    inner: Weak<SubscriptionInner>,
}

impl WeakSubscription {
    /// Dispose the subscription if any strong handle is still alive.
    pub fn dispose(&self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.run_teardown();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("closed", &self.is_closed())
            .finish()
    }
}
