//! The stream contract and the cold [`Observable`] producer.

use crate::error::{Result, StreamError};
use crate::stream::ops;
use crate::stream::scheduler::Scheduler;
use crate::stream::subscription::{Subscription, WeakSubscription};
use crate::types::{Notification, StreamId};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

/// Receiver of a stream's notifications.
pub type Observer<T> = Rc<dyn Fn(Notification<T>)>;

type Producer<T> = Rc<dyn Fn(Observer<T>) -> Result<Subscription>>;

/// A producer of values over time.
///
/// Every stream can be subscribed. Writable streams additionally hand out a
/// [`Sink`], and stateful ones expose their current value without a
/// subscription. Handles are cheap clones that share identity.
pub trait Stream: Clone + 'static {
    type Item: Clone + 'static;

    /// Identity used by bridges to decide whether to resubscribe.
    fn stream_id(&self) -> StreamId;

    /// Attach an observer. Fails only on misuse (the producer refused the
    /// subscription); data-level failures arrive as `Notification::Error`.
    fn subscribe_observer(&self, observer: Observer<Self::Item>) -> Result<Subscription>;

    /// Push capability.
    fn sink(&self) -> Option<Sink<Self::Item>> {
        None
    }

    /// Current-value capability. `None` when the stream has no such
    /// accessor or currently holds no value.
    fn current_value(&self) -> Option<Self::Item> {
        None
    }

    /// Whether the stream exposes [`current_value`](Self::current_value)
    /// at all, independent of whether it holds a value right now.
    fn has_current_value(&self) -> bool {
        false
    }

    fn subscribe<F>(&self, f: F) -> Result<Subscription>
    where
        F: Fn(Notification<Self::Item>) + 'static,
    {
        self.subscribe_observer(Rc::new(f))
    }

    /// Subscribe to values only; errors and completion are ignored.
    fn subscribe_next<F>(&self, f: F) -> Result<Subscription>
    where
        F: Fn(Self::Item) + 'static,
    {
        self.subscribe(move |n| {
            if let Notification::Next(value) = n {
                f(value)
            }
        })
    }

    /// A subscribe-only view of this stream.
    fn to_observable(&self) -> Observable<Self::Item> {
        let source = self.clone();
        Observable::new(move |observer| source.subscribe_observer(observer))
    }

    fn map<U, F>(&self, f: F) -> Observable<U>
    where
        U: Clone + 'static,
        F: Fn(Self::Item) -> U + 'static,
    {
        ops::map(self.clone(), f)
    }

    fn start_with(&self, value: Self::Item) -> Observable<Self::Item> {
        ops::start_with(self.clone(), value)
    }

    fn catch_error<S, F>(&self, handler: F) -> Observable<Self::Item>
    where
        S: Stream<Item = Self::Item>,
        F: Fn(StreamError) -> S + 'static,
    {
        ops::catch_error(self.clone(), handler)
    }

    fn take(&self, count: usize) -> Observable<Self::Item> {
        ops::take(self.clone(), count)
    }

    fn switch_map<S, F>(&self, project: F) -> Observable<S::Item>
    where
        S: Stream,
        F: Fn(Self::Item) -> S + 'static,
    {
        ops::switch_map(self.clone(), project)
    }

    fn debounce(&self, window: Duration, scheduler: Rc<dyn Scheduler>) -> Observable<Self::Item> {
        ops::debounce(self.clone(), window, scheduler)
    }
}

/// Push handle for a writable stream.
pub struct Sink<T> {
    target: StreamId,
    push: Rc<dyn Fn(T)>,
}

impl<T> Clone for Sink<T> {
    fn clone(&self) -> Self {
        Self {
            target: self.target,
            push: Rc::clone(&self.push),
        }
    }
}

impl<T> Sink<T> {
    pub fn new(target: StreamId, push: impl Fn(T) + 'static) -> Self {
        Self {
            target,
            push: Rc::new(push),
        }
    }

    /// Forward a value to the stream's push operation.
    pub fn push(&self, value: T) {
        (self.push)(value)
    }

    /// Id of the stream this sink writes to.
    pub fn target(&self) -> StreamId {
        self.target
    }
}

impl<T> fmt::Debug for Sink<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sink").field("target", &self.target).finish()
    }
}

/// Per-subscriber guard: stops forwarding after a terminal notification or
/// disposal, and releases the producer's resources at that point.
struct Guard {
    closed: Cell<bool>,
    producer_sub: RefCell<Option<Subscription>>,
    /// The subscriber's own handle, closed along with the guard.
    handle: RefCell<Option<WeakSubscription>>,
}

impl Guard {
    fn close(&self) {
        self.closed.set(true);
        let sub = self.producer_sub.borrow_mut().take();
        if let Some(sub) = sub {
            sub.dispose();
        }
        let handle = self.handle.borrow_mut().take();
        if let Some(handle) = handle {
            handle.dispose();
        }
    }
}

/// A cold stream: the producer runs once per subscriber.
pub struct Observable<T> {
    id: StreamId,
    producer: Producer<T>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            producer: Rc::clone(&self.producer),
        }
    }
}

impl<T> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable").field("id", &self.id).finish()
    }
}

impl<T: Clone + 'static> Observable<T> {
    /// Create an observable from a producer closure.
    ///
    /// The producer receives the observer and returns the subscription that
    /// releases whatever it set up. Returning an error refuses the
    /// subscription.
    pub fn new<F>(producer: F) -> Self
    where
        F: Fn(Observer<T>) -> Result<Subscription> + 'static,
    {
        Self {
            id: StreamId::next(),
            producer: Rc::new(producer),
        }
    }

    /// Emit `values` synchronously, then complete.
    pub fn of(values: Vec<T>) -> Self {
        Self::from_iter(values)
    }

    pub fn from_iter<I>(values: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        let values: Rc<[T]> = values.into_iter().collect();
        Self::new(move |observer| {
            for value in values.iter() {
                observer(Notification::Next(value.clone()));
            }
            observer(Notification::Complete);
            Ok(Subscription::closed())
        })
    }

    /// Fail immediately with `error`.
    pub fn fail(error: StreamError) -> Self {
        Self::new(move |observer| {
            observer(Notification::Error(error.clone()));
            Ok(Subscription::closed())
        })
    }

    /// Complete immediately.
    pub fn empty() -> Self {
        Self::new(|observer| {
            observer(Notification::Complete);
            Ok(Subscription::closed())
        })
    }

    /// Never emit anything.
    pub fn never() -> Self {
        Self::new(|_| Ok(Subscription::new(|| {})))
    }
}

impl<T: Clone + 'static> Stream for Observable<T> {
    type Item = T;

    fn stream_id(&self) -> StreamId {
        self.id
    }

    fn subscribe_observer(&self, observer: Observer<T>) -> Result<Subscription> {
        let guard = Rc::new(Guard {
            closed: Cell::new(false),
            producer_sub: RefCell::new(None),
            handle: RefCell::new(None),
        });

        let g = Rc::clone(&guard);
        let guarded: Observer<T> = Rc::new(move |n: Notification<T>| {
            if g.closed.get() {
                return;
            }
            let terminal = n.is_terminal();
            if terminal {
                g.closed.set(true);
            }
            observer(n);
            if terminal {
                g.close();
            }
        });

        let producer_sub = match (self.producer)(guarded) {
            Ok(sub) => sub,
            Err(e) => {
                guard.closed.set(true);
                return Err(e);
            }
        };

        if guard.closed.get() {
            // Terminated synchronously while subscribing.
            producer_sub.dispose();
            return Ok(Subscription::closed());
        }
        *guard.producer_sub.borrow_mut() = Some(producer_sub);

        let g = Rc::clone(&guard);
        let handle = Subscription::new(move || g.close());
        *guard.handle.borrow_mut() = Some(handle.downgrade());
        Ok(handle)
    }

    fn to_observable(&self) -> Observable<T> {
        self.clone()
    }
}
