//! Hot, externally writable streams.
//!
//! All three flavours share one multicast core and differ only in what they
//! remember for late subscribers:
//!
//! - [`Subject`]: nothing. A pure event stream that also accepts pushes.
//! - [`BehaviorSubject`]: the current value, delivered synchronously on
//!   subscribe and readable without subscribing.
//! - [`ReplaySubject`]: up to `capacity` past values, replayed in order on
//!   subscribe.
//!
//! Observers are notified in registration order. A notification goes to the
//! observers registered when it was pushed; an observer removed during
//! delivery may still receive that one notification.

use crate::error::{BridgeError, Result, StreamError};
use crate::stream::observable::{Observer, Sink, Stream};
use crate::stream::subscription::{Subscription, WeakSubscription};
use crate::types::{Notification, StreamId};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::trace;

enum Memory<T> {
    Nothing,
    Current(T),
    Replay {
        buffer: VecDeque<T>,
        capacity: Option<usize>,
    },
}

enum Terminal {
    Errored(StreamError),
    Completed,
}

struct Entry<T> {
    key: u64,
    observer: Observer<T>,
    handle: WeakSubscription,
}

struct SubjectCore<T> {
    observers: Vec<Entry<T>>,
    next_key: u64,
    memory: Memory<T>,
    terminal: Option<Terminal>,
}

/// Shared multicast machinery behind every subject flavour.
struct Hub<T> {
    id: StreamId,
    core: Rc<RefCell<SubjectCore<T>>>,
}

impl<T> Clone for Hub<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            core: Rc::clone(&self.core),
        }
    }
}

impl<T: Clone + 'static> Hub<T> {
    fn new(memory: Memory<T>) -> Self {
        Self {
            id: StreamId::next(),
            core: Rc::new(RefCell::new(SubjectCore {
                observers: Vec::new(),
                next_key: 1,
                memory,
                terminal: None,
            })),
        }
    }

    fn subscribe(&self, observer: Observer<T>) -> Result<Subscription> {
        let key = {
            let mut core = self.core.borrow_mut();
            let key = core.next_key;
            core.next_key += 1;
            key
        };
        let weak: Weak<RefCell<SubjectCore<T>>> = Rc::downgrade(&self.core);
        let handle = Subscription::new(move || {
            if let Some(core) = weak.upgrade() {
                let removed = {
                    let mut core = core.borrow_mut();
                    let idx = core.observers.iter().position(|entry| entry.key == key);
                    idx.map(|idx| core.observers.remove(idx))
                };
                // Dropped after the borrow ends; the observer may own
                // subscriptions that reach back into this subject.
                drop(removed);
            }
        });

        let (replay, terminal) = {
            let mut core = self.core.borrow_mut();
            let errored = matches!(core.terminal, Some(Terminal::Errored(_)));
            // An errored behavior subject has no current value; a replay
            // subject still replays its buffer before the error.
            let replay: Vec<T> = match &core.memory {
                Memory::Nothing => Vec::new(),
                Memory::Current(_) if errored => Vec::new(),
                Memory::Current(value) => vec![value.clone()],
                Memory::Replay { buffer, .. } => buffer.iter().cloned().collect(),
            };
            let terminal = core.terminal.as_ref().map(|t| match t {
                Terminal::Errored(e) => Notification::Error(e.clone()),
                Terminal::Completed => Notification::Complete,
            });
            if terminal.is_none() {
                core.observers.push(Entry {
                    key,
                    observer: Rc::clone(&observer),
                    handle: handle.downgrade(),
                });
            }
            (replay, terminal)
        };

        trace!(stream_id = %self.id, replayed = replay.len(), "subject subscribe");

        // Replay outside the borrow so observers may push back into the subject.
        for value in replay {
            observer(Notification::Next(value));
        }
        if let Some(terminal) = terminal {
            observer(terminal);
            handle.dispose();
        }
        Ok(handle)
    }

    fn emit(&self, n: Notification<T>) -> Result<()> {
        let entries: Vec<(Observer<T>, WeakSubscription)> = {
            let mut core = self.core.borrow_mut();
            if core.terminal.is_some() {
                return Err(BridgeError::SubjectClosed);
            }
            match &n {
                Notification::Next(value) => match &mut core.memory {
                    Memory::Nothing => {}
                    Memory::Current(current) => *current = value.clone(),
                    Memory::Replay { buffer, capacity } => {
                        buffer.push_back(value.clone());
                        if let Some(cap) = capacity {
                            while buffer.len() > *cap {
                                buffer.pop_front();
                            }
                        }
                    }
                },
                Notification::Error(e) => core.terminal = Some(Terminal::Errored(e.clone())),
                Notification::Complete => core.terminal = Some(Terminal::Completed),
            }
            if n.is_terminal() {
                core.observers
                    .drain(..)
                    .map(|e| (e.observer, e.handle))
                    .collect()
            } else {
                core.observers
                    .iter()
                    .map(|e| (Rc::clone(&e.observer), e.handle.clone()))
                    .collect()
            }
        };

        let terminal = n.is_terminal();
        for (observer, handle) in entries {
            observer(n.clone());
            if terminal {
                handle.dispose();
            }
        }
        Ok(())
    }

    fn subscriber_count(&self) -> usize {
        self.core.borrow().observers.len()
    }

    fn is_closed(&self) -> bool {
        self.core.borrow().terminal.is_some()
    }

    fn current(&self) -> Option<T> {
        let core = self.core.borrow();
        if matches!(core.terminal, Some(Terminal::Errored(_))) {
            return None;
        }
        match &core.memory {
            Memory::Current(value) => Some(value.clone()),
            _ => None,
        }
    }

    fn sink(&self) -> Sink<T> {
        let hub = self.clone();
        Sink::new(self.id, move |value| {
            if hub.emit(Notification::Next(value)).is_err() {
                trace!(stream_id = %hub.id, "push into closed subject ignored");
            }
        })
    }
}

macro_rules! subject_api {
    ($name:ident) => {
        impl<T: Clone + 'static> $name<T> {
            /// Push a value to every subscriber. Ignored once the subject is closed.
            pub fn next(&self, value: T) {
                if self.hub.emit(Notification::Next(value)).is_err() {
                    trace!(stream_id = %self.hub.id, "push into closed subject ignored");
                }
            }

            /// Push a value, failing if the subject is already closed.
            pub fn try_next(&self, value: T) -> Result<()> {
                self.hub.emit(Notification::Next(value))
            }

            /// Terminate with an error.
            pub fn error(&self, error: StreamError) {
                if self.hub.emit(Notification::Error(error)).is_err() {
                    trace!(stream_id = %self.hub.id, "error on closed subject ignored");
                }
            }

            /// Terminate normally.
            pub fn complete(&self) {
                if self.hub.emit(Notification::Complete).is_err() {
                    trace!(stream_id = %self.hub.id, "complete on closed subject ignored");
                }
            }

            pub fn is_closed(&self) -> bool {
                self.hub.is_closed()
            }

            /// Push handle; same as [`Stream::sink`] without the `Option`.
            pub fn writer(&self) -> Sink<T> {
                self.hub.sink()
            }

            /// Number of live observers.
            pub fn subscriber_count(&self) -> usize {
                self.hub.subscriber_count()
            }

            /// Subscribe-only view with its own identity; push and current
            /// value are not exposed through it.
            pub fn as_observable(&self) -> crate::stream::Observable<T> {
                let hub = self.hub.clone();
                crate::stream::Observable::new(move |observer| hub.subscribe(observer))
            }
        }

        impl<T> Clone for $name<T> {
            fn clone(&self) -> Self {
                Self {
                    hub: self.hub.clone(),
                }
            }
        }

        impl<T> fmt::Debug for $name<T> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("id", &self.hub.id)
                    .field("subscribers", &self.hub.core.borrow().observers.len())
                    .finish()
            }
        }
    };
}

/// Multicast stream with no memory.
pub struct Subject<T> {
    hub: Hub<T>,
}

impl<T: Clone + 'static> Subject<T> {
    pub fn new() -> Self {
        Self {
            hub: Hub::new(Memory::Nothing),
        }
    }
}

impl<T: Clone + 'static> Default for Subject<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + 'static> Stream for Subject<T> {
    type Item = T;

    fn stream_id(&self) -> StreamId {
        self.hub.id
    }

    fn subscribe_observer(&self, observer: Observer<T>) -> Result<Subscription> {
        self.hub.subscribe(observer)
    }

    fn sink(&self) -> Option<Sink<T>> {
        Some(self.hub.sink())
    }
}

subject_api!(Subject);

/// Multicast stream holding a current value.
pub struct BehaviorSubject<T> {
    hub: Hub<T>,
}

impl<T: Clone + 'static> BehaviorSubject<T> {
    pub fn new(initial: T) -> Self {
        Self {
            hub: Hub::new(Memory::Current(initial)),
        }
    }

    /// The current value.
    pub fn value(&self) -> T {
        match &self.hub.core.borrow().memory {
            Memory::Current(value) => value.clone(),
            _ => unreachable!("behavior subject always holds a value"),
        }
    }
}

impl<T: Clone + 'static> Stream for BehaviorSubject<T> {
    type Item = T;

    fn stream_id(&self) -> StreamId {
        self.hub.id
    }

    fn subscribe_observer(&self, observer: Observer<T>) -> Result<Subscription> {
        self.hub.subscribe(observer)
    }

    fn sink(&self) -> Option<Sink<T>> {
        Some(self.hub.sink())
    }

    fn current_value(&self) -> Option<T> {
        self.hub.current()
    }

    fn has_current_value(&self) -> bool {
        true
    }
}

subject_api!(BehaviorSubject);

/// Multicast stream replaying buffered values.
pub struct ReplaySubject<T> {
    hub: Hub<T>,
}

impl<T: Clone + 'static> ReplaySubject<T> {
    /// Replay at most `capacity` values.
    pub fn new(capacity: usize) -> Self {
        Self::with_capacity(Some(capacity))
    }

    /// Replay every value ever pushed.
    pub fn unbounded() -> Self {
        Self::with_capacity(None)
    }

    fn with_capacity(capacity: Option<usize>) -> Self {
        Self {
            hub: Hub::new(Memory::Replay {
                buffer: VecDeque::new(),
                capacity,
            }),
        }
    }

    /// Number of buffered values.
    pub fn buffered(&self) -> usize {
        match &self.hub.core.borrow().memory {
            Memory::Replay { buffer, .. } => buffer.len(),
            _ => 0,
        }
    }
}

impl<T: Clone + 'static> Stream for ReplaySubject<T> {
    type Item = T;

    fn stream_id(&self) -> StreamId {
        self.hub.id
    }

    fn subscribe_observer(&self, observer: Observer<T>) -> Result<Subscription> {
        self.hub.subscribe(observer)
    }

    fn sink(&self) -> Option<Sink<T>> {
        Some(self.hub.sink())
    }
}

subject_api!(ReplaySubject);
