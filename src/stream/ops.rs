//! Composition operators.
//!
//! Only the handful the bridges are built from. Every operator returns a
//! plain [`Observable`], so composed streams expose subscribe and nothing
//! else.

use crate::error::StreamError;
use crate::stream::observable::{Observable, Observer, Stream};
use crate::stream::scheduler::Scheduler;
use crate::stream::subscription::Subscription;
use crate::types::Notification;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, error};

/// Transform each value.
pub fn map<S, U, F>(source: S, f: F) -> Observable<U>
where
    S: Stream,
    U: Clone + 'static,
    F: Fn(S::Item) -> U + 'static,
{
    let f = Rc::new(f);
    Observable::new(move |observer: Observer<U>| {
        let f = Rc::clone(&f);
        source.subscribe(move |n| {
            observer(match n {
                Notification::Next(value) => Notification::Next(f(value)),
                Notification::Error(e) => Notification::Error(e),
                Notification::Complete => Notification::Complete,
            })
        })
    })
}

/// Emit `value` before anything from `source`.
pub fn start_with<S: Stream>(source: S, value: S::Item) -> Observable<S::Item> {
    Observable::new(move |observer| {
        observer(Notification::Next(value.clone()));
        source.subscribe_observer(observer)
    })
}

/// Replace an error with the stream returned by `handler`.
pub fn catch_error<S, R, F>(source: S, handler: F) -> Observable<S::Item>
where
    S: Stream,
    R: Stream<Item = S::Item>,
    F: Fn(StreamError) -> R + 'static,
{
    let handler = Rc::new(handler);
    Observable::new(move |observer: Observer<S::Item>| {
        let fallback: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
        let slot = Rc::clone(&fallback);
        let handler = Rc::clone(&handler);
        let upstream = source.subscribe(move |n| match n {
            Notification::Error(e) => match handler(e).subscribe_observer(Rc::clone(&observer)) {
                Ok(sub) => {
                    *slot.borrow_mut() = Some(sub);
                }
                Err(misuse) => {
                    error!(error = %misuse, "catch_error fallback refused subscription");
                    observer(Notification::Error(misuse.into()));
                }
            },
            other => observer(other),
        })?;
        Ok(Subscription::new(move || {
            upstream.dispose();
            let sub = fallback.borrow_mut().take();
            if let Some(sub) = sub {
                sub.dispose();
            }
        }))
    })
}

/// Forward the first `count` values, then complete.
pub fn take<S: Stream>(source: S, count: usize) -> Observable<S::Item> {
    Observable::new(move |observer: Observer<S::Item>| {
        if count == 0 {
            observer(Notification::Complete);
            return Ok(Subscription::closed());
        }
        let taken = Cell::new(0usize);
        source.subscribe(move |n| match n {
            Notification::Next(value) => {
                if taken.get() >= count {
                    return;
                }
                taken.set(taken.get() + 1);
                observer(Notification::Next(value));
                if taken.get() == count {
                    observer(Notification::Complete);
                }
            }
            other => observer(other),
        })
    })
}

#[derive(Default)]
struct SwitchState {
    /// Bumped for every outer value and on disposal; inner emissions tagged
    /// with an older generation are dropped.
    generation: u64,
    inner: Option<Subscription>,
    outer_done: bool,
}

/// Map each value to an inner stream and mirror only the latest one.
///
/// A new outer value disposes the previous inner subscription before the
/// next inner stream is subscribed.
pub fn switch_map<S, R, F>(source: S, project: F) -> Observable<R::Item>
where
    S: Stream,
    R: Stream,
    F: Fn(S::Item) -> R + 'static,
{
    let project = Rc::new(project);
    Observable::new(move |observer: Observer<R::Item>| {
        let state = Rc::new(RefCell::new(SwitchState::default()));
        let st = Rc::clone(&state);
        let project = Rc::clone(&project);

        let outer = source.subscribe(move |n| match n {
            Notification::Next(value) => {
                let (generation, previous) = {
                    let mut s = st.borrow_mut();
                    s.generation += 1;
                    (s.generation, s.inner.take())
                };
                if let Some(previous) = previous {
                    debug!(generation, "superseding in-flight inner stream");
                    previous.dispose();
                }

                let inner_stream = project(value);
                let inner_state = Rc::clone(&st);
                let inner_observer = Rc::clone(&observer);
                let subscribed = inner_stream.subscribe(move |n| {
                    if inner_state.borrow().generation != generation {
                        return;
                    }
                    match n {
                        Notification::Complete => {
                            let (finished, done) = {
                                let mut s = inner_state.borrow_mut();
                                (s.inner.take(), s.outer_done)
                            };
                            drop(finished);
                            if done {
                                inner_observer(Notification::Complete);
                            }
                        }
                        other => inner_observer(other),
                    }
                });

                match subscribed {
                    Ok(sub) => {
                        let stale = {
                            let mut s = st.borrow_mut();
                            if s.generation == generation && !sub.is_closed() {
                                s.inner = Some(sub);
                                None
                            } else {
                                Some(sub)
                            }
                        };
                        if let Some(stale) = stale {
                            stale.dispose();
                        }
                    }
                    Err(misuse) => {
                        error!(generation, error = %misuse, "inner stream refused subscription");
                        observer(Notification::Error(misuse.into()));
                    }
                }
            }
            Notification::Error(e) => observer(Notification::Error(e)),
            Notification::Complete => {
                let idle = {
                    let mut s = st.borrow_mut();
                    s.outer_done = true;
                    s.inner.is_none()
                };
                if idle {
                    observer(Notification::Complete);
                }
            }
        })?;

        Ok(Subscription::new(move || {
            outer.dispose();
            let inner = {
                let mut s = state.borrow_mut();
                s.generation += 1;
                s.inner.take()
            };
            if let Some(inner) = inner {
                inner.dispose();
            }
        }))
    })
}

struct DebounceState<T> {
    held: Option<T>,
    timer: Option<Subscription>,
}

/// Emit a value only after `window` passes without another value arriving.
///
/// Each arrival cancels the pending timer and schedules a fresh one, so
/// every earlier value in a burst is discarded. Completion flushes the held
/// value first; an error discards it.
pub fn debounce<S: Stream>(
    source: S,
    window: Duration,
    scheduler: Rc<dyn Scheduler>,
) -> Observable<S::Item> {
    Observable::new(move |observer: Observer<S::Item>| {
        let state = Rc::new(RefCell::new(DebounceState {
            held: None,
            timer: None,
        }));
        let st = Rc::clone(&state);
        let scheduler = Rc::clone(&scheduler);

        let upstream = source.subscribe(move |n| match n {
            Notification::Next(value) => {
                let previous = {
                    let mut s = st.borrow_mut();
                    s.held = Some(value);
                    s.timer.take()
                };
                if let Some(previous) = previous {
                    debug!(window_ms = window.as_millis() as u64, "debounce timer reset");
                    previous.dispose();
                }

                let fire_state = Rc::clone(&st);
                let fire_observer = Rc::clone(&observer);
                let timer = scheduler.schedule(
                    window,
                    Box::new(move || {
                        let (held, timer) = {
                            let mut s = fire_state.borrow_mut();
                            (s.held.take(), s.timer.take())
                        };
                        drop(timer);
                        if let Some(value) = held {
                            fire_observer(Notification::Next(value));
                        }
                    }),
                );
                st.borrow_mut().timer = Some(timer);
            }
            Notification::Error(e) => {
                let (held, timer) = {
                    let mut s = st.borrow_mut();
                    (s.held.take(), s.timer.take())
                };
                drop(held);
                if let Some(timer) = timer {
                    timer.dispose();
                }
                observer(Notification::Error(e));
            }
            Notification::Complete => {
                let (held, timer) = {
                    let mut s = st.borrow_mut();
                    (s.held.take(), s.timer.take())
                };
                if let Some(timer) = timer {
                    timer.dispose();
                }
                if let Some(value) = held {
                    observer(Notification::Next(value));
                }
                observer(Notification::Complete);
            }
        })?;

        Ok(Subscription::new(move || {
            upstream.dispose();
            let timer = state.borrow_mut().timer.take();
            if let Some(timer) = timer {
                timer.dispose();
            }
        }))
    })
}
