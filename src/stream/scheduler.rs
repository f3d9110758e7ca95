//! Timer scheduling for time-windowed operators.
//!
//! The bridge never sleeps or spawns threads. Timers are handed to a
//! [`Scheduler`] owned by the host event loop, which runs them when their
//! deadline passes. [`ManualScheduler`] is a virtual clock the loop (or a
//! test) advances explicitly.

use crate::stream::subscription::Subscription;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::Duration;
use tracing::trace;

/// A deferred task.
pub type Task = Box<dyn FnOnce()>;

/// Source of time and timers.
pub trait Scheduler {
    /// Time elapsed since the scheduler's origin.
    fn now(&self) -> Duration;

    /// Run `task` once `delay` has elapsed. Disposing the returned
    /// subscription cancels the timer if it has not fired yet.
    fn schedule(&self, delay: Duration, task: Task) -> Subscription;
}

struct Timeline {
    now: Duration,
    next_seq: u64,
    /// Ordered by deadline, then by scheduling order.
    timers: BTreeMap<(Duration, u64), Task>,
}

/// Virtual clock driven by explicit `advance_*` calls.
#[derive(Clone)]
pub struct ManualScheduler {
    timeline: Rc<RefCell<Timeline>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self {
            timeline: Rc::new(RefCell::new(Timeline {
                now: Duration::ZERO,
                next_seq: 0,
                timers: BTreeMap::new(),
            })),
        }
    }

    /// Type-erased handle for operators.
    pub fn shared(&self) -> Rc<dyn Scheduler> {
        Rc::new(self.clone())
    }

    /// Advance the clock by `delta`, running every timer that falls due.
    pub fn advance_by(&self, delta: Duration) -> usize {
        let target = self.now() + delta;
        self.advance_to(target)
    }

    /// Advance the clock to `target`, running due timers in deadline order.
    ///
    /// Timers scheduled by a running task also fire in this call if their
    /// deadline is not after `target`. Returns how many timers ran.
    pub fn advance_to(&self, target: Duration) -> usize {
        let mut ran = 0;
        loop {
            let task = {
                let mut timeline = self.timeline.borrow_mut();
                let due = timeline
                    .timers
                    .first_key_value()
                    .map(|(key, _)| *key)
                    .filter(|(deadline, _)| *deadline <= target);
                match due {
                    Some(key) => {
                        timeline.now = timeline.now.max(key.0);
                        timeline.timers.remove(&key)
                    }
                    None => {
                        timeline.now = timeline.now.max(target);
                        None
                    }
                }
            };
            match task {
                Some(task) => {
                    task();
                    ran += 1;
                }
                None => break,
            }
        }
        if ran > 0 {
            trace!(ran, now_ms = self.now().as_millis() as u64, "timers fired");
        }
        ran
    }

    /// Run timers already due at the current instant.
    pub fn run_pending(&self) -> usize {
        self.advance_to(self.now())
    }

    /// Number of timers waiting to fire.
    pub fn pending_count(&self) -> usize {
        self.timeline.borrow().timers.len()
    }
}

impl Default for ManualScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let timeline = self.timeline.borrow();
        f.debug_struct("ManualScheduler")
            .field("now", &timeline.now)
            .field("pending", &timeline.timers.len())
            .finish()
    }
}

impl Scheduler for ManualScheduler {
    fn now(&self) -> Duration {
        self.timeline.borrow().now
    }

    fn schedule(&self, delay: Duration, task: Task) -> Subscription {
        let key = {
            let mut timeline = self.timeline.borrow_mut();
            let key = (timeline.now + delay, timeline.next_seq);
            timeline.next_seq += 1;
            timeline.timers.insert(key, task);
            key
        };
        let weak: Weak<RefCell<Timeline>> = Rc::downgrade(&self.timeline);
        Subscription::new(move || {
            if let Some(timeline) = weak.upgrade() {
                let cancelled = timeline.borrow_mut().timers.remove(&key);
                // The task may own subscriptions that cancel other timers.
                drop(cancelled);
            }
        })
    }
}
