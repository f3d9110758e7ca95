//! Subscription lifecycle keyed by stream identity.

use crate::bridge::lifecycle::{EffectSlot, Teardown};
use crate::bridge::observer::StableObserver;
use crate::error::Result;
use crate::stream::Stream;
use crate::types::{Notification, StreamId};
use std::fmt;
use tracing::{debug, trace, warn};

/// Binds a stream to a per-render callback without resubscribing.
///
/// Call [`bind`](Self::bind) on every render with the current callback. The
/// first call (and every call with a stream of a different identity)
/// subscribes a fresh [`StableObserver`]; calls with the same stream only
/// swap the observer's handler, so the callback never goes stale and the
/// producer never sees a second subscription.
///
/// This is also the effect entry point: a component that only reacts to
/// values, without keeping them as state, uses the bridge directly.
///
/// # Invariants
///
/// 1. At most one live subscription per bridge.
/// 2. The previous subscription is disposed, exactly once, before the next
///    one is established.
/// 3. A failed subscribe leaves the bridge unbound.
pub struct SubscriptionBridge<T> {
    effect: EffectSlot,
    observer: Option<StableObserver<T>>,
}

impl<T: Clone + 'static> SubscriptionBridge<T> {
    pub fn new() -> Self {
        Self {
            effect: EffectSlot::new(),
            observer: None,
        }
    }

    /// Bind `stream` to `on_value` for this render.
    ///
    /// Values delivered synchronously while subscribing reach `on_value`
    /// before this returns. Stream errors are logged and otherwise ignored;
    /// a subscribe failure is returned and nothing is recorded.
    pub fn bind<S, F>(&mut self, stream: &S, on_value: F) -> Result<()>
    where
        S: Stream<Item = T>,
        F: Fn(T) + 'static,
    {
        let key = stream.stream_id();
        if self.effect.key() == Some(key) {
            if let Some(observer) = &self.observer {
                observer.set_handler(on_value);
                return Ok(());
            }
        }

        self.observer = None;
        let observer = StableObserver::new();
        observer.set_handler(on_value);

        let source = stream.clone();
        let receiver = observer.clone();
        self.effect.run(key, move || {
            let sub = source.subscribe(move |n| match n {
                Notification::Next(value) => {
                    trace!(stream_id = %key, "value delivered");
                    receiver.receive(value);
                }
                Notification::Error(e) => {
                    warn!(stream_id = %key, error = %e, "bound stream failed")
                }
                Notification::Complete => debug!(stream_id = %key, "bound stream completed"),
            })?;
            debug!(stream_id = %key, "subscribed");
            Ok(Box::new(move || sub.dispose()) as Teardown)
        })?;

        self.observer = Some(observer);
        Ok(())
    }

    /// Identity of the currently bound stream.
    pub fn bound_stream(&self) -> Option<StreamId> {
        self.effect.key()
    }

    pub fn is_bound(&self) -> bool {
        self.effect.key().is_some()
    }

    /// Unsubscribe. Safe to call repeatedly; the next `bind` subscribes
    /// again even for the same stream.
    pub fn dispose(&mut self) {
        self.effect.dispose();
        self.observer = None;
    }
}

impl<T: Clone + 'static> Default for SubscriptionBridge<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for SubscriptionBridge<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionBridge")
            .field("bound", &self.effect.key())
            .finish()
    }
}
