//! Streams surfaced as synchronously readable component state.

use crate::bridge::initial_value::{probe_fast, stream_kind};
use crate::bridge::lifecycle::StateCell;
use crate::bridge::subscription::SubscriptionBridge;
use crate::error::Result;
use crate::stream::{Sink, Stream};
use crate::types::{StreamId, StreamKind};
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use tracing::{debug, trace};

/// How the initial state is obtained when a stream is attached.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedMode {
    /// Subscribe once; values pushed while subscribing become the initial
    /// state. Producers with subscribe-time side effects run them once.
    #[default]
    SharedSubscription,
    /// Probe first (current value, else subscribe-and-dispose), then
    /// subscribe for real and skip the replayed value the probe already saw.
    ProbeThenSubscribe,
}

/// Configuration for [`StateBridge`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateBridgeConfig {
    pub seed_mode: SeedMode,
}

/// Keeps the latest value of a stream as local state.
///
/// [`attach`](Self::attach) is called on every render and returns the
/// current value together with a push handle when the stream accepts
/// pushes. State starts as `None` until the stream has produced a value;
/// a stream with a current value is readable on the very first render.
///
/// Attaching a stream of a different identity discards the old state and
/// starts over.
pub struct StateBridge<T> {
    config: StateBridgeConfig,
    bridge: SubscriptionBridge<T>,
    state: StateCell<Option<T>>,
    kind: Option<StreamKind>,
    sink: Option<Sink<T>>,
}

impl<T: Clone + 'static> StateBridge<T> {
    pub fn new() -> Self {
        Self::with_config(StateBridgeConfig::default())
    }

    pub fn with_config(config: StateBridgeConfig) -> Self {
        Self {
            config,
            bridge: SubscriptionBridge::new(),
            state: StateCell::new(None),
            kind: None,
            sink: None,
        }
    }

    /// Current value and, for writable streams, the push handle.
    pub fn attach<S>(&mut self, stream: &S) -> Result<(Option<T>, Option<Sink<T>>)>
    where
        S: Stream<Item = T>,
    {
        if self.bridge.bound_stream() != Some(stream.stream_id()) {
            self.establish(stream)?;
        }
        Ok((self.state.get(), self.sink.clone()))
    }

    fn establish<S>(&mut self, stream: &S) -> Result<()>
    where
        S: Stream<Item = T>,
    {
        self.bridge.dispose();
        self.kind = None;
        self.sink = None;
        self.state.seed(None);

        let kind = stream_kind(stream);
        debug!(
            stream_id = %stream.stream_id(),
            ?kind,
            mode = ?self.config.seed_mode,
            "attaching state"
        );

        match self.config.seed_mode {
            SeedMode::SharedSubscription => {
                let seeding = Rc::new(Cell::new(true));
                let (flag, state) = (Rc::clone(&seeding), self.state.clone());
                let bound = self.bridge.bind(stream, move |value| {
                    if flag.get() {
                        state.seed(Some(value));
                    } else {
                        state.set(Some(value));
                    }
                });
                seeding.set(false);
                bound?;
            }
            SeedMode::ProbeThenSubscribe => {
                let probed = probe_fast(stream)?;
                let found = probed.is_some();
                if found {
                    self.state.seed(probed);
                }

                // Pushes inside the real subscribe call replay what the probe
                // saw: the first is dropped, any further ones seed silently.
                let replay_pending = Rc::new(Cell::new(found));
                let subscribing = Rc::new(Cell::new(true));
                let (pending, inside, state) = (
                    Rc::clone(&replay_pending),
                    Rc::clone(&subscribing),
                    self.state.clone(),
                );
                let bound = self.bridge.bind(stream, move |value| {
                    if !inside.get() {
                        state.set(Some(value));
                    } else if pending.replace(false) {
                        trace!("skipping replay of probed value");
                    } else {
                        state.seed(Some(value));
                    }
                });
                subscribing.set(false);
                replay_pending.set(false);
                bound?;
            }
        }

        self.kind = Some(kind);
        if kind.accepts_push() {
            self.sink = stream.sink();
        }
        Ok(())
    }

    /// Latest value without re-attaching.
    pub fn value(&self) -> Option<T> {
        self.state.get()
    }

    /// The underlying state, for hosts that watch it to schedule renders.
    pub fn state(&self) -> &StateCell<Option<T>> {
        &self.state
    }

    /// Classification of the attached stream.
    pub fn kind(&self) -> Option<StreamKind> {
        self.kind
    }

    pub fn attached_stream(&self) -> Option<StreamId> {
        self.bridge.bound_stream()
    }

    pub fn dispose(&mut self) {
        self.bridge.dispose();
    }
}

impl<T: Clone + 'static> Default for StateBridge<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for StateBridge<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateBridge")
            .field("config", &self.config)
            .field("kind", &self.kind)
            .field("state", &self.state)
            .finish()
    }
}

/// Attach and return only the value.
pub fn state_result<S>(
    bridge: &mut StateBridge<S::Item>,
    stream: &S,
) -> Result<Option<S::Item>>
where
    S: Stream,
{
    bridge.attach(stream).map(|(value, _)| value)
}

/// Only the push handle of `stream`, without subscribing.
pub fn state_action<S: Stream>(stream: &S) -> Option<Sink<S::Item>> {
    stream.sink()
}
