//! Request bridges: a dispatch handle in, the latest envelope out.
//!
//! [`AjaxBridge`] owns a request subject, feeds it through the
//! [`RequestStatusPipeline`](crate::http::RequestStatusPipeline) and keeps
//! the latest envelope as state. [`DebouncedAjaxBridge`] holds each dispatch
//! for a quiet window first, so only the last one of a burst becomes a
//! request. [`DebounceBridge`] is the same debounce stage in front of a
//! plain function, without status envelopes.
//!
//! # Example
//!
//! ```ignore
//! let mut search = DebouncedAjaxBridge::new(api::search, scheduler.shared());
//!
//! // On every render:
//! let (envelope, dispatch) = search.attach()?;
//! dispatch.push("foo".to_string());
//! ```

use crate::bridge::{StateCell, SubscriptionBridge};
use crate::error::Result;
use crate::http::http;
use crate::stream::{Observable, Scheduler, Sink, Stream, Subject};
use crate::types::RequestEnvelope;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;
use tracing::debug;

/// Default quiet window for debounced dispatch.
pub const DEBOUNCE: Duration = Duration::from_millis(500);

/// Configuration for the debounced bridges.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebounceConfig {
    /// Time a dispatched value is held; a newer dispatch restarts it.
    pub window: Duration,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self { window: DEBOUNCE }
    }
}

/// Shared core: an input subject, a derived output stream, and the latest
/// output as state.
struct Channel<In, Out> {
    input: Subject<In>,
    output: Observable<Out>,
    bridge: SubscriptionBridge<Out>,
    state: StateCell<Option<Out>>,
}

impl<In: Clone + 'static, Out: Clone + 'static> Channel<In, Out> {
    fn new(input: Subject<In>, output: Observable<Out>) -> Self {
        Self {
            input,
            output,
            bridge: SubscriptionBridge::new(),
            state: StateCell::new(None),
        }
    }

    fn attach_with<F>(&mut self, on_change: F) -> Result<(Option<Out>, Sink<In>)>
    where
        F: Fn(&Out) + 'static,
    {
        let state = self.state.clone();
        self.bridge.bind(&self.output, move |value: Out| {
            state.set(Some(value.clone()));
            on_change(&value);
        })?;
        Ok((self.state.get(), self.input.writer()))
    }
}

impl<In, Out> fmt::Debug for Channel<In, Out> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("input", &self.input)
            .field("bridge", &self.bridge)
            .finish()
    }
}

/// Latest request envelope plus a dispatch handle.
pub struct AjaxBridge<Req, Res> {
    channel: Channel<Req, RequestEnvelope<Req, Res>>,
}

impl<Req, Res> AjaxBridge<Req, Res>
where
    Req: Clone + fmt::Debug + 'static,
    Res: Clone + 'static,
{
    /// `dispatch` starts a request and returns its response stream.
    pub fn new<F, S>(dispatch: F) -> Self
    where
        F: Fn(Req) -> S + 'static,
        S: Stream<Item = Res>,
    {
        let requests = Subject::new();
        let envelopes = http(dispatch).apply(&requests);
        Self {
            channel: Channel::new(requests, envelopes),
        }
    }

    /// Latest envelope (`None` before the first dispatch) and the dispatch
    /// handle.
    pub fn attach(&mut self) -> Result<(Option<RequestEnvelope<Req, Res>>, Sink<Req>)> {
        self.attach_with(|_| {})
    }

    /// Like [`attach`](Self::attach), also calling `on_change` on every
    /// envelope transition. The callback installed by the most recent call
    /// is the one invoked.
    pub fn attach_with<F>(
        &mut self,
        on_change: F,
    ) -> Result<(Option<RequestEnvelope<Req, Res>>, Sink<Req>)>
    where
        F: Fn(&RequestEnvelope<Req, Res>) + 'static,
    {
        self.channel.attach_with(on_change)
    }

    /// Latest envelope without re-attaching.
    pub fn envelope(&self) -> Option<RequestEnvelope<Req, Res>> {
        self.channel.state.get()
    }

    /// The envelope state, for hosts that watch it to schedule renders.
    pub fn state(&self) -> &StateCell<Option<RequestEnvelope<Req, Res>>> {
        &self.channel.state
    }

    /// Stop observing; a pending request is cancelled.
    pub fn dispose(&mut self) {
        self.channel.bridge.dispose();
    }
}

impl<Req, Res> fmt::Debug for AjaxBridge<Req, Res> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AjaxBridge")
            .field("channel", &self.channel)
            .finish()
    }
}

/// [`AjaxBridge`] with a debounce stage in front of the pipeline.
///
/// A dispatched request waits `config.window`; a newer dispatch within that
/// window discards it before it ever becomes a pending envelope.
pub struct DebouncedAjaxBridge<Req, Res> {
    config: DebounceConfig,
    channel: Channel<Req, RequestEnvelope<Req, Res>>,
}

impl<Req, Res> DebouncedAjaxBridge<Req, Res>
where
    Req: Clone + fmt::Debug + 'static,
    Res: Clone + 'static,
{
    pub fn new<F, S>(dispatch: F, scheduler: Rc<dyn Scheduler>) -> Self
    where
        F: Fn(Req) -> S + 'static,
        S: Stream<Item = Res>,
    {
        Self::with_config(dispatch, scheduler, DebounceConfig::default())
    }

    pub fn with_config<F, S>(
        dispatch: F,
        scheduler: Rc<dyn Scheduler>,
        config: DebounceConfig,
    ) -> Self
    where
        F: Fn(Req) -> S + 'static,
        S: Stream<Item = Res>,
    {
        let requests = Subject::new();
        let settled = requests.debounce(config.window, scheduler);
        let envelopes = http(dispatch).apply(&settled);
        debug!(
            window_ms = config.window.as_millis() as u64,
            "debounced ajax bridge created"
        );
        Self {
            config,
            channel: Channel::new(requests, envelopes),
        }
    }

    pub fn attach(&mut self) -> Result<(Option<RequestEnvelope<Req, Res>>, Sink<Req>)> {
        self.attach_with(|_| {})
    }

    pub fn attach_with<F>(
        &mut self,
        on_change: F,
    ) -> Result<(Option<RequestEnvelope<Req, Res>>, Sink<Req>)>
    where
        F: Fn(&RequestEnvelope<Req, Res>) + 'static,
    {
        self.channel.attach_with(on_change)
    }

    pub fn envelope(&self) -> Option<RequestEnvelope<Req, Res>> {
        self.channel.state.get()
    }

    pub fn state(&self) -> &StateCell<Option<RequestEnvelope<Req, Res>>> {
        &self.channel.state
    }

    pub fn config(&self) -> &DebounceConfig {
        &self.config
    }

    /// Stop observing; a held dispatch and a pending request are dropped.
    pub fn dispose(&mut self) {
        self.channel.bridge.dispose();
    }
}

impl<Req, Res> fmt::Debug for DebouncedAjaxBridge<Req, Res> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DebouncedAjaxBridge")
            .field("config", &self.config)
            .field("channel", &self.channel)
            .finish()
    }
}

/// Debounced calls to `func`, keeping only the latest output.
///
/// Inputs are debounced, then each surviving input is mapped through
/// `func`; a newer input cancels the previous call's output stream.
pub struct DebounceBridge<In, Out> {
    config: DebounceConfig,
    channel: Channel<In, Out>,
}

impl<In, Out> DebounceBridge<In, Out>
where
    In: Clone + 'static,
    Out: Clone + 'static,
{
    pub fn new<F, S>(func: F, scheduler: Rc<dyn Scheduler>) -> Self
    where
        F: Fn(In) -> S + 'static,
        S: Stream<Item = Out>,
    {
        Self::with_config(func, scheduler, DebounceConfig::default())
    }

    pub fn with_config<F, S>(
        func: F,
        scheduler: Rc<dyn Scheduler>,
        config: DebounceConfig,
    ) -> Self
    where
        F: Fn(In) -> S + 'static,
        S: Stream<Item = Out>,
    {
        let input = Subject::new();
        let output = input.debounce(config.window, scheduler).switch_map(func);
        Self {
            config,
            channel: Channel::new(input, output),
        }
    }

    /// Latest output and the input handle.
    pub fn attach(&mut self) -> Result<(Option<Out>, Sink<In>)> {
        self.attach_with(|_| {})
    }

    /// Like [`attach`](Self::attach), also calling `on_output` per output.
    pub fn attach_with<F>(&mut self, on_output: F) -> Result<(Option<Out>, Sink<In>)>
    where
        F: Fn(&Out) + 'static,
    {
        self.channel.attach_with(on_output)
    }

    pub fn output(&self) -> Option<Out> {
        self.channel.state.get()
    }

    pub fn config(&self) -> &DebounceConfig {
        &self.config
    }

    pub fn dispose(&mut self) {
        self.channel.bridge.dispose();
    }
}

impl<In, Out> fmt::Debug for DebounceBridge<In, Out> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DebounceBridge")
            .field("config", &self.config)
            .field("channel", &self.channel)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StreamError;
    use crate::stream::ManualScheduler;
    use crate::types::Status;
    use serde_json::json;
    use std::cell::RefCell;

    fn echo(req: String) -> Observable<String> {
        Observable::of(vec![format!("re: {req}")])
    }

    #[test]
    fn test_dispatch_updates_envelope() {
        let mut bridge = AjaxBridge::new(echo);
        let (envelope, dispatch) = bridge.attach().unwrap();
        assert!(envelope.is_none());

        dispatch.push("hi".to_string());
        let (envelope, _) = bridge.attach().unwrap();
        assert_eq!(
            envelope,
            Some(RequestEnvelope::succeeded("hi".to_string(), "re: hi".to_string()))
        );
        // pending, then succeeded
        assert_eq!(bridge.state().version(), 2);
    }

    #[test]
    fn test_on_change_sees_every_transition() {
        let mut bridge = AjaxBridge::new(|_req: String| {
            Observable::<String>::fail(StreamError::json(json!({"xhr": {"response": "oops"}})))
        });
        let statuses = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&statuses);
        let (_, dispatch) = bridge
            .attach_with(move |e| s.borrow_mut().push(e.status))
            .unwrap();

        dispatch.push("req1".to_string());
        assert_eq!(*statuses.borrow(), vec![Status::Pending, Status::Failed]);
        assert_eq!(bridge.envelope().unwrap().error, Some(json!("oops")));
    }

    #[test]
    fn test_latest_callback_is_used() {
        let mut bridge = AjaxBridge::new(echo);
        let calls = Rc::new(RefCell::new(Vec::new()));

        let c = Rc::clone(&calls);
        bridge.attach_with(move |_| c.borrow_mut().push("old")).unwrap();
        let c = Rc::clone(&calls);
        let (_, dispatch) = bridge.attach_with(move |_| c.borrow_mut().push("new")).unwrap();

        dispatch.push("x".to_string());
        assert_eq!(*calls.borrow(), vec!["new", "new"]);
    }

    #[test]
    fn test_debounced_dispatch_only_sends_last() {
        let clock = ManualScheduler::new();
        let sent = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&sent);
        let mut bridge = DebouncedAjaxBridge::new(
            move |req: String| {
                s.borrow_mut().push(req.clone());
                echo(req)
            },
            clock.shared(),
        );
        let (_, dispatch) = bridge.attach().unwrap();

        for (i, text) in ["f", "fo", "foo"].into_iter().enumerate() {
            if i > 0 {
                clock.advance_by(Duration::from_millis(100));
            }
            dispatch.push(text.to_string());
        }
        assert!(bridge.envelope().is_none());

        clock.advance_by(DEBOUNCE);
        assert_eq!(*sent.borrow(), vec!["foo"]);
        assert_eq!(bridge.envelope().unwrap().res.as_deref(), Some("re: foo"));
    }

    #[test]
    fn test_debounce_window_is_configurable() {
        let clock = ManualScheduler::new();
        let mut bridge = DebounceBridge::with_config(
            |n: u32| Observable::of(vec![n * 2]),
            clock.shared(),
            DebounceConfig {
                window: Duration::from_millis(50),
            },
        );
        let outputs = Rc::new(RefCell::new(Vec::new()));
        let o = Rc::clone(&outputs);
        let (value, input) = bridge.attach_with(move |v| o.borrow_mut().push(*v)).unwrap();
        assert_eq!(value, None);

        input.push(1);
        input.push(2);
        clock.advance_by(Duration::from_millis(49));
        assert_eq!(bridge.output(), None);
        clock.advance_by(Duration::from_millis(1));
        assert_eq!(bridge.output(), Some(4));
        assert_eq!(*outputs.borrow(), vec![4]);
    }

    #[test]
    fn test_dispose_cancels_held_dispatch() {
        let clock = ManualScheduler::new();
        let mut bridge = DebouncedAjaxBridge::new(echo, clock.shared());
        let (_, dispatch) = bridge.attach().unwrap();

        dispatch.push("late".to_string());
        assert_eq!(clock.pending_count(), 1);
        bridge.dispose();
        assert_eq!(clock.pending_count(), 0);
        clock.advance_by(DEBOUNCE);
        assert!(bridge.envelope().is_none());
    }

    #[test]
    fn test_default_config() {
        assert_eq!(DebounceConfig::default().window, Duration::from_millis(500));
    }
}
