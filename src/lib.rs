//! # Reactive State Bridge
//!
//! Bridges push-based streams into synchronously readable state owned by a
//! component lifecycle, without leaking subscriptions or reading stale
//! callbacks across re-renders.
//!
//! ## Core Concepts
//!
//! - **Streams**: a minimal push-stream contract with subjects, cold
//!   observables and the operators the bridges need
//! - **Bridges**: one subscription per stream identity, a swappable handler
//!   behind it, and the latest value kept as state
//! - **Requests**: a pending → succeeded | failed envelope per request, with
//!   superseded requests cancelled
//! - **Debounce**: only the last dispatch of a burst becomes a request
//!
//! ## Example
//!
//! ```ignore
//! use rx_state_bridge::{AjaxBridge, BehaviorSubject, Observable, StateBridge};
//!
//! // A writable value with a current state
//! let counter = BehaviorSubject::new(0);
//! let mut state = StateBridge::new();
//! let (value, set) = state.attach(&counter)?;
//! assert_eq!(value, Some(0));
//! set.unwrap().push(1);
//!
//! // A request with status tracking
//! let mut users = AjaxBridge::new(|id: u32| Observable::of(vec![format!("user {id}")]));
//! let (envelope, dispatch) = users.attach()?;
//! dispatch.push(7);
//! ```

pub mod ajax;
pub mod bridge;
pub mod error;
pub mod http;
pub mod stream;
pub mod types;

// Re-exports
pub use ajax::{AjaxBridge, DebounceBridge, DebounceConfig, DebouncedAjaxBridge, DEBOUNCE};
pub use bridge::{
    has_current_value_capability, has_push_capability, probe, probe_fast, state_action,
    state_result, stream_kind, EffectSlot, MountEffect, SeedMode, StableObserver, StateBridge,
    StateBridgeConfig, StateCell, SubscriptionBridge, Teardown,
};
pub use error::{BridgeError, Result, StreamError};
pub use http::{http, RequestStatusPipeline};
pub use stream::{
    BehaviorSubject, ManualScheduler, Observable, Observer, ReplaySubject, Scheduler, Sink, Stream,
    Subject, Subscription, Task, WeakSubscription,
};
pub use types::*;
