//! Bridges from push streams to lifecycle-scoped component state.
//!
//! The pieces, leaves first:
//! - [`StableObserver`]: fixed-identity observer with a swappable handler
//! - [`probe`]: synchronous initial-value detection and capability checks
//! - [`SubscriptionBridge`]: one subscription per stream identity
//! - [`StateBridge`]: latest value as state plus an optional push handle
//!
//! The host framework's effect and state primitives are modelled by
//! [`EffectSlot`], [`MountEffect`] and [`StateCell`].
//!
//! # Example
//!
//! ```ignore
//! let name = BehaviorSubject::new("None".to_string());
//! let mut bridge = StateBridge::new();
//!
//! // On every render:
//! let (value, set_name) = bridge.attach(&name)?;
//! assert_eq!(value.as_deref(), Some("None"));
//!
//! set_name.unwrap().push("Alice".to_string());
//! assert_eq!(bridge.value().as_deref(), Some("Alice"));
//! ```

mod initial_value;
mod lifecycle;
mod observer;
mod state;
mod subscription;

pub use initial_value::{
    has_current_value_capability, has_push_capability, probe, probe_fast, stream_kind,
};
pub use lifecycle::{EffectSlot, MountEffect, StateCell, Teardown};
pub use observer::StableObserver;
pub use state::{state_action, state_result, SeedMode, StateBridge, StateBridgeConfig};
pub use subscription::SubscriptionBridge;
