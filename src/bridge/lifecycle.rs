//! Host lifecycle primitives the bridges are written against.
//!
//! A component framework provides two things the bridges need: an effect
//! that re-runs when a dependency's identity changes (with teardown before
//! the next setup and on disposal), and locally-owned state whose updates
//! request a re-render. These types model exactly that, so a host only has
//! to call `attach` from its render and `dispose` from its unmount.

use crate::error::Result;
use crate::stream::Subscription;
use crate::types::StreamId;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::debug;

/// Teardown returned by an effect setup.
pub type Teardown = Box<dyn FnOnce()>;

/// An effect keyed by a stream identity.
///
/// `run` executes setup only when the key differs from the last successful
/// run, tearing the previous setup down first.
#[derive(Default)]
pub struct EffectSlot {
    key: Option<StreamId>,
    teardown: Option<Teardown>,
}

impl EffectSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `setup` if `key` changed. Returns whether setup ran.
    ///
    /// If setup fails, the slot is left empty: the previous teardown has
    /// already run and nothing new is recorded.
    pub fn run<F>(&mut self, key: StreamId, setup: F) -> Result<bool>
    where
        F: FnOnce() -> Result<Teardown>,
    {
        if self.key == Some(key) {
            return Ok(false);
        }
        self.dispose();
        let teardown = setup()?;
        self.key = Some(key);
        self.teardown = Some(teardown);
        Ok(true)
    }

    /// Run the current teardown, if any.
    pub fn dispose(&mut self) {
        if let Some(key) = self.key.take() {
            debug!(stream_id = %key, "effect teardown");
        }
        if let Some(teardown) = self.teardown.take() {
            teardown();
        }
    }

    /// Key of the last successful setup.
    pub fn key(&self) -> Option<StreamId> {
        self.key
    }
}

impl Drop for EffectSlot {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for EffectSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectSlot").field("key", &self.key).finish()
    }
}

/// An effect that runs once, on the first `run`.
#[derive(Default)]
pub struct MountEffect {
    mounted: bool,
    teardown: Option<Teardown>,
}

impl MountEffect {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `on_mount` the first time only. It may return a teardown that
    /// runs on [`dispose`](Self::dispose).
    pub fn run<F>(&mut self, on_mount: F)
    where
        F: FnOnce() -> Option<Teardown>,
    {
        if self.mounted {
            return;
        }
        self.mounted = true;
        self.teardown = on_mount();
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub fn dispose(&mut self) {
        if let Some(teardown) = self.teardown.take() {
            teardown();
        }
    }
}

impl Drop for MountEffect {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for MountEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MountEffect")
            .field("mounted", &self.mounted)
            .finish()
    }
}

type Watcher = Rc<dyn Fn()>;

struct StateInner<T> {
    value: T,
    version: u64,
    /// Render watchers, pruned lazily once their subscription is gone.
    watchers: Vec<Weak<dyn Fn()>>,
}

/// Locally-owned component state.
///
/// Cloning a `StateCell` creates another handle to the same state.
///
/// # Invariants
///
/// 1. `version` increments by exactly 1 on each [`set`](Self::set).
/// 2. [`seed`](Self::seed) replaces the value without a version bump or
///    notification (initial state written during setup).
/// 3. Watchers are notified in registration order, outside any borrow.
pub struct StateCell<T> {
    inner: Rc<RefCell<StateInner<T>>>,
}

impl<T> Clone for StateCell<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for StateCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("StateCell")
            .field("value", &inner.value)
            .field("version", &inner.version)
            .finish()
    }
}

impl<T: Clone + 'static> StateCell<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(StateInner {
                value,
                version: 0,
                watchers: Vec::new(),
            })),
        }
    }

    /// Clone of the current value.
    pub fn get(&self) -> T {
        self.inner.borrow().value.clone()
    }

    /// Borrow the current value without cloning.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.borrow().value)
    }

    /// Store `value`, bump the version, and request a re-render.
    pub fn set(&self, value: T) {
        let (old, watchers) = {
            let mut inner = self.inner.borrow_mut();
            let old = std::mem::replace(&mut inner.value, value);
            inner.version += 1;
            inner.watchers.retain(|w| w.strong_count() > 0);
            let watchers: Vec<Watcher> =
                inner.watchers.iter().filter_map(|w| w.upgrade()).collect();
            (old, watchers)
        };
        drop(old);
        for watcher in &watchers {
            watcher();
        }
    }

    /// Store `value` silently.
    pub fn seed(&self, value: T) {
        let old = std::mem::replace(&mut self.inner.borrow_mut().value, value);
        drop(old);
    }

    /// Number of `set` calls so far.
    pub fn version(&self) -> u64 {
        self.inner.borrow().version
    }

    /// Register a render watcher, called after every `set`.
    pub fn watch(&self, watcher: impl Fn() + 'static) -> Subscription {
        let strong: Watcher = Rc::new(watcher);
        self.inner.borrow_mut().watchers.push(Rc::downgrade(&strong));
        Subscription::new(move || drop(strong))
    }
}
