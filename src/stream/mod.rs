//! Minimal push-stream library the bridges are written against.
//!
//! This is deliberately small: a [`Stream`] contract, cold [`Observable`]s,
//! three hot subject flavours, the handful of operators the request
//! pipeline and debounce stage need, and a [`Scheduler`] for timers.
//!
//! Everything is single-threaded (`Rc`/`RefCell`). Observers are invoked
//! outside of any internal borrow, so an observer may push into, subscribe
//! to, or dispose the stream that is calling it.
//!
//! # Example
//!
//! ```ignore
//! let name = BehaviorSubject::new("None".to_string());
//! let upper = name.map(|s| s.to_uppercase());
//!
//! let sub = upper.subscribe_next(|s| println!("{s}"))?; // prints "NONE"
//! name.next("alice".to_string());                       // prints "ALICE"
//! sub.dispose();
//! ```

mod observable;
pub mod ops;
mod scheduler;
mod subject;
mod subscription;

pub use observable::{Observable, Observer, Sink, Stream};
pub use scheduler::{ManualScheduler, Scheduler, Task};
pub use subject::{BehaviorSubject, ReplaySubject, Subject};
pub use subscription::{Subscription, WeakSubscription};
