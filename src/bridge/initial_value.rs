//! Synchronous initial-value detection and capability checks.

use crate::error::Result;
use crate::stream::Stream;
use crate::types::{Notification, StreamKind};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::trace;

/// Determine whether `stream` has a value available right now.
///
/// Subscribes, records every value pushed synchronously during the
/// subscribe call, and disposes before returning. Stateful and replaying
/// producers push their current or buffered values inside `subscribe`, so
/// they yield `Some`; pure event streams yield `None`. When several values
/// are replayed, the last one wins.
///
/// A subscribe failure is returned as-is and no subscription is left
/// behind in any case.
pub fn probe<S: Stream>(stream: &S) -> Result<Option<S::Item>> {
    let last: Rc<RefCell<Option<S::Item>>> = Rc::new(RefCell::new(None));
    let slot = Rc::clone(&last);
    let sub = stream.subscribe(move |n| {
        if let Notification::Next(value) = n {
            *slot.borrow_mut() = Some(value);
        }
    })?;
    sub.dispose();

    let value = last.borrow_mut().take();
    trace!(stream_id = %stream.stream_id(), found = value.is_some(), "probed initial value");
    Ok(value)
}

/// Like [`probe`], but reads the current value directly when the stream
/// exposes one, without subscribing.
pub fn probe_fast<S: Stream>(stream: &S) -> Result<Option<S::Item>> {
    match stream.current_value() {
        Some(value) => Ok(Some(value)),
        None => probe(stream),
    }
}

/// Whether values can be pushed into `stream`.
pub fn has_push_capability<S: Stream>(stream: &S) -> bool {
    stream.sink().is_some()
}

/// Whether `stream` exposes its current value without subscribing.
pub fn has_current_value_capability<S: Stream>(stream: &S) -> bool {
    stream.has_current_value()
}

/// Classify `stream` once, at attachment time.
pub fn stream_kind<S: Stream>(stream: &S) -> StreamKind {
    match (has_push_capability(stream), has_current_value_capability(stream)) {
        (true, true) => StreamKind::StatefulWritableStream,
        (true, false) => StreamKind::WritableStream,
        (false, _) => StreamKind::EventStream,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;
    use crate::stream::{BehaviorSubject, Observable, ReplaySubject, Subject};

    #[test]
    fn test_behavior_subject_value_is_found() {
        let subject = BehaviorSubject::new("foo");
        assert_eq!(probe(&subject).unwrap(), Some("foo"));
        assert_eq!(subject.subscriber_count(), 0);
    }

    #[test]
    fn test_event_stream_is_unset() {
        let subject = Subject::<i32>::new();
        subject.next(1);
        assert_eq!(probe(&subject).unwrap(), None);
        assert_eq!(probe(&Observable::<i32>::never()).unwrap(), None);
        assert_eq!(probe(&ReplaySubject::<i32>::new(4)).unwrap(), None);
    }

    #[test]
    fn test_replay_last_value_wins() {
        let subject = ReplaySubject::new(3);
        for v in [1, 2, 3] {
            subject.next(v);
        }
        assert_eq!(probe(&subject).unwrap(), Some(3));
        assert_eq!(subject.subscriber_count(), 0);
    }

    #[test]
    fn test_piped_behavior_subject() {
        let subject = BehaviorSubject::new(None::<&str>);
        let piped = subject.map(|v| v);
        subject.next(Some("check"));
        assert_eq!(probe(&piped).unwrap(), Some(Some("check")));
        assert_eq!(subject.subscriber_count(), 0);
    }

    #[test]
    fn test_unit_value_is_distinguished_from_unset() {
        let subject = BehaviorSubject::new(());
        assert_eq!(probe(&subject).unwrap(), Some(()));
    }

    #[test]
    fn test_subscribe_failure_propagates() {
        let refusing =
            Observable::<i32>::new(|_| Err(BridgeError::SubscribeFailed("no".to_string())));
        assert!(matches!(probe(&refusing), Err(BridgeError::SubscribeFailed(_))));
    }

    #[test]
    fn test_fast_path_skips_subscribe() {
        let subject = BehaviorSubject::new(10);
        assert_eq!(probe_fast(&subject).unwrap(), Some(10));
        assert_eq!(probe_fast(&subject.as_observable()).unwrap(), Some(10));
    }

    #[test]
    fn test_capabilities() {
        let behavior = BehaviorSubject::new(0);
        let subject = Subject::<i32>::new();
        let observable = behavior.as_observable();

        assert!(has_push_capability(&behavior));
        assert!(has_push_capability(&subject));
        assert!(has_push_capability(&ReplaySubject::<i32>::new(1)));
        assert!(!has_push_capability(&observable));

        assert!(has_current_value_capability(&behavior));
        assert!(!has_current_value_capability(&subject));

        assert_eq!(stream_kind(&behavior), StreamKind::StatefulWritableStream);
        assert_eq!(stream_kind(&subject), StreamKind::WritableStream);
        assert_eq!(stream_kind(&observable), StreamKind::EventStream);
    }

    #[test]
    fn test_errored_behavior_subject_keeps_its_kind() {
        let behavior = BehaviorSubject::new(0);
        behavior.error(crate::error::StreamError::message("boom"));

        assert!(behavior.current_value().is_none());
        assert!(has_current_value_capability(&behavior));
        assert_eq!(stream_kind(&behavior), StreamKind::StatefulWritableStream);
        assert_eq!(probe_fast(&behavior).unwrap(), None);
    }
}
