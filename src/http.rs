//! Request status pipeline.
//!
//! Turns a stream of requests into a stream of [`RequestEnvelope`]s. Every
//! request produces a `Pending` envelope immediately, then at most one
//! terminal envelope. A newer request unsubscribes the older one's response
//! stream before subscribing its own, so a superseded result never
//! surfaces.
//!
//! ```text
//! requests ─switch_map─▶ dispatch(req)
//!                          ─map(succeeded)─start_with(pending)─catch(failed)─take(2)
//! ```

use crate::stream::{Observable, Observer, Stream};
use crate::types::{Notification, RequestEnvelope};
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use tracing::debug;

type Dispatch<Req, Res> = Rc<dyn Fn(Req) -> Observable<Res>>;

/// Wraps each request in a pending → succeeded | failed lifecycle.
pub struct RequestStatusPipeline<Req, Res> {
    dispatch: Dispatch<Req, Res>,
}

impl<Req, Res> Clone for RequestStatusPipeline<Req, Res> {
    fn clone(&self) -> Self {
        Self {
            dispatch: Rc::clone(&self.dispatch),
        }
    }
}

impl<Req, Res> fmt::Debug for RequestStatusPipeline<Req, Res> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestStatusPipeline").finish_non_exhaustive()
    }
}

impl<Req, Res> RequestStatusPipeline<Req, Res>
where
    Req: Clone + fmt::Debug + 'static,
    Res: Clone + 'static,
{
    /// `dispatch` starts a request and returns the stream of its response.
    /// Only the first value of that stream is used.
    pub fn new<F, S>(dispatch: F) -> Self
    where
        F: Fn(Req) -> S + 'static,
        S: Stream<Item = Res>,
    {
        Self {
            dispatch: Rc::new(move |req| dispatch(req).to_observable()),
        }
    }

    /// Envelope stream for `requests`.
    pub fn apply<S>(&self, requests: &S) -> Observable<RequestEnvelope<Req, Res>>
    where
        S: Stream<Item = Req>,
    {
        let dispatch = Rc::clone(&self.dispatch);
        requests.switch_map(move |req: Req| {
            let response = log_outcome(req.clone(), dispatch(req.clone()));
            let (succeeded_req, failed_req) = (req.clone(), req.clone());
            response
                .map(move |res| RequestEnvelope::succeeded(succeeded_req.clone(), res))
                .start_with(RequestEnvelope::pending(req))
                .catch_error(move |failure| {
                    Observable::of(vec![RequestEnvelope::failed(failed_req.clone(), failure)])
                })
                .take(2)
        })
    }
}

/// Build a pipeline from a dispatch function.
pub fn http<Req, Res, F, S>(dispatch: F) -> RequestStatusPipeline<Req, Res>
where
    Req: Clone + fmt::Debug + 'static,
    Res: Clone + 'static,
    F: Fn(Req) -> S + 'static,
    S: Stream<Item = Res>,
{
    RequestStatusPipeline::new(dispatch)
}

/// Pass `response` through, logging how the request ended.
fn log_outcome<Req, Res>(req: Req, response: Observable<Res>) -> Observable<Res>
where
    Req: fmt::Debug + 'static,
    Res: Clone + 'static,
{
    let req = Rc::new(req);
    Observable::new(move |observer: Observer<Res>| {
        let req = Rc::clone(&req);
        let answered = Cell::new(false);
        response.subscribe(move |n| {
            match &n {
                Notification::Next(_) => answered.set(true),
                Notification::Error(e) => debug!(req = ?req, error = %e, "request failed"),
                Notification::Complete if !answered.get() => {
                    debug!(req = ?req, "request completed without a response; staying pending")
                }
                Notification::Complete => {}
            }
            observer(n)
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{BridgeError, StreamError};
    use crate::stream::{Subject, Subscription};
    use crate::types::Status;
    use serde_json::json;
    use std::cell::RefCell;
    use std::collections::HashMap;

    type Envelope = RequestEnvelope<&'static str, String>;

    fn record(stream: &Observable<Envelope>) -> (Rc<RefCell<Vec<Envelope>>>, Subscription) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let sub = stream.subscribe_next(move |e| s.borrow_mut().push(e)).unwrap();
        (seen, sub)
    }

    #[test]
    fn test_success_emits_pending_then_succeeded() {
        let requests = Subject::new();
        let pipeline = http(|_req: &'static str| Observable::of(vec!["ok".to_string()]));
        let (seen, _sub) = record(&pipeline.apply(&requests));

        requests.next("req1");
        assert_eq!(
            *seen.borrow(),
            vec![
                RequestEnvelope::pending("req1"),
                RequestEnvelope::succeeded("req1", "ok".to_string()),
            ]
        );
    }

    #[test]
    fn test_failure_carries_detail() {
        let requests = Subject::new();
        let pipeline = http(|_req: &'static str| {
            Observable::<String>::fail(StreamError::json(json!({"xhr": {"response": "oops"}})))
        });
        let (seen, _sub) = record(&pipeline.apply(&requests));

        requests.next("req1");
        let seen = seen.borrow();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].status, Status::Failed);
        assert_eq!(seen[1].req, "req1");
        assert_eq!(seen[1].error, Some(json!("oops")));
        assert_eq!(seen[1].res, None);
    }

    #[test]
    fn test_only_first_response_value_is_used() {
        let requests = Subject::new();
        let pipeline = http(|_req: &'static str| {
            Observable::of(vec!["first".to_string(), "second".to_string()])
        });
        let (seen, _sub) = record(&pipeline.apply(&requests));

        requests.next("a");
        assert_eq!(seen.borrow().len(), 2);
        assert_eq!(seen.borrow()[1].res.as_deref(), Some("first"));
    }

    #[test]
    fn test_newer_request_supersedes_pending_one() {
        let responses: Rc<RefCell<HashMap<&'static str, Subject<String>>>> =
            Rc::new(RefCell::new(HashMap::new()));
        let r = Rc::clone(&responses);
        let pipeline = http(move |req: &'static str| {
            let subject = Subject::new();
            r.borrow_mut().insert(req, subject.clone());
            subject
        });
        let requests = Subject::new();
        let (seen, _sub) = record(&pipeline.apply(&requests));

        requests.next("A");
        requests.next("B");
        let a = responses.borrow()["A"].clone();
        let b = responses.borrow()["B"].clone();
        assert_eq!(a.subscriber_count(), 0);

        a.next("late".to_string());
        b.next("fresh".to_string());
        assert_eq!(
            *seen.borrow(),
            vec![
                RequestEnvelope::pending("A"),
                RequestEnvelope::pending("B"),
                RequestEnvelope::succeeded("B", "fresh".to_string()),
            ]
        );
    }

    #[test]
    fn test_never_resolving_request_stays_pending() {
        let requests = Subject::new();
        let pipeline = http(|_req: &'static str| Observable::<String>::never());
        let (seen, _sub) = record(&pipeline.apply(&requests));
        requests.next("slow");

        let empty = http(|_req: &'static str| Observable::<String>::empty());
        let (seen_empty, _sub2) = record(&empty.apply(&requests));
        requests.next("silent");

        assert!(seen.borrow().iter().all(|e| e.is_pending()));
        assert_eq!(*seen_empty.borrow(), vec![RequestEnvelope::pending("silent")]);
    }

    #[test]
    fn test_refused_dispatch_surfaces_as_error() {
        let requests = Subject::new();
        let pipeline = http(|_req: &'static str| {
            Observable::<String>::new(|_| Err(BridgeError::SubscribeFailed("offline".into())))
        });
        let errors = Rc::new(Cell::new(0));
        let e = Rc::clone(&errors);
        let _sub = pipeline
            .apply(&requests)
            .subscribe(move |n| {
                if let Notification::Error(_) = n {
                    e.set(e.get() + 1)
                }
            })
            .unwrap();

        requests.next("x");
        assert_eq!(errors.get(), 1);
    }
}
