//! Core types shared by streams and bridges.

use crate::error::StreamError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter for generating stream identities.
static NEXT_STREAM_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a stream.
///
/// Bridges key their setup/teardown cycle on this value: a new id means a
/// new subscription, the same id means the existing one is kept.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StreamId(pub u64);

impl StreamId {
    /// Allocate a fresh, process-unique id.
    pub fn next() -> Self {
        StreamId(NEXT_STREAM_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Debug for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StreamId({})", self.0)
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single event delivered to an observer.
#[derive(Clone, Debug, PartialEq)]
pub enum Notification<T> {
    /// A value.
    Next(T),
    /// Terminal failure.
    Error(StreamError),
    /// Terminal completion.
    Complete,
}

impl<T> Notification<T> {
    /// True for `Error` and `Complete`.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Notification::Next(_))
    }

    /// The carried value, if any.
    pub fn into_value(self) -> Option<T> {
        match self {
            Notification::Next(value) => Some(value),
            _ => None,
        }
    }
}

/// Capability set of a stream, determined once when a bridge attaches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    /// Subscribe only.
    EventStream,
    /// Subscribe + push.
    WritableStream,
    /// Subscribe + push + synchronously readable current value.
    StatefulWritableStream,
}

impl StreamKind {
    /// Whether values can be pushed into the stream from outside.
    pub fn accepts_push(self) -> bool {
        !matches!(self, StreamKind::EventStream)
    }

    /// Whether the current value can be read without subscribing.
    pub fn has_current_value(self) -> bool {
        matches!(self, StreamKind::StatefulWritableStream)
    }
}

/// Lifecycle state of a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pending,
    Succeeded,
    Failed,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Pending => "pending",
            Status::Succeeded => "succeeded",
            Status::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// A request paired with its current status and outcome.
///
/// Created `Pending` when the request is accepted, then replaced by exactly
/// one terminal envelope (`Succeeded` with `res`, or `Failed` with `error`).
///
/// `res` is typed as the response, so it stays `None` on failure. A failed
/// envelope carries the extracted detail in `error` and the whole
/// [`StreamError`] in `failure`, which serializes as an extra `failure` key.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope<Req, Res> {
    pub status: Status,
    pub req: Req,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub res: Option<Res>,
    /// Failure detail (see [`StreamError::detail`]).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
    /// Full failure payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<StreamError>,
}

impl<Req, Res> RequestEnvelope<Req, Res> {
    pub fn pending(req: Req) -> Self {
        Self {
            status: Status::Pending,
            req,
            res: None,
            error: None,
            failure: None,
        }
    }

    pub fn succeeded(req: Req, res: Res) -> Self {
        Self {
            status: Status::Succeeded,
            req,
            res: Some(res),
            error: None,
            failure: None,
        }
    }

    pub fn failed(req: Req, failure: StreamError) -> Self {
        Self {
            status: Status::Failed,
            req,
            res: None,
            error: Some(failure.detail()),
            failure: Some(failure),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == Status::Pending
    }

    /// True once the request has succeeded or failed.
    pub fn is_settled(&self) -> bool {
        !self.is_pending()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stream_ids_are_unique() {
        let a = StreamId::next();
        let b = StreamId::next();
        assert_ne!(a, b);
        assert!(b > a);
    }

    #[test]
    fn test_envelope_serialization_skips_absent_fields() {
        let pending: RequestEnvelope<String, String> = RequestEnvelope::pending("req1".into());
        assert_eq!(
            serde_json::to_value(&pending).unwrap(),
            json!({"status": "pending", "req": "req1"})
        );

        let ok = RequestEnvelope::succeeded("req1".to_string(), "ok".to_string());
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            json!({"status": "succeeded", "req": "req1", "res": "ok"})
        );
    }

    #[test]
    fn test_failed_envelope_carries_detail_and_payload() {
        let failure = StreamError::json(json!({"xhr": {"response": "oops"}}));
        let env: RequestEnvelope<&str, ()> = RequestEnvelope::failed("req1", failure.clone());
        assert_eq!(env.status, Status::Failed);
        assert_eq!(env.error, Some(json!("oops")));
        assert_eq!(env.failure, Some(failure));
        assert_eq!(env.res, None);
        assert!(env.is_settled());
        assert_eq!(
            serde_json::to_value(&env).unwrap(),
            json!({
                "status": "failed",
                "req": "req1",
                "error": "oops",
                "failure": {"xhr": {"response": "oops"}}
            })
        );
    }

    #[test]
    fn test_stream_kind_capabilities() {
        assert!(!StreamKind::EventStream.accepts_push());
        assert!(StreamKind::WritableStream.accepts_push());
        assert!(!StreamKind::WritableStream.has_current_value());
        assert!(StreamKind::StatefulWritableStream.has_current_value());
    }
}
