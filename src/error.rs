//! Error types for the bridge.
//!
//! Two families live here. [`BridgeError`] is a programmer-level failure
//! (misuse of a stream or a subject) and is returned synchronously to the
//! caller of setup. [`StreamError`] is a data-level failure that travels
//! through a stream's error channel and is recovered into state values by
//! the request pipeline.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Main error type for bridge operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BridgeError {
    #[error("Subscribe failed: {0}")]
    SubscribeFailed(String),

    #[error("Subject is closed")]
    SubjectClosed,
}

/// Result type for bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Failure carried by [`Notification::Error`](crate::Notification::Error).
///
/// The payload is free-form JSON so producers can attach whatever their
/// transport reports (status codes, response bodies, xhr-style envelopes).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamError {
    payload: Value,
}

impl StreamError {
    /// Wrap an arbitrary JSON payload.
    pub fn json(payload: Value) -> Self {
        Self { payload }
    }

    /// Plain text failure.
    pub fn message(msg: impl Into<String>) -> Self {
        Self {
            payload: Value::String(msg.into()),
        }
    }

    /// The full failure payload.
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// The inspectable failure detail.
    ///
    /// For ajax-style payloads shaped like `{"xhr": {"response": ..}}` this is
    /// the response body; for anything else it is the whole payload.
    pub fn detail(&self) -> Value {
        self.payload
            .pointer("/xhr/response")
            .cloned()
            .unwrap_or_else(|| self.payload.clone())
    }
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.payload {
            Value::String(s) => write!(f, "{}", s),
            other => write!(f, "{}", other),
        }
    }
}

impl std::error::Error for StreamError {}

impl From<BridgeError> for StreamError {
    fn from(e: BridgeError) -> Self {
        StreamError::message(e.to_string())
    }
}

impl From<Value> for StreamError {
    fn from(payload: Value) -> Self {
        StreamError::json(payload)
    }
}
