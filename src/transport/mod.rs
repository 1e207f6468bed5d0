//! Transport trait: the session/API black box the adapter is built on.
//!
//! This module defines the downward abstraction used by the Slack adapter. The
//! adapter never touches sockets or HTTP directly: it opens a streaming
//! session, reads event batches, calls named API methods and writes raw
//! messages through a `Transport`.

mod rtm;
#[cfg(test)]
pub(crate) mod fake;

pub use rtm::RtmTransport;

use async_trait::async_trait;
use serde_json::Value;

/// A single record read from the event stream.
///
/// Events are opaque service-defined JSON objects with at least a `type`
/// discriminant. They live for one read cycle and are never retained.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEvent(Value);

impl RawEvent {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// The `type` discriminant, if the record has one.
    pub fn kind(&self) -> Option<&str> {
        self.0.get("type").and_then(Value::as_str)
    }

    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

impl From<Value> for RawEvent {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for RawEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Decoded response of an API method call: `{"ok": bool, "error"?: str, ...}`.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse(Value);

impl ApiResponse {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn ok(&self) -> bool {
        self.0.get("ok").and_then(Value::as_bool).unwrap_or(false)
    }

    /// Server-reported error string, `"unknown"` when absent.
    pub fn error(&self) -> &str {
        self.0
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn str_field(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

/// Core transport trait: implement for any streaming/API client.
///
/// # Implementation Guide
///
/// 1. Implement `open_session()` to establish the long-lived event stream
/// 2. Implement `read_events()` to return whatever arrived since the last read
///    (an empty batch is fine; block briefly at most)
/// 3. Implement `call()` to invoke a named API method and return the decoded
///    response without interpreting `ok`
/// 4. Implement `send_raw()` to post plain text to a channel id
///
/// Reconnection at the socket level, TLS and pagination are the transport's
/// business; callers assume one `call()` returns the complete listing.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Human-readable transport name, used for logging.
    fn name(&self) -> &str;

    /// Open the streaming session.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be established. The adapter
    /// treats this as fatal.
    async fn open_session(&self) -> anyhow::Result<()>;

    /// Read the next batch of events. May be empty.
    ///
    /// # Errors
    ///
    /// Returns an error only when the stream is unusable (closed, broken).
    async fn read_events(&self) -> anyhow::Result<Vec<RawEvent>>;

    /// Invoke an API method with a JSON object of parameters.
    async fn call(&self, method: &str, params: &Value) -> anyhow::Result<ApiResponse>;

    /// Post `text` to the conversation `channel_id` over the stream.
    async fn send_raw(&self, channel_id: &str, text: &str) -> anyhow::Result<()>;
}
