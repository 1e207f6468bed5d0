use super::error::{SlackError, SlackResult};
use crate::transport::{ApiResponse, Transport};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Thin wrapper around `Transport::call` that interprets `ok`.
#[derive(Clone)]
pub struct SlackApi {
    transport: Arc<dyn Transport>,
}

impl SlackApi {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Call `method` and fail with [`SlackError::Api`] on `{"ok": false}`.
    pub async fn call(&self, method: &str, params: Value) -> SlackResult<ApiResponse> {
        let response = self.call_unchecked(method, params).await?;
        if !response.ok() {
            return Err(SlackError::Api {
                method: method.to_string(),
                error: response.error().to_string(),
            });
        }
        Ok(response)
    }

    /// Call `method` and hand back the raw response, whatever `ok` says.
    pub async fn call_unchecked(&self, method: &str, params: Value) -> SlackResult<ApiResponse> {
        debug!(method, transport = self.transport.name(), "Slack API call");
        Ok(self.transport.call(method, &params).await?)
    }
}

/// Decode `response[key]` into `T`, treating a missing key as JSON `null`.
pub(crate) fn decode_field<T: DeserializeOwned>(
    response: &ApiResponse,
    method: &str,
    key: &str,
) -> SlackResult<T> {
    let raw = response.get(key).cloned().unwrap_or(Value::Null);
    serde_json::from_value(raw).map_err(|e| {
        SlackError::Transport(anyhow::anyhow!(
            "Slack {method}: missing or invalid `{key}` in response: {e}"
        ))
    })
}
