use super::{ApiResponse, RawEvent, Transport};
use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

/// How long `read_events` waits for frames before returning a batch.
const READ_WINDOW: Duration = Duration::from_millis(250);
/// Upper bound on events returned by one `read_events` call.
const MAX_BATCH: usize = 100;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Slack transport: Web API over HTTPS plus the RTM websocket stream.
pub struct RtmTransport {
    token: String,
    api_base: String,
    client: Client,
    reader: Mutex<Option<SplitStream<WsStream>>>,
    writer: Mutex<Option<SplitSink<WsStream, WsMessage>>>,
    next_id: AtomicU64,
}

impl RtmTransport {
    pub fn new(token: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            api_base: api_base.into(),
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .connect_timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| Client::new()),
            reader: Mutex::new(None),
            writer: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.api_base.trim_end_matches('/'), method)
    }

    async fn write_frame(&self, frame: WsMessage) -> anyhow::Result<()> {
        let mut guard = self.writer.lock().await;
        let writer = guard
            .as_mut()
            .ok_or_else(|| anyhow!("RTM session is not open"))?;
        writer.send(frame).await.context("writing RTM frame")
    }

    async fn close_session(&self) {
        *self.reader.lock().await = None;
        let mut writer = self.writer.lock().await;
        if let Some(ref mut w) = *writer {
            let _ = w.close().await;
        }
        *writer = None;
    }
}

/// Flatten a JSON object of parameters into form fields.
fn form_fields(params: &Value) -> Vec<(String, String)> {
    let Some(map) = params.as_object() else {
        return Vec::new();
    };
    map.iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| {
            let value = match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), value)
        })
        .collect()
}

#[async_trait]
impl Transport for RtmTransport {
    fn name(&self) -> &str {
        "rtm"
    }

    async fn open_session(&self) -> anyhow::Result<()> {
        let resp = self.call("rtm.connect", &json!({})).await?;
        if !resp.ok() {
            bail!("rtm.connect failed: {}", resp.error());
        }
        let url = resp
            .str_field("url")
            .ok_or_else(|| anyhow!("no url in rtm.connect response"))?;
        debug!(url = %url, "Got RTM websocket URL");

        let (stream, _) = tokio_tungstenite::connect_async(url)
            .await
            .context("connecting to RTM websocket")?;
        let (write, read) = stream.split();
        *self.writer.lock().await = Some(write);
        *self.reader.lock().await = Some(read);
        info!("RTM websocket connected");
        Ok(())
    }

    async fn read_events(&self) -> anyhow::Result<Vec<RawEvent>> {
        let mut events = Vec::new();
        let mut pongs = Vec::new();
        let mut broken = None;
        {
            let mut guard = self.reader.lock().await;
            let reader = guard
                .as_mut()
                .ok_or_else(|| anyhow!("RTM session is not open"))?;
            let deadline = tokio::time::Instant::now() + READ_WINDOW;

            while events.len() < MAX_BATCH {
                let Ok(frame) = tokio::time::timeout_at(deadline, reader.next()).await else {
                    break;
                };
                match frame {
                    Some(Ok(WsMessage::Text(text))) => {
                        match serde_json::from_str::<Value>(text.as_str()) {
                            Ok(value) => events.push(RawEvent::new(value)),
                            Err(e) => debug!(error = %e, "Skipping non-JSON RTM frame"),
                        }
                    }
                    Some(Ok(WsMessage::Ping(data))) => pongs.push(WsMessage::Pong(data)),
                    Some(Ok(WsMessage::Close(frame))) => {
                        broken = Some(anyhow!("RTM stream closed by server: {frame:?}"));
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        broken = Some(anyhow!("RTM stream error: {e}"));
                        break;
                    }
                    None => {
                        broken = Some(anyhow!("RTM stream ended"));
                        break;
                    }
                }
            }
        }

        for pong in pongs {
            if let Err(e) = self.write_frame(pong).await {
                warn!(error = %e, "Failed to answer RTM ping");
            }
        }

        if let Some(err) = broken {
            self.close_session().await;
            return Err(err);
        }
        Ok(events)
    }

    async fn call(&self, method: &str, params: &Value) -> anyhow::Result<ApiResponse> {
        let resp = self
            .client
            .post(self.method_url(method))
            .bearer_auth(&self.token)
            .form(&form_fields(params))
            .send()
            .await
            .with_context(|| format!("Slack {method} request failed"))?;

        let status = resp.status();
        if !status.is_success() {
            bail!("Slack {method} failed ({status})");
        }

        let body: Value = resp
            .json()
            .await
            .with_context(|| format!("Slack {method}: response is not valid JSON"))?;
        Ok(ApiResponse::new(body))
    }

    async fn send_raw(&self, channel_id: &str, text: &str) -> anyhow::Result<()> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let frame = json!({
            "id": id,
            "type": "message",
            "channel": channel_id,
            "text": text,
        });
        self.write_frame(WsMessage::Text(frame.to_string().into()))
            .await
    }
}
