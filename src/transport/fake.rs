//! Scripted in-memory transport for tests.

use super::{ApiResponse, RawEvent, Transport};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};

pub(crate) struct FakeTransport {
    batches: Mutex<VecDeque<Vec<RawEvent>>>,
    responses: Mutex<HashMap<String, Value>>,
    calls: Mutex<Vec<(String, Value)>>,
    sent: Mutex<Vec<(String, String)>>,
    opened: Mutex<u32>,
    open_error: Option<String>,
    fail_when_drained: bool,
}

impl FakeTransport {
    /// A transport with no directory data; every method answers `{"ok": true}`.
    pub fn new() -> Self {
        Self {
            batches: Mutex::new(VecDeque::new()),
            responses: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
            opened: Mutex::new(0),
            open_error: None,
            fail_when_drained: false,
        }
    }

    /// A small workspace: users alice/bob/slackline, channels general
    /// (joined), random, old (archived), private group secret, and one
    /// direct conversation with alice.
    pub fn workspace() -> Self {
        let fake = Self::new();
        fake.respond(
            "auth.test",
            json!({"ok": true, "user_id": "UBOT", "user": "slackline", "team": "Acme"}),
        );
        fake.respond(
            "users.list",
            json!({"ok": true, "members": [
                {"id": "U1", "name": "alice"},
                {"id": "U2", "name": "bob"},
                {"id": "UBOT", "name": "slackline"},
            ]}),
        );
        fake.respond(
            "channels.list",
            json!({"ok": true, "channels": [
                {"id": "C1", "name": "general", "is_member": true, "is_archived": false},
                {"id": "C2", "name": "random", "is_member": false, "is_archived": false},
                {"id": "C3", "name": "old", "is_member": false, "is_archived": true},
            ]}),
        );
        fake.respond(
            "groups.list",
            json!({"ok": true, "groups": [
                {"id": "G1", "name": "secret", "is_archived": false},
            ]}),
        );
        fake.respond(
            "im.list",
            json!({"ok": true, "ims": [{"id": "D1", "user": "U1"}]}),
        );
        fake.respond(
            "channels.info",
            json!({"ok": true, "channel": {
                "id": "C1", "name": "general",
                "topic": {"value": ""},
                "purpose": {"value": "Company-wide announcements"},
            }}),
        );
        fake.respond(
            "groups.info",
            json!({"ok": true, "group": {
                "id": "G1", "name": "secret",
                "topic": {"value": "Launch plans"},
                "purpose": {"value": ""},
            }}),
        );
        fake
    }

    pub fn failing_open(mut self, reason: &str) -> Self {
        self.open_error = Some(reason.to_string());
        self
    }

    /// Make `read_events` fail once every scripted batch has been served.
    pub fn failing_when_drained(mut self) -> Self {
        self.fail_when_drained = true;
        self
    }

    pub fn respond(&self, method: &str, response: Value) {
        self.responses.lock().insert(method.to_string(), response);
    }

    pub fn push_batch(&self, events: Vec<Value>) {
        self.batches
            .lock()
            .push_back(events.into_iter().map(RawEvent::new).collect());
    }

    pub fn calls_to(&self, method: &str) -> usize {
        self.calls.lock().iter().filter(|(m, _)| m == method).count()
    }

    pub fn last_call(&self, method: &str) -> Option<Value> {
        self.calls
            .lock()
            .iter()
            .rev()
            .find(|(m, _)| m == method)
            .map(|(_, p)| p.clone())
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().clone()
    }

    pub fn times_opened(&self) -> u32 {
        *self.opened.lock()
    }

    fn answer(&self, method: &str, params: &Value) -> Value {
        if method == "im.open" {
            let user = params.get("user").and_then(Value::as_str).unwrap_or("");
            return json!({"ok": true, "channel": {"id": format!("D{user}")}});
        }
        let mut response = self
            .responses
            .lock()
            .get(method)
            .cloned()
            .unwrap_or_else(|| json!({"ok": true}));

        let exclude_archived = params
            .get("exclude_archived")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if exclude_archived {
            for key in ["channels", "groups"] {
                if let Some(list) = response.get_mut(key).and_then(Value::as_array_mut) {
                    list.retain(|c| !c["is_archived"].as_bool().unwrap_or(false));
                }
            }
        }
        response
    }
}

#[async_trait]
impl Transport for FakeTransport {
    fn name(&self) -> &str {
        "fake"
    }

    async fn open_session(&self) -> anyhow::Result<()> {
        *self.opened.lock() += 1;
        match &self.open_error {
            Some(reason) => anyhow::bail!("{reason}"),
            None => Ok(()),
        }
    }

    async fn read_events(&self) -> anyhow::Result<Vec<RawEvent>> {
        match self.batches.lock().pop_front() {
            Some(batch) => Ok(batch),
            None if self.fail_when_drained => anyhow::bail!("stream ended"),
            None => Ok(Vec::new()),
        }
    }

    async fn call(&self, method: &str, params: &Value) -> anyhow::Result<ApiResponse> {
        self.calls.lock().push((method.to_string(), params.clone()));
        Ok(ApiResponse::new(self.answer(method, params)))
    }

    async fn send_raw(&self, channel_id: &str, text: &str) -> anyhow::Result<()> {
        self.sent
            .lock()
            .push((channel_id.to_string(), text.to_string()));
        Ok(())
    }
}
