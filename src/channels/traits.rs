//! Handler trait: the framework side of the adapter.
//!
//! This module defines the normalized message model shared with the chat-bot
//! framework and the callback hooks the dispatch loop invokes. Implement the
//! `Handler` trait to receive messages and presence changes from Slack.

use async_trait::async_trait;

/// A (node, domain) pair naming a user, a user within a room, or a room.
///
/// - user: `Identity::user("alice")` → node only
/// - occupant: `Identity::occupant("alice", "general")` → user within a room
/// - room: `Identity::room("general")` → domain only
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    node: String,
    domain: String,
}

impl Identity {
    pub fn user(node: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            domain: String::new(),
        }
    }

    pub fn occupant(node: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            domain: domain.into(),
        }
    }

    pub fn room(domain: impl Into<String>) -> Self {
        Self {
            node: String::new(),
            domain: domain.into(),
        }
    }

    /// Local part: a user name or id. Empty for rooms.
    pub fn node(&self) -> &str {
        &self.node
    }

    /// Domain part: a room name. Empty for bare users.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn is_room(&self) -> bool {
        self.node.is_empty() && !self.domain.is_empty()
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.node.is_empty(), self.domain.is_empty()) {
            (_, true) => write!(f, "{}", self.node),
            (true, false) => write!(f, "#{}", self.domain),
            (false, false) => write!(f, "{}@{}", self.node, self.domain),
        }
    }
}

/// Whether a message belongs to a one-to-one or a multi-user conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Direct conversation with a single user
    Direct,
    /// Public channel or private group
    Group,
}

/// A message received from or sent to Slack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Message text content
    pub body: String,
    pub kind: MessageKind,
    /// Sender; for inbound messages the domain is the room name
    pub from: Identity,
    /// Recipient; group messages are routed by `to.domain()`, direct ones by `to.node()`
    pub to: Identity,
}

impl Message {
    pub fn new(body: impl Into<String>, kind: MessageKind, from: Identity, to: Identity) -> Self {
        Self {
            body: body.into(),
            kind,
            from,
            to,
        }
    }

    pub fn is_direct(&self) -> bool {
        self.kind == MessageKind::Direct
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceStatus {
    Online,
    Offline,
}

/// A presence change for a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Presence {
    pub identifier: Identity,
    pub status: PresenceStatus,
}

impl Presence {
    pub fn new(identifier: Identity, status: PresenceStatus) -> Self {
        Self { identifier, status }
    }
}

/// Framework callbacks invoked by the dispatch loop.
///
/// All hooks run on the dispatch task, one event at a time. An error returned
/// from `on_message` or `on_presence` is logged and dropped; it never stops
/// the loop.
///
/// # Implementation Guide
///
/// 1. Implement `on_message()` to react to inbound messages
/// 2. Optionally override `on_presence()` to track who is online
/// 3. Optionally override `on_connected()`, `on_disconnected()` and
///    `on_shutdown()` for lifecycle bookkeeping
#[async_trait]
pub trait Handler: Send + Sync {
    /// Called when the stream greets us, before the bot's own online presence.
    async fn on_connected(&self) {}

    /// Called for every normalized inbound message.
    ///
    /// # Errors
    ///
    /// Errors are logged by the dispatch loop and otherwise ignored.
    async fn on_message(&self, message: &Message) -> anyhow::Result<()>;

    /// Called for every presence change, including the bot's own.
    async fn on_presence(&self, _presence: &Presence) -> anyhow::Result<()> {
        Ok(())
    }

    /// First hook of the shutdown sequence.
    async fn on_disconnected(&self) {}

    /// Last hook of the shutdown sequence.
    async fn on_shutdown(&self) {}
}
