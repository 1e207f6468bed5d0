//! Translate RTM events into framework events.

use super::directory::Directory;
use super::error::{SlackError, SlackResult};
use super::kind::ChannelKind;
use crate::channels::{Identity, Message, MessageKind, Presence, PresenceStatus};
use crate::transport::RawEvent;
use serde::Deserialize;
use tracing::{debug, warn};

/// Outcome of normalizing one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The stream greeted us; the dispatch loop fires the connected hook.
    Hello,
    Message(Message),
    Presence(Presence),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum SlackEvent {
    Hello,
    PresenceChange {
        user: String,
        presence: String,
    },
    Message {
        channel: String,
        user: String,
        text: String,
    },
    #[serde(other)]
    Other,
}

/// Map a Slack presence string to a status.
///
/// Only `active` counts as online. Every other value, known or not, maps to
/// offline.
pub fn presence_status(presence: &str) -> PresenceStatus {
    if presence == "active" {
        PresenceStatus::Online
    } else {
        PresenceStatus::Offline
    }
}

/// Message kind for a channel id, `None` when the prefix is not recognised.
pub fn message_kind(channel_id: &str) -> Option<MessageKind> {
    match ChannelKind::from_id(channel_id) {
        ChannelKind::PublicChannel => {
            debug!("Handling message from a public channel");
            Some(MessageKind::Group)
        }
        ChannelKind::PrivateGroup => {
            debug!("Handling message from a private group");
            Some(MessageKind::Group)
        }
        ChannelKind::Direct => {
            debug!("Handling message from a user");
            Some(MessageKind::Direct)
        }
        ChannelKind::Unknown => None,
    }
}

/// Turn one raw event into zero or one [`Event`].
///
/// Events without a `type` (send acknowledgements) and unhandled types yield
/// `None`. Name-resolution failures are returned to the caller.
pub async fn normalize(
    event: &RawEvent,
    directory: &Directory,
    bot_name: &str,
) -> SlackResult<Option<Event>> {
    let Some(kind) = event.kind() else {
        return Ok(None);
    };

    let parsed: SlackEvent =
        serde_json::from_value(event.as_value().clone()).map_err(|e| SlackError::MalformedEvent {
            kind: kind.to_string(),
            reason: e.to_string(),
        })?;

    match parsed {
        SlackEvent::Hello => Ok(Some(Event::Hello)),
        SlackEvent::PresenceChange { user, presence } => Ok(Some(Event::Presence(Presence::new(
            Identity::user(user),
            presence_status(&presence),
        )))),
        SlackEvent::Message {
            channel,
            user,
            text,
        } => {
            let Some(kind) = message_kind(&channel) else {
                warn!(channel = %channel, "Unknown message type! Unable to handle");
                return Ok(None);
            };
            let room = directory.resolve_channel_name(&channel).await?;
            let sender = directory.resolve_user_name(&user).await?;
            Ok(Some(Event::Message(Message::new(
                text,
                kind,
                Identity::occupant(sender, room.clone()),
                Identity::occupant(bot_name, room),
            ))))
        }
        SlackEvent::Other => Ok(None),
    }
}
