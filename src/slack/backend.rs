//! Slack backend: connection, dispatch loop and outbound sender.

use super::api::SlackApi;
use super::directory::{ChannelInfo, Directory};
use super::error::{SlackError, SlackResult};
use super::kind::RoomRef;
use super::normalize::{normalize, Event};
use super::room::Room;
use crate::channels::{Handler, Identity, Message, MessageKind, Presence, PresenceStatus};
use crate::config::SlackConfig;
use crate::transport::{RawEvent, RtmTransport, Transport};
use crate::util::{redact_token, truncate_with_ellipsis};
use futures_util::FutureExt;
use serde_json::json;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Longest message body quoted in logs.
const LOG_BODY_CHARS: usize = 200;

pub struct SlackBackend {
    transport: Arc<dyn Transport>,
    directory: Arc<Directory>,
    /// The bot's own identity (node = user id)
    jid: Identity,
    username: String,
    poll_interval: Duration,
    admins: Vec<String>,
}

impl std::fmt::Debug for SlackBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackBackend")
            .field("transport", &self.transport.name())
            .field("jid", &self.jid)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl SlackBackend {
    /// Build the RTM transport from `config` and authenticate.
    ///
    /// # Errors
    ///
    /// `MissingToken` or `Authentication`; both are fatal.
    pub async fn from_config(config: &SlackConfig) -> SlackResult<Self> {
        let token = config.token()?;
        debug!(token = %redact_token(token), api_base = %config.api_base, "Using Slack token");
        let transport = Arc::new(RtmTransport::new(token, config.api_base.clone()));
        Self::authenticate(transport, config).await
    }

    /// Verify the token with `auth.test` and learn who we are.
    pub async fn authenticate(
        transport: Arc<dyn Transport>,
        config: &SlackConfig,
    ) -> SlackResult<Self> {
        let api = SlackApi::new(transport.clone());

        debug!("Verifying authentication token");
        let auth = api.call_unchecked("auth.test", json!({})).await?;
        if !auth.ok() {
            return Err(SlackError::Authentication(auth.error().to_string()));
        }
        let user_id = auth
            .str_field("user_id")
            .ok_or_else(|| SlackError::Authentication("auth.test returned no user_id".into()))?
            .to_string();
        let username = auth.str_field("user").unwrap_or(&user_id).to_string();
        debug!(user_id = %user_id, username = %username, "Token accepted");

        Ok(Self {
            transport,
            directory: Arc::new(Directory::new(api, config.im_cache_capacity)),
            jid: Identity::user(user_id),
            username,
            poll_interval: config.poll_interval(),
            admins: config.admins.clone(),
        })
    }

    pub fn identity(&self) -> &Identity {
        &self.jid
    }

    /// The bot's Slack user name.
    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn directory(&self) -> &Arc<Directory> {
        &self.directory
    }

    /// Open the streaming session.
    ///
    /// # Errors
    ///
    /// `Connection` when the transport cannot open the stream.
    pub async fn connect(&self) -> SlackResult<()> {
        info!(transport = self.transport.name(), "Connecting to Slack real-time messaging API");
        self.transport
            .open_session()
            .await
            .map_err(|e| SlackError::Connection(format!("{e:#}")))?;
        info!("Connected");
        Ok(())
    }

    /// Connect, then read and dispatch events until `shutdown` is cancelled.
    ///
    /// Returns `Ok(())` after an interrupt. Any other exit (the stream
    /// breaks) is an error. In both cases `on_disconnected` and then
    /// `on_shutdown` run exactly once. A failed connect returns before any
    /// hook runs.
    pub async fn run(&self, handler: &dyn Handler, shutdown: CancellationToken) -> SlackResult<()> {
        self.connect().await?;

        let outcome = self.serve(handler, &shutdown).await;
        if let Err(e) = &outcome {
            error!(error = %e, "Event loop failed");
        }

        debug!("Trigger disconnect callback");
        handler.on_disconnected().await;
        debug!("Trigger shutdown");
        handler.on_shutdown().await;
        outcome
    }

    async fn serve(&self, handler: &dyn Handler, shutdown: &CancellationToken) -> SlackResult<()> {
        loop {
            if shutdown.is_cancelled() {
                info!("Caught interrupt, shutting down..");
                return Ok(());
            }

            let events = tokio::select! {
                biased;
                () = shutdown.cancelled() => continue,
                batch = self.transport.read_events() => batch?,
            };

            for event in &events {
                self.dispatch(handler, event).await;
            }

            tokio::select! {
                biased;
                () = shutdown.cancelled() => {}
                () = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }

    /// Handle one event; errors and panics stop here.
    async fn dispatch(&self, handler: &dyn Handler, event: &RawEvent) {
        let outcome = AssertUnwindSafe(self.handle_event(handler, event))
            .catch_unwind()
            .await;
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let reason = format!("{e:#}");
                error!(
                    error = %reason,
                    event = %truncate_with_ellipsis(&event.to_string(), LOG_BODY_CHARS),
                    "An error occurred while handling a Slack event"
                );
            }
            Err(_) => error!(
                event = %truncate_with_ellipsis(&event.to_string(), LOG_BODY_CHARS),
                "A panic occurred while handling a Slack event"
            ),
        }
    }

    async fn handle_event(&self, handler: &dyn Handler, event: &RawEvent) -> anyhow::Result<()> {
        debug!(event = %event, "Slack event");
        match normalize(event, &self.directory, &self.username).await? {
            Some(Event::Hello) => {
                handler.on_connected().await;
                handler
                    .on_presence(&Presence::new(self.jid.clone(), PresenceStatus::Online))
                    .await?;
            }
            Some(Event::Message(message)) => handler.on_message(&message).await?,
            Some(Event::Presence(presence)) => handler.on_presence(&presence).await?,
            None => {}
        }
        Ok(())
    }

    /// Send `message`, fire-and-forget. Failures are logged, never returned.
    pub async fn send_message(&self, message: &Message) {
        let recipient = recipient_name(message);
        if let Err(e) = self.try_send(message, recipient).await {
            error!(
                recipient = %recipient,
                body = %truncate_with_ellipsis(&message.body, LOG_BODY_CHARS),
                error = %e,
                "An error occurred while trying to send a message"
            );
        }
    }

    async fn try_send(&self, message: &Message, recipient: &str) -> SlackResult<()> {
        let channel_id = match message.kind {
            MessageKind::Group => self.directory.resolve_channel_id(recipient).await?,
            MessageKind::Direct => {
                let user_id = self.directory.resolve_user_id(recipient).await?;
                self.directory.open_direct_conversation(&user_id).await?
            }
        };
        debug!(
            kind = ?message.kind,
            recipient = %recipient,
            channel = %channel_id,
            "Sending message"
        );
        self.transport.send_raw(&channel_id, &message.body).await?;
        Ok(())
    }

    /// Reply to `message` with `text`.
    ///
    /// A private reply to a group message goes to the sender alone.
    pub fn build_reply(&self, message: &Message, text: &str, private: bool) -> Message {
        let to = if private && message.kind == MessageKind::Group {
            Identity::user(message.from.node())
        } else {
            message.from.clone()
        };
        let kind = if private {
            MessageKind::Direct
        } else {
            message.kind
        };
        Message::new(text, kind, self.jid.clone(), to)
    }

    pub fn is_admin(&self, identity: &Identity) -> bool {
        self.admins.iter().any(|a| a == identity.node())
    }

    /// A room from a name (`general`, `#general`), an id (`C024BE91L`) or a
    /// channel link (`<#C024BE91L>`).
    pub async fn query_room(&self, room: &str) -> SlackResult<Room> {
        match RoomRef::parse(room) {
            RoomRef::Id(id) => Room::by_id(self.directory.clone(), &id).await,
            RoomRef::Name(name) => Room::by_name(self.directory.clone(), &name).await,
        }
    }

    /// Rooms the bot is currently in.
    pub async fn rooms(&self) -> SlackResult<Vec<Room>> {
        let channels = self.directory.channels(true, true).await?;
        Ok(channels
            .iter()
            .map(|c| Room::from_listing(self.directory.clone(), c))
            .collect())
    }

    pub async fn channels(
        &self,
        exclude_archived: bool,
        joined_only: bool,
    ) -> SlackResult<Vec<ChannelInfo>> {
        self.directory.channels(exclude_archived, joined_only).await
    }

    pub async fn resolve_user_id(&self, name: &str) -> SlackResult<String> {
        self.directory.resolve_user_id(name).await
    }

    pub async fn resolve_user_name(&self, id: &str) -> SlackResult<String> {
        self.directory.resolve_user_name(id).await
    }

    pub async fn resolve_channel_id(&self, name: &str) -> SlackResult<String> {
        self.directory.resolve_channel_id(name).await
    }

    pub async fn resolve_channel_name(&self, id: &str) -> SlackResult<String> {
        self.directory.resolve_channel_name(id).await
    }
}

/// Human-readable target of an outgoing message.
fn recipient_name(message: &Message) -> &str {
    match message.kind {
        MessageKind::Group => message.to.domain(),
        MessageKind::Direct => message.to.node(),
    }
}
