//! Rooms: public channels, private groups and direct conversations behind
//! one type.
//!
//! A room is built from exactly one of a name or an id and derives the other.
//! The id is memoized until `leave` or `destroy` changes the room's remote
//! state. Public channels are administered through `channels.*` methods and
//! private groups through `groups.*`; callers never see the difference.

use super::api::decode_field;
use super::directory::{ChannelInfo, Directory};
use super::error::{SlackError, SlackResult};
use super::kind::{strip_sigil, ChannelKind};
use crate::channels::Identity;
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::info;

/// Construction arguments for [`Room::new`].
///
/// `node` and `resource` exist so identity-shaped input can be passed
/// through; a room accepts neither.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomArgs {
    pub name: Option<String>,
    pub id: Option<String>,
    pub node: Option<String>,
    pub resource: Option<String>,
}

impl RoomArgs {
    pub fn name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }
}

impl From<&Identity> for RoomArgs {
    fn from(identity: &Identity) -> Self {
        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
        Self {
            name: non_empty(identity.domain()),
            node: non_empty(identity.node()),
            ..Self::default()
        }
    }
}

pub struct Room {
    name: String,
    id: Mutex<Option<String>>,
    directory: Arc<Directory>,
}

impl Room {
    /// Build a room from exactly one of `args.name` / `args.id`.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` when both or neither are given, or when `node` or
    /// `resource` is set. Construction by id fails with `RoomNotFound` when
    /// the directory does not know the id.
    pub async fn new(directory: Arc<Directory>, args: RoomArgs) -> SlackResult<Self> {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.is_empty());
        if present(&args.node) || present(&args.resource) {
            return Err(SlackError::InvalidArgument(
                "Room only supports construction using an id or a name".into(),
            ));
        }

        // "" and a bare "#" count as not supplied.
        let name = args
            .name
            .as_deref()
            .map(strip_sigil)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let id = args.id.filter(|s| !s.is_empty());

        match (name, id) {
            (Some(_), Some(_)) => Err(SlackError::InvalidArgument(
                "id and name are mutually exclusive".into(),
            )),
            (None, None) => Err(SlackError::InvalidArgument(
                "Room requires either an id or a name".into(),
            )),
            (Some(name), None) => Ok(Self {
                name,
                id: Mutex::new(None),
                directory,
            }),
            (None, Some(id)) => {
                let name = directory.resolve_channel_name(&id).await?;
                Ok(Self {
                    name,
                    id: Mutex::new(Some(id)),
                    directory,
                })
            }
        }
    }

    pub async fn by_name(directory: Arc<Directory>, name: &str) -> SlackResult<Self> {
        Self::new(directory, RoomArgs::name(name)).await
    }

    pub async fn by_id(directory: Arc<Directory>, id: &str) -> SlackResult<Self> {
        Self::new(directory, RoomArgs::id(id)).await
    }

    /// Room taken from a directory listing, where both sides are already known.
    pub(crate) fn from_listing(directory: Arc<Directory>, info: &ChannelInfo) -> Self {
        Self {
            name: info.name.clone(),
            id: Mutex::new(Some(info.id.clone())),
            directory,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn identity(&self) -> Identity {
        Identity::room(&self.name)
    }

    pub async fn id(&self) -> SlackResult<String> {
        if let Some(id) = self.id.lock().clone() {
            return Ok(id);
        }
        let id = self.directory.resolve_channel_id(&self.name).await?;
        *self.id.lock() = Some(id.clone());
        Ok(id)
    }

    /// Forget the memoized id; the next `id()` asks the directory again.
    pub fn invalidate_id(&self) {
        *self.id.lock() = None;
    }

    pub async fn kind(&self) -> SlackResult<ChannelKind> {
        Ok(ChannelKind::from_id(&self.id().await?))
    }

    /// True for private groups.
    pub async fn private(&self) -> SlackResult<bool> {
        Ok(self.kind().await?.is_private())
    }

    /// Whether a channel or group with this name exists, archived or not.
    pub async fn exists(&self) -> SlackResult<bool> {
        let channels = self.directory.channels(false, false).await?;
        Ok(channels.iter().any(|c| c.name == self.name))
    }

    pub async fn joined(&self) -> SlackResult<bool> {
        let channels = self.directory.channels(true, true).await?;
        Ok(channels.iter().any(|c| c.name == self.name))
    }

    pub async fn topic(&self) -> SlackResult<Option<String>> {
        Ok(text_value(&self.info().await?, "topic"))
    }

    pub async fn set_topic(&self, topic: &str) -> SlackResult<()> {
        self.set_text("setTopic", "topic", topic).await
    }

    pub async fn purpose(&self) -> SlackResult<Option<String>> {
        Ok(text_value(&self.info().await?, "purpose"))
    }

    pub async fn set_purpose(&self, purpose: &str) -> SlackResult<()> {
        self.set_text("setPurpose", "purpose", purpose).await
    }

    pub async fn join(&self) -> SlackResult<()> {
        info!("Joining channel {self}");
        self.directory
            .api()
            .call("channels.join", json!({ "name": self.name }))
            .await?;
        Ok(())
    }

    pub async fn leave(&self) -> SlackResult<()> {
        let id = self.id().await?;
        let kind = ChannelKind::from_id(&id);
        info!("Leaving {kind} {self} ({id})");
        self.directory
            .api()
            .call(&format!("{}.leave", kind.api_family()), json!({ "channel": id }))
            .await?;
        self.invalidate_id();
        Ok(())
    }

    pub async fn create(&self, private: bool) -> SlackResult<()> {
        let method = if private {
            info!("Creating group {self}");
            "groups.create"
        } else {
            info!("Creating channel {self}");
            "channels.create"
        };
        self.directory
            .api()
            .call(method, json!({ "name": self.name }))
            .await?;
        Ok(())
    }

    /// Archive the room.
    pub async fn destroy(&self) -> SlackResult<()> {
        let id = self.id().await?;
        let kind = ChannelKind::from_id(&id);
        info!("Archiving {kind} {self} ({id})");
        self.directory
            .api()
            .call(&format!("{}.archive", kind.api_family()), json!({ "channel": id }))
            .await?;
        self.invalidate_id();
        Ok(())
    }

    async fn info(&self) -> SlackResult<Value> {
        let id = self.id().await?;
        let kind = ChannelKind::from_id(&id);
        let method = format!("{}.info", kind.api_family());
        let response = self
            .directory
            .api()
            .call(&method, json!({ "channel": id }))
            .await?;
        let info: Map<String, Value> = decode_field(&response, &method, kind.info_key())?;
        Ok(Value::Object(info))
    }

    async fn set_text(&self, method: &str, field: &str, value: &str) -> SlackResult<()> {
        let id = self.id().await?;
        let kind = ChannelKind::from_id(&id);
        info!("Setting {field} of {self} ({id}) to '{value}'");
        self.directory
            .api()
            .call(
                &format!("{}.{method}", kind.api_family()),
                json!({ "channel": id, field: value }),
            )
            .await?;
        Ok(())
    }
}

/// `info[field]["value"]`, with the empty string meaning unset.
fn text_value(info: &Value, field: &str) -> Option<String> {
    info.get(field)
        .and_then(|f| f.get("value"))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl PartialEq for Room {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Room {}

impl std::fmt::Debug for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Room")
            .field("name", &self.name)
            .field("id", &*self.id.lock())
            .finish_non_exhaustive()
    }
}

impl std::fmt::Display for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slack::api::SlackApi;
    use crate::transport::fake::FakeTransport;

    fn setup() -> (Arc<FakeTransport>, Arc<Directory>) {
        let fake = Arc::new(FakeTransport::workspace());
        let dir = Arc::new(Directory::new(SlackApi::new(fake.clone()), 50));
        (fake, dir)
    }

    #[tokio::test]
    async fn both_name_and_id_is_rejected() {
        let (_fake, dir) = setup();
        let args = RoomArgs {
            name: Some("general".into()),
            id: Some("C1".into()),
            ..RoomArgs::default()
        };
        let err = Room::new(dir, args).await.unwrap_err();
        assert!(matches!(err, SlackError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn neither_name_nor_id_is_rejected() {
        let (_fake, dir) = setup();
        let err = Room::new(dir, RoomArgs::default()).await.unwrap_err();
        assert!(matches!(err, SlackError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn extraneous_identity_fields_are_rejected() {
        let (_fake, dir) = setup();
        let args = RoomArgs {
            name: Some("general".into()),
            resource: Some("laptop".into()),
            ..RoomArgs::default()
        };
        assert!(matches!(
            Room::new(dir.clone(), args).await,
            Err(SlackError::InvalidArgument(_))
        ));

        let occupant = Identity::occupant("alice", "general");
        assert!(matches!(
            Room::new(dir, RoomArgs::from(&occupant)).await,
            Err(SlackError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn room_identity_converts_to_args() {
        let (_fake, dir) = setup();
        let room = Room::new(dir, RoomArgs::from(&Identity::room("general")))
            .await
            .unwrap();
        assert_eq!(room.name(), "general");
    }

    #[tokio::test]
    async fn sigil_is_stripped() {
        let (_fake, dir) = setup();
        let a = Room::by_name(dir.clone(), "#general").await.unwrap();
        let b = Room::by_name(dir, "general").await.unwrap();
        assert_eq!(a.name(), "general");
        assert_eq!(a, b);
        assert_eq!(a.id().await.unwrap(), b.id().await.unwrap());
        assert_eq!(a.to_string(), "#general");
    }

    #[tokio::test]
    async fn by_id_derives_name() {
        let (_fake, dir) = setup();
        let room = Room::by_id(dir, "G1").await.unwrap();
        assert_eq!(room.name(), "secret");
        assert!(room.private().await.unwrap());
    }

    #[tokio::test]
    async fn by_unknown_id_is_room_not_found() {
        let (_fake, dir) = setup();
        let err = Room::by_id(dir, "C999").await.unwrap_err();
        assert!(matches!(err, SlackError::RoomNotFound(_)));
    }

    #[tokio::test]
    async fn id_is_memoized() {
        let (fake, dir) = setup();
        let room = Room::by_name(dir, "general").await.unwrap();
        assert_eq!(room.id().await.unwrap(), "C1");
        assert_eq!(room.id().await.unwrap(), "C1");
        assert!(!room.private().await.unwrap());
        assert_eq!(fake.calls_to("channels.list"), 1);
    }

    #[tokio::test]
    async fn unknown_name_fails_on_id_access() {
        let (_fake, dir) = setup();
        let room = Room::by_name(dir, "nowhere").await.unwrap();
        assert!(matches!(room.id().await, Err(SlackError::RoomNotFound(_))));
        assert!(!room.exists().await.unwrap());
    }

    #[tokio::test]
    async fn exists_includes_archived_and_joined_does_not() {
        let (_fake, dir) = setup();
        let old = Room::by_name(dir.clone(), "old").await.unwrap();
        assert!(old.exists().await.unwrap());
        assert!(!old.joined().await.unwrap());

        let general = Room::by_name(dir.clone(), "general").await.unwrap();
        assert!(general.joined().await.unwrap());

        let random = Room::by_name(dir, "random").await.unwrap();
        assert!(random.exists().await.unwrap());
        assert!(!random.joined().await.unwrap());
    }

    #[tokio::test]
    async fn topic_and_purpose_use_info_calls() {
        let (fake, dir) = setup();
        let general = Room::by_name(dir.clone(), "general").await.unwrap();
        assert_eq!(general.topic().await.unwrap(), None);
        assert_eq!(
            general.purpose().await.unwrap().as_deref(),
            Some("Company-wide announcements")
        );
        assert_eq!(fake.calls_to("channels.info"), 2);

        let secret = Room::by_name(dir, "secret").await.unwrap();
        assert_eq!(secret.topic().await.unwrap().as_deref(), Some("Launch plans"));
        assert_eq!(secret.purpose().await.unwrap(), None);
        assert_eq!(fake.last_call("groups.info"), Some(json!({"channel": "G1"})));
    }

    #[tokio::test]
    async fn setters_route_by_privacy() {
        let (fake, dir) = setup();
        let general = Room::by_name(dir.clone(), "general").await.unwrap();
        general.set_topic("Standup at 10").await.unwrap();
        assert_eq!(
            fake.last_call("channels.setTopic"),
            Some(json!({"channel": "C1", "topic": "Standup at 10"}))
        );

        let secret = Room::by_name(dir, "secret").await.unwrap();
        secret.set_purpose("Stealth").await.unwrap();
        assert_eq!(
            fake.last_call("groups.setPurpose"),
            Some(json!({"channel": "G1", "purpose": "Stealth"}))
        );
        assert_eq!(fake.calls_to("channels.setPurpose"), 0);
    }

    #[tokio::test]
    async fn leave_and_destroy_reset_the_id() {
        let (fake, dir) = setup();
        let secret = Room::by_name(dir.clone(), "secret").await.unwrap();
        secret.leave().await.unwrap();
        assert_eq!(fake.last_call("groups.leave"), Some(json!({"channel": "G1"})));
        assert!(secret.id.lock().is_none());

        let general = Room::by_name(dir, "general").await.unwrap();
        general.destroy().await.unwrap();
        assert_eq!(
            fake.last_call("channels.archive"),
            Some(json!({"channel": "C1"}))
        );
        assert!(general.id.lock().is_none());
    }

    #[tokio::test]
    async fn create_and_join_use_the_name() {
        let (fake, dir) = setup();
        let room = Room::by_name(dir, "#launch").await.unwrap();
        room.create(true).await.unwrap();
        assert_eq!(fake.last_call("groups.create"), Some(json!({"name": "launch"})));
        room.create(false).await.unwrap();
        assert_eq!(fake.last_call("channels.create"), Some(json!({"name": "launch"})));
        room.join().await.unwrap();
        assert_eq!(fake.last_call("channels.join"), Some(json!({"name": "launch"})));
    }

    #[tokio::test]
    async fn api_failures_surface_from_admin_calls() {
        let (fake, dir) = setup();
        fake.respond("channels.join", json!({"ok": false, "error": "is_archived"}));
        let room = Room::by_name(dir, "old").await.unwrap();
        let err = room.join().await.unwrap_err();
        assert!(matches!(err, SlackError::Api { .. }));
    }

    #[tokio::test]
    async fn empty_name_or_bare_sigil_is_no_name() {
        let (_fake, dir) = setup();
        for name in ["", "#"] {
            let err = Room::by_name(dir.clone(), name).await.unwrap_err();
            assert!(
                matches!(err, SlackError::InvalidArgument(_)),
                "name {name:?} gave {err}"
            );
        }
        let err = Room::by_id(dir, "").await.unwrap_err();
        assert!(matches!(err, SlackError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn empty_id_next_to_a_name_is_ignored() {
        let (_fake, dir) = setup();
        let args = RoomArgs {
            name: Some("general".into()),
            id: Some(String::new()),
            node: Some(String::new()),
            ..RoomArgs::default()
        };
        let room = Room::new(dir, args).await.unwrap();
        assert_eq!(room.name(), "general");
        assert_eq!(room.id().await.unwrap(), "C1");
    }

    #[tokio::test]
    async fn info_without_payload_is_transport_error() {
        let (fake, dir) = setup();
        fake.respond("channels.info", json!({"ok": true}));
        let general = Room::by_name(dir, "general").await.unwrap();
        let err = general.topic().await.unwrap_err();
        assert!(matches!(err, SlackError::Transport(_)), "got {err}");
        assert!(err.to_string().contains("channels.info"));
    }
}
