//! Identity cache: user and channel names versus Slack ids.
//!
//! The maps start empty and fill on demand. A miss refreshes the relevant
//! listing from the directory and retries once; only then does the lookup
//! fail. Entries are never invalidated.

use super::api::{decode_field, SlackApi};
use super::cache::{CacheStats, LruCache};
use super::error::{SlackError, SlackResult};
use super::kind::strip_sigil;
use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;

/// Channel or group as returned by `channels.list` / `groups.list`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChannelInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub is_member: bool,
    #[serde(default)]
    pub is_archived: bool,
}

#[derive(Debug, Deserialize)]
struct Member {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct Im {
    id: String,
    user: String,
}

#[derive(Debug, Default)]
struct NameMap {
    by_id: HashMap<String, String>,
    by_name: HashMap<String, String>,
}

impl NameMap {
    fn insert(&mut self, id: &str, name: &str) {
        self.by_id.insert(id.to_string(), name.to_string());
        self.by_name.insert(name.to_string(), id.to_string());
    }

    /// Record a name for `id` without making it addressable by that name.
    fn insert_alias(&mut self, id: &str, name: &str) {
        self.by_id.insert(id.to_string(), name.to_string());
    }

    fn name_of(&self, id: &str) -> Option<String> {
        self.by_id.get(id).cloned()
    }

    fn id_of(&self, name: &str) -> Option<String> {
        self.by_name.get(name).cloned()
    }
}

pub struct Directory {
    api: SlackApi,
    users: RwLock<NameMap>,
    channels: RwLock<NameMap>,
    ims: Mutex<LruCache<String, String>>,
}

impl Directory {
    pub fn new(api: SlackApi, im_capacity: usize) -> Self {
        Self {
            api,
            users: RwLock::new(NameMap::default()),
            channels: RwLock::new(NameMap::default()),
            ims: Mutex::new(LruCache::new(im_capacity)),
        }
    }

    pub fn api(&self) -> &SlackApi {
        &self.api
    }

    pub async fn resolve_user_name(&self, id: &str) -> SlackResult<String> {
        if let Some(name) = self.users.read().name_of(id) {
            return Ok(name);
        }
        self.refresh_users().await?;
        self.users
            .read()
            .name_of(id)
            .ok_or_else(|| SlackError::UserNotFound(format!("no user with ID {id} exists")))
    }

    pub async fn resolve_user_id(&self, name: &str) -> SlackResult<String> {
        let name = name.strip_prefix('@').unwrap_or(name);
        if let Some(id) = self.users.read().id_of(name) {
            return Ok(id);
        }
        self.refresh_users().await?;
        self.users
            .read()
            .id_of(name)
            .ok_or_else(|| SlackError::UserNotFound(format!("no user named {name} exists")))
    }

    /// Name of a channel, group or direct conversation. Direct conversations
    /// are named after the other participant.
    pub async fn resolve_channel_name(&self, id: &str) -> SlackResult<String> {
        if let Some(name) = self.channels.read().name_of(id) {
            return Ok(name);
        }
        self.refresh_channels().await?;
        self.channels
            .read()
            .name_of(id)
            .ok_or_else(|| SlackError::RoomNotFound(format!("no channel with ID {id} exists")))
    }

    pub async fn resolve_channel_id(&self, name: &str) -> SlackResult<String> {
        let name = strip_sigil(name);
        if let Some(id) = self.channels.read().id_of(name) {
            return Ok(id);
        }
        self.refresh_channels().await?;
        self.channels.read().id_of(name).ok_or_else(|| {
            SlackError::RoomNotFound(format!(
                "#{name} does not exist (or is a private group you don't have access to)"
            ))
        })
    }

    /// Channels followed by groups.
    ///
    /// `joined_only` filters channels on membership. Groups are listed only
    /// when the bot is in them, so they are never filtered.
    pub async fn channels(
        &self,
        exclude_archived: bool,
        joined_only: bool,
    ) -> SlackResult<Vec<ChannelInfo>> {
        let params = json!({ "exclude_archived": exclude_archived });

        let response = self.api.call("channels.list", params.clone()).await?;
        let channels: Vec<ChannelInfo> = decode_field(&response, "channels.list", "channels")?;

        let response = self.api.call("groups.list", params).await?;
        let groups: Vec<ChannelInfo> = decode_field(&response, "groups.list", "groups")?;

        {
            let mut map = self.channels.write();
            for c in channels.iter().chain(groups.iter()) {
                map.insert(&c.id, &c.name);
            }
        }

        Ok(channels
            .into_iter()
            .filter(|c| c.is_member || !joined_only)
            .chain(groups)
            .collect())
    }

    /// Open (or reuse) the direct conversation with `user_id`.
    ///
    /// Memoized in a bounded LRU. The lock is held across the remote call so
    /// concurrent callers never open the same conversation twice.
    pub async fn open_direct_conversation(&self, user_id: &str) -> SlackResult<String> {
        let mut ims = self.ims.lock().await;
        if let Some(id) = ims.get(&user_id.to_string()) {
            return Ok(id);
        }

        let response = self.api.call("im.open", json!({ "user": user_id })).await?;
        let id = response
            .get("channel")
            .and_then(|c| c.get("id"))
            .and_then(Value::as_str)
            .ok_or_else(|| {
                SlackError::Transport(anyhow::anyhow!("no channel id in im.open response"))
            })?
            .to_string();

        debug!(user = user_id, channel = %id, "Opened direct conversation");
        ims.insert(user_id.to_string(), id.clone());
        Ok(id)
    }

    pub async fn im_cache_stats(&self) -> CacheStats {
        self.ims.lock().await.stats()
    }

    async fn refresh_users(&self) -> SlackResult<()> {
        let response = self.api.call("users.list", json!({})).await?;
        let members: Vec<Member> = decode_field(&response, "users.list", "members")?;
        debug!(count = members.len(), "Refreshed user directory");

        let mut users = self.users.write();
        for m in &members {
            users.insert(&m.id, &m.name);
        }
        Ok(())
    }

    async fn refresh_channels(&self) -> SlackResult<()> {
        self.channels(false, false).await?;

        let response = self.api.call("im.list", json!({})).await?;
        let ims: Vec<Im> = decode_field(&response, "im.list", "ims")?;

        let unknown = {
            let users = self.users.read();
            ims.iter().any(|im| users.name_of(&im.user).is_none())
        };
        if unknown {
            self.refresh_users().await?;
        }

        {
            let users = self.users.read();
            let mut channels = self.channels.write();
            for im in &ims {
                let name = users.name_of(&im.user).unwrap_or_else(|| im.user.clone());
                channels.insert_alias(&im.id, &name);
            }
        }
        debug!(ims = ims.len(), "Refreshed channel directory");
        Ok(())
    }
}
