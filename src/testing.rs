//! In-memory fakes for the platform APIs, the correlation store and the
//! media fetcher, shared by the translator and orchestrator tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use crate::db::{DatabaseError, MessageLink, MessageLinkStore};
use crate::discord::{
    DiscordApi, DiscordChannel, DiscordMember, DiscordMessage, DiscordRole, DiscordUser,
    GuildPreview, Webhook, WebhookMessage,
};
use crate::error::{RelayError, Result};
use crate::media::{MediaFetch, PassthroughTranscoder};
use crate::qq::{GroupMemberInfo, LoginInfo, OneBotApi, RawSegment, VersionInfo};
use crate::relay::context::{RelayContext, ResolvedLink, WebhookCredentials};
use crate::relay::suppressor::SelfDeleteSuppressor;

#[derive(Default)]
pub struct FakeDiscord {
    pub members: Mutex<HashMap<(i64, i64), DiscordMember>>,
    pub users: Mutex<HashMap<i64, DiscordUser>>,
    pub channels: Mutex<HashMap<i64, DiscordChannel>>,
    pub roles: Mutex<HashMap<(i64, i64), DiscordRole>>,
    pub guilds: Mutex<HashMap<i64, GuildPreview>>,
    pub messages: Mutex<HashMap<(i64, i64), DiscordMessage>>,
    pub channel_webhooks: Mutex<HashMap<i64, Vec<Webhook>>>,
    pub executed: Mutex<Vec<(i64, WebhookMessage)>>,
    pub deleted: Mutex<Vec<(i64, i64)>>,
    pub application_id: AtomicI64,
    next_id: AtomicI64,
    pub fail_executes: AtomicUsize,
    pub fail_creates: AtomicUsize,
}

impl FakeDiscord {
    pub fn add_guild(&self, guild_id: i64, name: &str) {
        self.guilds.lock().insert(
            guild_id,
            GuildPreview {
                id: guild_id,
                name: name.into(),
            },
        );
    }

    pub fn add_member(&self, guild_id: i64, user_id: i64, nick: Option<&str>, username: &str) {
        self.members.lock().insert(
            (guild_id, user_id),
            DiscordMember {
                nick: nick.map(Into::into),
                avatar: None,
                user: Some(DiscordUser {
                    id: user_id,
                    username: username.into(),
                    global_name: None,
                    avatar: None,
                    bot: false,
                }),
            },
        );
    }

    pub fn add_message(&self, message: DiscordMessage) {
        self.messages
            .lock()
            .insert((message.channel_id, message.id), message);
    }
}

#[async_trait]
impl DiscordApi for FakeDiscord {
    async fn get_guild_member(&self, guild_id: i64, user_id: i64) -> Result<DiscordMember> {
        self.members
            .lock()
            .get(&(guild_id, user_id))
            .cloned()
            .ok_or_else(|| RelayError::UnknownEntity("Unknown User".into()))
    }

    async fn get_user(&self, user_id: i64) -> Result<DiscordUser> {
        self.users
            .lock()
            .get(&user_id)
            .cloned()
            .ok_or_else(|| RelayError::UnknownEntity("Unknown User".into()))
    }

    async fn get_channel(&self, channel_id: i64) -> Result<DiscordChannel> {
        self.channels
            .lock()
            .get(&channel_id)
            .cloned()
            .ok_or_else(|| RelayError::UnknownEntity("Unknown Channel".into()))
    }

    async fn get_guild_role(&self, guild_id: i64, role_id: i64) -> Result<DiscordRole> {
        self.roles
            .lock()
            .get(&(guild_id, role_id))
            .cloned()
            .ok_or_else(|| RelayError::UnknownEntity("Unknown Role".into()))
    }

    async fn get_guild_preview(&self, guild_id: i64) -> Result<GuildPreview> {
        self.guilds
            .lock()
            .get(&guild_id)
            .cloned()
            .ok_or_else(|| RelayError::UnknownEntity("Unknown Guild".into()))
    }

    async fn get_channel_message(
        &self,
        channel_id: i64,
        message_id: i64,
    ) -> Result<DiscordMessage> {
        self.messages
            .lock()
            .get(&(channel_id, message_id))
            .cloned()
            .ok_or_else(|| RelayError::UnknownEntity("Unknown Message".into()))
    }

    async fn get_channel_webhooks(&self, channel_id: i64) -> Result<Vec<Webhook>> {
        Ok(self
            .channel_webhooks
            .lock()
            .get(&channel_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_webhook(&self, channel_id: i64, name: &str) -> Result<Webhook> {
        if decrement(&self.fail_creates) {
            return Err(RelayError::Network("simulated create failure".into()));
        }
        let id = 8000 + self.next_id.fetch_add(1, Ordering::SeqCst);
        let hook = Webhook {
            id,
            token: Some(format!("token-{id}")),
            application_id: Some(self.application_id.load(Ordering::SeqCst)),
            name: Some(name.into()),
        };
        self.channel_webhooks
            .lock()
            .entry(channel_id)
            .or_default()
            .push(hook.clone());
        Ok(hook)
    }

    async fn execute_webhook(
        &self,
        webhook_id: i64,
        _token: &str,
        message: &WebhookMessage,
    ) -> Result<i64> {
        if decrement(&self.fail_executes) {
            return Err(RelayError::Network("simulated webhook failure".into()));
        }
        self.executed.lock().push((webhook_id, message.clone()));
        Ok(9000 + self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    async fn delete_message(&self, channel_id: i64, message_id: i64) -> Result<()> {
        self.deleted.lock().push((channel_id, message_id));
        Ok(())
    }
}

pub struct FakeOneBot {
    pub self_id: i64,
    pub app_name: Mutex<String>,
    pub members: Mutex<HashMap<(i64, i64), GroupMemberInfo>>,
    pub sent: Mutex<Vec<(i64, Vec<RawSegment>)>>,
    pub deleted: Mutex<Vec<i64>>,
    pub uploads: Mutex<Vec<(i64, String, String)>>,
    next_id: AtomicI64,
    pub fail_sends: AtomicUsize,
    pub fail_deletes: AtomicUsize,
}

impl Default for FakeOneBot {
    fn default() -> Self {
        Self {
            self_id: 1000,
            app_name: Mutex::new("NapCat.Onebot".into()),
            members: Mutex::new(HashMap::new()),
            sent: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
            uploads: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(0),
            fail_sends: AtomicUsize::new(0),
            fail_deletes: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl OneBotApi for FakeOneBot {
    async fn get_login_info(&self) -> Result<LoginInfo> {
        Ok(LoginInfo {
            user_id: self.self_id,
            nickname: "relay".into(),
        })
    }

    async fn get_group_member_info(
        &self,
        group_id: i64,
        user_id: i64,
    ) -> Result<GroupMemberInfo> {
        self.members
            .lock()
            .get(&(group_id, user_id))
            .cloned()
            .ok_or_else(|| RelayError::UnknownEntity("member not found".into()))
    }

    async fn get_version_info(&self) -> Result<VersionInfo> {
        Ok(VersionInfo {
            app_name: self.app_name.lock().clone(),
            app_version: "0".into(),
        })
    }

    async fn send_group_msg(&self, group_id: i64, message: &[RawSegment]) -> Result<i64> {
        if decrement(&self.fail_sends) {
            return Err(RelayError::Network("simulated send failure".into()));
        }
        self.sent.lock().push((group_id, message.to_vec()));
        Ok(7000 + self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    async fn delete_msg(&self, message_id: i64) -> Result<()> {
        if decrement(&self.fail_deletes) {
            return Err(RelayError::UnknownEntity("message already recalled".into()));
        }
        self.deleted.lock().push(message_id);
        Ok(())
    }

    async fn upload_group_file(&self, group_id: i64, file: &str, name: &str) -> Result<()> {
        self.uploads
            .lock()
            .push((group_id, file.to_string(), name.to_string()));
        Ok(())
    }
}

fn decrement(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<MessageLink>>,
    next_id: AtomicI64,
}

impl MemoryStore {
    pub async fn seed(&self, discord_message_id: i64, qq_message_id: i64) {
        let id = 1 + self.next_id.fetch_add(1, Ordering::SeqCst);
        self.rows.lock().push(MessageLink {
            id,
            discord_message_id,
            qq_message_id,
        });
    }

    pub fn rows(&self) -> Vec<MessageLink> {
        self.rows.lock().clone()
    }
}

#[async_trait]
impl MessageLinkStore for MemoryStore {
    async fn insert(
        &self,
        discord_message_id: i64,
        qq_message_id: i64,
    ) -> std::result::Result<(), DatabaseError> {
        self.seed(discord_message_id, qq_message_id).await;
        Ok(())
    }

    async fn get_by_discord_id(
        &self,
        discord_message_id: i64,
    ) -> std::result::Result<Vec<MessageLink>, DatabaseError> {
        Ok(self
            .rows
            .lock()
            .iter()
            .filter(|row| row.discord_message_id == discord_message_id)
            .cloned()
            .collect())
    }

    async fn get_by_qq_id(
        &self,
        qq_message_id: i64,
    ) -> std::result::Result<Vec<MessageLink>, DatabaseError> {
        Ok(self
            .rows
            .lock()
            .iter()
            .filter(|row| row.qq_message_id == qq_message_id)
            .cloned()
            .collect())
    }

    async fn delete(&self, id: i64) -> std::result::Result<(), DatabaseError> {
        self.rows.lock().retain(|row| row.id != id);
        Ok(())
    }
}

pub struct FakeMedia {
    bytes: Vec<u8>,
    pub fetched: Mutex<Vec<String>>,
}

impl Default for FakeMedia {
    fn default() -> Self {
        Self::returning(b"\x89PNG\r\n\x1a\nfake")
    }
}

impl FakeMedia {
    pub fn returning(bytes: &[u8]) -> Self {
        Self {
            bytes: bytes.to_vec(),
            fetched: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl MediaFetch for FakeMedia {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.fetched.lock().push(url.to_string());
        Ok(self.bytes.clone())
    }
}

/// One-link context over the given fakes: guild 10, channel 20, group 30.
pub fn context_with(
    discord: Arc<FakeDiscord>,
    qq: Arc<FakeOneBot>,
    store: Arc<MemoryStore>,
    media: Arc<FakeMedia>,
) -> RelayContext {
    RelayContext {
        links: vec![ResolvedLink {
            guild_id: 10,
            guild_channel_id: 20,
            group_id: 30,
            webhook: Some(WebhookCredentials {
                id: 40,
                token: "tok".into(),
            }),
        }],
        store,
        discord,
        qq,
        media,
        transcoder: Arc::new(PassthroughTranscoder),
        suppressor: SelfDeleteSuppressor::default(),
        unmatch_beginning: vec!["/".into()],
        only_to_me: false,
        cache_dir: std::env::temp_dir().join("dcqq-relay-tests"),
        qq_self_id: 1000,
    }
}

/// A plain guild message in the linked channel, authored by Alice.
pub fn guild_message(id: i64, content: &str) -> DiscordMessage {
    DiscordMessage {
        id,
        channel_id: 20,
        guild_id: Some(10),
        author: DiscordUser {
            id: 4,
            username: "alice".into(),
            global_name: Some("Alice".into()),
            avatar: None,
            bot: false,
        },
        member_nick: None,
        content: content.into(),
        attachments: Vec::new(),
        embeds: Vec::new(),
        sticker_items: Vec::new(),
        referenced_message: None,
        message_reference: None,
        message_snapshots: Vec::new(),
        timestamp: Utc::now(),
    }
}
