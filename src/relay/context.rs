use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Link;
use crate::db::MessageLinkStore;
use crate::discord::DiscordApi;
use crate::media::{AudioTranscoder, MediaFetch};
use crate::qq::OneBotApi;
use crate::relay::suppressor::SelfDeleteSuppressor;

/// Webhook identity used to post into a guild channel.
#[derive(Debug, Clone)]
pub struct WebhookCredentials {
    pub id: i64,
    pub token: String,
}

/// A configured pairing after webhook provisioning. A link whose webhook
/// could not be resolved still relays guild messages into the group; only
/// posting back into the guild needs the credentials.
#[derive(Debug, Clone)]
pub struct ResolvedLink {
    pub guild_id: i64,
    pub guild_channel_id: i64,
    pub group_id: i64,
    pub webhook: Option<WebhookCredentials>,
}

impl ResolvedLink {
    pub fn from_configured(link: &Link, webhook: Option<WebhookCredentials>) -> Self {
        Self {
            guild_id: link.guild_id,
            guild_channel_id: link.guild_channel_id,
            group_id: link.group_id,
            webhook,
        }
    }
}

/// Everything one event handler needs, assembled once at connect time and
/// shared by `Arc`.
pub struct RelayContext {
    pub links: Vec<ResolvedLink>,
    pub store: Arc<dyn MessageLinkStore>,
    pub discord: Arc<dyn DiscordApi>,
    pub qq: Arc<dyn OneBotApi>,
    pub media: Arc<dyn MediaFetch>,
    pub transcoder: Arc<dyn AudioTranscoder>,
    pub suppressor: SelfDeleteSuppressor,
    /// Leading characters that mark a message as a command to skip.
    pub unmatch_beginning: Vec<String>,
    pub only_to_me: bool,
    pub cache_dir: PathBuf,
    /// Our own QQ account id, for recognizing mirrored senders.
    pub qq_self_id: i64,
}

impl RelayContext {
    pub fn link_for_channel(&self, channel_id: i64) -> Option<&ResolvedLink> {
        self.links
            .iter()
            .find(|link| link.guild_channel_id == channel_id)
    }

    pub fn link_for_group(&self, group_id: i64) -> Option<&ResolvedLink> {
        self.links.iter().find(|link| link.group_id == group_id)
    }
}
