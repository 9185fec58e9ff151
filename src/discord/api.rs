use async_trait::async_trait;

use crate::discord::model::{
    DiscordChannel, DiscordMember, DiscordMessage, DiscordRole, DiscordUser, GuildPreview,
    Webhook, WebhookMessage,
};
use crate::error::Result;

/// Call surface of the Discord REST API the relay depends on. The real
/// client speaks HTTP; tests substitute an in-memory fake.
#[async_trait]
pub trait DiscordApi: Send + Sync {
    async fn get_guild_member(&self, guild_id: i64, user_id: i64) -> Result<DiscordMember>;

    async fn get_user(&self, user_id: i64) -> Result<DiscordUser>;

    async fn get_channel(&self, channel_id: i64) -> Result<DiscordChannel>;

    async fn get_guild_role(&self, guild_id: i64, role_id: i64) -> Result<DiscordRole>;

    async fn get_guild_preview(&self, guild_id: i64) -> Result<GuildPreview>;

    async fn get_channel_message(
        &self,
        channel_id: i64,
        message_id: i64,
    ) -> Result<DiscordMessage>;

    async fn get_channel_webhooks(&self, channel_id: i64) -> Result<Vec<Webhook>>;

    async fn create_webhook(&self, channel_id: i64, name: &str) -> Result<Webhook>;

    /// Posts through a webhook and returns the created message id.
    async fn execute_webhook(
        &self,
        webhook_id: i64,
        token: &str,
        message: &WebhookMessage,
    ) -> Result<i64>;

    async fn delete_message(&self, channel_id: i64, message_id: i64) -> Result<()>;
}
