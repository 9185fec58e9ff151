use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Proxy, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

use crate::config::DiscordConfig;
use crate::discord::api::DiscordApi;
use crate::discord::model::{
    DiscordChannel, DiscordMember, DiscordMessage, DiscordRole, DiscordUser, GuildPreview,
    Webhook, WebhookMessage, snowflake,
};
use crate::error::{RelayError, Result};

/// Discord REST v10 client authenticated as a bot.
pub struct DiscordRestClient {
    api_base: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdOnly {
    #[serde(with = "snowflake")]
    id: i64,
}

impl DiscordRestClient {
    pub fn new(config: &DiscordConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bot {}", config.bot_token))
            .map_err(|e| RelayError::Network(format!("bad bot token: {e}")))?;
        headers.insert(AUTHORIZATION, auth);

        let mut builder = Client::builder().default_headers(headers);
        if let Some(proxy) = &config.proxy {
            builder = builder.proxy(Proxy::all(proxy)?);
        }
        let client = builder
            .build()
            .map_err(|e| RelayError::Network(e.to_string()))?;

        Ok(Self {
            api_base: config.api_base.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    async fn check(path: &str, response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let detail = response
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(|b| b.message)
            .unwrap_or_else(|| status.to_string());

        // Timeouts and rate limits may clear on a later attempt; other 4xx
        // answers will not.
        if status.is_server_error()
            || status == StatusCode::REQUEST_TIMEOUT
            || status == StatusCode::TOO_MANY_REQUESTS
        {
            Err(RelayError::Network(format!("discord {path}: {detail}")))
        } else {
            Err(RelayError::UnknownEntity(detail))
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        debug!("discord get path={}", path);
        let response = self.client.get(self.url(path)).send().await?;
        let response = Self::check(path, response).await?;
        response
            .json()
            .await
            .map_err(|e| RelayError::Network(format!("discord {path} bad payload: {e}")))
    }
}

#[async_trait]
impl DiscordApi for DiscordRestClient {
    async fn get_guild_member(&self, guild_id: i64, user_id: i64) -> Result<DiscordMember> {
        self.get(&format!("/guilds/{guild_id}/members/{user_id}"))
            .await
    }

    async fn get_user(&self, user_id: i64) -> Result<DiscordUser> {
        self.get(&format!("/users/{user_id}")).await
    }

    async fn get_channel(&self, channel_id: i64) -> Result<DiscordChannel> {
        self.get(&format!("/channels/{channel_id}")).await
    }

    async fn get_guild_role(&self, guild_id: i64, role_id: i64) -> Result<DiscordRole> {
        self.get(&format!("/guilds/{guild_id}/roles/{role_id}"))
            .await
    }

    async fn get_guild_preview(&self, guild_id: i64) -> Result<GuildPreview> {
        self.get(&format!("/guilds/{guild_id}/preview")).await
    }

    async fn get_channel_message(
        &self,
        channel_id: i64,
        message_id: i64,
    ) -> Result<DiscordMessage> {
        self.get(&format!("/channels/{channel_id}/messages/{message_id}"))
            .await
    }

    async fn get_channel_webhooks(&self, channel_id: i64) -> Result<Vec<Webhook>> {
        self.get(&format!("/channels/{channel_id}/webhooks")).await
    }

    async fn create_webhook(&self, channel_id: i64, name: &str) -> Result<Webhook> {
        let path = format!("/channels/{channel_id}/webhooks");
        let response = self
            .client
            .post(self.url(&path))
            .json(&json!({ "name": name }))
            .send()
            .await?;
        let response = Self::check(&path, response).await?;
        response
            .json()
            .await
            .map_err(|e| RelayError::Network(format!("discord {path} bad payload: {e}")))
    }

    async fn execute_webhook(
        &self,
        webhook_id: i64,
        token: &str,
        message: &WebhookMessage,
    ) -> Result<i64> {
        let path = format!("/webhooks/{webhook_id}/{token}?wait=true");
        // Keep the token out of error text.
        let label = format!("/webhooks/{webhook_id}");
        let payload = json!({
            "content": message.content,
            "username": message.username,
            "avatar_url": message.avatar_url,
            "embeds": message.embeds,
        });

        let mut form = Form::new().text("payload_json", payload.to_string());
        for (i, file) in message.files.iter().enumerate() {
            form = form.part(
                format!("files[{i}]"),
                Part::bytes(file.bytes.clone()).file_name(file.filename.clone()),
            );
        }

        debug!(
            "discord execute_webhook id={} files={}",
            webhook_id,
            message.files.len()
        );
        let response = self
            .client
            .post(self.url(&path))
            .multipart(form)
            .send()
            .await?;
        let response = Self::check(&label, response).await?;
        let created: IdOnly = response
            .json()
            .await
            .map_err(|e| RelayError::Network(format!("discord {label} bad payload: {e}")))?;
        Ok(created.id)
    }

    async fn delete_message(&self, channel_id: i64, message_id: i64) -> Result<()> {
        let path = format!("/channels/{channel_id}/messages/{message_id}");
        let response = self.client.delete(self.url(&path)).send().await?;
        Self::check(&path, response).await?;
        Ok(())
    }
}
