use futures::future::join_all;
use tracing::{error, info};

use crate::config::Link;
use crate::discord::DiscordApi;
use crate::relay::context::{ResolvedLink, WebhookCredentials};

/// Outcome of connect-time provisioning. Every configured link stays in
/// `links` so guild messages keep flowing into the group; channels listed
/// in `failed_channels` got no webhook and cannot receive group messages
/// until the next connect.
pub struct ProvisionOutcome {
    pub links: Vec<ResolvedLink>,
    pub failed_channels: Vec<i64>,
}

/// Resolves webhook credentials for every configured link, concurrently.
/// Order of preference: credentials from the config file, an existing
/// channel webhook owned by our application, a freshly created one.
pub async fn provision(
    discord: &dyn DiscordApi,
    application_id: i64,
    configured: &[Link],
) -> ProvisionOutcome {
    let resolutions = join_all(
        configured
            .iter()
            .map(|link| resolve_credentials(discord, application_id, link)),
    )
    .await;

    let mut links = Vec::new();
    let mut failed_channels = Vec::new();
    for (link, credentials) in configured.iter().zip(resolutions) {
        if credentials.is_none() {
            failed_channels.push(link.guild_channel_id);
        }
        links.push(ResolvedLink::from_configured(link, credentials));
    }
    info!(
        "webhook provisioning done: {} links, {} without credentials",
        links.len(),
        failed_channels.len()
    );
    ProvisionOutcome {
        links,
        failed_channels,
    }
}

async fn resolve_credentials(
    discord: &dyn DiscordApi,
    application_id: i64,
    link: &Link,
) -> Option<WebhookCredentials> {
    if let (Some(id), Some(token)) = (link.webhook_id, link.webhook_token.clone()) {
        return Some(WebhookCredentials { id, token });
    }

    let channel_id = link.guild_channel_id;
    match discord.get_channel_webhooks(channel_id).await {
        Ok(webhooks) => {
            let owned = webhooks
                .into_iter()
                .find(|hook| hook.application_id == Some(application_id));
            if let Some(hook) = owned {
                if let Some(token) = hook.token {
                    return Some(WebhookCredentials { id: hook.id, token });
                }
            }
        }
        Err(e) => error!("get webhooks failed, channel {}: {}", channel_id, e),
    }

    match discord
        .create_webhook(channel_id, &channel_id.to_string())
        .await
    {
        Ok(hook) => {
            if let Some(token) = hook.token {
                return Some(WebhookCredentials { id: hook.id, token });
            }
            error!("created webhook without token, channel {}", channel_id);
        }
        Err(e) => error!("create webhook failed, channel {}: {}", channel_id, e),
    }
    None
}
