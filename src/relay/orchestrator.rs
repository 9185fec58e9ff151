use std::sync::Arc;
use std::time::Duration;

use futures::Future;
use futures::future::join_all;
use tracing::{debug, warn};

use crate::discord::DiscordMessage;
use crate::error::Result;
use crate::qq::{QqSegment, RawSegment, encode_all};
use crate::relay::context::{RelayContext, ResolvedLink};
use crate::relay::delivery::{FileDelivery, save_to_cache};
use crate::relay::events::{GroupReply, GroupSender, InboundEvent};
use crate::relay::filter::{group_leading_text, is_mirrored_author, starts_with_command};
use crate::relay::suppressor::SuppressedId;
use crate::translate::{GroupSendPlan, translate_group_message, translate_guild_message};

const MAX_ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Where in its lifecycle an event is, for log lines only.
#[derive(Debug, Clone, Copy)]
enum RelayStage {
    FilteredOut,
    Translating,
    Sending,
    Persisting,
    Done,
}

/// Drives one event from filter to persisted correlation records. Handlers
/// run concurrently per event; failures are logged and scoped to the event.
pub struct Orchestrator {
    ctx: Arc<RelayContext>,
    retry_delay: Duration,
}

impl Orchestrator {
    pub fn new(ctx: Arc<RelayContext>) -> Self {
        Self {
            ctx,
            retry_delay: RETRY_DELAY,
        }
    }

    #[cfg(test)]
    fn without_retry_delay(ctx: Arc<RelayContext>) -> Self {
        Self {
            ctx,
            retry_delay: Duration::ZERO,
        }
    }

    pub async fn handle_event(&self, event: InboundEvent) {
        let outcome = match event {
            InboundEvent::GuildMessage { message, to_me } => {
                self.relay_guild_message(message, to_me).await
            }
            InboundEvent::GuildMessageDelete {
                channel_id,
                message_id,
                ..
            } => self.relay_guild_delete(channel_id, message_id).await,
            InboundEvent::GroupMessage {
                group_id,
                message_id,
                sender,
                segments,
                reply,
                to_me,
            } => {
                self.relay_group_message(group_id, message_id, sender, segments, reply, to_me)
                    .await
            }
            InboundEvent::GroupRecall {
                group_id,
                message_id,
            } => self.relay_group_recall(group_id, message_id).await,
        };
        if let Err(e) = outcome {
            warn!("relay failed: {}", e);
        }
    }

    async fn relay_guild_message(&self, mut message: DiscordMessage, to_me: bool) -> Result<()> {
        let ctx = &self.ctx;
        let Some(link) = ctx.link_for_channel(message.channel_id) else {
            debug!(
                "guild message {} stage={:?}: channel {} not linked",
                message.id,
                RelayStage::FilteredOut,
                message.channel_id
            );
            return Ok(());
        };
        if is_mirrored_author(&message) {
            debug!(
                "guild message {} stage={:?}: own mirror",
                message.id,
                RelayStage::FilteredOut
            );
            return Ok(());
        }
        if ctx.only_to_me && !to_me {
            debug!(
                "guild message {} stage={:?}: not addressed to us",
                message.id,
                RelayStage::FilteredOut
            );
            return Ok(());
        }
        if starts_with_command(ctx, &message.content) {
            debug!(
                "guild message {} stage={:?}: command prefix",
                message.id,
                RelayStage::FilteredOut
            );
            return Ok(());
        }

        if message.needs_fetch() {
            let fetched = ctx
                .discord
                .get_channel_message(message.channel_id, message.id)
                .await?;
            message.content = fetched.content;
            message.attachments = fetched.attachments;
            message.embeds = fetched.embeds;
            message.sticker_items = fetched.sticker_items;
        }

        debug!(
            "guild message {} stage={:?}",
            message.id,
            RelayStage::Translating
        );
        let plan = translate_guild_message(ctx, &message).await?;

        debug!("guild message {} stage={:?}", message.id, RelayStage::Sending);
        let sent_ids = self
            .with_retries("send to group", || self.deliver_group_plan(link, &plan))
            .await?;

        debug!(
            "guild message {} stage={:?}",
            message.id,
            RelayStage::Persisting
        );
        for qq_message_id in &sent_ids {
            self.with_retries("persist correlation", || {
                persist(ctx, message.id, *qq_message_id)
            })
            .await?;
        }

        debug!(
            "guild message {} stage={:?}: {} sends",
            message.id,
            RelayStage::Done,
            sent_ids.len()
        );
        Ok(())
    }

    /// Resolves the file delivery mode, sends every batch of the plan, and
    /// returns the group message ids created.
    async fn deliver_group_plan(
        &self,
        link: &ResolvedLink,
        plan: &GroupSendPlan,
    ) -> Result<Vec<i64>> {
        let ctx = &self.ctx;
        let mut batches = plan.batches.clone();
        let mut uploads: Vec<(String, String)> = Vec::new();

        if !plan.files.is_empty() {
            match FileDelivery::probe(&*ctx.qq).await? {
                FileDelivery::Inline => {
                    for file in &plan.files {
                        batches.push(vec![QqSegment::file_bytes(&file.name, &file.bytes)]);
                    }
                }
                FileDelivery::ByPath { needs_upload } => {
                    for file in &plan.files {
                        let path = save_to_cache(&ctx.cache_dir, &file.name, &file.bytes).await?;
                        if needs_upload {
                            uploads.push((path, file.name.clone()));
                        } else {
                            batches.push(vec![QqSegment::File {
                                file: path,
                                name: file.name.clone(),
                            }]);
                        }
                    }
                }
            }
        }

        let wire: Vec<Vec<RawSegment>> = batches.iter().map(|batch| encode_all(batch)).collect();
        let sends = join_all(
            wire.iter()
                .map(|message| ctx.qq.send_group_msg(link.group_id, message)),
        )
        .await;
        let ids = sends.into_iter().collect::<Result<Vec<i64>>>()?;

        let upload_results = join_all(
            uploads
                .iter()
                .map(|(path, name)| ctx.qq.upload_group_file(link.group_id, path, name)),
        )
        .await;
        upload_results.into_iter().collect::<Result<Vec<()>>>()?;

        Ok(ids)
    }

    async fn relay_group_message(
        &self,
        group_id: i64,
        message_id: i64,
        sender: GroupSender,
        segments: Vec<RawSegment>,
        reply: Option<GroupReply>,
        to_me: bool,
    ) -> Result<()> {
        let ctx = &self.ctx;
        let Some(link) = ctx.link_for_group(group_id) else {
            debug!(
                "group message {} stage={:?}: group {} not linked",
                message_id,
                RelayStage::FilteredOut,
                group_id
            );
            return Ok(());
        };
        if ctx.only_to_me && !to_me {
            debug!(
                "group message {} stage={:?}: not addressed to us",
                message_id,
                RelayStage::FilteredOut
            );
            return Ok(());
        }
        if starts_with_command(ctx, &group_leading_text(&segments)) {
            debug!(
                "group message {} stage={:?}: command prefix",
                message_id,
                RelayStage::FilteredOut
            );
            return Ok(());
        }
        let Some(webhook) = &link.webhook else {
            debug!(
                "group message {} stage={:?}: channel {} has no webhook",
                message_id,
                RelayStage::FilteredOut,
                link.guild_channel_id
            );
            return Ok(());
        };

        debug!(
            "group message {} stage={:?}",
            message_id,
            RelayStage::Translating
        );
        let message =
            translate_group_message(ctx, link, &sender, &segments, reply.as_ref()).await?;

        debug!("group message {} stage={:?}", message_id, RelayStage::Sending);
        let discord_message_id = self
            .with_retries("execute webhook", || {
                ctx.discord
                    .execute_webhook(webhook.id, &webhook.token, &message)
            })
            .await?;

        debug!(
            "group message {} stage={:?}",
            message_id,
            RelayStage::Persisting
        );
        self.with_retries("persist correlation", || {
            persist(ctx, discord_message_id, message_id)
        })
        .await?;

        debug!("group message {} stage={:?}", message_id, RelayStage::Done);
        Ok(())
    }

    async fn relay_guild_delete(&self, channel_id: i64, message_id: i64) -> Result<()> {
        let ctx = &self.ctx;
        if ctx.suppressor.consume(SuppressedId::Discord(message_id)) {
            debug!("guild delete {}: own echo, suppressed", message_id);
            return Ok(());
        }
        if ctx.link_for_channel(channel_id).is_none() {
            return Ok(());
        }

        let rows = ctx.store.get_by_discord_id(message_id).await?;
        for row in rows {
            // The platform echoes our delete; the marker has to be in place
            // before the call goes out.
            ctx.suppressor.mark(SuppressedId::Qq(row.qq_message_id));
            self.with_retries("delete group message", || ctx.qq.delete_msg(row.qq_message_id))
                .await?;
            self.with_retries("remove correlation", || unlink(ctx, row.id))
                .await?;
        }
        debug!("guild delete {} stage={:?}", message_id, RelayStage::Done);
        Ok(())
    }

    async fn relay_group_recall(&self, group_id: i64, message_id: i64) -> Result<()> {
        let ctx = &self.ctx;
        if ctx.suppressor.consume(SuppressedId::Qq(message_id)) {
            debug!("group recall {}: own echo, suppressed", message_id);
            return Ok(());
        }
        let Some(link) = ctx.link_for_group(group_id) else {
            return Ok(());
        };

        let rows = ctx.store.get_by_qq_id(message_id).await?;
        for row in rows {
            ctx.suppressor
                .mark(SuppressedId::Discord(row.discord_message_id));
            self.with_retries("delete guild message", || {
                ctx.discord
                    .delete_message(link.guild_channel_id, row.discord_message_id)
            })
            .await?;
            self.with_retries("remove correlation", || unlink(ctx, row.id))
                .await?;
        }
        debug!("group recall {} stage={:?}", message_id, RelayStage::Done);
        Ok(())
    }

    /// Fixed retry budget for transient failures: up to three attempts with
    /// a constant pause between them. Terminal errors pass straight through.
    async fn with_retries<T, F, Fut>(&self, what: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < MAX_ATTEMPTS => {
                    warn!("{} failed (attempt {}/{}): {}", what, attempt, MAX_ATTEMPTS, e);
                    tokio::time::sleep(self.retry_delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

async fn persist(ctx: &RelayContext, discord_message_id: i64, qq_message_id: i64) -> Result<()> {
    Ok(ctx.store.insert(discord_message_id, qq_message_id).await?)
}

async fn unlink(ctx: &RelayContext, row_id: i64) -> Result<()> {
    Ok(ctx.store.delete(row_id).await?)
}
