use chrono::{DateTime, Duration, Utc};
use futures::future::{BoxFuture, join_all};

use crate::discord::{
    DiscordAttachment, DiscordMessage, DiscordSegment, Embed, MessageSnapshot, StickerItem,
    parse_content,
};
use crate::error::{RelayError, Result};
use crate::qq::QqSegment;
use crate::relay::context::RelayContext;
use crate::translate::lookup::member_display;

/// A non-segment payload that must be delivered as a group file.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Translated Discord message, already grouped the way OneBot wants it:
/// one combinable batch, one batch per video, files delivered separately.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupSendPlan {
    pub batches: Vec<Vec<QqSegment>>,
    pub files: Vec<OutgoingFile>,
}

enum Converted {
    Segments(Vec<QqSegment>),
    File(OutgoingFile),
    Nothing,
}

/// Converts one guild message into a group send plan. Every unit (content
/// markup, attachment, sticker, reply, forward snapshot) converts
/// concurrently; results are joined back in message order.
pub async fn translate_guild_message(
    ctx: &RelayContext,
    message: &DiscordMessage,
) -> Result<GroupSendPlan> {
    let mut tasks: Vec<BoxFuture<'_, Result<Converted>>> = Vec::new();

    let header = sender_header(message);
    tasks.push(Box::pin(async move {
        Ok(Converted::Segments(vec![QqSegment::text(header)]))
    }));

    let guild_id = message.guild_id.unwrap_or_default();
    for segment in parse_content(&message.content) {
        tasks.push(Box::pin(convert_content_segment(ctx, guild_id, segment)));
    }
    for embed in &message.embeds {
        tasks.push(Box::pin(convert_embed(ctx, embed)));
    }
    for attachment in &message.attachments {
        tasks.push(Box::pin(convert_attachment(ctx, attachment)));
    }
    for sticker in &message.sticker_items {
        tasks.push(Box::pin(convert_sticker(ctx, sticker)));
    }
    if let Some(referenced) = &message.referenced_message {
        tasks.push(Box::pin(convert_reference(ctx, referenced.id)));
    }
    if let Some(snapshot) = message.message_snapshots.first() {
        push_snapshot_tasks(ctx, message, snapshot, &mut tasks);
    }

    let mut segments = Vec::new();
    let mut files = Vec::new();
    for converted in join_all(tasks).await {
        match converted? {
            Converted::Segments(more) => segments.extend(more),
            Converted::File(file) => files.push(file),
            Converted::Nothing => {}
        }
    }
    Ok(split_for_send(segments, files))
}

fn sender_header(message: &DiscordMessage) -> String {
    format!(
        "{}(@{}):\n\n",
        message.display_name(),
        message.author.username
    )
}

async fn convert_content_segment(
    ctx: &RelayContext,
    guild_id: i64,
    segment: DiscordSegment,
) -> Result<Converted> {
    let converted = match segment {
        DiscordSegment::Text(text) => Converted::Segments(vec![QqSegment::text(text)]),
        DiscordSegment::MentionUser { user_id } => {
            let (nick, username) = member_display(&*ctx.discord, guild_id, user_id).await?;
            Converted::Segments(vec![QqSegment::text(format!("@{nick}({username})"))])
        }
        DiscordSegment::MentionRole { role_id } => {
            let name = match ctx.discord.get_guild_role(guild_id, role_id).await {
                Ok(role) => role.name,
                Err(RelayError::UnknownEntity(_)) => "(error:未知身份组)".to_string(),
                Err(e) => return Err(e),
            };
            Converted::Segments(vec![QqSegment::text(format!("@{name}"))])
        }
        DiscordSegment::MentionChannel { channel_id } => {
            let name = match ctx.discord.get_channel(channel_id).await {
                Ok(channel) => channel
                    .name
                    .filter(|name| !name.is_empty())
                    .unwrap_or_else(|| "(error:未知频道)".to_string()),
                Err(RelayError::UnknownEntity(_)) => "(error:未知频道)".to_string(),
                Err(e) => return Err(e),
            };
            Converted::Segments(vec![QqSegment::text(format!("#{name}"))])
        }
        DiscordSegment::MentionEveryone => Converted::Segments(vec![QqSegment::at_all()]),
        DiscordSegment::CustomEmoji { id, animated, .. } => {
            let ext = if animated { "gif" } else { "webp" };
            let url = format!("https://cdn.discordapp.com/emojis/{id}.{ext}");
            let bytes = ctx.media.fetch(&url).await?;
            Converted::Segments(vec![QqSegment::image_bytes(&bytes)])
        }
        DiscordSegment::Timestamp { raw } => Converted::Segments(vec![QqSegment::text(raw)]),
    };
    Ok(converted)
}

async fn convert_attachment(
    ctx: &RelayContext,
    attachment: &DiscordAttachment,
) -> Result<Converted> {
    let content_type = attachment.content_type.as_deref().unwrap_or("");
    let bytes = ctx.media.fetch(&attachment.url).await?;

    if content_type.contains("image") {
        return Ok(Converted::Segments(vec![QqSegment::image_bytes(&bytes)]));
    }
    if content_type.contains("video") {
        return Ok(Converted::Segments(vec![QqSegment::video_bytes(&bytes)]));
    }
    if content_type.contains("audio") && attachment.duration_secs.is_some() {
        match ctx.transcoder.transcode(&bytes).await {
            Ok(audio) => return Ok(Converted::Segments(vec![QqSegment::record_bytes(&audio)])),
            // No codec for this container: degrade to a plain file.
            Err(RelayError::Unsupported(_)) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(Converted::File(OutgoingFile {
        name: attachment.filename.clone(),
        bytes,
    }))
}

async fn convert_sticker(ctx: &RelayContext, sticker: &StickerItem) -> Result<Converted> {
    let url = format!("https://cdn.discordapp.com/stickers/{}.png", sticker.id);
    // Lottie stickers have no raster render; fall back to a name tag.
    match ctx.media.fetch(&url).await {
        Ok(bytes) => Ok(Converted::Segments(vec![QqSegment::image_bytes(&bytes)])),
        Err(_) => Ok(Converted::Segments(vec![QqSegment::text(format!(
            "[{}]",
            sticker.name
        ))])),
    }
}

async fn convert_reference(ctx: &RelayContext, referenced_id: i64) -> Result<Converted> {
    let rows = ctx.store.get_by_discord_id(referenced_id).await?;
    Ok(match rows.first() {
        Some(row) => Converted::Segments(vec![QqSegment::reply(row.qq_message_id)]),
        None => Converted::Nothing,
    })
}

async fn convert_embed(ctx: &RelayContext, embed: &Embed) -> Result<Converted> {
    // U+E0020 after a closing paren keeps QQ from linkifying the URL.
    const TAG: char = '\u{E0020}';
    let mut segments = Vec::new();

    if let Some(author) = &embed.author {
        let mut line = author.name.clone();
        if let Some(url) = &author.url {
            line.push_str(&format!("({url}{TAG})"));
        }
        segments.push(QqSegment::text(format!("{line}:\n")));
    }
    if let Some(title) = &embed.title {
        let mut line = title.clone();
        if let Some(url) = &embed.url {
            line.push_str(&format!("({url}{TAG})"));
        }
        segments.push(QqSegment::text(format!("{line}\n")));
    }
    if let Some(thumbnail) = &embed.thumbnail {
        segments.push(QqSegment::text(format!("{}\n", thumbnail.url)));
    }
    if let Some(description) = &embed.description {
        let defanged = description.replace(')', &format!("{TAG})"));
        segments.push(QqSegment::text(format!("{defanged}\n")));
    }
    for field in &embed.fields {
        segments.push(QqSegment::text(format!("{}\n{}\n", field.name, field.value)));
    }
    if let Some(image) = &embed.image {
        let bytes = ctx.media.fetch(&image.url).await?;
        segments.push(QqSegment::image_bytes(&bytes));
        segments.push(QqSegment::text("\n"));
    }
    if let Some(video) = &embed.video {
        let url = video.proxy_url.as_deref().unwrap_or(&video.url);
        let bytes = ctx.media.fetch(url).await?;
        segments.push(QqSegment::video_bytes(&bytes));
    }
    Ok(Converted::Segments(segments))
}

fn push_snapshot_tasks<'a>(
    ctx: &'a RelayContext,
    message: &'a DiscordMessage,
    snapshot: &'a MessageSnapshot,
    tasks: &mut Vec<BoxFuture<'a, Result<Converted>>>,
) {
    tasks.push(Box::pin(async {
        Ok(Converted::Segments(vec![QqSegment::text("↱ 已转发：\n")]))
    }));

    // Forwards can cross guilds; the reference carries the source guild.
    let snapshot_guild = message
        .message_reference
        .as_ref()
        .and_then(|reference| reference.guild_id)
        .or(message.guild_id)
        .unwrap_or_default();

    for segment in parse_content(&snapshot.content) {
        tasks.push(Box::pin(convert_content_segment(
            ctx,
            snapshot_guild,
            segment,
        )));
    }
    for embed in &snapshot.embeds {
        tasks.push(Box::pin(convert_embed(ctx, embed)));
    }
    for attachment in &snapshot.attachments {
        tasks.push(Box::pin(convert_attachment(ctx, attachment)));
    }
    for sticker in &snapshot.sticker_items {
        tasks.push(Box::pin(convert_sticker(ctx, sticker)));
    }

    let timestamp = snapshot.timestamp.unwrap_or(message.timestamp);
    tasks.push(Box::pin(snapshot_footer(ctx, snapshot_guild, timestamp)));
}

async fn snapshot_footer(
    ctx: &RelayContext,
    guild_id: i64,
    timestamp: DateTime<Utc>,
) -> Result<Converted> {
    let guild_name = match ctx.discord.get_guild_preview(guild_id).await {
        Ok(preview) => format!("{} ", preview.name),
        Err(RelayError::UnknownEntity(_)) => String::new(),
        Err(e) => return Err(e),
    };
    // Group readers live in UTC+8.
    let local = timestamp + Duration::hours(8);
    Ok(Converted::Segments(vec![QqSegment::text(format!(
        "\n{guild_name}{}",
        local.format("%Y/%m/%d %H:%M")
    ))]))
}

/// Regroups flat segments for OneBot delivery: text, images, replies,
/// records and mentions combine into one message; each video must go out
/// alone.
fn split_for_send(segments: Vec<QqSegment>, files: Vec<OutgoingFile>) -> GroupSendPlan {
    let mut combinable = Vec::new();
    let mut videos = Vec::new();
    for segment in segments {
        match segment {
            QqSegment::Video { .. } => videos.push(vec![segment]),
            QqSegment::Text { .. }
            | QqSegment::Image { .. }
            | QqSegment::Reply { .. }
            | QqSegment::Record { .. }
            | QqSegment::At { .. } => combinable.push(segment),
            _ => {}
        }
    }

    let mut batches = Vec::new();
    if !combinable.is_empty() {
        batches.push(combinable);
    }
    batches.extend(videos);
    GroupSendPlan { batches, files }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};

    use super::{split_for_send, translate_guild_message};
    use crate::qq::QqSegment;
    use crate::testing::{
        FakeDiscord, FakeMedia, FakeOneBot, MemoryStore, context_with, guild_message,
    };

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\nrest";

    #[tokio::test]
    async fn header_precedes_content() {
        let ctx = context_with(
            Arc::new(FakeDiscord::default()),
            Arc::new(FakeOneBot::default()),
            Arc::new(MemoryStore::default()),
            Arc::new(FakeMedia::default()),
        );
        let message = guild_message(1, "hi there");

        let plan = translate_guild_message(&ctx, &message).await.expect("plan");
        assert_eq!(plan.batches.len(), 1);
        assert_eq!(
            plan.batches[0][0],
            QqSegment::text("Alice(@alice):\n\n")
        );
        assert_eq!(plan.batches[0][1], QqSegment::text("hi there"));
        assert!(plan.files.is_empty());
    }

    #[tokio::test]
    async fn unknown_mention_renders_placeholder() {
        let ctx = context_with(
            Arc::new(FakeDiscord::default()),
            Arc::new(FakeOneBot::default()),
            Arc::new(MemoryStore::default()),
            Arc::new(FakeMedia::default()),
        );
        let message = guild_message(1, "ping <@999>");

        let plan = translate_guild_message(&ctx, &message).await.expect("plan");
        assert_eq!(
            plan.batches[0][2],
            QqSegment::text("@(error:未知用户)(999)")
        );
    }

    #[tokio::test]
    async fn attachments_split_into_batches_and_files() {
        let media = Arc::new(FakeMedia::returning(PNG));
        let ctx = context_with(
            Arc::new(FakeDiscord::default()),
            Arc::new(FakeOneBot::default()),
            Arc::new(MemoryStore::default()),
            media,
        );
        let mut message = guild_message(1, "look");
        message.attachments = vec![
            attachment("a.png", "image/png"),
            attachment("b.mp4", "video/mp4"),
            attachment("notes.pdf", "application/pdf"),
        ];

        let plan = translate_guild_message(&ctx, &message).await.expect("plan");
        // Batch 0 carries header, text and the image; the video rides alone.
        assert_eq!(plan.batches.len(), 2);
        assert!(matches!(plan.batches[0][2], QqSegment::Image { .. }));
        assert!(matches!(plan.batches[1][0], QqSegment::Video { .. }));
        assert_eq!(plan.files.len(), 1);
        assert_eq!(plan.files[0].name, "notes.pdf");
    }

    #[tokio::test]
    async fn known_reference_becomes_reply_segment() {
        let store = Arc::new(MemoryStore::default());
        store.seed(400, 500).await;
        let ctx = context_with(
            Arc::new(FakeDiscord::default()),
            Arc::new(FakeOneBot::default()),
            store,
            Arc::new(FakeMedia::default()),
        );
        let mut message = guild_message(1, "agree");
        message.referenced_message = Some(Box::new(guild_message(400, "original")));

        let plan = translate_guild_message(&ctx, &message).await.expect("plan");
        assert!(plan.batches[0].contains(&QqSegment::reply(500)));
    }

    #[tokio::test]
    async fn snapshot_gets_marker_and_footer() {
        let discord = Arc::new(FakeDiscord::default());
        // The message under test lives in guild 10.
        discord.add_guild(10, "My Guild");
        let ctx = context_with(
            discord,
            Arc::new(FakeOneBot::default()),
            Arc::new(MemoryStore::default()),
            Arc::new(FakeMedia::default()),
        );
        let mut message = guild_message(1, "");
        message.message_snapshots = vec![crate::discord::MessageSnapshot {
            content: "forwarded words".into(),
            timestamp: Some(Utc.with_ymd_and_hms(2024, 5, 1, 4, 0, 0).unwrap()),
            ..Default::default()
        }];

        let plan = translate_guild_message(&ctx, &message).await.expect("plan");
        let batch = &plan.batches[0];
        assert!(batch.contains(&QqSegment::text("↱ 已转发：\n")));
        assert!(batch.contains(&QqSegment::text("forwarded words")));
        // 04:00 UTC is noon in UTC+8.
        assert!(batch.contains(&QqSegment::text("\nMy Guild 2024/05/01 12:00")));
    }

    #[test]
    fn each_video_is_its_own_batch() {
        let plan = split_for_send(
            vec![
                QqSegment::text("a"),
                QqSegment::Video { file: "v1".into() },
                QqSegment::text("b"),
                QqSegment::Video { file: "v2".into() },
            ],
            Vec::new(),
        );
        assert_eq!(plan.batches.len(), 3);
        assert_eq!(plan.batches[0].len(), 2);
    }

    fn attachment(name: &str, content_type: &str) -> crate::discord::DiscordAttachment {
        crate::discord::DiscordAttachment {
            filename: name.into(),
            url: format!("https://cdn.example/{name}"),
            content_type: Some(content_type.into()),
            duration_secs: None,
        }
    }
}
