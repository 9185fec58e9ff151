use futures::future::join_all;

use crate::discord::{Embed, EmbedAuthor, EmbedMedia, FilePayload, WebhookMessage};
use crate::error::{RelayError, Result};
use crate::media::guess_filename;
use crate::qq::{QqSegment, RawSegment, face_name};
use crate::relay::context::{RelayContext, ResolvedLink};
use crate::relay::events::{GroupReply, GroupSender};
use crate::translate::lookup::{member_avatar, member_display};

/// Converts one group message into a webhook payload impersonating the QQ
/// sender: `"<name> [QQ:<id>]"` plus the qlogo avatar.
pub async fn translate_group_message(
    ctx: &RelayContext,
    link: &ResolvedLink,
    sender: &GroupSender,
    segments: &[RawSegment],
    reply: Option<&GroupReply>,
) -> Result<WebhookMessage> {
    let (content, file_specs, mut embeds) = build_parts(ctx, link, segments, false).await?;

    if let Some(reply) = reply {
        embeds.push(build_reply_embed(ctx, link, reply).await?);
    }

    let files = join_all(file_specs.iter().map(|spec| fetch_file(ctx, spec)))
        .await
        .into_iter()
        .collect::<Result<Vec<_>>>()?;

    Ok(WebhookMessage {
        content,
        username: Some(format!(
            "{} [QQ:{}]",
            sender.display_name(),
            sender.user_id
        )),
        avatar_url: Some(qq_avatar_url(sender.user_id)),
        embeds,
        files,
    })
}

struct FileSpec {
    name: String,
    url: String,
}

async fn fetch_file(ctx: &RelayContext, spec: &FileSpec) -> Result<FilePayload> {
    let bytes = ctx.media.fetch(&spec.url).await?;
    Ok(FilePayload {
        filename: guess_filename(&spec.name, &bytes),
        bytes,
    })
}

fn qq_avatar_url(user_id: i64) -> String {
    format!("https://q.qlogo.cn/g?b=qq&nk={user_id}&s=100")
}

fn market_face_url(face_id: &str) -> String {
    let prefix = face_id.get(..2).unwrap_or(face_id);
    format!("https://gxh.vip.qq.com/club/item/parcel/item/{prefix}/{face_id}/raw300.gif")
}

fn unsupported_text(segment: &QqSegment) -> String {
    let raw = segment.to_raw();
    format!("[不支持的消息类型](type: {}, data: {})", raw.kind, raw.data)
}

/// Last `n` characters; QQ image file ids are long and only the tail is
/// stable enough to use as a filename.
fn tail(s: &str, n: usize) -> String {
    let count = s.chars().count();
    if count <= n {
        s.to_string()
    } else {
        s.chars().skip(count - n).collect()
    }
}

async fn group_member_name(ctx: &RelayContext, group_id: i64, qq: &str) -> Result<String> {
    let user_id: i64 = qq
        .parse()
        .map_err(|_| RelayError::Unsupported(format!("bad at target: {qq}")))?;
    match ctx.qq.get_group_member_info(group_id, user_id).await {
        Ok(member) => Ok(member.display_name().to_string()),
        Err(RelayError::UnknownEntity(_)) => Ok("(error:未知用户)".to_string()),
        Err(e) => Err(e),
    }
}

/// Walks the segment list accumulating plain text, pending file downloads
/// and embeds. Media placeholders (`[图片]` etc.) only render when there is
/// surrounding text, or always in reply previews.
async fn build_parts(
    ctx: &RelayContext,
    link: &ResolvedLink,
    segments: &[RawSegment],
    reply_mode: bool,
) -> Result<(String, Vec<FileSpec>, Vec<Embed>)> {
    let mut text = String::new();
    let mut files = Vec::new();
    let mut embeds = Vec::new();

    for segment in QqSegment::decode_all(segments) {
        match segment {
            QqSegment::Text { text: piece } => {
                // Keep relayed text from pinging the whole channel.
                text.push_str(
                    &piece
                        .replace("@everyone", "@.everyone")
                        .replace("@here", "@.here"),
                );
            }
            QqSegment::Face { id } => match face_name(&id) {
                Some(name) => text.push_str(&format!("[{name}]")),
                None => text.push_str(&format!("[QQemojiID:{id}]")),
            },
            QqSegment::MFace {
                summary,
                url,
                emoji_id,
            } => match (summary, url) {
                (Some(summary), Some(url)) => {
                    if !text.is_empty() || reply_mode {
                        text.push_str(&summary);
                    }
                    files.push(FileSpec {
                        name: format!("{summary}.gif"),
                        url,
                    });
                }
                _ => {
                    if !text.is_empty() || reply_mode {
                        text.push_str("[动画表情]");
                    }
                    if let Some(id) = emoji_id {
                        files.push(FileSpec {
                            name: format!("{id}.gif"),
                            url: market_face_url(&id),
                        });
                    }
                }
            },
            QqSegment::MarketFace { summary, face_id } => {
                if !text.is_empty() || reply_mode {
                    text.push_str(&summary);
                }
                files.push(FileSpec {
                    name: format!("{summary}.gif"),
                    url: market_face_url(&face_id),
                });
            }
            QqSegment::At { qq, name } => {
                if qq == "0" || qq == "all" {
                    text.push_str("@everyone");
                } else {
                    let shown = match name {
                        Some(name) => name,
                        None => format!(
                            "@{}",
                            group_member_name(ctx, link.group_id, &qq).await?
                        ),
                    };
                    text.push_str(&format!("{shown}[QQ:{qq}] "));
                }
            }
            QqSegment::Image { file, url } => {
                if !text.is_empty() || reply_mode {
                    text.push_str("[图片]");
                }
                if let Some(url) = url {
                    files.push(FileSpec {
                        name: tail(&file, 40),
                        url,
                    });
                }
            }
            QqSegment::Record { .. } => {
                if !text.is_empty() || reply_mode {
                    text.push_str("[语音]");
                }
            }
            QqSegment::Video { .. } => {
                if !text.is_empty() || reply_mode {
                    text.push_str("[视频]");
                }
            }
            QqSegment::Share {
                title,
                url,
                content,
                image,
            } => {
                embeds.push(Embed {
                    title: Some(title),
                    url: Some(url),
                    description: content,
                    image: image.map(|url| EmbedMedia {
                        url,
                        proxy_url: None,
                    }),
                    ..Default::default()
                });
            }
            QqSegment::Contact { kind, id } => {
                let label = if kind == "qq" { "好友" } else { "群" };
                text.push_str(&format!("推荐{label}：{id}"));
            }
            QqSegment::Location {
                lat,
                lon,
                title,
                content,
            } => {
                text.push_str(&format!("[位置共享](lat:{lat}, lon: {lon})"));
                embeds.push(Embed {
                    title,
                    description: content,
                    ..Default::default()
                });
            }
            QqSegment::Music => text.push_str("[音乐分享]"),
            QqSegment::Forward => {
                if text.is_empty() {
                    text.push_str("[合并转发]");
                }
            }
            QqSegment::Xml { data } => text.push_str(&format!("[xml 消息]({data})")),
            QqSegment::Json { data } => text.push_str(&format!("[json 消息]({data})")),
            // The reply, if any, arrives pre-split on the event.
            QqSegment::Reply { .. } => {}
            segment @ (QqSegment::File { .. }
            | QqSegment::Rps
            | QqSegment::Dice
            | QqSegment::Unsupported { .. }) => {
                text.push_str(&unsupported_text(&segment));
            }
        }
    }

    Ok((text, files, embeds))
}

/// Renders the quoted message as an embed. When the quoted message is one
/// the relay itself mirrored from Discord, the embed points back at the
/// original author and message; otherwise it carries the QQ sender and a
/// jump link if the correlation store knows the Discord counterpart.
async fn build_reply_embed(
    ctx: &RelayContext,
    link: &ResolvedLink,
    reply: &GroupReply,
) -> Result<Embed> {
    let (mut plaintext, _, _) = build_parts(ctx, link, &reply.segments, true).await?;
    let mut timestamp = format!("<t:{}:R>", reply.time);
    let mut author: Option<EmbedAuthor> = None;

    let rows = ctx.store.get_by_qq_id(reply.message_id).await?;
    let description = if let Some(row) = rows.first() {
        let reference_id = row.discord_message_id;
        if reply.sender.user_id == ctx.qq_self_id {
            let dc_message = ctx
                .discord
                .get_channel_message(link.guild_channel_id, reference_id)
                .await?;
            let (name, username) =
                member_display(&*ctx.discord, link.guild_id, dc_message.author.id).await?;
            author = Some(EmbedAuthor {
                name: format!("{name}(@{username})"),
                url: None,
                icon_url: Some(
                    member_avatar(&*ctx.discord, link.guild_id, dc_message.author.id).await?,
                ),
            });
            plaintext = dc_message.content.clone();
            timestamp = format!("<t:{}:R>", dc_message.timestamp.timestamp());
        }
        format!(
            "{plaintext}\n\n{timestamp}[[ ↑ ]](https://discord.com/channels/{}/{}/{reference_id})",
            link.guild_id, link.guild_channel_id
        )
    } else {
        format!("{plaintext}\n\n{timestamp}[ ? ]")
    };

    let author = author.unwrap_or_else(|| EmbedAuthor {
        name: format!("{}[QQ:{}]", reply.sender.display_name(), reply.sender.user_id),
        url: None,
        icon_url: Some(qq_avatar_url(reply.sender.user_id)),
    });

    Ok(Embed {
        author: Some(author),
        description: Some(description),
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use test_case::test_case;

    use super::translate_group_message;
    use crate::qq::{GroupMemberInfo, RawSegment};
    use crate::relay::events::{GroupReply, GroupSender};
    use crate::testing::{FakeDiscord, FakeMedia, FakeOneBot, MemoryStore, context_with};

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\nrest";

    fn raw(kind: &str, data: serde_json::Value) -> RawSegment {
        RawSegment {
            kind: kind.to_string(),
            data,
        }
    }

    fn sender() -> GroupSender {
        GroupSender {
            user_id: 777,
            nickname: "小明".into(),
            card: None,
        }
    }

    #[tokio::test]
    async fn text_mention_and_image_render_with_placeholders() {
        let ctx = context_with(
            Arc::new(FakeDiscord::default()),
            Arc::new(FakeOneBot::default()),
            Arc::new(MemoryStore::default()),
            Arc::new(FakeMedia::returning(PNG)),
        );
        let link = ctx.links[0].clone();
        let segments = vec![
            raw("text", json!({ "text": "hello " })),
            raw("at", json!({ "qq": "888", "name": "Bob" })),
            raw("image", json!({ "file": "ABCDEF.png", "url": "https://img.example/1" })),
        ];

        let message = translate_group_message(&ctx, &link, &sender(), &segments, None)
            .await
            .expect("translate");
        assert_eq!(message.content, "hello Bob[QQ:888] [图片]");
        assert_eq!(message.files.len(), 1);
        assert_eq!(message.files[0].filename, "ABCDEF.png");
        assert_eq!(message.username.as_deref(), Some("小明 [QQ:777]"));
        assert_eq!(
            message.avatar_url.as_deref(),
            Some("https://q.qlogo.cn/g?b=qq&nk=777&s=100")
        );
    }

    #[tokio::test]
    async fn everyone_mentions_are_defanged() {
        let ctx = context_with(
            Arc::new(FakeDiscord::default()),
            Arc::new(FakeOneBot::default()),
            Arc::new(MemoryStore::default()),
            Arc::new(FakeMedia::default()),
        );
        let link = ctx.links[0].clone();
        let segments = vec![raw("text", json!({ "text": "@everyone @here hi" }))];

        let message = translate_group_message(&ctx, &link, &sender(), &segments, None)
            .await
            .expect("translate");
        assert_eq!(message.content, "@.everyone @.here hi");
    }

    #[tokio::test]
    async fn face_uses_name_table_with_id_fallback() {
        let ctx = context_with(
            Arc::new(FakeDiscord::default()),
            Arc::new(FakeOneBot::default()),
            Arc::new(MemoryStore::default()),
            Arc::new(FakeMedia::default()),
        );
        let link = ctx.links[0].clone();
        let segments = vec![
            raw("face", json!({ "id": "5" })),
            raw("face", json!({ "id": "99999" })),
        ];

        let message = translate_group_message(&ctx, &link, &sender(), &segments, None)
            .await
            .expect("translate");
        assert_eq!(message.content, "[流泪][QQemojiID:99999]");
    }

    #[tokio::test]
    async fn bare_mention_resolves_the_group_card() {
        let qq = Arc::new(FakeOneBot::default());
        qq.members.lock().insert(
            (30, 888),
            GroupMemberInfo {
                user_id: 888,
                nickname: "bob".into(),
                card: Some("Bobby".into()),
            },
        );
        let ctx = context_with(
            Arc::new(FakeDiscord::default()),
            qq,
            Arc::new(MemoryStore::default()),
            Arc::new(FakeMedia::default()),
        );
        let link = ctx.links[0].clone();
        let segments = vec![raw("at", json!({ "qq": "888" }))];

        let message = translate_group_message(&ctx, &link, &sender(), &segments, None)
            .await
            .expect("translate");
        assert_eq!(message.content, "@Bobby[QQ:888] ");
    }

    #[tokio::test]
    async fn known_reply_gets_jump_link() {
        let store = Arc::new(MemoryStore::default());
        store.seed(500, 600).await;
        let ctx = context_with(
            Arc::new(FakeDiscord::default()),
            Arc::new(FakeOneBot::default()),
            store,
            Arc::new(FakeMedia::default()),
        );
        let link = ctx.links[0].clone();
        let reply = GroupReply {
            message_id: 600,
            time: 1_700_000_000,
            sender: sender(),
            segments: vec![raw("text", json!({ "text": "earlier" }))],
        };

        let message = translate_group_message(
            &ctx,
            &link,
            &sender(),
            &[raw("text", json!({ "text": "yes" }))],
            Some(&reply),
        )
        .await
        .expect("translate");
        let embed = message.embeds.last().expect("reply embed");
        let description = embed.description.as_deref().expect("description");
        assert!(description.contains("earlier"));
        assert!(description.contains(&format!(
            "[[ ↑ ]](https://discord.com/channels/{}/{}/500)",
            link.guild_id, link.guild_channel_id
        )));
        assert_eq!(
            embed.author.as_ref().map(|a| a.name.as_str()),
            Some("小明[QQ:777]")
        );
    }

    #[tokio::test]
    async fn unknown_reply_marks_question() {
        let ctx = context_with(
            Arc::new(FakeDiscord::default()),
            Arc::new(FakeOneBot::default()),
            Arc::new(MemoryStore::default()),
            Arc::new(FakeMedia::default()),
        );
        let link = ctx.links[0].clone();
        let reply = GroupReply {
            message_id: 601,
            time: 1_700_000_000,
            sender: sender(),
            segments: vec![raw("text", json!({ "text": "gone" }))],
        };

        let message = translate_group_message(&ctx, &link, &sender(), &[], Some(&reply))
            .await
            .expect("translate");
        let description = message.embeds[0].description.as_deref().expect("description");
        assert!(description.ends_with("<t:1700000000:R>[ ? ]"));
    }

    #[test_case("record", json!({ "file": "x.silk" }), "[语音]")]
    #[test_case("video", json!({ "file": "x.mp4" }), "[视频]")]
    #[test_case("music", json!({}), "[音乐分享]")]
    #[test_case("rps", json!({}), "[不支持的消息类型]")]
    #[test_case("dice", json!({}), "[不支持的消息类型]")]
    #[test_case("xml", json!({ "data": "<x/>" }), "[xml 消息]")]
    #[test_case("json", json!({ "data": "{}" }), "[json 消息]")]
    #[test_case("hologram", json!({ "x": 1 }), "[不支持的消息类型]")]
    #[tokio::test]
    async fn no_segment_kind_vanishes(kind: &str, data: serde_json::Value, marker: &str) {
        let ctx = context_with(
            Arc::new(FakeDiscord::default()),
            Arc::new(FakeOneBot::default()),
            Arc::new(MemoryStore::default()),
            Arc::new(FakeMedia::default()),
        );
        let link = ctx.links[0].clone();
        let segments = vec![
            raw("text", json!({ "text": "x " })),
            raw(kind, data),
        ];

        let message = translate_group_message(&ctx, &link, &sender(), &segments, None)
            .await
            .expect("translate");
        assert!(
            message.content.contains(marker),
            "content {:?} misses {marker}",
            message.content
        );
    }
}
