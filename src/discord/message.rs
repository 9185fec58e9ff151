use once_cell::sync::Lazy;
use regex::Regex;

/// One atomic unit of Discord message text after markup decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscordSegment {
    Text(String),
    MentionUser { user_id: i64 },
    MentionRole { role_id: i64 },
    MentionChannel { channel_id: i64 },
    MentionEveryone,
    CustomEmoji { id: i64, name: String, animated: bool },
    Timestamp { raw: String },
}

static MARKUP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"<@!?(?P<user>\d+)>|<@&(?P<role>\d+)>|<\#(?P<channel>\d+)>|<(?P<anim>a?):(?P<emoji_name>\w+):(?P<emoji_id>\d+)>|<(?P<ts>t:[^>]+)>|(?P<everyone>@everyone|@here)",
    )
    .expect("markup regex")
});

/// Decodes raw Discord message content into an ordered segment sequence.
/// Anything between recognized markup stays as literal text.
pub fn parse_content(content: &str) -> Vec<DiscordSegment> {
    let mut segments = Vec::new();
    let mut cursor = 0;

    for cap in MARKUP.captures_iter(content) {
        let whole = cap.get(0).expect("match 0 always present");
        if whole.start() > cursor {
            segments.push(DiscordSegment::Text(
                content[cursor..whole.start()].to_string(),
            ));
        }
        cursor = whole.end();

        if let Some(id) = cap.name("user") {
            if let Ok(user_id) = id.as_str().parse() {
                segments.push(DiscordSegment::MentionUser { user_id });
                continue;
            }
        } else if let Some(id) = cap.name("role") {
            if let Ok(role_id) = id.as_str().parse() {
                segments.push(DiscordSegment::MentionRole { role_id });
                continue;
            }
        } else if let Some(id) = cap.name("channel") {
            if let Ok(channel_id) = id.as_str().parse() {
                segments.push(DiscordSegment::MentionChannel { channel_id });
                continue;
            }
        } else if let Some(id) = cap.name("emoji_id") {
            if let Ok(emoji_id) = id.as_str().parse() {
                segments.push(DiscordSegment::CustomEmoji {
                    id: emoji_id,
                    name: cap
                        .name("emoji_name")
                        .map(|m| m.as_str().to_string())
                        .unwrap_or_default(),
                    animated: cap.name("anim").is_some_and(|m| !m.as_str().is_empty()),
                });
                continue;
            }
        } else if let Some(ts) = cap.name("ts") {
            segments.push(DiscordSegment::Timestamp {
                raw: format!("<{}>", ts.as_str()),
            });
            continue;
        } else if cap.name("everyone").is_some() {
            segments.push(DiscordSegment::MentionEveryone);
            continue;
        }

        // Numeric overflow in an id: keep the raw markup visible as text.
        segments.push(DiscordSegment::Text(whole.as_str().to_string()));
    }

    if cursor < content.len() {
        segments.push(DiscordSegment::Text(content[cursor..].to_string()));
    }

    segments
}
