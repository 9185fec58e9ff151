use once_cell::sync::Lazy;
use regex::Regex;

use crate::discord::DiscordMessage;
use crate::qq::{QqSegment, RawSegment};
use crate::relay::context::RelayContext;

/// Mirrored QQ senders are posted through webhooks whose username carries a
/// `[QQ:<id>]` suffix. Matching that plus the bot flag keeps our own output
/// from echoing back into the group.
static MIRRORED_USERNAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r".*?\[QQ:\d*?\]$").expect("mirrored username regex"));

pub fn is_mirrored_author(message: &DiscordMessage) -> bool {
    message.author.bot && MIRRORED_USERNAME.is_match(&message.author.username)
}

/// Command prefixes configured in `unmatch_beginning` drop the message
/// before translation.
pub fn starts_with_command(ctx: &RelayContext, text: &str) -> bool {
    ctx.unmatch_beginning
        .iter()
        .any(|prefix| !prefix.is_empty() && text.starts_with(prefix.as_str()))
}

/// Leading text of a group message, for the command-prefix check.
pub fn group_leading_text(segments: &[RawSegment]) -> String {
    match segments.first().map(QqSegment::from_raw) {
        Some(QqSegment::Text { text }) => text,
        _ => String::new(),
    }
}
