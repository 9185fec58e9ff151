use crate::discord::DiscordMessage;
use crate::qq::RawSegment;

#[derive(Debug, Clone)]
pub struct GroupSender {
    pub user_id: i64,
    pub nickname: String,
    pub card: Option<String>,
}

impl GroupSender {
    pub fn display_name(&self) -> &str {
        match self.card.as_deref() {
            Some(card) if !card.is_empty() => card,
            _ => &self.nickname,
        }
    }
}

/// Quoted message attached to a group message, already split off from the
/// segment list by the gateway adapter.
#[derive(Debug, Clone)]
pub struct GroupReply {
    pub message_id: i64,
    /// Unix seconds of the quoted message.
    pub time: i64,
    pub sender: GroupSender,
    pub segments: Vec<RawSegment>,
}

/// One platform event handed to the relay by a gateway adapter.
#[derive(Debug, Clone)]
pub enum InboundEvent {
    GuildMessage {
        message: DiscordMessage,
        to_me: bool,
    },
    GuildMessageDelete {
        guild_id: i64,
        channel_id: i64,
        message_id: i64,
    },
    GroupMessage {
        group_id: i64,
        message_id: i64,
        sender: GroupSender,
        segments: Vec<RawSegment>,
        reply: Option<GroupReply>,
        to_me: bool,
    },
    GroupRecall {
        group_id: i64,
        message_id: i64,
    },
}
