pub use self::api::DiscordApi;
pub use self::message::{DiscordSegment, parse_content};
pub use self::model::{
    DiscordAttachment, DiscordChannel, DiscordMember, DiscordMessage, DiscordRole, DiscordUser,
    Embed, EmbedAuthor, EmbedField, EmbedMedia, FilePayload, GuildPreview, MessageReference,
    MessageSnapshot, StickerItem, Webhook, WebhookMessage,
};
pub use self::rest::DiscordRestClient;

pub mod api;
pub mod message;
pub mod model;
pub mod rest;
