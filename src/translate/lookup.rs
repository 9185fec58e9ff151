use crate::discord::DiscordApi;
use crate::error::{RelayError, Result};

/// Resolves a guild member to `(display name, username)`.
///
/// Missing users render as a visible placeholder instead of failing the
/// message. When the guild itself is unknown (the member left, or the
/// lookup crosses guilds through a forward) the plain user profile is the
/// next best source.
pub async fn member_display(
    discord: &dyn DiscordApi,
    guild_id: i64,
    user_id: i64,
) -> Result<(String, String)> {
    match discord.get_guild_member(guild_id, user_id).await {
        Ok(member) => {
            let username = member
                .user
                .as_ref()
                .map(|user| user.username.clone())
                .unwrap_or_default();
            if let Some(nick) = member.nick.filter(|nick| !nick.is_empty()) {
                Ok((nick, username))
            } else if let Some(global_name) = member
                .user
                .as_ref()
                .and_then(|user| user.global_name.clone())
                .filter(|name| !name.is_empty())
            {
                Ok((global_name, username))
            } else {
                Ok((String::new(), user_id.to_string()))
            }
        }
        Err(RelayError::UnknownEntity(detail)) if detail == "Unknown User" => {
            Ok(("(error:未知用户)".to_string(), user_id.to_string()))
        }
        Err(RelayError::UnknownEntity(detail)) if detail == "Unknown Guild" => {
            let user = discord.get_user(user_id).await?;
            Ok((user.global_name.unwrap_or_default(), user.username))
        }
        Err(e) => Err(e),
    }
}

/// CDN URL for a member's avatar: the guild-specific one first, then the
/// account avatar, then empty.
pub async fn member_avatar(
    discord: &dyn DiscordApi,
    guild_id: i64,
    user_id: i64,
) -> Result<String> {
    let member = discord.get_guild_member(guild_id, user_id).await?;
    if let Some(avatar) = member.avatar.filter(|a| !a.is_empty()) {
        return Ok(format!(
            "https://cdn.discordapp.com/guilds/{guild_id}/users/{user_id}/avatars/{avatar}.{}",
            animated_ext(&avatar)
        ));
    }
    if let Some(avatar) = member
        .user
        .and_then(|user| user.avatar)
        .filter(|a| !a.is_empty())
    {
        return Ok(format!(
            "https://cdn.discordapp.com/avatars/{user_id}/{avatar}.{}",
            animated_ext(&avatar)
        ));
    }
    Ok(String::new())
}

fn animated_ext(avatar_hash: &str) -> &'static str {
    if avatar_hash.starts_with("a_") {
        "gif"
    } else {
        "webp"
    }
}

#[cfg(test)]
mod tests {
    use super::animated_ext;

    #[test]
    fn animated_hashes_get_gif() {
        assert_eq!(animated_ext("a_deadbeef"), "gif");
        assert_eq!(animated_ext("deadbeef"), "webp");
    }
}
