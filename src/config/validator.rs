use std::collections::HashSet;

use thiserror::Error;
use url::Url;

use super::Config;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    Io(String, String),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

impl Config {
    /// Link lookups must be unambiguous in both directions, so duplicate
    /// guild channels or groups across links are rejected at load time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut channels = HashSet::new();
        let mut groups = HashSet::new();

        for link in &self.links {
            if !channels.insert(link.guild_channel_id) {
                return Err(ConfigError::Invalid(format!(
                    "guild channel {} appears in more than one link",
                    link.guild_channel_id
                )));
            }
            if !groups.insert(link.group_id) {
                return Err(ConfigError::Invalid(format!(
                    "group {} appears in more than one link",
                    link.group_id
                )));
            }
            if link.webhook_id.is_some() != link.webhook_token.is_some() {
                return Err(ConfigError::Invalid(format!(
                    "link for channel {} has a partial webhook credential",
                    link.guild_channel_id
                )));
            }
        }

        if self.discord.bot_token.is_empty() {
            return Err(ConfigError::Invalid("discord.bot_token is empty".into()));
        }

        Url::parse(&self.onebot.api_url)
            .map_err(|e| ConfigError::Invalid(format!("onebot.api_url: {e}")))?;
        if let Some(proxy) = &self.discord.proxy {
            Url::parse(proxy).map_err(|e| ConfigError::Invalid(format!("discord.proxy: {e}")))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{Config, ConfigError};

    fn base_config(links_yaml: &str) -> Config {
        let yaml = format!(
            r#"
{links_yaml}
discord:
  bot_token: "t"
  application_id: 1
onebot:
  api_url: "http://localhost:3000"
database:
  filename: "relay.db"
"#
        );
        serde_yaml::from_str(&yaml).expect("parse")
    }

    #[test]
    fn accepts_distinct_links() {
        let config = base_config(
            r#"links:
  - { guild_id: 1, guild_channel_id: 10, group_id: 20 }
  - { guild_id: 1, guild_channel_id: 11, group_id: 21 }"#,
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_duplicate_group() {
        let config = base_config(
            r#"links:
  - { guild_id: 1, guild_channel_id: 10, group_id: 20 }
  - { guild_id: 1, guild_channel_id: 11, group_id: 20 }"#,
        );
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn rejects_partial_webhook_credential() {
        let config = base_config(
            r#"links:
  - { guild_id: 1, guild_channel_id: 10, group_id: 20, webhook_id: 5 }"#,
        );
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn rejects_unparseable_api_url() {
        let mut config = base_config("links: []");
        config.onebot.api_url = "not a url".into();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
