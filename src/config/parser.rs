use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// One configured channel pairing. Webhook credentials are optional here;
/// the provisioner fills them in (or finds them) at connect time.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Link {
    pub guild_id: i64,
    pub guild_channel_id: i64,
    pub group_id: i64,
    #[serde(default)]
    pub webhook_id: Option<i64>,
    #[serde(default)]
    pub webhook_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default)]
    pub relay: RelayFilterConfig,
    pub discord: DiscordConfig,
    pub onebot: OneBotConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RelayFilterConfig {
    /// Leading characters that mark a message as a command to be suppressed.
    #[serde(default = "default_unmatch_beginning")]
    pub unmatch_beginning: Vec<String>,
    /// When set, only messages @-mentioning the relay bot are forwarded.
    #[serde(default)]
    pub only_to_me: bool,
    /// Scratch directory for save-then-reference file delivery.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
}

impl Default for RelayFilterConfig {
    fn default() -> Self {
        Self {
            unmatch_beginning: default_unmatch_beginning(),
            only_to_me: false,
            cache_dir: None,
        }
    }
}

impl RelayFilterConfig {
    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("dcqq-relay"))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DiscordConfig {
    pub bot_token: String,
    /// Application identity used to recognize webhooks we own.
    pub application_id: i64,
    #[serde(default = "default_discord_api_base")]
    pub api_base: String,
    /// Outbound proxy for API calls and CDN fetches.
    #[serde(default)]
    pub proxy: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OneBotConfig {
    /// Base URL of the OneBot v11 HTTP API, e.g. `http://127.0.0.1:3000`.
    pub api_url: String,
    #[serde(default)]
    pub access_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// SQLite database file path.
    pub filename: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.display().to_string(), e.to_string()))?;
        let config: Config = serde_yaml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }
}

fn default_unmatch_beginning() -> Vec<String> {
    vec!["/".to_string()]
}

fn default_discord_api_base() -> String {
    "https://discord.com/api/v10".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}
