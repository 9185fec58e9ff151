pub use self::parser::{
    Config, DatabaseConfig, DiscordConfig, Link, LoggingConfig, OneBotConfig, RelayFilterConfig,
};
pub use self::validator::ConfigError;

mod parser;
mod validator;
