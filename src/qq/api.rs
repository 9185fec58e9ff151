use async_trait::async_trait;
use serde::Deserialize;

use crate::error::Result;
use crate::qq::RawSegment;

#[derive(Debug, Clone, Deserialize)]
pub struct LoginInfo {
    pub user_id: i64,
    pub nickname: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GroupMemberInfo {
    pub user_id: i64,
    pub nickname: String,
    #[serde(default)]
    pub card: Option<String>,
}

impl GroupMemberInfo {
    /// Group card takes precedence over the account nickname.
    pub fn display_name(&self) -> &str {
        match self.card.as_deref() {
            Some(card) if !card.is_empty() => card,
            _ => &self.nickname,
        }
    }
}

/// Reported OneBot server implementation, used by the file-delivery
/// capability probe.
#[derive(Debug, Clone, Deserialize)]
pub struct VersionInfo {
    pub app_name: String,
    #[serde(default)]
    pub app_version: String,
}

/// Call surface of the OneBot v11 bot API the relay depends on. The real
/// client speaks HTTP; tests substitute an in-memory fake.
#[async_trait]
pub trait OneBotApi: Send + Sync {
    async fn get_login_info(&self) -> Result<LoginInfo>;

    async fn get_group_member_info(
        &self,
        group_id: i64,
        user_id: i64,
    ) -> Result<GroupMemberInfo>;

    async fn get_version_info(&self) -> Result<VersionInfo>;

    /// Sends a group message, returning the platform-native message id.
    async fn send_group_msg(&self, group_id: i64, message: &[RawSegment]) -> Result<i64>;

    async fn delete_msg(&self, message_id: i64) -> Result<()>;

    /// Two-step file delivery for server variants that cannot accept inline
    /// payloads: the file must already exist at `file` on the server host.
    async fn upload_group_file(&self, group_id: i64, file: &str, name: &str) -> Result<()>;
}
