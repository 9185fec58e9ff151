use async_trait::async_trait;

use super::DatabaseError;
use super::models::MessageLink;

/// Correlation store access. Every call is one self-contained transaction;
/// records are only ever created and deleted, never updated.
#[async_trait]
pub trait MessageLinkStore: Send + Sync {
    async fn insert(
        &self,
        discord_message_id: i64,
        qq_message_id: i64,
    ) -> Result<(), DatabaseError>;

    async fn get_by_discord_id(
        &self,
        discord_message_id: i64,
    ) -> Result<Vec<MessageLink>, DatabaseError>;

    async fn get_by_qq_id(&self, qq_message_id: i64) -> Result<Vec<MessageLink>, DatabaseError>;

    async fn delete(&self, id: i64) -> Result<(), DatabaseError>;
}
