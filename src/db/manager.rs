use std::sync::Arc;

use diesel::Connection;
use diesel::RunQueryDsl;
use diesel::sqlite::SqliteConnection;

use crate::config::DatabaseConfig;
use crate::db::sqlite::SqliteMessageLinkStore;
use crate::db::{DatabaseError, MessageLinkStore};

#[derive(Clone)]
pub struct DatabaseManager {
    sqlite_path: String,
    message_links: Arc<dyn MessageLinkStore>,
}

impl DatabaseManager {
    pub async fn new(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let path = config.filename.clone();
        let message_links = Arc::new(SqliteMessageLinkStore::new(Arc::new(path.clone())));
        Ok(Self {
            sqlite_path: path,
            message_links,
        })
    }

    pub async fn migrate(&self) -> Result<(), DatabaseError> {
        let path = self.sqlite_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = SqliteConnection::establish(&path)
                .map_err(|e| DatabaseError::Connection(e.to_string()))?;

            let statements = [
                r#"
                CREATE TABLE IF NOT EXISTS message_links (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    discord_message_id BIGINT NOT NULL,
                    qq_message_id BIGINT NOT NULL
                )
                "#,
                "CREATE INDEX IF NOT EXISTS idx_message_links_discord_id ON message_links(discord_message_id)",
                "CREATE INDEX IF NOT EXISTS idx_message_links_qq_id ON message_links(qq_message_id)",
            ];

            for statement in statements {
                diesel::sql_query(statement)
                    .execute(&mut conn)
                    .map_err(|e| DatabaseError::Migration(e.to_string()))?;
            }

            Ok(())
        })
        .await
        .map_err(|e| DatabaseError::Migration(format!("migration task failed: {e}")))?
    }

    pub fn message_links(&self) -> Arc<dyn MessageLinkStore> {
        self.message_links.clone()
    }
}
