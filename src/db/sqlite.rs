use std::sync::Arc;

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;

use crate::db::schema::message_links;

use super::DatabaseError;
use super::models::MessageLink;

// SQLite INTEGER primary keys come back as i32; the public API keeps i64.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = message_links)]
struct DbMessageLink {
    id: i32,
    discord_message_id: i64,
    qq_message_id: i64,
}

impl DbMessageLink {
    fn into_message_link(self) -> MessageLink {
        MessageLink {
            id: self.id as i64,
            discord_message_id: self.discord_message_id,
            qq_message_id: self.qq_message_id,
        }
    }
}

#[derive(Insertable)]
#[diesel(table_name = message_links)]
struct NewMessageLink {
    discord_message_id: i64,
    qq_message_id: i64,
}

fn establish_connection(path: &str) -> Result<SqliteConnection, DatabaseError> {
    SqliteConnection::establish(path).map_err(|e| DatabaseError::Connection(e.to_string()))
}

pub struct SqliteMessageLinkStore {
    db_path: Arc<String>,
}

impl SqliteMessageLinkStore {
    pub fn new(db_path: Arc<String>) -> Self {
        Self { db_path }
    }
}

#[async_trait]
impl super::MessageLinkStore for SqliteMessageLinkStore {
    async fn insert(
        &self,
        discord_message_id: i64,
        qq_message_id: i64,
    ) -> Result<(), DatabaseError> {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            conn.transaction(|conn| {
                diesel::insert_into(message_links::table)
                    .values(NewMessageLink {
                        discord_message_id,
                        qq_message_id,
                    })
                    .execute(conn)
                    .map(|_| ())
            })
            .map_err(|e: diesel::result::Error| DatabaseError::Query(e.to_string()))
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn get_by_discord_id(
        &self,
        message_id: i64,
    ) -> Result<Vec<MessageLink>, DatabaseError> {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            use crate::db::schema::message_links::dsl::*;
            message_links
                .filter(discord_message_id.eq(message_id))
                .select(DbMessageLink::as_select())
                .load::<DbMessageLink>(&mut conn)
                .map_err(|e| DatabaseError::Query(e.to_string()))
                .map(|rows| rows.into_iter().map(DbMessageLink::into_message_link).collect())
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn get_by_qq_id(&self, message_id: i64) -> Result<Vec<MessageLink>, DatabaseError> {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            use crate::db::schema::message_links::dsl::*;
            message_links
                .filter(qq_message_id.eq(message_id))
                .select(DbMessageLink::as_select())
                .load::<DbMessageLink>(&mut conn)
                .map_err(|e| DatabaseError::Query(e.to_string()))
                .map(|rows| rows.into_iter().map(DbMessageLink::into_message_link).collect())
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn delete(&self, link_id: i64) -> Result<(), DatabaseError> {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            use crate::db::schema::message_links::dsl::*;
            diesel::delete(message_links.filter(id.eq(link_id as i32)))
                .execute(&mut conn)
                .map(|_| ())
                .map_err(|e| DatabaseError::Query(e.to_string()))
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }
}
