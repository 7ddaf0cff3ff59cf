use std::str::FromStr;

use async_trait::async_trait;
use sqlx::{sqlite::{SqliteConnectOptions, SqlitePoolOptions}, SqlitePool};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use uuid::Uuid;

use crate::message::Message;

use super::MessageStore;

type MessageRow = (
    String,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    String,
);

/// Durable history in a sqlite database.
#[derive(Clone)]
pub struct SqliteStore {
    db_pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true);
        let db_pool = SqlitePoolOptions::new()
            .max_connections(16)
            .connect_with(options)
            .await?;

        Self::new(db_pool).await
    }

    /// Wraps an existing pool, creating the `messages` table if needed.
    pub async fn new(db_pool: SqlitePool) -> anyhow::Result<Self> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY NOT NULL,
                sender TEXT NOT NULL,
                role TEXT,
                content TEXT,
                file_url TEXT,
                file_name TEXT,
                file_type TEXT,
                timestamp TEXT NOT NULL
            )"
        )
            .execute(&db_pool)
            .await?;

        Ok(Self { db_pool })
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.db_pool
    }
}

#[async_trait]
impl MessageStore for SqliteStore {
    async fn append(&self, message: &Message) -> anyhow::Result<()> {
        sqlx::query("INSERT INTO messages (id,sender,role,content,file_url,file_name,file_type,timestamp) values (?,?,?,?,?,?,?,?)")
            .bind(message.id.to_string())
            .bind(&message.sender)
            .bind(message.role.as_deref())
            .bind(message.content.as_deref())
            .bind(message.file_url.as_deref())
            .bind(message.file_name.as_deref())
            .bind(message.file_type.as_deref())
            .bind(message.timestamp.format(&Rfc3339)?)
            .execute(&self.db_pool)
            .await?;

        Ok(())
    }

    async fn recent(&self, limit: Option<usize>) -> anyhow::Result<Vec<Message>> {
        // sqlite treats a negative LIMIT as no limit
        let limit = limit.map_or(-1, |limit| i64::try_from(limit).unwrap_or(i64::MAX));

        let rows: Vec<MessageRow> =
            sqlx::query_as("SELECT id,sender,role,content,file_url,file_name,file_type,timestamp FROM messages ORDER BY rowid DESC LIMIT ?")
                .bind(limit)
                .fetch_all(&self.db_pool)
                .await?;

        let mut messages = rows.into_iter()
            .map(row_to_message)
            .collect::<anyhow::Result<Vec<_>>>()?;
        messages.reverse();

        Ok(messages)
    }
}

fn row_to_message(
    (id, sender, role, content, file_url, file_name, file_type, timestamp): MessageRow,
) -> anyhow::Result<Message> {
    Ok(Message {
        id: Uuid::parse_str(&id)?,
        sender,
        role,
        content,
        file_url,
        file_name,
        file_type,
        timestamp: OffsetDateTime::parse(&timestamp, &Rfc3339)?,
    })
}
