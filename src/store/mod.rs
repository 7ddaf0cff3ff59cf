//! Where message history lives.

mod memory;
mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;

use crate::message::Message;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Backing storage for chat history.
///
/// `recent` returns the newest `limit` messages (all of them for `None`),
/// oldest first.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn append(&self, message: &Message) -> anyhow::Result<()>;
    async fn recent(&self, limit: Option<usize>) -> anyhow::Result<Vec<Message>>;
}

/// Opens the history store named by `database_url`.
///
/// No URL, or a database that can't be reached, means volatile history.
pub async fn open(database_url: Option<&str>) -> Arc<dyn MessageStore> {
    let Some(url) = database_url else {
        tracing::info!("no DATABASE_URL, keeping history in memory");
        return Arc::new(MemoryStore::new());
    };

    match SqliteStore::connect(url).await {
        Ok(store) => {
            tracing::info!(url, "persisting history to sqlite");
            Arc::new(store)
        }
        Err(err) => {
            tracing::error!(url, ?err, "database connection failed, keeping history in memory");
            Arc::new(MemoryStore::new())
        }
    }
}
