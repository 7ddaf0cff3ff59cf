use std::sync::Mutex;

use anyhow::anyhow;
use async_trait::async_trait;

use crate::message::Message;

use super::MessageStore;

/// Volatile history, gone on restart.
#[derive(Default)]
pub struct MemoryStore {
    messages: Mutex<Vec<Message>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn append(&self, message: &Message) -> anyhow::Result<()> {
        self.messages
            .lock()
            .map_err(|_| anyhow!("memory store poisoned"))?
            .push(message.clone());
        Ok(())
    }

    async fn recent(&self, limit: Option<usize>) -> anyhow::Result<Vec<Message>> {
        let messages = self.messages
            .lock()
            .map_err(|_| anyhow!("memory store poisoned"))?;
        let skip = limit.map_or(0, |limit| messages.len().saturating_sub(limit));

        Ok(messages[skip..].to_vec())
    }
}
