use std::{fmt, sync::Arc};

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::{message::Message, store::MessageStore};

use super::events::ServerEvent;

/// Per-connection channel the relay writes server events into.
pub type Outbox = mpsc::UnboundedSender<ServerEvent>;

/// Identifies one live socket. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The active connections, in registration order, plus access to history.
pub struct Registry {
    connections: Vec<(ConnectionId, Outbox)>,
    store: Arc<dyn MessageStore>,
    history_limit: Option<usize>,
}

impl Registry {
    pub fn new(store: Arc<dyn MessageStore>, history_limit: Option<usize>) -> Self {
        Self {
            connections: Vec::new(),
            store,
            history_limit,
        }
    }

    /// Sends the history snapshot to `outbox`, then adds the connection.
    /// Registering the same id twice leaves two entries.
    pub async fn register(&mut self, conn: ConnectionId, outbox: Outbox) {
        self.deliver_snapshot(conn, &outbox).await;
        self.connections.push((conn, outbox));
    }

    pub fn unregister(&mut self, conn: ConnectionId) {
        self.connections.retain(|(id, _)| *id != conn);
    }

    pub async fn snapshot(&self) -> anyhow::Result<Vec<Message>> {
        self.store.recent(self.history_limit).await
    }

    /// Persists `message`. A store failure is logged, never returned.
    pub async fn append(&self, message: &Message) {
        if let Err(err) = self.store.append(message).await {
            tracing::error!(message_id = %message.id, ?err, "failed to persist message");
        }
    }

    pub fn outbox(&self, conn: ConnectionId) -> Option<&Outbox> {
        self.connections
            .iter()
            .find(|(id, _)| *id == conn)
            .map(|(_, outbox)| outbox)
    }

    pub fn connections(&self) -> impl Iterator<Item = &(ConnectionId, Outbox)> {
        self.connections.iter()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub(crate) async fn deliver_snapshot(&self, conn: ConnectionId, outbox: &Outbox) {
        let messages = match self.snapshot().await {
            Ok(messages) => messages,
            Err(err) => {
                tracing::error!(%conn, ?err, "failed to load history");
                return;
            }
        };

        if outbox.send(ServerEvent::PreviousMessages(messages)).is_err() {
            tracing::debug!(%conn, "connection closed before history was delivered");
        }
    }
}
