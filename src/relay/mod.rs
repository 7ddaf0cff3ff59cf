//! Connection registry and broadcast relay.
//!
//! All relay state is owned by one worker task. Socket handlers talk to it
//! through a [`RelayHandle`], and every command runs to completion (store
//! round trip included) before the next one is taken, so connects, sends
//! and disconnects never interleave.

mod events;
mod registry;

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::{message::{Message, MessageDraft}, store::MessageStore};

pub use events::{ClientEvent, ServerEvent};
pub use registry::{ConnectionId, Outbox, Registry};

#[derive(Debug)]
pub(crate) enum Command {
    Connect { conn: ConnectionId, outbox: Outbox },
    LoadMessages { conn: ConnectionId },
    Send { conn: ConnectionId, draft: MessageDraft },
    Disconnect { conn: ConnectionId },
}

/// Cheap to clone; lives in `AppState`.
#[derive(Clone)]
pub struct RelayHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl RelayHandle {
    /// Registers a new connection. Its first event is the history snapshot.
    pub fn connect(&self, outbox: Outbox) -> ConnectionId {
        let conn = ConnectionId::new();
        self.dispatch(Command::Connect { conn, outbox });
        conn
    }

    pub fn load_messages(&self, conn: ConnectionId) {
        self.dispatch(Command::LoadMessages { conn });
    }

    pub fn send(&self, conn: ConnectionId, draft: MessageDraft) {
        self.dispatch(Command::Send { conn, draft });
    }

    pub fn disconnect(&self, conn: ConnectionId) {
        self.dispatch(Command::Disconnect { conn });
    }

    pub fn handle_event(&self, conn: ConnectionId, event: ClientEvent) {
        match event {
            ClientEvent::LoadMessages => self.load_messages(conn),
            ClientEvent::SendMessage(draft) => self.send(conn, draft),
        }
    }

    fn dispatch(&self, command: Command) {
        if let Err(err) = self.commands.send(command) {
            tracing::warn!(command = ?err.0, "relay worker has stopped");
        }
    }
}

pub struct Relay {
    registry: Registry,
    commands: mpsc::UnboundedReceiver<Command>,
}

impl Relay {
    pub fn new(store: Arc<dyn MessageStore>, history_limit: Option<usize>) -> (Self, RelayHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let relay = Self {
            registry: Registry::new(store, history_limit),
            commands: rx,
        };

        (relay, RelayHandle { commands: tx })
    }

    /// Starts the worker on the current runtime.
    pub fn spawn(store: Arc<dyn MessageStore>, history_limit: Option<usize>) -> RelayHandle {
        let (relay, handle) = Self::new(store, history_limit);
        tokio::spawn(relay.run());
        handle
    }

    /// Runs until every handle has been dropped.
    pub async fn run(mut self) {
        while let Some(command) = self.commands.recv().await {
            self.handle(command).await;
        }

        tracing::debug!("relay worker finished");
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Connect { conn, outbox } => {
                self.registry.register(conn, outbox).await;
                tracing::info!(%conn, connections = self.registry.len(), "connected");
            }
            Command::LoadMessages { conn } => {
                let Some(outbox) = self.registry.outbox(conn) else {
                    tracing::debug!(%conn, "load-messages from unknown connection");
                    return;
                };
                self.registry.deliver_snapshot(conn, outbox).await;
            }
            Command::Send { conn, draft } => {
                let message = self.publish(draft).await;
                tracing::debug!(%conn, message_id = %message.id, "relayed message");
            }
            Command::Disconnect { conn } => {
                self.registry.unregister(conn);
                tracing::info!(%conn, connections = self.registry.len(), "disconnected");
            }
        }
    }

    /// Stamps the draft, persists it best-effort and fans it out to every
    /// registered connection, the sender included.
    pub async fn publish(&mut self, draft: MessageDraft) -> Message {
        let message = draft.stamp();
        self.registry.append(&message).await;

        for (conn, outbox) in self.registry.connections() {
            if outbox.send(ServerEvent::NewMessage(message.clone())).is_err() {
                tracing::debug!(%conn, "skipping closed connection");
            }
        }

        message
    }
}
