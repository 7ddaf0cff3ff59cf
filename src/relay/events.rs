//! JSON frames exchanged over the socket: `{"event": ..., "data": ...}`.

use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::message::{Message, MessageDraft};

#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// Any `data` is ignored.
    LoadMessages,
    SendMessage(MessageDraft),
}

impl<'de> Deserialize<'de> for ClientEvent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Frame {
            event: String,
            #[serde(default)]
            data: Value,
        }

        let Frame { event, data } = Frame::deserialize(deserializer)?;
        match event.as_str() {
            "load-messages" => Ok(ClientEvent::LoadMessages),
            "send-message" => Ok(ClientEvent::SendMessage(MessageDraft::from_value(data))),
            other => Err(de::Error::unknown_variant(other, &["load-messages", "send-message"])),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// History snapshot, oldest first.
    PreviousMessages(Vec<Message>),
    NewMessage(Message),
}
