use axum::{debug_handler, extract::{rejection::QueryRejection, ws::Message, Query, State, WebSocketUpgrade}, response::IntoResponse};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::relay::{ClientEvent, RelayHandle};

/// Handshake query. Only used for logging; identity is unclaimed.
#[derive(Debug, Default, Deserialize)]
pub struct Handshake {
    pub username: Option<String>,
    pub role: Option<String>,
}

#[debug_handler(state = crate::AppState)]
pub async fn chat_ws(
    State(relay): State<RelayHandle>,
    handshake: Result<Query<Handshake>, QueryRejection>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    // an odd query string never blocks the socket
    let handshake = handshake.map(|Query(handshake)| handshake).unwrap_or_default();

    ws.on_upgrade(async move |stream| {
        let (outbox, mut events) = mpsc::unbounded_channel();
        let conn = relay.connect(outbox);
        tracing::info!(
            %conn,
            username = handshake.username.as_deref().unwrap_or("?"),
            role = handshake.role.as_deref().unwrap_or("?"),
            "socket opened"
        );
        let (mut sender, mut receiver) = stream.split();

        let mut send_task = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let frame = match serde_json::to_string(&event) {
                    Ok(frame) => frame,
                    Err(err) => {
                        tracing::error!(%conn, ?err, "failed to encode event");
                        continue;
                    }
                };

                if sender.send(Message::Text(frame.into())).await.is_err() {
                    break;
                }
            }
        });

        let inbound = relay.clone();
        let mut recv_task = tokio::spawn(async move {
            while let Some(Ok(frame)) = receiver.next().await {
                let event = match frame {
                    Message::Text(text) => serde_json::from_str::<ClientEvent>(text.as_str()),
                    Message::Binary(data) => serde_json::from_slice::<ClientEvent>(&data),
                    Message::Close(_) => break,
                    _ => continue,
                };

                match event {
                    Ok(event) => inbound.handle_event(conn, event),
                    Err(err) => tracing::debug!(%conn, %err, "skipping malformed frame"),
                }
            }
        });

        tokio::select! {
            _ = &mut send_task => recv_task.abort(),
            _ = &mut recv_task => send_task.abort(),
        };

        relay.disconnect(conn);
    })
}
