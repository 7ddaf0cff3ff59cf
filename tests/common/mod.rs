#![allow(dead_code)]

use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use anyhow::anyhow;
use async_trait::async_trait;
use chatrelay::{
    relay::{Outbox, ServerEvent},
    store::{MemoryStore, MessageStore},
    upload::Uploads,
    AppState, Message, Relay,
};
use futures_util::{SinkExt, StreamExt};
use tokio::{net::TcpStream, sync::mpsc, time};
use tokio_tungstenite::{tungstenite, MaybeTlsStream, WebSocketStream};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);
const QUIET_PERIOD: Duration = Duration::from_millis(200);

/// A store whose every call fails, like an unreachable database.
pub struct FailingStore;

#[async_trait]
impl MessageStore for FailingStore {
    async fn append(&self, _message: &Message) -> anyhow::Result<()> {
        Err(anyhow!("store is down"))
    }

    async fn recent(&self, _limit: Option<usize>) -> anyhow::Result<Vec<Message>> {
        Err(anyhow!("store is down"))
    }
}

pub fn outbox() -> (Outbox, mpsc::UnboundedReceiver<ServerEvent>) {
    mpsc::unbounded_channel()
}

pub async fn next_event(rx: &mut mpsc::UnboundedReceiver<ServerEvent>) -> ServerEvent {
    time::timeout(RECV_TIMEOUT, rx.recv())
        .await
        .expect("timeout waiting for event")
        .expect("outbox closed")
}

pub async fn expect_new_message(rx: &mut mpsc::UnboundedReceiver<ServerEvent>) -> Message {
    match next_event(rx).await {
        ServerEvent::NewMessage(message) => message,
        other => panic!("expected new-message, got {other:?}"),
    }
}

pub async fn expect_history(rx: &mut mpsc::UnboundedReceiver<ServerEvent>) -> Vec<Message> {
    match next_event(rx).await {
        ServerEvent::PreviousMessages(messages) => messages,
        other => panic!("expected previous-messages, got {other:?}"),
    }
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub upload_dir: PathBuf,
    _tmp: tempfile::TempDir,
}

pub async fn start_server() -> TestServer {
    start_server_with(Arc::new(MemoryStore::new()), None).await
}

/// Starts the full router on a random port. `upload_dir` overrides the
/// temp directory uploads normally go to.
pub async fn start_server_with(store: Arc<dyn MessageStore>, upload_dir: Option<PathBuf>) -> TestServer {
    let tmp = tempfile::tempdir().expect("tempdir");
    let upload_dir = upload_dir.unwrap_or_else(|| tmp.path().join("uploads"));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();

    let state = AppState {
        relay: Relay::spawn(store, Some(50)),
        uploads: Arc::new(Uploads {
            dir: upload_dir.clone(),
            public_url: format!("http://{addr}"),
            max_bytes: 1024 * 1024,
        }),
    };
    let app = chatrelay::router(state);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer { addr, upload_dir, _tmp: tmp }
}

pub async fn connect(addr: SocketAddr) -> WsStream {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
        .await
        .expect("ws connect");
    ws
}

pub async fn send_json(ws: &mut WsStream, value: serde_json::Value) {
    ws.send(tungstenite::Message::Text(value.to_string().into()))
        .await
        .expect("ws send");
}

pub async fn next_json(ws: &mut WsStream) -> serde_json::Value {
    loop {
        let frame = time::timeout(RECV_TIMEOUT, ws.next())
            .await
            .expect("timeout waiting for frame")
            .expect("stream ended")
            .expect("ws read error");

        if let tungstenite::Message::Text(text) = frame {
            return serde_json::from_str(&text).expect("frame is json");
        }
    }
}

/// Asserts nothing arrives for a short while.
pub async fn assert_quiet(ws: &mut WsStream) {
    if let Ok(frame) = time::timeout(QUIET_PERIOD, ws.next()).await {
        panic!("expected no frame, got {frame:?}");
    }
}
