mod common;

use serde_json::json;

use common::{assert_quiet, connect, next_json, send_json, start_server};

#[tokio::test]
async fn connect_receives_history_then_messages_are_broadcast() {
    let server = start_server().await;

    let mut a = connect(server.addr).await;
    let history = next_json(&mut a).await;
    assert_eq!(history, json!({ "event": "previous-messages", "data": [] }));

    let mut b = connect(server.addr).await;
    assert_eq!(next_json(&mut b).await["event"], "previous-messages");

    send_json(&mut a, json!({
        "event": "send-message",
        "data": { "content": "hi", "sender": "A" },
    }))
    .await;

    for ws in [&mut a, &mut b] {
        let event = next_json(ws).await;
        assert_eq!(event["event"], "new-message");
        assert_eq!(event["data"]["content"], "hi");
        assert_eq!(event["data"]["sender"], "A");
        assert!(event["data"]["id"].is_string());
        assert!(event["data"]["timestamp"].is_string());
        assert_quiet(ws).await;
    }
}

#[tokio::test]
async fn late_joiner_sees_message_once_in_order() {
    let server = start_server().await;
    let mut a = connect(server.addr).await;
    next_json(&mut a).await;

    for content in ["one", "two"] {
        send_json(&mut a, json!({
            "event": "send-message",
            "data": { "content": content, "sender": "A", "role": "user" },
        }))
        .await;
        next_json(&mut a).await;
    }

    let mut b = connect(server.addr).await;
    let history = next_json(&mut b).await;
    assert_eq!(history["event"], "previous-messages");
    let contents: Vec<_> = history["data"].as_array().unwrap()
        .iter()
        .map(|m| m["content"].as_str().unwrap().to_owned())
        .collect();
    assert_eq!(contents, ["one", "two"]);
    assert_eq!(history["data"][0]["role"], "user");
    assert_quiet(&mut b).await;
}

#[tokio::test]
async fn malformed_frames_are_skipped() {
    let server = start_server().await;
    let mut a = connect(server.addr).await;
    next_json(&mut a).await;

    send_json(&mut a, json!({ "event": "send-private-message", "data": {} })).await;
    send_json(&mut a, json!("not an event")).await;
    assert_quiet(&mut a).await;

    send_json(&mut a, json!({ "event": "send-message", "data": { "content": "still works" } })).await;
    let event = next_json(&mut a).await;
    assert_eq!(event["data"]["content"], "still works");
    assert_eq!(event["data"]["sender"], "");
}

#[tokio::test]
async fn load_messages_replies_with_history() {
    let server = start_server().await;
    let mut a = connect(server.addr).await;
    next_json(&mut a).await;

    send_json(&mut a, json!({ "event": "send-message", "data": { "content": "hi", "sender": "A" } })).await;
    let sent = next_json(&mut a).await;

    send_json(&mut a, json!({ "event": "load-messages" })).await;
    let history = next_json(&mut a).await;
    assert_eq!(history["event"], "previous-messages");
    assert_eq!(history["data"], serde_json::Value::Array(vec![sent["data"].clone()]));
}

#[tokio::test]
async fn closed_socket_does_not_break_broadcast() {
    let server = start_server().await;
    let mut a = connect(server.addr).await;
    let mut b = connect(server.addr).await;
    next_json(&mut a).await;
    next_json(&mut b).await;

    a.close(None).await.unwrap();

    send_json(&mut b, json!({ "event": "send-message", "data": { "content": "anyone?", "sender": "B" } })).await;
    assert_eq!(next_json(&mut b).await["data"]["content"], "anyone?");
}

#[tokio::test]
async fn odd_payload_types_are_relayed_as_is() {
    let server = start_server().await;
    let mut a = connect(server.addr).await;
    next_json(&mut a).await;

    send_json(&mut a, json!({ "event": "send-message", "data": { "sender": null, "content": "hi" } })).await;
    let event = next_json(&mut a).await;
    assert_eq!(event["event"], "new-message");
    assert_eq!(event["data"]["sender"], "");
    assert_eq!(event["data"]["content"], "hi");

    send_json(&mut a, json!({ "event": "send-message", "data": { "sender": "A", "content": 42 } })).await;
    let event = next_json(&mut a).await;
    assert_eq!(event["event"], "new-message");
    assert_eq!(event["data"]["sender"], "A");
    assert_eq!(event["data"]["content"], "42");
}

#[tokio::test]
async fn load_messages_with_payload_still_replies() {
    let server = start_server().await;
    let mut a = connect(server.addr).await;
    next_json(&mut a).await;

    send_json(&mut a, json!({ "event": "load-messages", "data": {} })).await;
    assert_eq!(next_json(&mut a).await["event"], "previous-messages");

    send_json(&mut a, json!({ "event": "load-messages", "data": { "userId": "u1" } })).await;
    assert_eq!(next_json(&mut a).await["event"], "previous-messages");
}

#[tokio::test]
async fn handshake_query_is_accepted() {
    let server = start_server().await;
    let (mut a, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws?username=A&role=admin", server.addr))
        .await
        .expect("ws connect");

    assert_eq!(next_json(&mut a).await["event"], "previous-messages");
}
