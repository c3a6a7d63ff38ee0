//! Realtime invariants: broadcast exclusion, channel rendezvous, and the
//! protocol auth gate over a live WebSocket gateway.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use arbordb::auth::SharedSecretValidator;
use arbordb::engine::MemoryEngine;
use arbordb::realtime::{
    ConnectionRegistry, GatewayConfig, NotificationBus, RealtimeError, RealtimeGateway,
};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const SECRET: &str = "integration-secret";

async fn start_gateway(engine: Arc<MemoryEngine>) -> (Arc<RealtimeGateway>, String) {
    let gateway = Arc::new(RealtimeGateway::new(
        engine,
        Arc::new(SharedSecretValidator::new(SECRET)),
        GatewayConfig::default(),
    ));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = Arc::clone(&gateway);
    tokio::spawn(async move {
        let _ = server.serve(listener).await;
    });
    (gateway, format!("ws://{}", addr))
}

async fn connect(url: &str) -> Client {
    let (client, _) = connect_async(url).await.unwrap();
    client
}

async fn send(client: &mut Client, frame: Value) {
    client
        .send(Message::Text(frame.to_string()))
        .await
        .unwrap();
}

async fn recv_json(client: &mut Client) -> Value {
    let deadline = Duration::from_secs(2);
    loop {
        let message = tokio::time::timeout(deadline, client.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("connection closed while waiting for a frame")
            .expect("websocket error");
        if let Message::Text(text) = message {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

async fn authenticate(client: &mut Client) {
    send(client, json!({"op": 0, "data": {"token": SECRET}})).await;
    let ack = recv_json(client).await;
    assert_eq!(ack["data"]["authorized"], json!(true));
}

#[tokio::test]
async fn broadcast_excludes_only_the_named_connections() {
    let registry = ConnectionRegistry::new();
    let (tx_a, mut rx_a) = tokio::sync::mpsc::unbounded_channel();
    let (tx_b, mut rx_b) = tokio::sync::mpsc::unbounded_channel();
    let (tx_c, mut rx_c) = tokio::sync::mpsc::unbounded_channel();
    registry.add("a", tx_a).await;
    registry.add("b", tx_b).await;
    registry.add("c", tx_c).await;

    registry.broadcast("msg", &["a"]).await;

    assert_eq!(rx_b.recv().await.as_deref(), Some("msg"));
    assert_eq!(rx_c.recv().await.as_deref(), Some("msg"));
    assert!(rx_a.try_recv().is_err());
}

#[tokio::test]
async fn channel_rendezvous_requires_registered_interest() {
    let bus = NotificationBus::new(Arc::new(MemoryEngine::new()));

    // No waiter has registered interest yet.
    assert!(matches!(
        bus.publish("c1", "p").await,
        Err(RealtimeError::ChannelNotFound(_))
    ));

    bus.subscribe("c1").unwrap();
    bus.publish("c1", "p").await.unwrap();
    assert_eq!(bus.await_next("c1").await.unwrap(), "p");
}

#[tokio::test]
async fn operations_before_auth_never_reach_the_store() {
    let engine = Arc::new(MemoryEngine::new());
    let (_gateway, url) = start_gateway(Arc::clone(&engine)).await;
    let mut client = connect(&url).await;

    send(
        &mut client,
        json!({"op": 1, "data": {"path": "posts", "data": {"title": "hi"}}}),
    )
    .await;

    let reply = recv_json(&mut client).await;
    assert!(reply["data"]["error"].is_object());
    assert_eq!(engine.leaf_count(), 0);
}

#[tokio::test]
async fn failed_handshake_closes_the_connection() {
    let (_gateway, url) = start_gateway(Arc::new(MemoryEngine::new())).await;
    let mut client = connect(&url).await;

    send(&mut client, json!({"op": 0, "data": {"token": "wrong"}})).await;
    let ack = recv_json(&mut client).await;
    assert_eq!(ack["data"]["authorized"], json!(false));

    // The server closes after the unauthorized acknowledgment.
    let next = tokio::time::timeout(Duration::from_secs(2), client.next())
        .await
        .expect("timed out waiting for close");
    match next {
        None | Some(Ok(Message::Close(_))) | Some(Err(_)) => {}
        other => panic!("expected close, got {:?}", other),
    }
}

#[tokio::test]
async fn inserts_fan_out_to_other_authenticated_connections() {
    let engine = Arc::new(MemoryEngine::new());
    let (_gateway, url) = start_gateway(Arc::clone(&engine)).await;

    let mut writer = connect(&url).await;
    let mut observer = connect(&url).await;
    authenticate(&mut writer).await;
    authenticate(&mut observer).await;

    send(
        &mut writer,
        json!({"op": 1, "data": {"path": "posts.1", "data": {"title": "hi"}}}),
    )
    .await;

    // Writer gets the success acknowledgment.
    let ack = recv_json(&mut writer).await;
    assert_eq!(ack["data"]["success"], json!(true));

    // Observer gets the accepted payload.
    let broadcast = recv_json(&mut observer).await;
    assert_eq!(broadcast["op"], json!(1));
    assert_eq!(
        broadcast["data"],
        json!({"path": "posts.1", "data": {"title": "hi"}})
    );

    assert_eq!(engine.leaf_count(), 1);
}

#[tokio::test]
async fn deletes_broadcast_the_removed_subtree() {
    let engine = Arc::new(MemoryEngine::new());
    let (_gateway, url) = start_gateway(Arc::clone(&engine)).await;

    let mut writer = connect(&url).await;
    let mut observer = connect(&url).await;
    authenticate(&mut writer).await;
    authenticate(&mut observer).await;

    send(
        &mut writer,
        json!({"op": 1, "data": {"path": "posts.1", "data": {"title": "hi"}}}),
    )
    .await;
    recv_json(&mut writer).await; // insert ack
    recv_json(&mut observer).await; // insert broadcast

    send(&mut writer, json!({"op": 2, "data": {"path": "posts.1"}})).await;
    recv_json(&mut writer).await; // delete ack

    let broadcast = recv_json(&mut observer).await;
    assert_eq!(broadcast["op"], json!(2));
    assert_eq!(
        broadcast["data"],
        json!({"path": "posts.1", "data": {"title": "hi"}})
    );
    assert_eq!(engine.leaf_count(), 0);
}

#[tokio::test]
async fn malformed_frames_terminate_only_the_offending_connection() {
    let engine = Arc::new(MemoryEngine::new());
    let (_gateway, url) = start_gateway(Arc::clone(&engine)).await;

    let mut good = connect(&url).await;
    let mut bad = connect(&url).await;
    authenticate(&mut good).await;

    bad.send(Message::Text("not json".into())).await.unwrap();
    let next = tokio::time::timeout(Duration::from_secs(2), bad.next())
        .await
        .expect("timed out waiting for close");
    match next {
        None | Some(Ok(Message::Close(_))) | Some(Err(_)) => {}
        other => panic!("expected close, got {:?}", other),
    }

    // The healthy connection still works.
    send(
        &mut good,
        json!({"op": 1, "data": {"path": "a", "data": {"x": 1}}}),
    )
    .await;
    let ack = recv_json(&mut good).await;
    assert_eq!(ack["data"]["success"], json!(true));
}
