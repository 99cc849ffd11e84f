//! Integration tests for WsServer
//!
//! These run real WebSocket clients against a server bound to an ephemeral
//! port and check the welcome handshake and bus delivery.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use hwbus_core::Message;
use hwbus_network::{BroadcastBus, ConnectionId, InboundHandler, WsServer, WsServerConfig};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct Echo;

impl InboundHandler for Echo {
    fn handle(&self, _connection: ConnectionId, message: Message) -> Value {
        json!({ "type": message.kind, "response": message.data, "id": message.id })
    }
}

async fn start(server_id: Option<&str>, max_connections: usize) -> (SocketAddr, BroadcastBus, CancellationToken) {
    let bus = BroadcastBus::new(max_connections);
    let config = WsServerConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        server_id: server_id.map(str::to_string),
        info: json!({ "server": "hwbus-test" }),
    };
    let server = WsServer::bind(config, bus.clone()).await.unwrap();
    let addr = server.local_addr().unwrap();
    let shutdown = CancellationToken::new();
    tokio::spawn(server.serve(Arc::new(Echo), shutdown.clone()));
    (addr, bus, shutdown)
}

async fn connect(addr: SocketAddr) -> Client {
    let (ws, _) = connect_async(format!("ws://{addr}")).await.unwrap();
    ws
}

async fn send(ws: &mut Client, value: Value) {
    ws.send(WsMessage::Text(value.to_string())).await.unwrap();
}

async fn next_json(ws: &mut Client) -> Value {
    loop {
        let frame = timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("no frame from server")
            .expect("stream ended")
            .unwrap();
        if let WsMessage::Text(text) = frame {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

async fn expect_closed(ws: &mut Client) {
    let frame = timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("connection was not closed");
    assert!(matches!(frame, None | Some(Ok(WsMessage::Close(_))) | Some(Err(_))));
}

async fn welcomed(addr: SocketAddr) -> Client {
    let mut ws = connect(addr).await;
    send(&mut ws, json!({"type": "welcome"})).await;
    let reply = next_json(&mut ws).await;
    assert_eq!(reply["type"], "welcome");
    ws
}

#[tokio::test]
async fn test_welcome_then_routed_reply() {
    let (addr, bus, shutdown) = start(None, 10).await;
    let mut ws = connect(addr).await;

    send(&mut ws, json!({"type": "welcome", "id": 1})).await;
    let reply = next_json(&mut ws).await;
    assert_eq!(reply, json!({"type": "welcome", "info": {"server": "hwbus-test"}}));

    send(&mut ws, json!({"type": "gpio-interface", "data": {"action": "get"}, "id": 2})).await;
    let reply = next_json(&mut ws).await;
    assert_eq!(reply["response"], json!({"action": "get"}));
    assert_eq!(reply["id"], 2);

    assert_eq!(bus.connections().iter().filter(|c| c.authorized).count(), 1);
    shutdown.cancel();
}

#[tokio::test]
async fn test_messages_before_welcome_are_unauthorized() {
    let (addr, _bus, shutdown) = start(None, 10).await;
    let mut ws = connect(addr).await;

    send(&mut ws, json!({"type": "gpio-interface", "data": {}, "id": "a"})).await;
    let reply = next_json(&mut ws).await;
    assert_eq!(reply["error"]["code"], 401);
    assert_eq!(reply["error"]["name"], "Unauthorized");
    assert_eq!(reply["error"]["msgId"], "a");
    assert!(reply.get("response").is_none());

    // The connection stays open and can still complete the handshake.
    send(&mut ws, json!({"type": "welcome"})).await;
    assert_eq!(next_json(&mut ws).await["type"], "welcome");
    shutdown.cancel();
}

#[tokio::test]
async fn test_wrong_server_id_closes_connection() {
    let (addr, bus, shutdown) = start(Some("secret"), 10).await;
    let mut ws = connect(addr).await;

    send(&mut ws, json!({"type": "welcome", "data": {"serverId": "guess"}})).await;
    let reply = next_json(&mut ws).await;
    assert_eq!(reply["error"]["code"], 401);
    expect_closed(&mut ws).await;

    let mut ws = connect(addr).await;
    send(&mut ws, json!({"type": "welcome", "data": {"serverId": "secret"}})).await;
    assert!(next_json(&mut ws).await.get("info").is_some());
    assert_eq!(bus.len(), 1);
    shutdown.cancel();
}

#[tokio::test]
async fn test_invalid_json_is_reported() {
    let (addr, _bus, shutdown) = start(None, 10).await;
    let mut ws = welcomed(addr).await;

    ws.send(WsMessage::Text("{not json".into())).await.unwrap();
    let reply = next_json(&mut ws).await;
    assert_eq!(reply["error"]["code"], 400);
    shutdown.cancel();
}

#[tokio::test]
async fn test_broadcast_reaches_only_authorized_connections() {
    let (addr, bus, shutdown) = start(None, 10).await;
    let mut authorized = welcomed(addr).await;
    let mut anonymous = connect(addr).await;

    // Wait until both connections have joined the bus.
    timeout(Duration::from_secs(5), async {
        while bus.len() < 2 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    let delivered = bus.deliver(&json!({"type": "broadcaster", "data": {"broadcast": 1}}), None).unwrap();
    assert_eq!(delivered, 1);
    assert_eq!(next_json(&mut authorized).await["data"]["broadcast"], 1);

    // The first frame the anonymous client sees is its own 401, not the broadcast.
    send(&mut anonymous, json!({"type": "x"})).await;
    assert_eq!(next_json(&mut anonymous).await["error"]["code"], 401);
    shutdown.cancel();
}

#[tokio::test]
async fn test_connections_above_limit_are_refused() {
    let (addr, bus, shutdown) = start(None, 1).await;
    let _first = welcomed(addr).await;

    let mut second = connect(addr).await;
    expect_closed(&mut second).await;
    assert_eq!(bus.len(), 1);
    shutdown.cancel();
}

#[tokio::test]
async fn test_disconnect_leaves_the_bus() {
    let (addr, bus, shutdown) = start(None, 10).await;
    let mut ws = welcomed(addr).await;
    assert_eq!(bus.len(), 1);

    ws.close(None).await.unwrap();
    timeout(Duration::from_secs(5), async {
        while !bus.is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("connection still on the bus");
    shutdown.cancel();
}
