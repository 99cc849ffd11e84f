//! WebSocket transport.
//!
//! ## Protocol
//!
//! Every connection joins the [`BroadcastBus`] unauthorized and must first
//! send a welcome:
//!
//! ```json
//! {"type": "welcome", "data": {"serverId": "optional-secret"}}
//! ```
//!
//! When a server id is configured it must match; otherwise the connection is
//! answered with an `Unauthorized` error and closed. A successful welcome is
//! answered with `{"type": "welcome", "info": {...}}`.
//!
//! Any other message is parsed as a [`Message`] and handed to the
//! [`InboundHandler`]; the handler's reply goes back to the sender only.
//! Messages from unauthorized connections get a `401` error and are not routed.

use std::net::SocketAddr;
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use hwbus_core::constants::TYPE_WELCOME;
use hwbus_core::{Error, ErrorPayload, Message};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::bus::{BroadcastBus, ConnectionId, Outbound};
use crate::error::{BusError, Result};

/// Receives every routable inbound message.
///
/// `handle` must not block: it returns the immediate reply and starts any
/// asynchronous work on its own.
pub trait InboundHandler: Send + Sync + 'static {
    fn handle(&self, connection: ConnectionId, message: Message) -> Value;
}

#[derive(Debug, Clone)]
pub struct WsServerConfig {
    pub bind_addr: SocketAddr,
    /// Handshake secret; `None` accepts every welcome.
    pub server_id: Option<String>,
    /// Sent as `info` in the welcome reply.
    pub info: Value,
}

/// WebSocket server feeding a [`BroadcastBus`].
pub struct WsServer {
    listener: TcpListener,
    config: WsServerConfig,
    bus: BroadcastBus,
}

impl WsServer {
    /// Bind the listening socket.
    ///
    /// # Errors
    /// [`BusError::BindFailed`] when the address is unavailable.
    pub async fn bind(config: WsServerConfig, bus: BroadcastBus) -> Result<Self> {
        let listener = TcpListener::bind(config.bind_addr)
            .await
            .map_err(|source| BusError::BindFailed {
                addr: config.bind_addr,
                source,
            })?;
        info!(addr = %config.bind_addr, "WebSocket server listening");
        Ok(Self {
            listener,
            config,
            bus,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until `shutdown` is cancelled.
    pub async fn serve<H: InboundHandler>(self, handler: Arc<H>, shutdown: CancellationToken) {
        let config = Arc::new(self.config);
        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        tokio::spawn(handle_connection(
                            stream,
                            peer,
                            self.bus.clone(),
                            Arc::clone(&config),
                            Arc::clone(&handler),
                            shutdown.clone(),
                        ));
                    }
                    Err(e) => error!(error = %e, "Accept failed"),
                },
                () = shutdown.cancelled() => {
                    info!("WebSocket server stopped accepting");
                    break;
                }
            }
        }
    }
}

async fn handle_connection<H: InboundHandler>(
    stream: TcpStream,
    peer: SocketAddr,
    bus: BroadcastBus,
    config: Arc<WsServerConfig>,
    handler: Arc<H>,
    shutdown: CancellationToken,
) {
    let ws = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!(%peer, error = %e, "WebSocket handshake failed");
            return;
        }
    };
    let (mut sink, mut source) = ws.split();

    let (id, mut outbound) = match bus.connect(Some(peer)) {
        Ok(joined) => joined,
        Err(e) => {
            warn!(%peer, error = %e, "Connection refused");
            let _ = sink.send(WsMessage::Close(None)).await;
            return;
        }
    };
    info!(connection = %id, %peer, "Connection opened");

    let writer = tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            let sent = match frame {
                Outbound::Text(text) => sink.send(WsMessage::Text(text)).await,
                Outbound::Close => {
                    let _ = sink.send(WsMessage::Close(None)).await;
                    break;
                }
            };
            if let Err(e) = sent {
                debug!(error = %e, "Send failed");
                break;
            }
        }
    });

    loop {
        tokio::select! {
            frame = source.next() => match frame {
                Some(Ok(WsMessage::Text(text))) => {
                    if !on_text(id, &text, &bus, &config, handler.as_ref()) {
                        break;
                    }
                }
                Some(Ok(WsMessage::Close(_))) | None => break,
                Some(Ok(_)) => trace!(connection = %id, "Ignoring non-text frame"),
                Some(Err(e)) => {
                    debug!(connection = %id, error = %e, "Receive failed");
                    break;
                }
            },
            () = shutdown.cancelled() => break,
        }
    }

    bus.disconnect(id);
    let _ = writer.await;
    info!(connection = %id, "Connection closed");
}

/// Handle one text frame. Returns `false` when the connection must close.
fn on_text<H: InboundHandler>(
    id: ConnectionId,
    text: &str,
    bus: &BroadcastBus,
    config: &WsServerConfig,
    handler: &H,
) -> bool {
    let message: Message = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => {
            let payload = ErrorPayload::from(&Error::config(format!("Invalid message: {e}")));
            send_reply(bus, id, &json!({ "type": "error", "error": payload }));
            return true;
        }
    };
    trace!(connection = %id, kind = %message.kind, "Inbound message");

    if message.kind == TYPE_WELCOME {
        return welcome(id, &message, bus, config);
    }

    if !bus.is_authorized(id) {
        let payload = BusError::unauthorized_payload("Connection is not authorized, send a welcome first")
            .with_msg_id(message.id.clone());
        send_reply(bus, id, &json!({ "type": message.kind, "error": payload }));
        return true;
    }

    let reply = handler.handle(id, message);
    send_reply(bus, id, &reply);
    true
}

fn welcome(id: ConnectionId, message: &Message, bus: &BroadcastBus, config: &WsServerConfig) -> bool {
    let offered = message.data.get("serverId").and_then(Value::as_str);
    let accepted = match config.server_id.as_deref() {
        None => true,
        Some(expected) => offered == Some(expected),
    };

    if !accepted {
        warn!(connection = %id, "Welcome rejected");
        let payload = BusError::unauthorized_payload("Invalid server id").with_msg_id(message.id.clone());
        send_reply(bus, id, &json!({ "type": TYPE_WELCOME, "error": payload }));
        bus.disconnect(id);
        return false;
    }

    if bus.authorize(id).is_err() {
        return false;
    }
    send_reply(bus, id, &json!({ "type": TYPE_WELCOME, "info": config.info }));
    true
}

fn send_reply(bus: &BroadcastBus, id: ConnectionId, reply: &Value) {
    if let Err(e) = bus.reply(id, reply) {
        debug!(connection = %id, error = %e, "Reply dropped");
    }
}
