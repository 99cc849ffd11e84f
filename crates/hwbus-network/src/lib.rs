//! Event delivery for the hwbus server
//!
//! This crate owns everything between the router and remote callers.
//!
//! # Components
//!
//! - **BroadcastBus**: connection table with per-connection authorization;
//!   delivers events to one connection or to every authorized one.
//! - **WsServer**: WebSocket transport with the welcome handshake, feeding
//!   inbound messages to an [`InboundHandler`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use hwbus_core::Message;
//! use hwbus_network::{BroadcastBus, ConnectionId, InboundHandler, WsServer, WsServerConfig};
//! use serde_json::{Value, json};
//! use tokio_util::sync::CancellationToken;
//!
//! struct Echo;
//!
//! impl InboundHandler for Echo {
//!     fn handle(&self, _connection: ConnectionId, message: Message) -> Value {
//!         json!({ "type": message.kind, "response": message.data })
//!     }
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let bus = BroadcastBus::new(100);
//! let config = WsServerConfig {
//!     bind_addr: "127.0.0.1:8443".parse()?,
//!     server_id: None,
//!     info: json!({ "server": "hwbus" }),
//! };
//! let server = WsServer::bind(config, bus.clone()).await?;
//! server.serve(Arc::new(Echo), CancellationToken::new()).await;
//! # Ok(())
//! # }
//! ```

mod bus;
mod error;
mod ws;

pub use bus::{BroadcastBus, ConnectionId, ConnectionInfo, Outbound, encode};
pub use error::{BusError, Result};
pub use ws::{InboundHandler, WsServer, WsServerConfig};
