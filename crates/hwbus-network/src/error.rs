use std::net::SocketAddr;

use hwbus_core::constants::CODE_UNAUTHORIZED;
use hwbus_core::ErrorPayload;
use thiserror::Error;

use crate::bus::ConnectionId;

pub type Result<T> = std::result::Result<T, BusError>;

/// Errors raised while routing events to connections or serving the transport.
#[derive(Debug, Error)]
pub enum BusError {
    /// Targeted delivery to a connection that never completed the handshake.
    /// The connection has been closed.
    #[error("Connection {0} is not authorized")]
    Unauthorized(ConnectionId),

    #[error("Connection {0} not connected")]
    NotConnected(ConnectionId),

    #[error("Maximum connections reached: {0}")]
    MaxConnectionsReached(usize),

    #[error("Failed to bind to {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BusError {
    /// Wire form of an authorization failure.
    #[must_use]
    pub fn unauthorized_payload(msg: impl Into<String>) -> ErrorPayload {
        ErrorPayload::new("Unauthorized", msg, CODE_UNAUTHORIZED)
    }
}
