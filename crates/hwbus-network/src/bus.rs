//! Broadcast bus: event fan-out to connected callers.
//!
//! Each connection is represented by an unbounded outbound queue drained by
//! its transport task. The bus itself never awaits, so routing and relaying
//! stay non-blocking.
//!
//! # Authorization
//!
//! Connections join unauthorized and are authorized by the transport after a
//! successful handshake.
//!
//! - Targeted delivery to an unauthorized connection closes that connection,
//!   sends nothing and returns [`BusError::Unauthorized`].
//! - Untargeted delivery skips unauthorized connections silently.
//! - [`BroadcastBus::reply`] answers the sender of an inbound message and
//!   ignores authorization, so handshake errors can still be reported.

use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{BusError, Result};

/// Identifier of one transport connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Frame queued for a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Text(String),
    /// Close the connection after flushing earlier frames.
    Close,
}

/// Snapshot of a connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInfo {
    pub id: ConnectionId,
    pub remote_addr: Option<SocketAddr>,
    pub authorized: bool,
    pub connected_at: DateTime<Utc>,
}

struct Entry {
    tx: mpsc::UnboundedSender<Outbound>,
    remote_addr: Option<SocketAddr>,
    authorized: bool,
    connected_at: DateTime<Utc>,
}

struct BusState {
    connections: HashMap<ConnectionId, Entry>,
    max_connections: usize,
}

/// Shared registry of open connections. Cheap to clone.
#[derive(Clone)]
pub struct BroadcastBus {
    state: Arc<Mutex<BusState>>,
}

impl fmt::Debug for BroadcastBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BroadcastBus")
            .field("connections", &self.len())
            .finish()
    }
}

/// Text form of an event: strings verbatim, everything else as JSON.
pub fn encode(event: &Value) -> Result<String> {
    match event {
        Value::String(text) => Ok(text.clone()),
        other => Ok(serde_json::to_string(other)?),
    }
}

impl BroadcastBus {
    pub fn new(max_connections: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(BusState {
                connections: HashMap::new(),
                max_connections,
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, BusState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add an unauthorized connection and return its outbound queue.
    ///
    /// # Errors
    /// [`BusError::MaxConnectionsReached`] when the bus is full.
    pub fn connect(
        &self,
        remote_addr: Option<SocketAddr>,
    ) -> Result<(ConnectionId, mpsc::UnboundedReceiver<Outbound>)> {
        let mut state = self.state();
        if state.connections.len() >= state.max_connections {
            return Err(BusError::MaxConnectionsReached(state.max_connections));
        }
        let id = ConnectionId::new();
        let (tx, rx) = mpsc::unbounded_channel();
        state.connections.insert(
            id,
            Entry {
                tx,
                remote_addr,
                authorized: false,
                connected_at: Utc::now(),
            },
        );
        debug!(connection = %id, ?remote_addr, "Connection joined the bus");
        Ok((id, rx))
    }

    pub fn authorize(&self, id: ConnectionId) -> Result<()> {
        let mut state = self.state();
        let entry = state
            .connections
            .get_mut(&id)
            .ok_or(BusError::NotConnected(id))?;
        entry.authorized = true;
        info!(connection = %id, "Connection authorized");
        Ok(())
    }

    #[must_use]
    pub fn is_authorized(&self, id: ConnectionId) -> bool {
        self.state()
            .connections
            .get(&id)
            .is_some_and(|entry| entry.authorized)
    }

    /// Close and forget a connection. Returns `false` if it was not known.
    pub fn disconnect(&self, id: ConnectionId) -> bool {
        match self.state().connections.remove(&id) {
            Some(entry) => {
                let _ = entry.tx.send(Outbound::Close);
                debug!(connection = %id, "Connection left the bus");
                true
            }
            None => false,
        }
    }

    /// Deliver `event` to `target`, or to every authorized connection.
    ///
    /// Returns the number of connections the event was queued for.
    ///
    /// # Errors
    /// [`BusError::Unauthorized`] (after closing the connection) or
    /// [`BusError::NotConnected`] for a targeted delivery.
    pub fn deliver(&self, event: &Value, target: Option<ConnectionId>) -> Result<usize> {
        let text = encode(event)?;
        let mut state = self.state();

        let Some(target) = target else {
            let mut gone = Vec::new();
            let mut delivered = 0;
            for (id, entry) in state.connections.iter().filter(|(_, e)| e.authorized) {
                if entry.tx.send(Outbound::Text(text.clone())).is_ok() {
                    delivered += 1;
                } else {
                    gone.push(*id);
                }
            }
            for id in gone {
                state.connections.remove(&id);
            }
            return Ok(delivered);
        };

        let entry = state
            .connections
            .get(&target)
            .ok_or(BusError::NotConnected(target))?;
        if !entry.authorized {
            warn!(connection = %target, "Targeted event for unauthorized connection, closing it");
            if let Some(entry) = state.connections.remove(&target) {
                let _ = entry.tx.send(Outbound::Close);
            }
            return Err(BusError::Unauthorized(target));
        }
        if entry.tx.send(Outbound::Text(text)).is_err() {
            state.connections.remove(&target);
            return Err(BusError::NotConnected(target));
        }
        Ok(1)
    }

    /// Answer the sender of an inbound message, authorized or not.
    pub fn reply(&self, id: ConnectionId, event: &Value) -> Result<()> {
        let text = encode(event)?;
        let state = self.state();
        let entry = state.connections.get(&id).ok_or(BusError::NotConnected(id))?;
        entry
            .tx
            .send(Outbound::Text(text))
            .map_err(|_| BusError::NotConnected(id))
    }

    #[must_use]
    pub fn connections(&self) -> Vec<ConnectionInfo> {
        self.state()
            .connections
            .iter()
            .map(|(id, entry)| ConnectionInfo {
                id: *id,
                remote_addr: entry.remote_addr,
                authorized: entry.authorized,
                connected_at: entry.connected_at,
            })
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state().connections.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn drain(rx: &mut mpsc::UnboundedReceiver<Outbound>) -> Vec<Outbound> {
        let mut frames = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            frames.push(frame);
        }
        frames
    }

    #[rstest]
    #[case(json!("plain text"), "plain text")]
    #[case(json!(42), "42")]
    #[case(json!({"type": "msg"}), r#"{"type":"msg"}"#)]
    fn test_encode(#[case] event: Value, #[case] expected: &str) {
        assert_eq!(encode(&event).unwrap(), expected);
    }

    #[test]
    fn test_untargeted_skips_unauthorized() {
        let bus = BroadcastBus::new(10);
        let (a, mut rx_a) = bus.connect(None).unwrap();
        let (_b, mut rx_b) = bus.connect(None).unwrap();
        bus.authorize(a).unwrap();

        let delivered = bus.deliver(&json!({"type": "x"}), None).unwrap();

        assert_eq!(delivered, 1);
        assert_eq!(drain(&mut rx_a), vec![Outbound::Text(r#"{"type":"x"}"#.into())]);
        assert!(drain(&mut rx_b).is_empty());
        assert_eq!(bus.len(), 2);
    }

    #[test]
    fn test_targeted_unauthorized_closes_connection() {
        let bus = BroadcastBus::new(10);
        let (id, mut rx) = bus.connect(None).unwrap();

        let err = bus.deliver(&json!("secret"), Some(id)).unwrap_err();

        assert!(matches!(err, BusError::Unauthorized(target) if target == id));
        assert_eq!(drain(&mut rx), vec![Outbound::Close]);
        assert!(bus.is_empty());
    }

    #[test]
    fn test_targeted_authorized_delivery() {
        let bus = BroadcastBus::new(10);
        let (id, mut rx) = bus.connect(None).unwrap();
        let (_other, mut other_rx) = bus.connect(None).unwrap();
        bus.authorize(id).unwrap();

        assert_eq!(bus.deliver(&json!("hi"), Some(id)).unwrap(), 1);
        assert_eq!(drain(&mut rx), vec![Outbound::Text("hi".into())]);
        assert!(drain(&mut other_rx).is_empty());
    }

    #[test]
    fn test_unknown_target() {
        let bus = BroadcastBus::new(10);
        let err = bus.deliver(&json!("hi"), Some(ConnectionId::new())).unwrap_err();
        assert!(matches!(err, BusError::NotConnected(_)));
    }

    #[test]
    fn test_reply_ignores_authorization() {
        let bus = BroadcastBus::new(10);
        let (id, mut rx) = bus.connect(None).unwrap();

        bus.reply(id, &json!({"error": {"code": 401}})).unwrap();
        assert_eq!(drain(&mut rx).len(), 1);
        assert!(!bus.is_authorized(id));
    }

    #[test]
    fn test_max_connections() {
        let bus = BroadcastBus::new(1);
        let _first = bus.connect(None).unwrap();
        assert!(matches!(
            bus.connect(None),
            Err(BusError::MaxConnectionsReached(1))
        ));
    }

    #[test]
    fn test_dropped_receiver_is_pruned() {
        let bus = BroadcastBus::new(10);
        let (id, rx) = bus.connect(None).unwrap();
        bus.authorize(id).unwrap();
        drop(rx);

        assert_eq!(bus.deliver(&json!("x"), None).unwrap(), 0);
        assert!(bus.is_empty());
    }

    #[test]
    fn test_disconnect() {
        let bus = BroadcastBus::new(10);
        let (id, mut rx) = bus.connect(None).unwrap();
        assert!(bus.disconnect(id));
        assert!(!bus.disconnect(id));
        assert_eq!(drain(&mut rx), vec![Outbound::Close]);
    }
}
