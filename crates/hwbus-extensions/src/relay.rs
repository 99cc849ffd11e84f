//! Forwards extension callbacks to the broadcast bus.

use hwbus_network::BroadcastBus;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::extension::ExtensionEvent;

/// Relay every event until all callback senders are gone.
///
/// Events go to every authorized connection as `{type, data}`, errors as
/// `{type, error}`. Start payloads are only logged.
pub fn spawn_relay(mut events: mpsc::UnboundedReceiver<ExtensionEvent>, bus: BroadcastBus) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let envelope = match event {
                ExtensionEvent::Started { extension, payload } => {
                    info!(extension = %extension, %payload, "Extension started");
                    continue;
                }
                ExtensionEvent::Event { extension, payload } => {
                    debug!(extension = %extension, "Broadcasting event");
                    json!({ "type": extension, "data": payload })
                }
                ExtensionEvent::Error { extension, error } => {
                    debug!(extension = %extension, code = error.code, "Broadcasting error");
                    json!({ "type": extension, "error": error })
                }
            };
            if let Err(e) = bus.deliver(&envelope, None) {
                warn!(error = %e, "Relay delivery failed");
            }
        }
        debug!("Extension event stream closed");
    })
}
