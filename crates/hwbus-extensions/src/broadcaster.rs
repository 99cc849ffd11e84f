//! Re-emits whatever it is sent to every authorized connection.

use hwbus_core::Message;
use hwbus_core::constants::{RESPONSE_SENT, RESPONSE_UNKNOWN};
use serde_json::{Value, json};

use crate::extension::{BROADCASTER, Extension, ExtensionCallbacks};

#[derive(Debug, Clone)]
pub struct Broadcaster {
    callbacks: ExtensionCallbacks,
}

impl Broadcaster {
    pub fn new(callbacks: ExtensionCallbacks) -> Self {
        callbacks.on_start(json!({ "msg": "Broadcaster initialized." }));
        Self { callbacks }
    }
}

impl Extension for Broadcaster {
    fn name(&self) -> &str {
        BROADCASTER
    }

    fn input(&self, message: &Message) -> Value {
        if message.data.is_null() {
            return json!(RESPONSE_UNKNOWN);
        }
        // The event may reach callers before the response does.
        self.callbacks
            .on_event(json!({ "broadcast": message.data }));
        json!(RESPONSE_SENT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extension::ExtensionEvent;
    use tokio::sync::mpsc;

    #[test]
    fn test_broadcast_wraps_data() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let broadcaster = Broadcaster::new(ExtensionCallbacks::new(BROADCASTER, tx));
        assert!(matches!(rx.try_recv(), Ok(ExtensionEvent::Started { .. })));

        let response = broadcaster.input(&Message::new(BROADCASTER, json!({"hello": "world"})));

        assert_eq!(response, json!("sent"));
        match rx.try_recv().unwrap() {
            ExtensionEvent::Event { extension, payload } => {
                assert_eq!(extension, "broadcaster");
                assert_eq!(payload, json!({"broadcast": {"hello": "world"}}));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_missing_data_is_unknown_request() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let broadcaster = Broadcaster::new(ExtensionCallbacks::new(BROADCASTER, tx));
        let _started = rx.try_recv();

        let response = broadcaster.input(&Message::new(BROADCASTER, Value::Null));

        assert_eq!(response, json!("unknown request"));
        assert!(rx.try_recv().is_err());
    }
}
