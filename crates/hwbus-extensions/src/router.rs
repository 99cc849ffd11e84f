//! Routes inbound messages to extensions by `type`.
//!
//! Reply shape: `{type, response, id}`. Two types are answered here:
//! `msg` echoes its text, and anything unmatched gets
//! `{type: "undefined", response: "unknown message type: <type>"}`.

use hwbus_core::Message;
use hwbus_core::constants::{TYPE_MSG, TYPE_UNDEFINED};
use hwbus_network::{ConnectionId, InboundHandler};
use serde_json::{Value, json};
use tracing::debug;

use crate::extension::Extension;
use crate::registry::ExtensionRegistry;

#[derive(Debug, Clone)]
pub struct Router {
    extensions: ExtensionRegistry,
}

impl Router {
    pub fn new(extensions: ExtensionRegistry) -> Self {
        Self { extensions }
    }

    #[must_use]
    pub fn extensions(&self) -> &ExtensionRegistry {
        &self.extensions
    }

    /// Hand `message` to its extension and build the reply.
    pub fn route(&self, message: &Message) -> Value {
        if let Some(extension) = self.extensions.get(&message.kind) {
            debug!(extension = %message.kind, msg_id = ?message.id, "Calling extension");
            let response = extension.input(message);
            return reply(&message.kind, response, message);
        }

        if message.kind == TYPE_MSG {
            let text = message
                .text
                .clone()
                .map(Value::String)
                .or_else(|| message.data.get("text").cloned())
                .unwrap_or(Value::Null);
            return reply(TYPE_MSG, text, message);
        }

        debug!(kind = %message.kind, "Unknown message type");
        reply(
            TYPE_UNDEFINED,
            json!(format!("unknown message type: {}", message.kind)),
            message,
        )
    }
}

fn reply(kind: &str, response: Value, message: &Message) -> Value {
    let mut reply = json!({ "type": kind, "response": response });
    if let Some(id) = &message.id {
        reply["id"] = id.clone();
    }
    reply
}

impl InboundHandler for Router {
    fn handle(&self, _connection: ConnectionId, message: Message) -> Value {
        self.route(&message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn router() -> Router {
        let (extensions, _events) = ExtensionRegistry::new();
        Router::new(extensions)
    }

    #[rstest]
    #[case(json!({"type": "msg", "text": "hello", "id": 1}), json!({"type": "msg", "response": "hello", "id": 1}))]
    #[case(json!({"type": "msg", "data": {"text": "hi"}}), json!({"type": "msg", "response": "hi"}))]
    #[case(
        json!({"type": "lights", "id": "x"}),
        json!({"type": "undefined", "response": "unknown message type: lights", "id": "x"})
    )]
    fn test_reserved_types(#[case] message: Value, #[case] expected: Value) {
        let message: Message = serde_json::from_value(message).unwrap();
        assert_eq!(router().route(&message), expected);
    }
}
