//! Inbound message and outbound error envelopes.
//!
//! Inbound messages look like
//!
//! ```text
//! { "type": "gpio-interface", "data": { ... }, "id": 7, "timestamp": 1700000000000 }
//! ```
//!
//! `type` selects the extension (or a reserved control type) and `id` is an
//! opaque correlation token that is echoed back in replies and events.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Error;

/// Caller-chosen correlation token (number or string, echoed verbatim).
pub type MsgId = Value;

/// A message received from a remote caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Target extension name or reserved control type.
    #[serde(rename = "type")]
    pub kind: String,

    /// Extension-specific payload.
    #[serde(default)]
    pub data: Value,

    /// Correlation token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<MsgId>,

    /// Caller timestamp in milliseconds (`ts` is accepted too).
    #[serde(default, alias = "ts", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,

    /// Free text used by the `msg` echo type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Message {
    pub fn new(kind: impl Into<String>, data: Value) -> Self {
        Self {
            kind: kind.into(),
            data,
            id: None,
            timestamp: None,
            text: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<MsgId>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// The `error` object of an outbound error event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub name: String,
    pub msg: String,
    pub code: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg_id: Option<MsgId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

impl ErrorPayload {
    pub fn new(name: impl Into<String>, msg: impl Into<String>, code: u16) -> Self {
        Self {
            name: name.into(),
            msg: msg.into(),
            code,
            msg_id: None,
            item_id: None,
            action: None,
        }
    }

    pub fn with_msg_id(mut self, msg_id: Option<MsgId>) -> Self {
        self.msg_id = msg_id;
        self
    }

    pub fn with_item_id(mut self, item_id: impl Into<String>) -> Self {
        self.item_id = Some(item_id.into());
        self
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }
}

impl From<&Error> for ErrorPayload {
    fn from(error: &Error) -> Self {
        Self::new(error.name(), error.to_string(), error.code())
    }
}
