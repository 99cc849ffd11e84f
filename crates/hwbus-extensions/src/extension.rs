//! Extension contract.
//!
//! An extension is created once per configured name and lives until
//! shutdown. It gets three callback slots at construction:
//!
//! | slot       | relayed as                        |
//! |------------|-----------------------------------|
//! | `on_start` | logged only                       |
//! | `on_event` | `{type: <name>, data: <payload>}` |
//! | `on_error` | `{type: <name>, error: <payload>}`|
//!
//! `input` must return at once. Work that takes longer is started in the
//! background and reports back through `on_event`/`on_error`, echoing the
//! caller's `msgId` for correlation.

use hwbus_core::{Error, ErrorPayload, Message, Result};
use hwbus_hardware::Pending;
use hwbus_hardware::platform::Platform;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::trace;

use crate::broadcaster::Broadcaster;
use crate::gpio::GpioInterface;

/// Name of the GPIO interface extension.
pub const GPIO_INTERFACE: &str = "gpio-interface";

/// Name of the broadcaster extension.
pub const BROADCASTER: &str = "broadcaster";

/// Output of an extension callback.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtensionEvent {
    Started { extension: String, payload: Value },
    Event { extension: String, payload: Value },
    Error { extension: String, error: ErrorPayload },
}

impl ExtensionEvent {
    #[must_use]
    pub fn extension(&self) -> &str {
        match self {
            Self::Started { extension, .. }
            | Self::Event { extension, .. }
            | Self::Error { extension, .. } => extension,
        }
    }
}

/// The three callback slots handed to an extension.
#[derive(Debug, Clone)]
pub struct ExtensionCallbacks {
    extension: String,
    tx: mpsc::UnboundedSender<ExtensionEvent>,
}

impl ExtensionCallbacks {
    pub fn new(extension: impl Into<String>, tx: mpsc::UnboundedSender<ExtensionEvent>) -> Self {
        Self {
            extension: extension.into(),
            tx,
        }
    }

    #[must_use]
    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn on_start(&self, payload: Value) {
        self.send(ExtensionEvent::Started {
            extension: self.extension.clone(),
            payload,
        });
    }

    pub fn on_event(&self, payload: Value) {
        self.send(ExtensionEvent::Event {
            extension: self.extension.clone(),
            payload,
        });
    }

    pub fn on_error(&self, error: ErrorPayload) {
        self.send(ExtensionEvent::Error {
            extension: self.extension.clone(),
            error,
        });
    }

    fn send(&self, event: ExtensionEvent) {
        // The relay is gone only during shutdown.
        if self.tx.send(event).is_err() {
            trace!(extension = %self.extension, "Event dropped, relay stopped");
        }
    }
}

/// A resource an extension must give back at shutdown.
pub struct ReleaseTask {
    /// Human-readable name used in drain logs.
    pub label: String,
    pub future: Pending<()>,
}

impl std::fmt::Debug for ReleaseTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReleaseTask").field("label", &self.label).finish()
    }
}

/// Contract of every extension.
pub trait Extension: Send + Sync {
    fn name(&self) -> &str;

    /// Handle one routed message and return the immediate response.
    fn input(&self, message: &Message) -> Value;

    /// Start releasing everything the extension holds.
    fn release(&self) -> Vec<ReleaseTask> {
        Vec::new()
    }
}

/// Built-in extensions.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum AnyExtension {
    Gpio(GpioInterface),
    Broadcaster(Broadcaster),
}

impl AnyExtension {
    /// Create the built-in extension called `name`.
    ///
    /// # Errors
    /// `UnsupportedError` for an unknown name.
    pub fn from_name(name: &str, callbacks: ExtensionCallbacks, platform: &Platform) -> Result<Self> {
        match name {
            GPIO_INTERFACE => Ok(Self::Gpio(GpioInterface::new(callbacks, platform.clone()))),
            BROADCASTER => Ok(Self::Broadcaster(Broadcaster::new(callbacks))),
            other => Err(Error::unsupported(format!("extension '{other}'"))),
        }
    }
}

impl Extension for AnyExtension {
    fn name(&self) -> &str {
        match self {
            Self::Gpio(ext) => ext.name(),
            Self::Broadcaster(ext) => ext.name(),
        }
    }

    fn input(&self, message: &Message) -> Value {
        match self {
            Self::Gpio(ext) => ext.input(message),
            Self::Broadcaster(ext) => ext.input(message),
        }
    }

    fn release(&self) -> Vec<ReleaseTask> {
        match self {
            Self::Gpio(ext) => ext.release(),
            Self::Broadcaster(ext) => ext.release(),
        }
    }
}
