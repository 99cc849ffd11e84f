//! Shared helpers for the hwbus-extensions integration tests.

#![allow(dead_code)]

use std::time::Duration;

use hwbus_core::{ErrorPayload, Message};
use hwbus_extensions::{AnyExtension, ExtensionEvent, ExtensionRegistry, GPIO_INTERFACE, GpioInterface, Router};
use hwbus_hardware::mock::{MockPlatform, MockPlatformHandle};
use hwbus_hardware::platform::Platform;
use serde_json::Value;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;

pub struct Harness {
    pub router: Router,
    pub handle: MockPlatformHandle,
    pub events: UnboundedReceiver<ExtensionEvent>,
}

/// A router with the GPIO interface over a fresh mock platform.
pub fn gpio_harness() -> Harness {
    let (mock, handle) = MockPlatform::new();
    let platform = Platform::Mock(mock);
    let (extensions, events) = ExtensionRegistry::new();
    extensions
        .register(GPIO_INTERFACE, |cb| Ok(AnyExtension::Gpio(GpioInterface::new(cb, platform))))
        .unwrap();
    Harness {
        router: Router::new(extensions),
        handle,
        events,
    }
}

impl Harness {
    /// Send a GPIO request and return the router's `response`.
    pub fn send(&self, id: i64, data: Value) -> Value {
        let message = Message::new(GPIO_INTERFACE, data).with_id(id);
        self.router.route(&message)["response"].clone()
    }

    /// Next event or error, skipping start notifications.
    pub async fn next(&mut self) -> Outcome {
        loop {
            let event = timeout(Duration::from_secs(5), self.events.recv())
                .await
                .expect("no extension event")
                .expect("event stream closed");
            match event {
                ExtensionEvent::Started { .. } => continue,
                ExtensionEvent::Event { payload, .. } => return Outcome::Event(payload["gpio"].clone()),
                ExtensionEvent::Error { error, .. } => return Outcome::Error(error),
            }
        }
    }

    pub async fn next_event(&mut self) -> Value {
        match self.next().await {
            Outcome::Event(event) => event,
            Outcome::Error(error) => panic!("expected an event, got error {error:?}"),
        }
    }

    pub async fn next_error(&mut self) -> ErrorPayload {
        match self.next().await {
            Outcome::Error(error) => error,
            Outcome::Event(event) => panic!("expected an error, got event {event}"),
        }
    }
}

#[derive(Debug)]
pub enum Outcome {
    Event(Value),
    Error(ErrorPayload),
}
