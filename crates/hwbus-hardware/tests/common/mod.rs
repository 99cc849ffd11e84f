//! Shared helpers for the hwbus-hardware integration tests.

#![allow(dead_code)]

use hwbus_core::{DeviceKind, Error};
use hwbus_hardware::config::DeviceConfig;
use hwbus_hardware::mock::{MockPlatform, MockPlatformHandle};
use hwbus_hardware::platform::Platform;
use hwbus_hardware::registry::{DeviceEvent, DeviceRegistry};
use serde_json::{Value, json};
use tokio::sync::mpsc::UnboundedReceiver;

/// A registry over a fresh mock platform.
pub fn mock_registry() -> (
    DeviceRegistry,
    MockPlatformHandle,
    UnboundedReceiver<DeviceEvent>,
) {
    let (mock, handle) = MockPlatform::new();
    let (registry, events) = DeviceRegistry::new(Platform::Mock(mock));
    (registry, handle, events)
}

pub fn item(config: Value) -> DeviceConfig {
    DeviceConfig::parse(DeviceKind::Item, &config).unwrap()
}

/// APA102 strip on `spidev0.0`.
pub fn apa102_strip(id: &str, leds: usize) -> DeviceConfig {
    item(json!({
        "id": id,
        "file": "spi-rgb-leds",
        "options": {"numOfLeds": leds, "ledType": "apa102"}
    }))
}

pub fn ws281x_strip(id: &str, leds: usize) -> DeviceConfig {
    item(json!({
        "id": id,
        "file": "spi-rgb-leds",
        "options": {"numOfLeds": leds, "ledType": "ws281x"}
    }))
}

pub fn pin(kind: DeviceKind, config: Value) -> DeviceConfig {
    DeviceConfig::parse(kind, &config).unwrap()
}

/// Unwrap the error of a result whose success type is not `Debug`.
pub fn expect_err<T>(result: Result<T, Error>) -> Error {
    match result {
        Ok(_) => panic!("expected an error"),
        Err(e) => e,
    }
}
