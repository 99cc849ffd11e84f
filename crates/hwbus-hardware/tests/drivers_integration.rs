//! Driver-level tests against the mock platform, without the registry.

mod common;

use hwbus_core::{DeviceId, Error};
use hwbus_hardware::drivers::{RingConfig, RingDevice, StripConfig, StripDevice};
use hwbus_hardware::mock::MockPlatform;
use hwbus_hardware::platform::Platform;
use hwbus_hardware::traits::{Device, DeviceState};
use hwbus_protocol::Chipset;
use rstest::rstest;
use serde_json::json;

fn strip(leds: usize) -> (StripDevice, hwbus_hardware::mock::MockPlatformHandle) {
    let (mock, handle) = MockPlatform::new();
    let config = StripConfig {
        chipset: Chipset::Apa102,
        num_leds: leds,
        spi_bus: 0,
        spi_device: 0,
        aux_pin: None,
    };
    (
        StripDevice::new(DeviceId::new("strip").unwrap(), config, Platform::Mock(mock)),
        handle,
    )
}

fn ring() -> (RingDevice, hwbus_hardware::mock::MockPlatformHandle) {
    let (mock, handle) = MockPlatform::new();
    (
        RingDevice::new(
            DeviceId::new("ring").unwrap(),
            RingConfig::default(),
            Platform::Mock(mock),
        ),
        handle,
    )
}

#[tokio::test]
async fn test_strip_before_init() {
    let (mut device, handle) = strip(3);

    assert!(matches!(device.read_data(&json!({})).await, Err(Error::NoData)));
    let err = device
        .write_data(&json!({"ledIndex": 1, "hex": "#ffffff"}))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotReady { .. }));
    assert!(handle.transfers().is_empty());
}

#[tokio::test]
async fn test_strip_release_is_idempotent() {
    let (mut device, handle) = strip(1);
    device.init().await.unwrap();

    device.release().await.unwrap();
    device.release().await.unwrap();

    assert_eq!(device.state(), DeviceState::Released);
    assert_eq!(handle.transfers().len(), 2);
    assert!(device.init().await.is_err());
}

#[tokio::test]
async fn test_strip_failed_transfer_keeps_last_write() {
    let (mut device, handle) = strip(2);
    device.init().await.unwrap();

    handle.fail_transfers("spidev0.0");
    let err = device
        .write_data(&json!({"ledIndex": 2, "red": 9, "green": 8, "blue": 7}))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Transfer { .. }));

    // The buffer holds the write; the next successful transfer carries it.
    handle.clear_faults();
    device
        .write_data(&json!({"ledIndex": 1, "red": 1, "green": 0, "blue": 0}))
        .await
        .unwrap();
    let last = handle.last_transfer("spidev0.0").unwrap();
    assert_eq!(last[8..12], [0xFF, 7, 8, 9]);
}

#[tokio::test]
async fn test_strip_brightness_level() {
    let (mut device, handle) = strip(1);
    device.init().await.unwrap();

    device
        .write_data(&json!({"ledIndex": 1, "red": 1, "green": 2, "blue": 3, "brightness": 7}))
        .await
        .unwrap();
    assert_eq!(handle.last_transfer("spidev0.0").unwrap()[4..8], [0xE7, 3, 2, 1]);

    let err = device
        .write_data(&json!({"ledIndex": 1, "red": 1, "green": 2, "blue": 3, "brightness": 32}))
        .await
        .unwrap_err();
    assert_eq!(err.code(), 400);
}

#[tokio::test]
async fn test_strip_read_reports_buffer_and_colors() {
    let (mut device, _handle) = strip(2);
    device.init().await.unwrap();
    device
        .write_data(&json!({"ledIndex": 2, "hex": "#0a0b0c"}))
        .await
        .unwrap();

    let data = device.read_data(&json!({})).await.unwrap();
    assert_eq!(data["buffer"].as_array().unwrap().len(), 16);
    assert_eq!(data["leds"][1], json!({"red": 10, "green": 11, "blue": 12}));
}

#[tokio::test]
async fn test_ring_init_sequence() {
    let (mut device, handle) = ring();
    device.init().await.unwrap();

    let transfers = handle.usb_transfers();
    assert_eq!(transfers.len(), 2);
    assert_eq!(
        (transfers[0].request_type, transfers[0].request, transfers[0].value, transfers[0].index),
        (0x40, 0, 0x22, 0x1C)
    );
    assert_eq!(transfers[0].data, vec![0]);
    assert_eq!(transfers[1].value, 0x20);
    assert_eq!(transfers[1].data, vec![10]);
}

#[rstest]
#[case("idle", 1, vec![0, 0, 0, 0])]
#[case("listening", 2, vec![0])]
#[case("speaking", 4, vec![0])]
#[case("loading", 5, vec![0])]
#[tokio::test]
async fn test_ring_states(#[case] state: &str, #[case] value: u16, #[case] data: Vec<u8>) {
    let (mut device, handle) = ring();
    device.init().await.unwrap();

    let result = device.write_data(&json!({ "state": state })).await.unwrap();
    assert_eq!(result["state"], state);

    let last = handle.usb_transfers().pop().unwrap();
    assert_eq!(last.value, value);
    assert_eq!(last.data, data);
}

#[tokio::test]
async fn test_ring_wake_word_only_changes_vad() {
    let (mut device, _handle) = ring();
    device.init().await.unwrap();
    device.write_data(&json!({"state": "listening"})).await.unwrap();
    device.write_data(&json!({"state": "wakeWordActive"})).await.unwrap();

    let data = device.read_data(&json!({})).await.unwrap();
    assert_eq!(data["state"], "listening");
    assert_eq!(data["vad"], "on");
}

#[tokio::test]
async fn test_ring_custom_frame() {
    let (mut device, handle) = ring();
    device.init().await.unwrap();

    let err = device.write_data(&json!({"state": "custom"})).await.unwrap_err();
    assert_eq!(err.code(), 400);

    device
        .write_data(&json!({"state": "custom", "rgb0Array": [255, 0, 0, 0]}))
        .await
        .unwrap();
    let last = handle.usb_transfers().pop().unwrap();
    assert_eq!(last.value, 6);
    assert_eq!(last.data, vec![255, 0, 0, 0]);
}

#[tokio::test]
async fn test_ring_rejects_unknown_state() {
    let (mut device, _handle) = ring();
    device.init().await.unwrap();

    let err = device.write_data(&json!({"state": "dancing"})).await.unwrap_err();
    assert_eq!(err.to_string(), "WrongData: Unknown state 'dancing'");
    let err = device.write_data(&json!({})).await.unwrap_err();
    assert_eq!(err.to_string(), "MissingData: Required: state");
}

#[tokio::test]
async fn test_ring_release_closes_even_when_idle_fails() {
    let (mut device, handle) = ring();
    device.init().await.unwrap();

    handle.fail_transfers("usb-2886:0018");
    assert!(device.release().await.is_err());
    assert!(!handle.is_open("usb-2886:0018"));
}

#[tokio::test]
async fn test_ring_missing_device() {
    let (mut device, handle) = ring();
    handle.fail_open("usb-2886:0018");

    let err = device.init().await.unwrap_err();
    assert_eq!(err.name(), "DeviceUnavailable");
    assert!(matches!(device.read_data(&json!({})).await, Err(Error::NoData)));
}
