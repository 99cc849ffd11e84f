//! Integration tests for DeviceRegistry
//!
//! These run every driver against the mock platform and check the lifecycle
//! guarantees: unique ids, per-device ordering, bounded opens and cleanup.

mod common;

use std::time::Duration;

use common::{apa102_strip, expect_err, mock_registry, pin, ws281x_strip};
use futures::future::join_all;
use hwbus_core::{DeviceId, DeviceKind, Error};
use hwbus_hardware::registry::DeviceEvent;
use serde_json::json;
use tokio::time::{Instant, timeout};

fn id(s: &str) -> DeviceId {
    DeviceId::new(s).unwrap()
}

#[tokio::test]
async fn test_duplicate_registration_conflicts_and_keeps_live_device() {
    let (registry, handle, _events) = mock_registry();

    registry.register(apa102_strip("strip", 3)).unwrap().await.unwrap();
    let err = expect_err(registry.register(apa102_strip("strip", 5)));

    assert!(matches!(err, Error::Conflict { .. }));
    assert_eq!(err.code(), 423);

    // The first instance is still the one answering.
    let data = registry
        .submit_read(DeviceKind::Item, &id("strip"), json!({}))
        .unwrap()
        .await
        .unwrap();
    assert_eq!(data["leds"].as_array().unwrap().len(), 3);
    assert_eq!(handle.transfers().len(), 1);
}

#[tokio::test]
async fn test_concurrent_registration_admits_exactly_one() {
    let (registry, _handle, _events) = mock_registry();

    let first = registry.register(apa102_strip("strip", 3));
    let second = registry.register(apa102_strip("strip", 3));

    assert!(first.is_ok());
    assert!(matches!(expect_err(second), Error::Conflict { .. }));
    first.unwrap().await.unwrap();
    assert_eq!(registry.len(), 1);
}

#[tokio::test]
async fn test_ids_are_shared_across_kinds() {
    let (registry, _handle, _events) = mock_registry();

    registry
        .register(pin(DeviceKind::Led, json!({"id": "x", "pin": 4})))
        .unwrap()
        .await
        .unwrap();
    let err = expect_err(registry.register(apa102_strip("x", 1)));
    assert!(matches!(err, Error::Conflict { .. }));

    // A request for the wrong kind does not find it.
    let err = expect_err(registry.submit_read(DeviceKind::Item, &id("x"), json!({})));
    assert!(matches!(err, Error::NotFound { .. }));
}

#[tokio::test]
async fn test_unknown_ids() {
    let (registry, _handle, _events) = mock_registry();

    let err = expect_err(registry.submit_write(DeviceKind::Item, &id("ghost"), json!({})));
    assert_eq!(err.code(), 404);
    assert!(registry.release(DeviceKind::Item, &id("ghost")).is_none());
}

#[tokio::test]
async fn test_writes_apply_in_submission_order() {
    let (registry, handle, _events) = mock_registry();
    let strip = registry.register(apa102_strip("strip", 2)).unwrap().await.unwrap();

    let writes: Vec<_> = ["#110000", "#002200", "#000033"]
        .into_iter()
        .map(|hex| {
            registry
                .submit_write(DeviceKind::Item, &strip.id, json!({"ledIndex": 1, "hex": hex}))
                .unwrap()
        })
        .collect();
    for result in join_all(writes).await {
        assert_eq!(result.unwrap(), json!({"status": "transferred"}));
    }

    let transfers = handle.transfers_on("spidev0.0");
    assert_eq!(transfers.len(), 4);
    // LED 1 lives at bytes 4..8 as [brightness, blue, green, red].
    assert_eq!(transfers[1][4..8], [0xFF, 0x00, 0x00, 0x11]);
    assert_eq!(transfers[2][4..8], [0xFF, 0x00, 0x22, 0x00]);
    assert_eq!(transfers[3][4..8], [0xFF, 0x33, 0x00, 0x00]);

    let data = registry
        .submit_read(DeviceKind::Item, &strip.id, json!({}))
        .unwrap()
        .await
        .unwrap();
    assert_eq!(data["leds"][0], json!({"red": 0, "green": 0, "blue": 0x33}));
}

#[tokio::test]
async fn test_rejected_write_does_not_transfer() {
    let (registry, handle, _events) = mock_registry();
    let strip = registry.register(apa102_strip("strip", 3)).unwrap().await.unwrap();

    let err = registry
        .submit_write(DeviceKind::Item, &strip.id, json!({"ledIndex": 4, "red": 1, "green": 1, "blue": 1}))
        .unwrap()
        .await
        .unwrap_err();
    assert_eq!(err.code(), 400);

    let err = registry
        .submit_write(DeviceKind::Item, &strip.id, json!({"red": 1}))
        .unwrap()
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "MissingData: Required: 'ledIndex' and {'red', 'green', 'blue'} or 'hex'");

    assert_eq!(handle.transfers().len(), 1);
}

#[tokio::test]
async fn test_oversized_strip_is_rejected_without_claiming_id() {
    let (registry, handle, _events) = mock_registry();

    for leds in [10_000_000_000_000_usize, 2_305_843_009_213_693_952] {
        let err = expect_err(registry.register(apa102_strip("big", leds)));
        assert_eq!(err.code(), 400);
        assert!(!registry.contains(&id("big")));
    }
    assert!(handle.open_resources().is_empty());

    registry.register(apa102_strip("big", 4096)).unwrap().await.unwrap();
    assert_eq!(handle.transfers()[0].data.len(), 4096 * 4 + 8);
}

#[tokio::test(start_paused = true)]
async fn test_ws281x_settles_before_first_write() {
    let (registry, handle, _events) = mock_registry();
    let start = Instant::now();

    let registered = registry.register(ws281x_strip("ws", 3)).unwrap();
    // Queued behind init.
    let write = registry
        .submit_write(DeviceKind::Item, &id("ws"), json!({"ledIndex": 2, "red": 255, "green": 0, "blue": 0}))
        .unwrap();

    registered.await.unwrap();
    assert!(start.elapsed() >= Duration::from_secs(1));
    write.await.unwrap();

    let transfers = handle.transfers();
    assert_eq!(transfers.len(), 2);
    assert_eq!(transfers[0].speed_hz, 10_000_000);
    assert_eq!(transfers[0].delay_us, 50);
    assert_eq!(transfers[0].data.len(), 27);
}

#[tokio::test(start_paused = true)]
async fn test_stalled_open_times_out_and_frees_id() {
    let (registry, handle, _events) = mock_registry();
    handle.stall_open("spidev0.0");

    let err = registry.register(apa102_strip("strip", 1)).unwrap().await.unwrap_err();
    assert!(matches!(err, Error::DeviceUnavailable { .. }));
    assert!(!registry.contains(&id("strip")));

    handle.clear_faults();
    registry.register(apa102_strip("strip", 1)).unwrap().await.unwrap();
}

#[tokio::test]
async fn test_four_mic_hat_powers_aux_pin() {
    let (registry, handle, _events) = mock_registry();
    let config = common::item(json!({"file": "mic-hat-leds", "options": {"model": "4mic"}}));

    let info = registry.register(config).unwrap().await.unwrap();
    assert_eq!(info.id.as_str(), "mic-hat-leds");
    assert_eq!(handle.pin(5).unwrap().value, 1);
    assert_eq!(handle.spi_speed("spidev0.1"), Some(4_000_000));
    assert_eq!(handle.last_transfer("spidev0.1").unwrap().len(), 12 * 4 + 8);

    registry
        .release(DeviceKind::Item, &info.id)
        .unwrap()
        .await
        .unwrap();
    assert_eq!(handle.pin_writes(5), vec![1, 0]);
    assert!(!handle.is_exported(5));
    assert!(!handle.is_open("spidev0.1"));
}

#[tokio::test]
async fn test_release_cleans_aux_pin_after_transfer_failure() {
    let (registry, handle, _events) = mock_registry();
    let config = common::item(json!({"id": "hat", "file": "mic-hat-leds", "options": {"model": "4mic"}}));
    registry.register(config).unwrap().await.unwrap();

    handle.fail_transfers("spidev0.1");
    let err = registry
        .release(DeviceKind::Item, &id("hat"))
        .unwrap()
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Transfer { .. }));
    assert!(!handle.is_exported(5));
    assert!(!handle.is_open("spidev0.1"));
    assert!(!registry.contains(&id("hat")));
}

#[tokio::test]
async fn test_failed_init_releases_aux_pin() {
    let (registry, handle, _events) = mock_registry();
    handle.fail_open("spidev0.1");
    let config = common::item(json!({"file": "mic-hat-leds", "options": {"model": "4mic"}}));

    let err = registry.register(config).unwrap().await.unwrap_err();
    assert_eq!(err.name(), "DeviceUnavailable");
    assert!(!handle.is_exported(5));
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_release_switches_leds_off() {
    let (registry, handle, _events) = mock_registry();
    let strip = registry.register(apa102_strip("strip", 2)).unwrap().await.unwrap();
    registry
        .submit_write(DeviceKind::Item, &strip.id, json!({"ledIndex": 2, "hex": "#ffffff"}))
        .unwrap()
        .await
        .unwrap();

    registry
        .release(DeviceKind::Item, &strip.id)
        .unwrap()
        .await
        .unwrap();

    let transfers = handle.transfers_on("spidev0.0");
    assert_eq!(transfers.len(), 3);
    assert_eq!(transfers[2], transfers[0]);
    assert!(!handle.is_open("spidev0.0"));
}

#[tokio::test]
async fn test_operations_after_release_are_rejected() {
    let (registry, _handle, _events) = mock_registry();
    let strip = registry.register(apa102_strip("strip", 1)).unwrap().await.unwrap();

    let release = registry.release(DeviceKind::Item, &strip.id).unwrap();
    let err = expect_err(registry.submit_write(DeviceKind::Item, &strip.id, json!({})));
    assert!(matches!(err, Error::NotReady { .. }));

    release.await.unwrap();
    let err = expect_err(registry.submit_write(DeviceKind::Item, &strip.id, json!({})));
    assert!(matches!(err, Error::NotFound { .. }));
}

#[tokio::test]
async fn test_button_edges_become_events() {
    let (registry, handle, mut events) = mock_registry();
    registry
        .register(pin(DeviceKind::Button, json!({"id": "btn", "pin": 17, "edge": "rising"})))
        .unwrap()
        .await
        .unwrap();

    assert!(handle.trigger_edge(17, 0));
    assert!(handle.trigger_edge(17, 1));

    let event = timeout(Duration::from_secs(1), events.recv())
        .await
        .expect("no edge event")
        .unwrap();
    assert_eq!(
        event,
        DeviceEvent::Edge {
            id: id("btn"),
            pin: 17,
            value: 1
        }
    );

    let data = registry
        .submit_read(DeviceKind::Button, &id("btn"), json!({}))
        .unwrap()
        .await
        .unwrap();
    assert_eq!(data, json!({"value": 1}));
}

#[tokio::test]
async fn test_led_set_and_get() {
    let (registry, handle, _events) = mock_registry();
    let led = registry
        .register(pin(DeviceKind::Led, json!({"pin": "4"})))
        .unwrap()
        .await
        .unwrap();
    assert_eq!(led.id.as_str(), "4");
    assert_eq!(led.pin, Some(4));

    let set = registry
        .submit_write(DeviceKind::Led, &led.id, json!({"value": 1}))
        .unwrap()
        .await
        .unwrap();
    assert_eq!(set, json!({"value": 1}));
    assert_eq!(handle.pin(4).unwrap().value, 1);

    let get = registry
        .submit_read(DeviceKind::Led, &led.id, json!({}))
        .unwrap()
        .await
        .unwrap();
    assert_eq!(get, json!({"value": 1}));

    registry.release(DeviceKind::Led, &led.id).unwrap().await.unwrap();
    assert!(!handle.is_exported(4));
}

#[tokio::test]
async fn test_release_all() {
    let (registry, handle, _events) = mock_registry();
    registry.register(apa102_strip("a", 1)).unwrap().await.unwrap();
    registry
        .register(pin(DeviceKind::Led, json!({"pin": 4})))
        .unwrap()
        .await
        .unwrap();
    registry
        .register(pin(DeviceKind::Button, json!({"pin": 17})))
        .unwrap()
        .await
        .unwrap();
    assert_eq!(registry.list().len(), 3);

    let pending = registry.release_all();
    assert_eq!(pending.len(), 3);
    for (_, result) in join_all(pending.into_iter().map(|(id, fut)| async move { (id, fut.await) })).await {
        result.unwrap();
    }

    assert!(registry.is_empty());
    assert!(handle.open_resources().is_empty());
}
