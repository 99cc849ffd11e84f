use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use hwbus_core::{PinDirection, PinEdge};
use tokio::sync::mpsc;

use super::bus::{MockPin, MockSpiBus, MockUsb};
use crate::error::{HardwareError, Result};
use crate::platform::{pin_resource, spi_resource, usb_resource};

/// One recorded SPI write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpiTransfer {
    pub resource: String,
    pub data: Vec<u8>,
    pub speed_hz: u32,
    pub delay_us: u16,
}

/// One recorded USB control transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsbTransfer {
    pub resource: String,
    pub request_type: u8,
    pub request: u8,
    pub value: u16,
    pub index: u16,
    pub data: Vec<u8>,
}

/// Current configuration and level of an exported mock pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinRecord {
    pub direction: PinDirection,
    pub edge: PinEdge,
    pub value: u8,
}

#[derive(Debug, Default)]
pub(super) struct MockState {
    pub(super) open: HashSet<String>,
    pub(super) spi_speeds: HashMap<String, u32>,
    pub(super) transfers: Vec<SpiTransfer>,
    pub(super) pins: HashMap<u32, PinRecord>,
    pub(super) pin_writes: Vec<(u32, u8)>,
    pub(super) edges: HashMap<u32, mpsc::UnboundedSender<u8>>,
    pub(super) usb_transfers: Vec<UsbTransfer>,
    fail_open: HashSet<String>,
    stall_open: HashSet<String>,
    pub(super) fail_transfer: HashSet<String>,
    pub(super) stall_transfer: HashSet<String>,
    pub(super) fail_close: HashSet<String>,
}

#[derive(Debug, Clone, Default)]
pub(super) struct Shared(Arc<Mutex<MockState>>);

impl Shared {
    pub(super) fn lock(&self) -> MutexGuard<'_, MockState> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Platform whose resources exist only in memory.
///
/// Cheap to clone; clones share the same recorded state.
#[derive(Debug, Clone)]
pub struct MockPlatform {
    shared: Shared,
}

impl MockPlatform {
    /// Create a platform and the handle observing it.
    pub fn new() -> (Self, MockPlatformHandle) {
        let shared = Shared::default();
        (
            Self {
                shared: shared.clone(),
            },
            MockPlatformHandle { shared },
        )
    }

    /// Open `spidev{bus}.{device}` with a maximum clock of `speed_hz`.
    pub async fn open_spi(&self, bus: u8, device: u8, speed_hz: u32) -> Result<MockSpiBus> {
        let resource = spi_resource(bus, device);
        self.before_open(&resource).await?;

        let mut state = self.shared.lock();
        state.open.insert(resource.clone());
        state.spi_speeds.insert(resource.clone(), speed_hz);
        drop(state);
        Ok(MockSpiBus::new(resource, self.shared.clone()))
    }

    /// Export a pin. Exporting a pin that is already exported fails as busy.
    pub async fn open_pin(&self, number: u32, direction: PinDirection, edge: PinEdge) -> Result<MockPin> {
        let resource = pin_resource(number);
        self.before_open(&resource).await?;

        let (edge_tx, edge_rx) = mpsc::unbounded_channel();
        let mut state = self.shared.lock();
        if state.pins.contains_key(&number) {
            return Err(HardwareError::open_failed(resource, "pin is busy"));
        }
        let value = match direction {
            PinDirection::High => 1,
            _ => 0,
        };
        state.pins.insert(
            number,
            PinRecord {
                direction,
                edge,
                value,
            },
        );
        state.edges.insert(number, edge_tx);
        state.open.insert(resource.clone());
        drop(state);

        Ok(MockPin::new(number, resource, edge, edge_rx, self.shared.clone()))
    }

    pub async fn open_usb(&self, vendor_id: u16, product_id: u16) -> Result<MockUsb> {
        let resource = usb_resource(vendor_id, product_id);
        self.before_open(&resource).await?;

        self.shared.lock().open.insert(resource.clone());
        Ok(MockUsb::new(resource, self.shared.clone()))
    }

    async fn before_open(&self, resource: &str) -> Result<()> {
        let (fail, stall) = {
            let state = self.shared.lock();
            (
                state.fail_open.contains(resource),
                state.stall_open.contains(resource),
            )
        };
        if stall {
            std::future::pending::<()>().await;
        }
        if fail {
            return Err(HardwareError::open_failed(resource, "no such device"));
        }
        Ok(())
    }
}

/// Observes and steers a [`MockPlatform`].
#[derive(Debug, Clone)]
pub struct MockPlatformHandle {
    shared: Shared,
}

impl MockPlatformHandle {
    /// Make every future open of `resource` fail.
    pub fn fail_open(&self, resource: &str) {
        self.shared.lock().fail_open.insert(resource.to_string());
    }

    /// Make every future open of `resource` hang.
    pub fn stall_open(&self, resource: &str) {
        self.shared.lock().stall_open.insert(resource.to_string());
    }

    /// Make writes on `resource` fail (SPI transfers, pin writes, USB control).
    pub fn fail_transfers(&self, resource: &str) {
        self.shared.lock().fail_transfer.insert(resource.to_string());
    }

    /// Make writes on `resource` never complete.
    pub fn stall_transfers(&self, resource: &str) {
        self.shared.lock().stall_transfer.insert(resource.to_string());
    }

    /// Make closing or unexporting `resource` fail.
    pub fn fail_close(&self, resource: &str) {
        self.shared.lock().fail_close.insert(resource.to_string());
    }

    pub fn clear_faults(&self) {
        let mut state = self.shared.lock();
        state.fail_open.clear();
        state.stall_open.clear();
        state.fail_transfer.clear();
        state.stall_transfer.clear();
        state.fail_close.clear();
    }

    /// Drive an exported pin to `value` and notify its edge watcher.
    ///
    /// Returns `false` when the pin is not exported.
    pub fn trigger_edge(&self, number: u32, value: u8) -> bool {
        let mut state = self.shared.lock();
        let Some(record) = state.pins.get_mut(&number) else {
            return false;
        };
        record.value = value;
        state
            .edges
            .get(&number)
            .is_some_and(|tx| tx.send(value).is_ok())
    }

    #[must_use]
    pub fn transfers(&self) -> Vec<SpiTransfer> {
        self.shared.lock().transfers.clone()
    }

    /// Payloads written to one bus, oldest first.
    #[must_use]
    pub fn transfers_on(&self, resource: &str) -> Vec<Vec<u8>> {
        self.shared
            .lock()
            .transfers
            .iter()
            .filter(|t| t.resource == resource)
            .map(|t| t.data.clone())
            .collect()
    }

    #[must_use]
    pub fn last_transfer(&self, resource: &str) -> Option<Vec<u8>> {
        self.transfers_on(resource).pop()
    }

    /// Speed requested when the bus was opened.
    #[must_use]
    pub fn spi_speed(&self, resource: &str) -> Option<u32> {
        self.shared.lock().spi_speeds.get(resource).copied()
    }

    #[must_use]
    pub fn pin(&self, number: u32) -> Option<PinRecord> {
        self.shared.lock().pins.get(&number).copied()
    }

    /// Values written to one pin, oldest first.
    #[must_use]
    pub fn pin_writes(&self, number: u32) -> Vec<u8> {
        self.shared
            .lock()
            .pin_writes
            .iter()
            .filter(|(pin, _)| *pin == number)
            .map(|(_, value)| *value)
            .collect()
    }

    #[must_use]
    pub fn is_exported(&self, number: u32) -> bool {
        self.shared.lock().pins.contains_key(&number)
    }

    #[must_use]
    pub fn usb_transfers(&self) -> Vec<UsbTransfer> {
        self.shared.lock().usb_transfers.clone()
    }

    #[must_use]
    pub fn is_open(&self, resource: &str) -> bool {
        self.shared.lock().open.contains(resource)
    }

    /// Every resource currently held open, sorted.
    #[must_use]
    pub fn open_resources(&self) -> Vec<String> {
        let mut open: Vec<String> = self.shared.lock().open.iter().cloned().collect();
        open.sort();
        open
    }
}
