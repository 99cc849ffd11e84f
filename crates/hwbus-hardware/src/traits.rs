//! Primitive and device trait definitions.
//!
//! Primitives (`SpiBus`, `GpioPin`, `UsbControl`) are the platform-supplied
//! "submit bytes, get completion or error" handles. [`Device`] is the common
//! contract every driver implements on top of them.
//!
//! All traits use native `async fn` (Edition 2024). Dispatch over concrete
//! implementations goes through the `Any*` enums in [`crate::bus`] and
//! [`crate::devices`].

#![allow(async_fn_in_trait)]

use hwbus_core::DeviceKind;
use serde::Serialize;
use serde_json::Value;

use crate::error::Result;
use crate::transfer::TransferOptions;

/// A clocked serial bus accepting whole-buffer writes.
pub trait SpiBus: Send {
    /// Resource name used in logs and errors, e.g. `spidev0.1`.
    fn resource(&self) -> &str;

    /// Write `data` as one message.
    async fn transfer(&mut self, data: &[u8], options: &TransferOptions) -> Result<()>;

    /// Close the bus. Closing twice is a no-op.
    async fn close(&mut self) -> Result<()>;
}

/// An exported GPIO pin.
pub trait GpioPin: Send {
    fn number(&self) -> u32;

    /// Current level, `0` or `1`.
    async fn read(&mut self) -> Result<u8>;

    async fn write(&mut self, value: u8) -> Result<()>;

    /// Wait for the next level change matching the configured edge.
    ///
    /// Must be cancel-safe: it is raced against other work in `select!`.
    async fn next_edge(&mut self) -> Result<u8>;

    /// Release the pin back to the OS. Unexporting twice is a no-op.
    async fn unexport(&mut self) -> Result<()>;
}

/// A USB device reachable through vendor control transfers.
pub trait UsbControl: Send {
    fn resource(&self) -> &str;

    /// Host-to-device control transfer; returns the number of bytes written.
    async fn control_out(
        &mut self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        data: &[u8],
    ) -> Result<usize>;

    async fn close(&mut self) -> Result<()>;
}

/// Lifecycle of a device. `Released` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceState {
    Uninitialized,
    Ready,
    Released,
}

/// Common contract of every driver.
///
/// Errors use the caller-facing taxonomy so they can be forwarded as events
/// without further translation.
pub trait Device: Send {
    fn kind(&self) -> DeviceKind;

    fn state(&self) -> DeviceState;

    fn is_ready(&self) -> bool {
        self.state() == DeviceState::Ready
    }

    /// Open the underlying resource and put the hardware in a known state.
    async fn init(&mut self) -> hwbus_core::Result<()>;

    /// Apply `data` and return a driver-specific result.
    async fn write_data(&mut self, data: &Value) -> hwbus_core::Result<Value>;

    /// Snapshot of the device state; never touches the bus.
    async fn read_data(&mut self, options: &Value) -> hwbus_core::Result<Value>;

    /// Switch everything off and release the resource. Idempotent.
    async fn release(&mut self) -> hwbus_core::Result<()>;
}
