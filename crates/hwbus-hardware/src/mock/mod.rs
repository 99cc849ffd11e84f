//! In-memory platform for development and testing.
//!
//! [`MockPlatform`] hands out SPI buses, GPIO pins and USB handles that record
//! every operation into shared state. The paired [`MockPlatformHandle`] reads
//! that state back and injects faults.
//!
//! ```
//! use hwbus_hardware::mock::MockPlatform;
//! use hwbus_hardware::traits::SpiBus;
//! use hwbus_hardware::transfer::TransferOptions;
//!
//! #[tokio::main]
//! async fn main() -> hwbus_hardware::Result<()> {
//!     let (platform, handle) = MockPlatform::new();
//!     let mut bus = platform.open_spi(0, 0, 4_000_000).await?;
//!
//!     bus.transfer(&[1, 2, 3], &TransferOptions::default()).await?;
//!     assert_eq!(handle.transfers_on("spidev0.0"), vec![vec![1, 2, 3]]);
//!     Ok(())
//! }
//! ```

mod bus;
mod platform;

pub use bus::{MockPin, MockSpiBus, MockUsb};
pub use platform::{MockPlatform, MockPlatformHandle, PinRecord, SpiTransfer, UsbTransfer};
