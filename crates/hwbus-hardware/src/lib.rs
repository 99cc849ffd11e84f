//! Device layer of the hwbus server.
//!
//! This crate turns `register`/`set`/`get`/`release` requests into driver
//! calls on real or simulated hardware.
//!
//! # Layers
//!
//! - **Primitives** ([`traits::SpiBus`], [`traits::GpioPin`],
//!   [`traits::UsbControl`]): submit bytes, get completion or error. Provided
//!   by a [`platform::Platform`], either the in-memory [`mock`] platform or
//!   the Linux backends behind the `hardware-*` features.
//! - **Drivers** ([`drivers`]): buttons, LEDs, SPI LED strips and the USB LED
//!   ring, all implementing [`traits::Device`].
//! - **Registry** ([`registry::DeviceRegistry`]): owns every live device and
//!   serializes operations per device.
//!
//! # Example
//!
//! ```
//! use hwbus_core::DeviceKind;
//! use hwbus_hardware::config::DeviceConfig;
//! use hwbus_hardware::mock::MockPlatform;
//! use hwbus_hardware::platform::Platform;
//! use hwbus_hardware::registry::DeviceRegistry;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> hwbus_core::Result<()> {
//!     let (mock, handle) = MockPlatform::new();
//!     let (registry, _events) = DeviceRegistry::new(Platform::Mock(mock));
//!
//!     let config = DeviceConfig::parse(
//!         DeviceKind::Item,
//!         &json!({"file": "spi-rgb-leds", "options": {"numOfLeds": 3, "ledType": "apa102"}}),
//!     )?;
//!     let info = registry.register(config)?.await?;
//!
//!     registry
//!         .submit_write(DeviceKind::Item, &info.id, json!({"ledIndex": 1, "hex": "#ff0000"}))?
//!         .await?;
//!     assert_eq!(handle.transfers().len(), 2);
//!     Ok(())
//! }
//! ```

pub mod bus;
pub mod config;
pub mod descriptor;
pub mod devices;
pub mod drivers;
pub mod error;
#[cfg(any(feature = "hardware-spi", feature = "hardware-gpio", feature = "hardware-usb"))]
pub mod linux;
pub mod mock;
pub mod platform;
pub mod registry;
pub mod traits;
pub mod transfer;

pub use config::DeviceConfig;
pub use descriptor::{Driver, DriverDescriptor};
pub use devices::AnyDevice;
pub use error::{HardwareError, Result};
pub use platform::{Platform, PlatformKind};
pub use registry::{DeviceEvent, DeviceInfo, DeviceRegistry, Pending};
pub use traits::{Device, DeviceState};
