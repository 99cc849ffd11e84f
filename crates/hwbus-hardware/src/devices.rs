//! Enum dispatch over every driver.
//!
//! The registry stores [`AnyDevice`] values; `Box<dyn Device>` is not an
//! option with native `async fn` in traits.
//!
//! ```
//! use hwbus_core::DeviceKind;
//! use hwbus_hardware::config::DeviceConfig;
//! use hwbus_hardware::devices::AnyDevice;
//! use hwbus_hardware::mock::MockPlatform;
//! use hwbus_hardware::platform::Platform;
//! use hwbus_hardware::traits::{Device, DeviceState};
//! use serde_json::json;
//!
//! let (mock, _handle) = MockPlatform::new();
//! let config = DeviceConfig::parse(DeviceKind::Led, &json!({"pin": 17})).unwrap();
//! let device = AnyDevice::build(config, Platform::Mock(mock)).unwrap();
//!
//! assert_eq!(device.kind(), DeviceKind::Led);
//! assert_eq!(device.state(), DeviceState::Uninitialized);
//! ```

use hwbus_core::DeviceKind;
use serde_json::Value;

use crate::config::DeviceConfig;
use crate::descriptor::Driver;
use crate::drivers::{ButtonDevice, LedDevice, RingConfig, RingDevice, StripConfig, StripDevice};
use crate::error::Result;
use crate::platform::Platform;
use crate::traits::{Device, DeviceState};

#[derive(Debug)]
#[non_exhaustive]
pub enum AnyDevice {
    Button(ButtonDevice),
    Led(LedDevice),
    Strip(StripDevice),
    Ring(RingDevice),
}

impl AnyDevice {
    /// Construct the driver for `config`. Nothing is opened yet.
    ///
    /// # Errors
    /// Driver option errors (`ConfigError`, `UnsupportedError`).
    pub fn build(config: DeviceConfig, platform: Platform) -> hwbus_core::Result<Self> {
        Ok(match config {
            DeviceConfig::Button(pin) => Self::Button(ButtonDevice::new(pin, platform)),
            DeviceConfig::Led(pin) => Self::Led(LedDevice::new(pin, platform)),
            DeviceConfig::Item(item) => match item.driver {
                Driver::SpiRgbLeds => Self::Strip(StripDevice::new(
                    item.id,
                    StripConfig::spi_rgb_leds(&item.options)?,
                    platform,
                )),
                Driver::MicHatLeds => Self::Strip(StripDevice::new(
                    item.id,
                    StripConfig::mic_hat(&item.options)?,
                    platform,
                )),
                Driver::UsbPixelRing => Self::Ring(RingDevice::new(
                    item.id,
                    RingConfig::parse(&item.options)?,
                    platform,
                )),
            },
        })
    }

    /// Pin number for buttons and LEDs.
    #[must_use]
    pub fn pin_number(&self) -> Option<u32> {
        match self {
            Self::Button(device) => Some(device.pin_number()),
            Self::Led(device) => Some(device.pin_number()),
            Self::Strip(_) | Self::Ring(_) => None,
        }
    }

    /// Next button edge. Never resolves for other devices.
    pub async fn next_edge(&mut self) -> Result<u8> {
        match self {
            Self::Button(device) => device.next_edge().await,
            _ => std::future::pending().await,
        }
    }
}

impl Device for AnyDevice {
    fn kind(&self) -> DeviceKind {
        match self {
            Self::Button(device) => device.kind(),
            Self::Led(device) => device.kind(),
            Self::Strip(device) => device.kind(),
            Self::Ring(device) => device.kind(),
        }
    }

    fn state(&self) -> DeviceState {
        match self {
            Self::Button(device) => device.state(),
            Self::Led(device) => device.state(),
            Self::Strip(device) => device.state(),
            Self::Ring(device) => device.state(),
        }
    }

    async fn init(&mut self) -> hwbus_core::Result<()> {
        match self {
            Self::Button(device) => device.init().await,
            Self::Led(device) => device.init().await,
            Self::Strip(device) => device.init().await,
            Self::Ring(device) => device.init().await,
        }
    }

    async fn write_data(&mut self, data: &Value) -> hwbus_core::Result<Value> {
        match self {
            Self::Button(device) => device.write_data(data).await,
            Self::Led(device) => device.write_data(data).await,
            Self::Strip(device) => device.write_data(data).await,
            Self::Ring(device) => device.write_data(data).await,
        }
    }

    async fn read_data(&mut self, options: &Value) -> hwbus_core::Result<Value> {
        match self {
            Self::Button(device) => device.read_data(options).await,
            Self::Led(device) => device.read_data(options).await,
            Self::Strip(device) => device.read_data(options).await,
            Self::Ring(device) => device.read_data(options).await,
        }
    }

    async fn release(&mut self) -> hwbus_core::Result<()> {
        match self {
            Self::Button(device) => device.release().await,
            Self::Led(device) => device.release().await,
            Self::Strip(device) => device.release().await,
            Self::Ring(device) => device.release().await,
        }
    }
}
