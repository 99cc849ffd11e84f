//! Platform selection and bounded resource opening.

use std::future::Future;
use std::str::FromStr;

use hwbus_core::constants::OPEN_TIMEOUT;
use hwbus_core::{PinDirection, PinEdge};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bus::{AnyPin, AnySpiBus, AnyUsb};
use crate::error::{HardwareError, Result};
use crate::mock::MockPlatform;

/// `spidev{bus}.{device}`
#[must_use]
pub fn spi_resource(bus: u8, device: u8) -> String {
    format!("spidev{bus}.{device}")
}

/// `gpio{number}`
#[must_use]
pub fn pin_resource(number: u32) -> String {
    format!("gpio{number}")
}

/// `usb-{vendor}:{product}` in lowercase hex.
#[must_use]
pub fn usb_resource(vendor_id: u16, product_id: u16) -> String {
    format!("usb-{vendor_id:04x}:{product_id:04x}")
}

/// Which backend the server drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformKind {
    #[default]
    Mock,
    Linux,
}

impl FromStr for PlatformKind {
    type Err = hwbus_core::Error;

    fn from_str(s: &str) -> hwbus_core::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mock" => Ok(Self::Mock),
            "linux" => Ok(Self::Linux),
            other => Err(hwbus_core::Error::unsupported(format!("platform '{other}'"))),
        }
    }
}

/// Source of SPI buses, GPIO pins and USB handles.
///
/// Every open is bounded by [`OPEN_TIMEOUT`]; expiry is reported as
/// [`HardwareError::Timeout`].
#[derive(Debug, Clone)]
pub enum Platform {
    Mock(MockPlatform),
    /// spidev, sysfs GPIO and libusb. Resources whose feature is disabled
    /// report `Unsupported`.
    Linux,
}

impl Platform {
    /// A fresh platform of `kind`. The mock handle is not kept.
    #[must_use]
    pub fn from_kind(kind: PlatformKind) -> Self {
        match kind {
            PlatformKind::Mock => Self::Mock(MockPlatform::new().0),
            PlatformKind::Linux => Self::Linux,
        }
    }

    #[must_use]
    pub fn kind(&self) -> PlatformKind {
        match self {
            Self::Mock(_) => PlatformKind::Mock,
            Self::Linux => PlatformKind::Linux,
        }
    }

    pub async fn open_spi(&self, bus: u8, device: u8, speed_hz: u32) -> Result<AnySpiBus> {
        let resource = spi_resource(bus, device);
        debug!(resource = %resource, speed_hz, "Opening SPI bus");
        match self {
            Self::Mock(mock) => bounded(&resource, mock.open_spi(bus, device, speed_hz))
                .await
                .map(AnySpiBus::Mock),
            Self::Linux => {
                #[cfg(feature = "hardware-spi")]
                {
                    bounded(
                        &resource,
                        crate::linux::SpidevBus::open(bus, device, speed_hz),
                    )
                    .await
                    .map(AnySpiBus::Spidev)
                }
                #[cfg(not(feature = "hardware-spi"))]
                {
                    Err(HardwareError::unsupported(format!(
                        "{resource} (built without hardware-spi)"
                    )))
                }
            }
        }
    }

    pub async fn open_pin(&self, number: u32, direction: PinDirection, edge: PinEdge) -> Result<AnyPin> {
        let resource = pin_resource(number);
        debug!(resource = %resource, direction = direction.as_str(), edge = edge.as_str(), "Exporting pin");
        match self {
            Self::Mock(mock) => bounded(&resource, mock.open_pin(number, direction, edge))
                .await
                .map(AnyPin::Mock),
            Self::Linux => {
                #[cfg(feature = "hardware-gpio")]
                {
                    bounded(
                        &resource,
                        crate::linux::SysfsPin::open(number, direction, edge),
                    )
                    .await
                    .map(AnyPin::Sysfs)
                }
                #[cfg(not(feature = "hardware-gpio"))]
                {
                    Err(HardwareError::unsupported(format!(
                        "{resource} (built without hardware-gpio)"
                    )))
                }
            }
        }
    }

    pub async fn open_usb(&self, vendor_id: u16, product_id: u16) -> Result<AnyUsb> {
        let resource = usb_resource(vendor_id, product_id);
        debug!(resource = %resource, "Opening USB device");
        match self {
            Self::Mock(mock) => bounded(&resource, mock.open_usb(vendor_id, product_id))
                .await
                .map(AnyUsb::Mock),
            Self::Linux => {
                #[cfg(feature = "hardware-usb")]
                {
                    bounded(
                        &resource,
                        crate::linux::RusbDevice::open(vendor_id, product_id),
                    )
                    .await
                    .map(AnyUsb::Rusb)
                }
                #[cfg(not(feature = "hardware-usb"))]
                {
                    Err(HardwareError::unsupported(format!(
                        "{resource} (built without hardware-usb)"
                    )))
                }
            }
        }
    }
}

async fn bounded<T>(resource: &str, open: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::time::timeout(OPEN_TIMEOUT, open)
        .await
        .map_err(|_| HardwareError::timeout(resource, OPEN_TIMEOUT.as_millis() as u64))?
}
