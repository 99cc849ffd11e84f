//! Linux backends: spidev, sysfs GPIO and libusb.
//!
//! Each backend is compiled only with its feature (`hardware-spi`,
//! `hardware-gpio`, `hardware-usb`).

#[cfg(feature = "hardware-gpio")]
mod sysfs;
#[cfg(feature = "hardware-spi")]
mod spidev;
#[cfg(feature = "hardware-usb")]
mod usb;

#[cfg(feature = "hardware-gpio")]
pub use sysfs::SysfsPin;
#[cfg(feature = "hardware-spi")]
pub use spidev::SpidevBus;
#[cfg(feature = "hardware-usb")]
pub use usb::RusbDevice;
