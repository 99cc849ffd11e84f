//! Enum wrappers for primitive dispatch.
//!
//! Native `async fn` in traits are not object safe, so instead of
//! `Box<dyn SpiBus>` every primitive is wrapped in an enum over its concrete
//! backends. Linux variants only exist when the matching feature is enabled.

use crate::error::Result;
use crate::mock::{MockPin, MockSpiBus, MockUsb};
use crate::traits::{GpioPin, SpiBus, UsbControl};
use crate::transfer::TransferOptions;

#[cfg(feature = "hardware-gpio")]
use crate::linux::SysfsPin;
#[cfg(feature = "hardware-spi")]
use crate::linux::SpidevBus;
#[cfg(feature = "hardware-usb")]
use crate::linux::RusbDevice;

#[derive(Debug)]
#[non_exhaustive]
pub enum AnySpiBus {
    Mock(MockSpiBus),
    #[cfg(feature = "hardware-spi")]
    Spidev(SpidevBus),
}

impl SpiBus for AnySpiBus {
    fn resource(&self) -> &str {
        match self {
            Self::Mock(bus) => bus.resource(),
            #[cfg(feature = "hardware-spi")]
            Self::Spidev(bus) => bus.resource(),
        }
    }

    async fn transfer(&mut self, data: &[u8], options: &TransferOptions) -> Result<()> {
        match self {
            Self::Mock(bus) => bus.transfer(data, options).await,
            #[cfg(feature = "hardware-spi")]
            Self::Spidev(bus) => bus.transfer(data, options).await,
        }
    }

    async fn close(&mut self) -> Result<()> {
        match self {
            Self::Mock(bus) => bus.close().await,
            #[cfg(feature = "hardware-spi")]
            Self::Spidev(bus) => bus.close().await,
        }
    }
}

#[derive(Debug)]
#[non_exhaustive]
pub enum AnyPin {
    Mock(MockPin),
    #[cfg(feature = "hardware-gpio")]
    Sysfs(SysfsPin),
}

impl GpioPin for AnyPin {
    fn number(&self) -> u32 {
        match self {
            Self::Mock(pin) => pin.number(),
            #[cfg(feature = "hardware-gpio")]
            Self::Sysfs(pin) => pin.number(),
        }
    }

    async fn read(&mut self) -> Result<u8> {
        match self {
            Self::Mock(pin) => pin.read().await,
            #[cfg(feature = "hardware-gpio")]
            Self::Sysfs(pin) => pin.read().await,
        }
    }

    async fn write(&mut self, value: u8) -> Result<()> {
        match self {
            Self::Mock(pin) => pin.write(value).await,
            #[cfg(feature = "hardware-gpio")]
            Self::Sysfs(pin) => pin.write(value).await,
        }
    }

    async fn next_edge(&mut self) -> Result<u8> {
        match self {
            Self::Mock(pin) => pin.next_edge().await,
            #[cfg(feature = "hardware-gpio")]
            Self::Sysfs(pin) => pin.next_edge().await,
        }
    }

    async fn unexport(&mut self) -> Result<()> {
        match self {
            Self::Mock(pin) => pin.unexport().await,
            #[cfg(feature = "hardware-gpio")]
            Self::Sysfs(pin) => pin.unexport().await,
        }
    }
}

#[derive(Debug)]
#[non_exhaustive]
pub enum AnyUsb {
    Mock(MockUsb),
    #[cfg(feature = "hardware-usb")]
    Rusb(RusbDevice),
}

impl UsbControl for AnyUsb {
    fn resource(&self) -> &str {
        match self {
            Self::Mock(usb) => usb.resource(),
            #[cfg(feature = "hardware-usb")]
            Self::Rusb(usb) => usb.resource(),
        }
    }

    async fn control_out(
        &mut self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        data: &[u8],
    ) -> Result<usize> {
        match self {
            Self::Mock(usb) => {
                usb.control_out(request_type, request, value, index, data)
                    .await
            }
            #[cfg(feature = "hardware-usb")]
            Self::Rusb(usb) => {
                usb.control_out(request_type, request, value, index, data)
                    .await
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        match self {
            Self::Mock(usb) => usb.close().await,
            #[cfg(feature = "hardware-usb")]
            Self::Rusb(usb) => usb.close().await,
        }
    }
}
