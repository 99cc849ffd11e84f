use std::fs::{File, OpenOptions};
use std::os::fd::AsRawFd;
use std::sync::Arc;

use crate::error::{HardwareError, Result};
use crate::platform::spi_resource;
use crate::traits::SpiBus;
use crate::transfer::TransferOptions;

/// `_IOW('k', 4, u32)`
const SPI_IOC_WR_MAX_SPEED_HZ: libc::c_ulong = 0x4004_6B04;

/// `_IOW('k', 0, [spi_ioc_transfer; 1])`
const SPI_IOC_MESSAGE_1: libc::c_ulong = 0x4020_6B00;

/// Mirror of the kernel's `struct spi_ioc_transfer` (32 bytes).
#[repr(C)]
#[derive(Debug, Default)]
struct SpiIocTransfer {
    tx_buf: u64,
    rx_buf: u64,
    len: u32,
    speed_hz: u32,
    delay_usecs: u16,
    bits_per_word: u8,
    cs_change: u8,
    tx_nbits: u8,
    rx_nbits: u8,
    word_delay_usecs: u8,
    pad: u8,
}

/// A `/dev/spidevB.D` character device.
#[derive(Debug)]
pub struct SpidevBus {
    resource: String,
    file: Option<Arc<File>>,
}

impl SpidevBus {
    pub async fn open(bus: u8, device: u8, speed_hz: u32) -> Result<Self> {
        let resource = spi_resource(bus, device);
        let path = format!("/dev/{resource}");

        let file = tokio::task::spawn_blocking(move || -> std::io::Result<File> {
            let file = OpenOptions::new().read(true).write(true).open(&path)?;
            // SAFETY: the fd is open for the lifetime of `file` and the ioctl
            // reads exactly one u32 from the provided pointer.
            let rc = unsafe {
                libc::ioctl(
                    file.as_raw_fd(),
                    SPI_IOC_WR_MAX_SPEED_HZ as _,
                    &speed_hz as *const u32,
                )
            };
            if rc < 0 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(file)
        })
        .await
        .map_err(|e| HardwareError::open_failed(&resource, e.to_string()))?
        .map_err(|e| HardwareError::open_failed(&resource, e.to_string()))?;

        Ok(Self {
            resource,
            file: Some(Arc::new(file)),
        })
    }
}

impl SpiBus for SpidevBus {
    fn resource(&self) -> &str {
        &self.resource
    }

    async fn transfer(&mut self, data: &[u8], options: &TransferOptions) -> Result<()> {
        let file = self
            .file
            .clone()
            .ok_or_else(|| HardwareError::closed(&self.resource))?;
        let data = data.to_vec();
        let speed_hz = options.speed_hz;
        let delay_usecs = options.delay_us;

        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let mut transfer = SpiIocTransfer {
                tx_buf: data.as_ptr() as u64,
                len: data.len() as u32,
                speed_hz,
                delay_usecs,
                bits_per_word: 8,
                ..SpiIocTransfer::default()
            };
            // SAFETY: `transfer` points at `data`, which outlives the call;
            // rx_buf is null so the kernel only reads from tx_buf.
            let rc = unsafe {
                libc::ioctl(
                    file.as_raw_fd(),
                    SPI_IOC_MESSAGE_1 as _,
                    &mut transfer as *mut SpiIocTransfer,
                )
            };
            if rc < 0 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        })
        .await
        .map_err(|e| HardwareError::transfer_failed(&self.resource, e.to_string()))?
        .map_err(|e| HardwareError::transfer_failed(&self.resource, e.to_string()))
    }

    async fn close(&mut self) -> Result<()> {
        // The descriptor closes when the last in-flight transfer drops its Arc.
        self.file.take();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_struct_matches_kernel_layout() {
        assert_eq!(std::mem::size_of::<SpiIocTransfer>(), 32);
    }
}
