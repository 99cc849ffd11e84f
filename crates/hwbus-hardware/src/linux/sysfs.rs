use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::Duration;

use hwbus_core::{PinDirection, PinEdge};
use tracing::trace;

use crate::error::{HardwareError, Result};
use crate::platform::pin_resource;
use crate::traits::GpioPin;

const GPIO_ROOT: &str = "/sys/class/gpio";

/// Value polling interval used to detect edges.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// udev may need a moment to fix permissions on a freshly exported pin.
const ATTRIBUTE_RETRIES: u32 = 20;
const ATTRIBUTE_RETRY_DELAY: Duration = Duration::from_millis(50);

/// A pin exported through `/sys/class/gpio`.
#[derive(Debug)]
pub struct SysfsPin {
    number: u32,
    resource: String,
    edge: PinEdge,
    last: u8,
    exported: bool,
}

impl SysfsPin {
    pub async fn open(number: u32, direction: PinDirection, edge: PinEdge) -> Result<Self> {
        let resource = pin_resource(number);

        match tokio::fs::write(format!("{GPIO_ROOT}/export"), number.to_string()).await {
            Ok(()) => {}
            // Already exported by someone else; take it over.
            Err(e) if e.kind() == ErrorKind::ResourceBusy => {}
            Err(e) => return Err(HardwareError::open_failed(&resource, e.to_string())),
        }

        let base = pin_dir(number);
        write_attribute(&resource, base.join("direction"), direction.as_str()).await?;
        if !direction.is_output() {
            write_attribute(&resource, base.join("edge"), edge.as_str()).await?;
        }

        let mut pin = Self {
            number,
            resource,
            edge,
            last: 0,
            exported: true,
        };
        pin.last = pin.read().await?;
        Ok(pin)
    }

    fn value_path(&self) -> PathBuf {
        pin_dir(self.number).join("value")
    }
}

fn pin_dir(number: u32) -> PathBuf {
    PathBuf::from(GPIO_ROOT).join(format!("gpio{number}"))
}

async fn write_attribute(resource: &str, path: PathBuf, value: &str) -> Result<()> {
    let mut attempt = 0;
    loop {
        match tokio::fs::write(&path, value).await {
            Ok(()) => return Ok(()),
            Err(e)
                if attempt < ATTRIBUTE_RETRIES
                    && matches!(e.kind(), ErrorKind::PermissionDenied | ErrorKind::NotFound) =>
            {
                attempt += 1;
                trace!(resource, attempt, "Pin attribute not writable yet");
                tokio::time::sleep(ATTRIBUTE_RETRY_DELAY).await;
            }
            Err(e) => return Err(HardwareError::open_failed(resource, e.to_string())),
        }
    }
}

impl GpioPin for SysfsPin {
    fn number(&self) -> u32 {
        self.number
    }

    async fn read(&mut self) -> Result<u8> {
        if !self.exported {
            return Err(HardwareError::closed(&self.resource));
        }
        let raw = tokio::fs::read_to_string(self.value_path()).await?;
        Ok(u8::from(raw.trim() == "1"))
    }

    async fn write(&mut self, value: u8) -> Result<()> {
        if !self.exported {
            return Err(HardwareError::closed(&self.resource));
        }
        let level = if value != 0 { "1" } else { "0" };
        tokio::fs::write(self.value_path(), level)
            .await
            .map_err(|e| HardwareError::transfer_failed(&self.resource, e.to_string()))
    }

    async fn next_edge(&mut self) -> Result<u8> {
        if self.edge == PinEdge::None {
            std::future::pending::<()>().await;
        }
        loop {
            tokio::time::sleep(POLL_INTERVAL).await;
            let value = self.read().await?;
            if value == self.last {
                continue;
            }
            self.last = value;
            if self.edge.accepts(value) {
                return Ok(value);
            }
        }
    }

    async fn unexport(&mut self) -> Result<()> {
        if !self.exported {
            return Ok(());
        }
        self.exported = false;
        tokio::fs::write(format!("{GPIO_ROOT}/unexport"), self.number.to_string())
            .await
            .map_err(|e| HardwareError::close_failed(&self.resource, e.to_string()))
    }
}
