use std::fmt;
use std::sync::Arc;

use hwbus_protocol::ring::TIMEOUT as CONTROL_TIMEOUT;
use rusb::{DeviceHandle, GlobalContext};

use crate::error::{HardwareError, Result};
use crate::platform::usb_resource;
use crate::traits::UsbControl;

/// A USB device opened by vendor and product id through libusb.
pub struct RusbDevice {
    resource: String,
    handle: Option<Arc<DeviceHandle<GlobalContext>>>,
}

impl fmt::Debug for RusbDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RusbDevice")
            .field("resource", &self.resource)
            .field("open", &self.handle.is_some())
            .finish()
    }
}

impl RusbDevice {
    pub async fn open(vendor_id: u16, product_id: u16) -> Result<Self> {
        let resource = usb_resource(vendor_id, product_id);

        let handle = tokio::task::spawn_blocking(move || {
            rusb::open_device_with_vid_pid(vendor_id, product_id)
        })
        .await
        .map_err(|e| HardwareError::open_failed(&resource, e.to_string()))?
        .ok_or_else(|| HardwareError::open_failed(&resource, "USB device not found"))?;

        Ok(Self {
            resource,
            handle: Some(Arc::new(handle)),
        })
    }
}

impl UsbControl for RusbDevice {
    fn resource(&self) -> &str {
        &self.resource
    }

    async fn control_out(
        &mut self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        data: &[u8],
    ) -> Result<usize> {
        let handle = self
            .handle
            .clone()
            .ok_or_else(|| HardwareError::closed(&self.resource))?;
        let data = data.to_vec();

        tokio::task::spawn_blocking(move || {
            handle.write_control(request_type, request, value, index, &data, CONTROL_TIMEOUT)
        })
        .await
        .map_err(|e| HardwareError::transfer_failed(&self.resource, e.to_string()))?
        .map_err(|e| HardwareError::transfer_failed(&self.resource, e.to_string()))
    }

    async fn close(&mut self) -> Result<()> {
        self.handle.take();
        Ok(())
    }
}
