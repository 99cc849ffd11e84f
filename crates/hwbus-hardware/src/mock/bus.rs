use hwbus_core::PinEdge;
use tokio::sync::mpsc;

use super::platform::{Shared, SpiTransfer, UsbTransfer};
use crate::error::{HardwareError, Result};
use crate::traits::{GpioPin, SpiBus, UsbControl};
use crate::transfer::TransferOptions;

/// Outcome of the fault checks done before a write.
enum WriteFault {
    None,
    Fail,
    Stall,
}

fn write_fault(shared: &Shared, resource: &str) -> WriteFault {
    let state = shared.lock();
    if state.stall_transfer.contains(resource) {
        WriteFault::Stall
    } else if state.fail_transfer.contains(resource) {
        WriteFault::Fail
    } else {
        WriteFault::None
    }
}

async fn check_write(shared: &Shared, resource: &str) -> Result<()> {
    match write_fault(shared, resource) {
        WriteFault::None => Ok(()),
        WriteFault::Fail => Err(HardwareError::transfer_failed(resource, "injected failure")),
        WriteFault::Stall => {
            std::future::pending::<()>().await;
            Ok(())
        }
    }
}

/// Release `resource` from the open set, honoring an injected close failure.
fn close_resource(shared: &Shared, resource: &str) -> Result<()> {
    let mut state = shared.lock();
    state.open.remove(resource);
    if state.fail_close.contains(resource) {
        return Err(HardwareError::close_failed(resource, "injected failure"));
    }
    Ok(())
}

/// In-memory SPI bus.
#[derive(Debug)]
pub struct MockSpiBus {
    resource: String,
    shared: Shared,
    closed: bool,
}

impl MockSpiBus {
    pub(super) fn new(resource: String, shared: Shared) -> Self {
        Self {
            resource,
            shared,
            closed: false,
        }
    }
}

impl SpiBus for MockSpiBus {
    fn resource(&self) -> &str {
        &self.resource
    }

    async fn transfer(&mut self, data: &[u8], options: &TransferOptions) -> Result<()> {
        if self.closed {
            return Err(HardwareError::closed(&self.resource));
        }
        check_write(&self.shared, &self.resource).await?;

        self.shared.lock().transfers.push(SpiTransfer {
            resource: self.resource.clone(),
            data: data.to_vec(),
            speed_hz: options.speed_hz,
            delay_us: options.delay_us,
        });
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        close_resource(&self.shared, &self.resource)
    }
}

/// In-memory GPIO pin. Edges are injected with
/// [`MockPlatformHandle::trigger_edge`](super::MockPlatformHandle::trigger_edge).
#[derive(Debug)]
pub struct MockPin {
    number: u32,
    resource: String,
    edge: PinEdge,
    edges: mpsc::UnboundedReceiver<u8>,
    shared: Shared,
    exported: bool,
}

impl MockPin {
    pub(super) fn new(
        number: u32,
        resource: String,
        edge: PinEdge,
        edges: mpsc::UnboundedReceiver<u8>,
        shared: Shared,
    ) -> Self {
        Self {
            number,
            resource,
            edge,
            edges,
            shared,
            exported: true,
        }
    }
}

impl GpioPin for MockPin {
    fn number(&self) -> u32 {
        self.number
    }

    async fn read(&mut self) -> Result<u8> {
        if !self.exported {
            return Err(HardwareError::closed(&self.resource));
        }
        self.shared
            .lock()
            .pins
            .get(&self.number)
            .map(|record| record.value)
            .ok_or_else(|| HardwareError::closed(&self.resource))
    }

    async fn write(&mut self, value: u8) -> Result<()> {
        if !self.exported {
            return Err(HardwareError::closed(&self.resource));
        }
        check_write(&self.shared, &self.resource).await?;

        let value = u8::from(value != 0);
        let mut state = self.shared.lock();
        if let Some(record) = state.pins.get_mut(&self.number) {
            record.value = value;
        }
        state.pin_writes.push((self.number, value));
        Ok(())
    }

    async fn next_edge(&mut self) -> Result<u8> {
        loop {
            match self.edges.recv().await {
                Some(value) if self.edge.accepts(value) => return Ok(value),
                Some(_) => continue,
                None => return Err(HardwareError::closed(&self.resource)),
            }
        }
    }

    async fn unexport(&mut self) -> Result<()> {
        if !self.exported {
            return Ok(());
        }
        self.exported = false;
        {
            let mut state = self.shared.lock();
            state.pins.remove(&self.number);
            state.edges.remove(&self.number);
        }
        close_resource(&self.shared, &self.resource)
    }
}

/// In-memory USB device.
#[derive(Debug)]
pub struct MockUsb {
    resource: String,
    shared: Shared,
    closed: bool,
}

impl MockUsb {
    pub(super) fn new(resource: String, shared: Shared) -> Self {
        Self {
            resource,
            shared,
            closed: false,
        }
    }
}

impl UsbControl for MockUsb {
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
        if self.closed {
            return Err(HardwareError::closed(&self.resource));
        }
        check_write(&self.shared, &self.resource).await?;

        self.shared.lock().usb_transfers.push(UsbTransfer {
            resource: self.resource.clone(),
            request_type,
            request,
            value,
            index,
            data: data.to_vec(),
        });
        Ok(data.len())
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        close_resource(&self.shared, &self.resource)
    }
}
