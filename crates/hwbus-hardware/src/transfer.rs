//! One encoded buffer per write over an SPI bus.

use hwbus_protocol::{Chipset, LedBuffer};
use tracing::warn;

use crate::bus::AnySpiBus;
use crate::error::Result;
use crate::traits::SpiBus;

/// Per-message bus parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferOptions {
    pub speed_hz: u32,
    /// Delay after the message before the bus is released.
    pub delay_us: u16,
}

impl TransferOptions {
    pub const fn new(speed_hz: u32, delay_us: u16) -> Self {
        Self { speed_hz, delay_us }
    }

    /// Clock and gap required by `chipset`.
    #[must_use]
    pub const fn for_chipset(chipset: Chipset) -> Self {
        Self::new(chipset.clock_hz(), chipset.inter_message_delay_us())
    }
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self::for_chipset(Chipset::default())
    }
}

/// Wraps an open bus and pushes whole LED buffers through it.
#[derive(Debug)]
pub struct TransferAdapter {
    bus: AnySpiBus,
    options: TransferOptions,
}

impl TransferAdapter {
    pub fn new(bus: AnySpiBus, options: TransferOptions) -> Self {
        Self { bus, options }
    }

    #[must_use]
    pub fn resource(&self) -> &str {
        self.bus.resource()
    }

    #[must_use]
    pub fn options(&self) -> TransferOptions {
        self.options
    }

    /// Transfer the full buffer as one message.
    pub async fn write(&mut self, buffer: &LedBuffer) -> Result<()> {
        let result = self.bus.transfer(buffer.as_bytes(), &self.options).await;
        if let Err(e) = &result {
            warn!(resource = self.bus.resource(), error = %e, "Transfer failed");
        }
        result
    }

    pub async fn close(&mut self) -> Result<()> {
        self.bus.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockPlatform;
    use hwbus_protocol::Rgb;

    #[test]
    fn test_options_follow_chipset() {
        assert_eq!(
            TransferOptions::for_chipset(Chipset::Ws281x),
            TransferOptions::new(10_000_000, 50)
        );
        assert_eq!(
            TransferOptions::for_chipset(Chipset::Apa102),
            TransferOptions::new(4_000_000, 0)
        );
    }

    #[tokio::test]
    async fn test_write_sends_whole_buffer() {
        let (platform, handle) = MockPlatform::new();
        let bus = platform.open_spi(0, 0, 4_000_000).await.unwrap();
        let mut adapter = TransferAdapter::new(
            AnySpiBus::Mock(bus),
            TransferOptions::for_chipset(Chipset::Apa102),
        );

        let mut buffer = LedBuffer::new(Chipset::Apa102, 2).unwrap();
        buffer.set_led(1, Rgb::new(1, 2, 3), None).unwrap();
        adapter.write(&buffer).await.unwrap();

        let transfers = handle.transfers();
        assert_eq!(transfers.len(), 1);
        assert_eq!(transfers[0].data, buffer.as_bytes());
        assert_eq!(transfers[0].delay_us, 0);
    }

    #[tokio::test]
    async fn test_write_reports_failure() {
        let (platform, handle) = MockPlatform::new();
        handle.fail_transfers("spidev0.0");
        let bus = platform.open_spi(0, 0, 10_000_000).await.unwrap();
        let mut adapter = TransferAdapter::new(AnySpiBus::Mock(bus), TransferOptions::default());

        let buffer = LedBuffer::new(Chipset::Ws281x, 1).unwrap();
        assert!(adapter.write(&buffer).await.is_err());
        assert!(handle.transfers().is_empty());
    }
}
