use hwbus_core::{DeviceId, DeviceKind, Error, PinDirection, PinEdge};
use serde_json::{Value, json};
use tracing::debug;

use crate::bus::AnyPin;
use crate::config::{PinConfig, number_field};
use crate::error::Result;
use crate::platform::Platform;
use crate::traits::{Device, DeviceState, GpioPin};

/// Input pin reporting level changes.
#[derive(Debug)]
pub struct ButtonDevice {
    id: DeviceId,
    number: u32,
    direction: PinDirection,
    edge: PinEdge,
    platform: Platform,
    pin: Option<AnyPin>,
    state: DeviceState,
}

impl ButtonDevice {
    pub fn new(config: PinConfig, platform: Platform) -> Self {
        Self {
            id: config.id,
            number: config.pin,
            direction: config.direction,
            edge: config.edge,
            platform,
            pin: None,
            state: DeviceState::Uninitialized,
        }
    }

    #[must_use]
    pub fn id(&self) -> &DeviceId {
        &self.id
    }

    #[must_use]
    pub fn pin_number(&self) -> u32 {
        self.number
    }

    /// Wait for the next accepted edge.
    ///
    /// Pending forever until the pin is exported.
    pub async fn next_edge(&mut self) -> Result<u8> {
        match self.pin.as_mut() {
            Some(pin) => pin.next_edge().await,
            None => std::future::pending().await,
        }
    }
}

impl Device for ButtonDevice {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Button
    }

    fn state(&self) -> DeviceState {
        self.state
    }

    async fn init(&mut self) -> hwbus_core::Result<()> {
        if self.state != DeviceState::Uninitialized {
            return Err(Error::not_ready(self.id.as_str()));
        }
        let pin = self
            .platform
            .open_pin(self.number, self.direction, self.edge)
            .await?;
        debug!(id = %self.id, pin = self.number, edge = self.edge.as_str(), "Button exported");
        self.pin = Some(pin);
        self.state = DeviceState::Ready;
        Ok(())
    }

    async fn write_data(&mut self, _data: &Value) -> hwbus_core::Result<Value> {
        Err(Error::unsupported("set on a button"))
    }

    async fn read_data(&mut self, _options: &Value) -> hwbus_core::Result<Value> {
        let pin = self.pin.as_mut().ok_or(Error::NoData)?;
        let value = pin.read().await?;
        Ok(json!({ "value": value }))
    }

    async fn release(&mut self) -> hwbus_core::Result<()> {
        self.state = DeviceState::Released;
        if let Some(mut pin) = self.pin.take() {
            pin.unexport().await?;
        }
        Ok(())
    }
}

/// Output pin driven high or low.
#[derive(Debug)]
pub struct LedDevice {
    id: DeviceId,
    number: u32,
    platform: Platform,
    pin: Option<AnyPin>,
    value: u8,
    state: DeviceState,
}

impl LedDevice {
    pub fn new(config: PinConfig, platform: Platform) -> Self {
        Self {
            id: config.id,
            number: config.pin,
            platform,
            pin: None,
            value: 0,
            state: DeviceState::Uninitialized,
        }
    }

    #[must_use]
    pub fn pin_number(&self) -> u32 {
        self.number
    }

    fn pin(&mut self) -> hwbus_core::Result<&mut AnyPin> {
        match (self.state, self.pin.as_mut()) {
            (DeviceState::Ready, Some(pin)) => Ok(pin),
            _ => Err(Error::not_ready(self.id.as_str())),
        }
    }
}

impl Device for LedDevice {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Led
    }

    fn state(&self) -> DeviceState {
        self.state
    }

    async fn init(&mut self) -> hwbus_core::Result<()> {
        if self.state != DeviceState::Uninitialized {
            return Err(Error::not_ready(self.id.as_str()));
        }
        let pin = self
            .platform
            .open_pin(self.number, PinDirection::Out, PinEdge::None)
            .await?;
        debug!(id = %self.id, pin = self.number, "LED exported");
        self.pin = Some(pin);
        self.state = DeviceState::Ready;
        Ok(())
    }

    /// `{ "value": 0 | 1 }`; any non-zero value drives the pin high.
    async fn write_data(&mut self, data: &Value) -> hwbus_core::Result<Value> {
        let value = match data.get("value") {
            Some(Value::Bool(on)) => u8::from(*on),
            _ => number_field(data, "value")?
                .map(|v| u8::from(v != 0))
                .ok_or_else(|| Error::missing_data("Invalid or missing value for 'set' action."))?,
        };
        self.pin()?.write(value).await?;
        self.value = value;
        Ok(json!({ "value": value }))
    }

    async fn read_data(&mut self, _options: &Value) -> hwbus_core::Result<Value> {
        if self.pin.is_none() {
            return Err(Error::NoData);
        }
        Ok(json!({ "value": self.value }))
    }

    async fn release(&mut self) -> hwbus_core::Result<()> {
        self.state = DeviceState::Released;
        if let Some(mut pin) = self.pin.take() {
            pin.unexport().await?;
        }
        Ok(())
    }
}
