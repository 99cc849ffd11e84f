//! USB microphone array LED ring (`usb-pixel-ring`).

use std::str::FromStr;

use hwbus_core::{DeviceId, DeviceKind, Error};
use hwbus_protocol::ring::{
    DEFAULT_BRIGHTNESS, INDEX, MAX_BRIGHTNESS, PRODUCT_ID, REQUEST, REQUEST_TYPE, VENDOR_ID,
};
use hwbus_protocol::{RingCommand, RingState, VadLedMode};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::bus::AnyUsb;
use crate::config::{number_field, string_field};
use crate::platform::Platform;
use crate::traits::{Device, DeviceState, UsbControl};

/// Animation set requested at registration. Only reported back for now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RingMode {
    #[default]
    Sepia,
    Seeed,
}

impl FromStr for RingMode {
    type Err = Error;

    fn from_str(s: &str) -> hwbus_core::Result<Self> {
        match s {
            "sepia" => Ok(Self::Sepia),
            "seeed" => Ok(Self::Seeed),
            other => Err(Error::wrong_data(format!(
                "mode must be sepia or seeed, got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingConfig {
    pub mode: RingMode,
    pub brightness: u8,
}

impl RingConfig {
    /// Options of `usb-pixel-ring`: `mode` and `brightness` (1..=31).
    pub fn parse(options: &Value) -> hwbus_core::Result<Self> {
        let mode = match string_field(options, "mode")? {
            Some(mode) => mode.parse()?,
            None => RingMode::default(),
        };
        let brightness = match number_field(options, "brightness")? {
            None => DEFAULT_BRIGHTNESS,
            Some(level) if (1..=i64::from(MAX_BRIGHTNESS)).contains(&level) => level as u8,
            Some(level) => {
                return Err(Error::wrong_data(format!(
                    "brightness must be between 1 and {MAX_BRIGHTNESS}, got {level}"
                )));
            }
        };
        Ok(Self { mode, brightness })
    }
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            mode: RingMode::default(),
            brightness: DEFAULT_BRIGHTNESS,
        }
    }
}

#[derive(Debug)]
pub struct RingDevice {
    id: DeviceId,
    config: RingConfig,
    platform: Platform,
    usb: Option<AnyUsb>,
    ring_state: Option<RingState>,
    vad: Option<VadLedMode>,
    state: DeviceState,
}

impl RingDevice {
    pub fn new(id: DeviceId, config: RingConfig, platform: Platform) -> Self {
        Self {
            id,
            config,
            platform,
            usb: None,
            ring_state: None,
            vad: None,
            state: DeviceState::Uninitialized,
        }
    }

    async fn send(usb: &mut AnyUsb, command: &RingCommand) -> hwbus_core::Result<()> {
        usb.control_out(REQUEST_TYPE, REQUEST, command.value(), INDEX, &command.payload())
            .await?;
        Ok(())
    }

    fn snapshot(&self) -> Value {
        json!({
            "state": self.ring_state.map_or("", RingState::as_str),
            "vad": self.vad,
            "mode": self.config.mode,
        })
    }
}

impl Device for RingDevice {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Item
    }

    fn state(&self) -> DeviceState {
        self.state
    }

    /// Open the ring, switch the VAD LED off and apply the brightness.
    async fn init(&mut self) -> hwbus_core::Result<()> {
        if self.state != DeviceState::Uninitialized {
            return Err(Error::not_ready(self.id.as_str()));
        }
        let mut usb = self.platform.open_usb(VENDOR_ID, PRODUCT_ID).await?;

        let setup = async {
            Self::send(&mut usb, &RingCommand::VadLed(VadLedMode::Off)).await?;
            Self::send(&mut usb, &RingCommand::Brightness(self.config.brightness)).await
        }
        .await;
        if let Err(e) = setup {
            if let Err(close) = usb.close().await {
                warn!(id = %self.id, error = %close, "Failed to close USB device after init failure");
            }
            return Err(e);
        }

        self.vad = Some(VadLedMode::Off);
        self.usb = Some(usb);
        self.state = DeviceState::Ready;
        info!(id = %self.id, brightness = self.config.brightness, "LED ring ready");
        Ok(())
    }

    /// `{ state, rgb0Array? }`. Wake-word states only toggle the VAD LED.
    async fn write_data(&mut self, data: &Value) -> hwbus_core::Result<Value> {
        let (Some(usb), DeviceState::Ready) = (self.usb.as_mut(), self.state) else {
            return Err(Error::not_ready(self.id.as_str()));
        };
        let state: RingState = string_field(data, "state")?
            .ok_or_else(|| Error::missing_data("Required: state"))?
            .parse()?;
        let frame = rgb0_array(data)?;
        let command = state.command(frame.as_deref())?;

        Self::send(usb, &command).await?;
        debug!(id = %self.id, state = state.as_str(), "Ring state written");

        match command {
            RingCommand::VadLed(mode) => self.vad = Some(mode),
            _ => self.ring_state = Some(state),
        }
        Ok(self.snapshot())
    }

    async fn read_data(&mut self, _options: &Value) -> hwbus_core::Result<Value> {
        if self.usb.is_none() {
            return Err(Error::NoData);
        }
        Ok(self.snapshot())
    }

    /// Return the ring to idle and close the device, even when idle fails.
    async fn release(&mut self) -> hwbus_core::Result<()> {
        self.state = DeviceState::Released;
        let Some(mut usb) = self.usb.take() else {
            return Ok(());
        };
        let idle = Self::send(&mut usb, &RingCommand::Idle).await;
        let closed = usb.close().await;
        idle?;
        closed?;
        debug!(id = %self.id, "LED ring released");
        Ok(())
    }
}

fn rgb0_array(data: &Value) -> hwbus_core::Result<Option<Vec<u8>>> {
    let Some(raw) = data.get("rgb0Array").filter(|v| !v.is_null()) else {
        return Ok(None);
    };
    let values = raw
        .as_array()
        .ok_or_else(|| Error::wrong_data("rgb0Array must be an array"))?;
    values
        .iter()
        .map(|v| {
            v.as_u64()
                .and_then(|n| u8::try_from(n).ok())
                .ok_or_else(|| Error::wrong_data("rgb0Array values must be between 0 and 255"))
        })
        .collect::<hwbus_core::Result<Vec<u8>>>()
        .map(Some)
}
