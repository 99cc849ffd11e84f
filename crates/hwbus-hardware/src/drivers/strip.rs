//! SPI-attached LED strips (`spi-rgb-leds`) and microphone HAT LEDs
//! (`mic-hat-leds`).
//!
//! Every accepted write re-encodes one LED in the buffer and pushes the whole
//! buffer as a single bus message, so the last accepted write always wins.

use std::str::FromStr;

use hwbus_core::{DeviceId, DeviceKind, Error, PinDirection, PinEdge};
use hwbus_protocol::{Chipset, LedBuffer, MAX_LEDS, Rgb};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::bus::AnyPin;
use crate::config::{number_field, string_field};
use crate::platform::Platform;
use crate::traits::{Device, DeviceState, GpioPin};
use crate::transfer::{TransferAdapter, TransferOptions};

/// Pin powering the LEDs of the 4-mic HAT.
const AUX_POWER_PIN: u32 = 5;

/// Microphone HAT layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MicHatModel {
    TwoMic,
    FourMic,
    SixMic,
    /// Linear 4-mic array; no addressable LEDs.
    FourMicLinear,
}

impl MicHatModel {
    #[must_use]
    pub const fn num_leds(self) -> usize {
        match self {
            Self::TwoMic => 3,
            Self::FourMic | Self::SixMic => 12,
            Self::FourMicLinear => 0,
        }
    }

    /// `(bus, device)` of the LED chain.
    #[must_use]
    pub const fn spi_address(self) -> (u8, u8) {
        match self {
            Self::FourMic => (0, 1),
            _ => (0, 0),
        }
    }

    #[must_use]
    pub const fn aux_pin(self) -> Option<u32> {
        match self {
            Self::FourMic => Some(AUX_POWER_PIN),
            _ => None,
        }
    }
}

impl FromStr for MicHatModel {
    type Err = Error;

    fn from_str(s: &str) -> hwbus_core::Result<Self> {
        match s {
            "2mic" => Ok(Self::TwoMic),
            "4mic" => Ok(Self::FourMic),
            "6mic" => Ok(Self::SixMic),
            "4micL" => Ok(Self::FourMicLinear),
            other => Err(Error::wrong_data(format!(
                "model must be one of 2mic, 4mic, 6mic, 4micL; got '{other}'"
            ))),
        }
    }
}

/// Validated strip options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StripConfig {
    pub chipset: Chipset,
    pub num_leds: usize,
    pub spi_bus: u8,
    pub spi_device: u8,
    /// Output pin driven high while the strip is registered.
    pub aux_pin: Option<u32>,
}

impl StripConfig {
    /// Options of `spi-rgb-leds`: `numOfLeds`, `ledType`, `spiBus`, `spiDevice`.
    pub fn spi_rgb_leds(options: &Value) -> hwbus_core::Result<Self> {
        let num_leds = led_count(options, 1)?.unwrap_or(1);
        let chipset = match string_field(options, "ledType")? {
            Some(name) => name.parse()?,
            None => Chipset::default(),
        };
        Ok(Self {
            chipset,
            num_leds,
            spi_bus: spi_selector(options, "spiBus")?,
            spi_device: spi_selector(options, "spiDevice")?,
            aux_pin: None,
        })
    }

    /// Options of `mic-hat-leds`: `model` and an optional `numOfLeds` override.
    pub fn mic_hat(options: &Value) -> hwbus_core::Result<Self> {
        let model = match string_field(options, "model")? {
            Some(name) => name.parse()?,
            None => MicHatModel::TwoMic,
        };
        let num_leds = led_count(options, 0)?.unwrap_or_else(|| model.num_leds());
        let (spi_bus, spi_device) = model.spi_address();
        Ok(Self {
            chipset: Chipset::Apa102,
            num_leds,
            spi_bus,
            spi_device,
            aux_pin: model.aux_pin(),
        })
    }
}

/// `numOfLeds` within `[min, MAX_LEDS]`.
fn led_count(options: &Value, min: usize) -> hwbus_core::Result<Option<usize>> {
    let Some(n) = number_field(options, "numOfLeds")? else {
        return Ok(None);
    };
    match usize::try_from(n) {
        Ok(count) if (min..=MAX_LEDS).contains(&count) => Ok(Some(count)),
        _ => Err(Error::wrong_data(format!(
            "numOfLeds must be between {min} and {MAX_LEDS}, got {n}"
        ))),
    }
}

fn spi_selector(options: &Value, name: &str) -> hwbus_core::Result<u8> {
    match number_field(options, name)? {
        None => Ok(0),
        Some(n @ (0 | 1)) => Ok(n as u8),
        Some(n) => Err(Error::wrong_data(format!("{name} must be 0 or 1, got {n}"))),
    }
}

/// An LED chain behind an SPI bus.
#[derive(Debug)]
pub struct StripDevice {
    id: DeviceId,
    config: StripConfig,
    platform: Platform,
    adapter: Option<TransferAdapter>,
    aux: Option<AnyPin>,
    buffer: Option<LedBuffer>,
    state: DeviceState,
}

impl StripDevice {
    pub fn new(id: DeviceId, config: StripConfig, platform: Platform) -> Self {
        Self {
            id,
            config,
            platform,
            adapter: None,
            aux: None,
            buffer: None,
            state: DeviceState::Uninitialized,
        }
    }

    #[must_use]
    pub fn config(&self) -> &StripConfig {
        &self.config
    }

    #[must_use]
    pub fn buffer(&self) -> Option<&LedBuffer> {
        self.buffer.as_ref()
    }

    async fn open(&mut self) -> hwbus_core::Result<()> {
        let buffer = LedBuffer::new(self.config.chipset, self.config.num_leds)?;

        if let Some(number) = self.config.aux_pin {
            let mut pin = self
                .platform
                .open_pin(number, PinDirection::High, PinEdge::None)
                .await?;
            let powered = pin.write(1).await;
            self.aux = Some(pin);
            powered?;
        }

        let bus = self
            .platform
            .open_spi(self.config.spi_bus, self.config.spi_device, self.config.chipset.clock_hz())
            .await?;
        let mut adapter =
            TransferAdapter::new(bus, TransferOptions::for_chipset(self.config.chipset));

        if let Err(e) = adapter.write(&buffer).await {
            if let Err(close) = adapter.close().await {
                warn!(id = %self.id, error = %close, "Failed to close bus after init failure");
            }
            return Err(e.into());
        }

        self.adapter = Some(adapter);
        self.buffer = Some(buffer);
        Ok(())
    }

    /// Drive the aux pin low and unexport it. Both steps are always attempted.
    async fn release_aux(&mut self) -> hwbus_core::Result<()> {
        let Some(mut pin) = self.aux.take() else {
            return Ok(());
        };
        let low = pin.write(0).await;
        let unexported = pin.unexport().await;
        low?;
        unexported?;
        Ok(())
    }
}

impl Device for StripDevice {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Item
    }

    fn state(&self) -> DeviceState {
        self.state
    }

    /// Power the chain, open the bus and switch every LED off.
    ///
    /// WS281X chains are given their settle delay before the device reports
    /// ready.
    async fn init(&mut self) -> hwbus_core::Result<()> {
        if self.state != DeviceState::Uninitialized {
            return Err(Error::not_ready(self.id.as_str()));
        }

        if let Err(e) = self.open().await {
            if let Err(cleanup) = self.release_aux().await {
                warn!(id = %self.id, error = %cleanup, "Aux pin cleanup failed");
            }
            return Err(e);
        }

        self.state = DeviceState::Ready;
        let settle = self.config.chipset.settle_delay();
        if !settle.is_zero() {
            debug!(id = %self.id, settle_ms = settle.as_millis() as u64, "Waiting for LEDs to settle");
            tokio::time::sleep(settle).await;
        }
        info!(
            id = %self.id,
            chipset = self.config.chipset.as_str(),
            leds = self.config.num_leds,
            "LED strip ready"
        );
        Ok(())
    }

    /// `{ ledIndex, red, green, blue }` or `{ ledIndex, hex }`, with an
    /// optional APA102 `brightness` level.
    async fn write_data(&mut self, data: &Value) -> hwbus_core::Result<Value> {
        let (Some(adapter), Some(buffer), DeviceState::Ready) =
            (self.adapter.as_mut(), self.buffer.as_mut(), self.state)
        else {
            return Err(Error::not_ready(self.id.as_str()));
        };

        let Some(led_index) = number_field(data, "ledIndex")? else {
            return Err(Error::missing_data(
                "Required: 'ledIndex' and {'red', 'green', 'blue'} or 'hex'",
            ));
        };

        if let Some(hex) = string_field(data, "hex")? {
            buffer.set_led_hex(led_index, hex)?;
        } else {
            let color = rgb_from(data)?;
            let level = match number_field(data, "brightness")? {
                None => None,
                Some(level @ 0..=31) => Some(level as u8),
                Some(level) => {
                    return Err(Error::wrong_data(format!(
                        "brightness must be between 0 and 31, got {level}"
                    )));
                }
            };
            buffer.set_led(led_index, color, level)?;
        }

        adapter.write(buffer).await?;
        Ok(json!({ "status": "transferred" }))
    }

    async fn read_data(&mut self, _options: &Value) -> hwbus_core::Result<Value> {
        let buffer = self.buffer.as_ref().ok_or(Error::NoData)?;
        Ok(json!({
            "buffer": buffer.as_bytes(),
            "leds": buffer.colors(),
        }))
    }

    /// Switch everything off, close the bus and power down the aux pin.
    ///
    /// The first failure is returned; later cleanup failures are only logged.
    async fn release(&mut self) -> hwbus_core::Result<()> {
        if self.state == DeviceState::Released {
            return Ok(());
        }
        self.state = DeviceState::Released;

        let mut first: Option<Error> = None;
        if let Some(mut adapter) = self.adapter.take() {
            if let Some(buffer) = self.buffer.as_mut() {
                buffer.encode_all(Rgb::OFF);
                if let Err(e) = adapter.write(buffer).await {
                    first.get_or_insert(e.into());
                }
            }
            if let Err(e) = adapter.close().await {
                record(&self.id, &mut first, e.into());
            }
        }
        if let Err(e) = self.release_aux().await {
            record(&self.id, &mut first, e);
        }

        debug!(id = %self.id, "LED strip released");
        first.map_or(Ok(()), Err)
    }
}

fn record(id: &DeviceId, first: &mut Option<Error>, error: Error) {
    if first.is_some() {
        warn!(id = %id, error = %error, "Cleanup failed during release");
    } else {
        *first = Some(error);
    }
}

fn rgb_from(data: &Value) -> hwbus_core::Result<Rgb> {
    let channel = |name: &str| -> hwbus_core::Result<Option<u8>> {
        number_field(data, name)?
            .map(|v| {
                u8::try_from(v)
                    .map_err(|_| Error::wrong_data(format!("{name} must be between 0 and 255, got {v}")))
            })
            .transpose()
    };
    match (channel("red")?, channel("green")?, channel("blue")?) {
        (Some(red), Some(green), Some(blue)) => Ok(Rgb::new(red, green, blue)),
        _ => Err(Error::missing_data(
            "Required: 'ledIndex' and {'red', 'green', 'blue'} or 'hex'",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hwbus_core::ConfigIssue;
    use rstest::rstest;

    #[test]
    fn test_spi_defaults() {
        let config = StripConfig::spi_rgb_leds(&json!({})).unwrap();
        assert_eq!(config.chipset, Chipset::Ws281x);
        assert_eq!(config.num_leds, 1);
        assert_eq!((config.spi_bus, config.spi_device), (0, 0));
        assert_eq!(config.aux_pin, None);
    }

    #[test]
    fn test_spi_options() {
        let config = StripConfig::spi_rgb_leds(
            &json!({"numOfLeds": "3", "ledType": "APA102", "spiBus": 1, "spiDevice": "1"}),
        )
        .unwrap();
        assert_eq!(config.chipset, Chipset::Apa102);
        assert_eq!(config.num_leds, 3);
        assert_eq!((config.spi_bus, config.spi_device), (1, 1));
    }

    #[rstest]
    #[case(json!({"numOfLeds": 0}))]
    #[case(json!({"numOfLeds": 4097}))]
    #[case(json!({"numOfLeds": 10_000_000_000_000_i64}))]
    #[case(json!({"numOfLeds": -3}))]
    #[case(json!({"spiBus": 2}))]
    #[case(json!({"spiDevice": -1}))]
    #[case(json!({"ledType": 5}))]
    fn test_spi_rejects_bad_options(#[case] options: Value) {
        let err = StripConfig::spi_rgb_leds(&options).unwrap_err();
        assert_eq!(err.config_issue(), Some(ConfigIssue::WrongData));
    }

    #[rstest]
    #[case(json!({"numOfLeds": -1}))]
    #[case(json!({"numOfLeds": 4097}))]
    #[case(json!({"model": "4mic", "numOfLeds": 2_305_843_009_213_693_952_i64}))]
    fn test_mic_hat_rejects_bad_led_count(#[case] options: Value) {
        let err = StripConfig::mic_hat(&options).unwrap_err();
        assert_eq!(err.config_issue(), Some(ConfigIssue::WrongData));
        assert_eq!(err.code(), 400);
    }

    #[test]
    fn test_led_count_upper_bound() {
        let config = StripConfig::spi_rgb_leds(&json!({"numOfLeds": 4096})).unwrap();
        assert_eq!(config.num_leds, MAX_LEDS);
    }

    #[test]
    fn test_unknown_chipset_is_unsupported() {
        let err = StripConfig::spi_rgb_leds(&json!({"ledType": "sk6812"})).unwrap_err();
        assert_eq!(err.code(), 501);
    }

    #[rstest]
    #[case("2mic", 3, (0, 0), None)]
    #[case("4mic", 12, (0, 1), Some(5))]
    #[case("6mic", 12, (0, 0), None)]
    #[case("4micL", 0, (0, 0), None)]
    fn test_mic_hat_models(
        #[case] model: &str,
        #[case] leds: usize,
        #[case] address: (u8, u8),
        #[case] aux: Option<u32>,
    ) {
        let config = StripConfig::mic_hat(&json!({ "model": model })).unwrap();
        assert_eq!(config.chipset, Chipset::Apa102);
        assert_eq!(config.num_leds, leds);
        assert_eq!((config.spi_bus, config.spi_device), address);
        assert_eq!(config.aux_pin, aux);
    }

    #[test]
    fn test_mic_hat_rejects_unknown_model() {
        assert!(StripConfig::mic_hat(&json!({"model": "8mic"})).is_err());
    }

    #[test]
    fn test_rgb_requires_all_channels() {
        let err = rgb_from(&json!({"red": 1, "green": 2})).unwrap_err();
        assert_eq!(err.config_issue(), Some(ConfigIssue::MissingData));

        let err = rgb_from(&json!({"red": 256, "green": 2, "blue": 3})).unwrap_err();
        assert_eq!(err.config_issue(), Some(ConfigIssue::WrongData));

        assert_eq!(
            rgb_from(&json!({"red": "1", "green": 2, "blue": 3})).unwrap(),
            Rgb::new(1, 2, 3)
        );
    }
}
