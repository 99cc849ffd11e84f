//! Vendor control protocol of the USB microphone-array LED ring.
//!
//! Every command is a single vendor OUT control transfer:
//!
//! | field | value |
//! |-------|-------|
//! | `bmRequestType` | `0x40` (vendor, device, host-to-device) |
//! | `bRequest` | `0` |
//! | `wValue` | command ([`RingCommand::value`]) |
//! | `wIndex` | `0x1C` |
//! | data | command payload ([`RingCommand::payload`]) |

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use hwbus_core::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::Rgb;

pub const VENDOR_ID: u16 = 0x2886;
pub const PRODUCT_ID: u16 = 0x0018;

pub const REQUEST_TYPE: u8 = 0x40;
pub const REQUEST: u8 = 0;
pub const INDEX: u16 = 0x1C;

pub const TIMEOUT: Duration = Duration::from_millis(8000);

pub const NUM_LEDS: usize = 12;

/// Bytes per LED in a custom frame: red, green, blue, zero.
pub const BYTES_PER_LED: usize = 4;

pub const DEFAULT_BRIGHTNESS: u8 = 10;
pub const MAX_BRIGHTNESS: u8 = 0x1F;

/// Behavior of the voice-activity LED in the ring center.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VadLedMode {
    Off,
    On,
    Auto,
}

impl VadLedMode {
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        match self {
            Self::Off => 0,
            Self::On => 1,
            Self::Auto => 3,
        }
    }
}

/// One control transfer understood by the ring firmware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RingCommand {
    Trace,
    Idle,
    Listening,
    Speaking,
    Loading,
    /// Per-LED colors as an `r, g, b, 0` sequence.
    Custom(Vec<u8>),
    /// Global brightness, `0..=31`.
    Brightness(u8),
    VadLed(VadLedMode),
}

impl RingCommand {
    /// `wValue` of the control transfer.
    #[must_use]
    pub fn value(&self) -> u16 {
        match self {
            Self::Trace => 0,
            Self::Idle => 1,
            Self::Listening => 2,
            Self::Speaking => 4,
            Self::Loading => 5,
            Self::Custom(_) => 6,
            Self::Brightness(_) => 0x20,
            Self::VadLed(_) => 0x22,
        }
    }

    #[must_use]
    pub fn payload(&self) -> Vec<u8> {
        match self {
            Self::Idle => vec![0; 4],
            Self::Trace | Self::Listening | Self::Speaking | Self::Loading => vec![0],
            Self::Custom(frame) => frame.clone(),
            Self::Brightness(level) => vec![(*level).min(MAX_BRIGHTNESS)],
            Self::VadLed(mode) => vec![mode.as_byte()],
        }
    }
}

/// Named ring states accepted by `writeData`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RingState {
    Idle,
    Loading,
    Listening,
    Speaking,
    AwaitDialog,
    WakeWordActive,
    WakeWordInactive,
    Custom,
}

impl RingState {
    pub const ALL: [RingState; 8] = [
        Self::Idle,
        Self::Loading,
        Self::Listening,
        Self::Speaking,
        Self::AwaitDialog,
        Self::WakeWordActive,
        Self::WakeWordInactive,
        Self::Custom,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Listening => "listening",
            Self::Speaking => "speaking",
            Self::AwaitDialog => "awaitDialog",
            Self::WakeWordActive => "wakeWordActive",
            Self::WakeWordInactive => "wakeWordInactive",
            Self::Custom => "custom",
        }
    }

    /// Wake-word states only toggle the VAD LED and leave the ring state alone.
    #[must_use]
    pub const fn changes_vad(self) -> bool {
        matches!(self, Self::WakeWordActive | Self::WakeWordInactive)
    }

    /// Translate a state into its control transfer.
    ///
    /// # Errors
    /// `MissingData` for `custom` without a frame, `WrongData` for a frame
    /// longer than the ring.
    pub fn command(self, rgb0: Option<&[u8]>) -> Result<RingCommand> {
        Ok(match self {
            Self::Idle => RingCommand::Idle,
            Self::Loading => RingCommand::Loading,
            Self::Listening => RingCommand::Listening,
            Self::Speaking => RingCommand::Speaking,
            Self::AwaitDialog => {
                let mut frame = RingFrame::new();
                frame.set_led(1, Rgb::new(120, 120, 0))?;
                RingCommand::Custom(frame.into_bytes())
            }
            Self::WakeWordActive => RingCommand::VadLed(VadLedMode::On),
            Self::WakeWordInactive => RingCommand::VadLed(VadLedMode::Off),
            Self::Custom => {
                let frame = rgb0.ok_or_else(|| Error::missing_data("Required: rgb0Array"))?;
                if frame.is_empty() || frame.len() > NUM_LEDS * BYTES_PER_LED {
                    return Err(Error::wrong_data(format!(
                        "rgb0Array must hold 1 to {} values",
                        NUM_LEDS * BYTES_PER_LED
                    )));
                }
                RingCommand::Custom(frame.to_vec())
            }
        })
    }
}

impl fmt::Display for RingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RingState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| Error::wrong_data(format!("Unknown state '{s}'")))
    }
}

/// Full-ring `rgb0` frame used by the `custom` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingFrame {
    bytes: [u8; NUM_LEDS * BYTES_PER_LED],
}

impl RingFrame {
    #[must_use]
    pub fn new() -> Self {
        Self {
            bytes: [0; NUM_LEDS * BYTES_PER_LED],
        }
    }

    /// One-based LED write.
    pub fn set_led(&mut self, led_index: usize, color: Rgb) -> Result<()> {
        if !(1..=NUM_LEDS).contains(&led_index) {
            return Err(Error::wrong_index(format!(
                "ledIndex {led_index} must be between 1 and {NUM_LEDS}"
            )));
        }
        let offset = (led_index - 1) * BYTES_PER_LED;
        self.bytes[offset..offset + BYTES_PER_LED]
            .copy_from_slice(&[color.red, color.green, color.blue, 0]);
        Ok(())
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes.to_vec()
    }
}

impl Default for RingFrame {
    fn default() -> Self {
        Self::new()
    }
}
