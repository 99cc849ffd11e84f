//! Chipset parameters: buffer geometry, clock and timing constraints.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use hwbus_core::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::{apa102, ws281x};

/// Longest chain a single buffer is built for.
pub const MAX_LEDS: usize = 4096;

/// Addressable LED chipset family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chipset {
    /// One-wire chips (WS2811/WS2812/WS2813) driven through the SPI MOSI line.
    #[default]
    Ws281x,

    /// Clocked two-wire chips with start/end frames.
    Apa102,
}

impl Chipset {
    /// SPI clock used for this chipset.
    #[must_use]
    pub const fn clock_hz(self) -> u32 {
        match self {
            Self::Ws281x => ws281x::CLOCK_HZ,
            Self::Apa102 => apa102::CLOCK_HZ,
        }
    }

    #[must_use]
    pub const fn bytes_per_led(self) -> usize {
        match self {
            Self::Ws281x => ws281x::BYTES_PER_LED,
            Self::Apa102 => apa102::BYTES_PER_LED,
        }
    }

    /// Total buffer length for `num_leds` LEDs, including frames.
    ///
    /// `None` when the length does not fit in `usize`.
    #[must_use]
    pub const fn buffer_len(self, num_leds: usize) -> Option<usize> {
        let Some(payload) = num_leds.checked_mul(self.bytes_per_led()) else {
            return None;
        };
        match self {
            Self::Ws281x => Some(payload),
            Self::Apa102 => payload.checked_add(apa102::START_FRAME.len() + apa102::END_FRAME.len()),
        }
    }

    /// Gap the bus keeps low after each message, in microseconds.
    #[must_use]
    pub const fn inter_message_delay_us(self) -> u16 {
        match self {
            Self::Ws281x => ws281x::INTER_MESSAGE_DELAY_US,
            Self::Apa102 => 0,
        }
    }

    /// Wait after the first transfer before writes are trusted.
    #[must_use]
    pub const fn settle_delay(self) -> Duration {
        match self {
            Self::Ws281x => ws281x::SETTLE_DELAY,
            Self::Apa102 => Duration::ZERO,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ws281x => "ws281x",
            Self::Apa102 => "apa102",
        }
    }
}

impl fmt::Display for Chipset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Chipset {
    type Err = Error;

    /// Case-insensitive; unknown names are `Unsupported`.
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ws281x" => Ok(Self::Ws281x),
            "apa102" => Ok(Self::Apa102),
            other => Err(Error::unsupported(format!("ledType '{other}'"))),
        }
    }
}
