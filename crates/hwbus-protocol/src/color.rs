//! RGB triples and the `#RRGGBB` convenience form.

use std::fmt;
use std::str::FromStr;

use hwbus_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// An 8-bit RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Rgb {
    pub const OFF: Rgb = Rgb::new(0, 0, 0);

    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    /// Parse `#RRGGBB`, `RRGGBB` or the short `#RGB` form.
    ///
    /// # Errors
    /// Returns a `WrongData` config error for anything else.
    ///
    /// ```
    /// use hwbus_protocol::Rgb;
    ///
    /// assert_eq!(Rgb::from_hex("#ceff1a").unwrap(), Rgb::new(0xce, 0xff, 0x1a));
    /// assert_eq!(Rgb::from_hex("#f0a").unwrap(), Rgb::new(0xff, 0x00, 0xaa));
    /// assert!(Rgb::from_hex("#12345").is_err());
    /// ```
    pub fn from_hex(hex: &str) -> Result<Self> {
        let digits = hex.trim().trim_start_matches('#');
        let invalid = || Error::wrong_data(format!("Invalid hex color '{hex}'"));

        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        match digits.len() {
            6 => {
                let channel = |range: std::ops::Range<usize>| {
                    u8::from_str_radix(&digits[range], 16).map_err(|_| invalid())
                };
                Ok(Self::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
            }
            3 => {
                let channel = |index: usize| {
                    u8::from_str_radix(&digits[index..=index], 16)
                        .map(|v| v * 0x11)
                        .map_err(|_| invalid())
                };
                Ok(Self::new(channel(0)?, channel(1)?, channel(2)?))
            }
            _ => Err(invalid()),
        }
    }

    /// Lowercase `#rrggbb` form.
    #[must_use]
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.red, self.green, self.blue)
    }
}

impl FromStr for Rgb {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Rgb::from_hex(s)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl From<(u8, u8, u8)> for Rgb {
    fn from((red, green, blue): (u8, u8, u8)) -> Self {
        Self::new(red, green, blue)
    }
}
