//! Chipset-specific LED buffer.
//!
//! The buffer is sized once at construction and rewritten in place on every
//! write. Internal indices are zero-based; [`LedBuffer::set_led`] is the
//! one-based entry point used by callers and validates before touching bytes.

use hwbus_core::{Error, Result};

use crate::chipset::MAX_LEDS;
use crate::{Chipset, Rgb, apa102, ws281x};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedBuffer {
    chipset: Chipset,
    num_leds: usize,
    bytes: Vec<u8>,
}

impl LedBuffer {
    /// A buffer with every LED encoded as off.
    ///
    /// # Errors
    /// `WrongData` when `num_leds` exceeds [`MAX_LEDS`].
    pub fn new(chipset: Chipset, num_leds: usize) -> Result<Self> {
        let len = chipset
            .buffer_len(num_leds)
            .filter(|_| num_leds <= MAX_LEDS)
            .ok_or_else(|| {
                Error::wrong_data(format!("numOfLeds must be at most {MAX_LEDS}, got {num_leds}"))
            })?;
        let mut buffer = Self {
            chipset,
            num_leds,
            bytes: vec![0; len],
        };
        if chipset == Chipset::Apa102 {
            apa102::write_frames(&mut buffer.bytes);
        }
        buffer.encode_all(Rgb::OFF);
        Ok(buffer)
    }

    #[must_use]
    pub fn chipset(&self) -> Chipset {
        self.chipset
    }

    #[must_use]
    pub fn num_leds(&self) -> usize {
        self.num_leds
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Encode one LED at zero-based `index`.
    ///
    /// `level` is the APA102 5-bit brightness; `None` keeps the fixed maximum.
    /// WS281X ignores it.
    ///
    /// # Errors
    /// `WrongIndex` when `index >= num_leds`; the buffer is left untouched.
    pub fn encode(&mut self, index: usize, color: Rgb, level: Option<u8>) -> Result<()> {
        if index >= self.num_leds {
            return Err(Error::wrong_index(format!(
                "LED index {index} out of range for {} LEDs",
                self.num_leds
            )));
        }

        let range = self.slot(index);
        let slot = &mut self.bytes[range];
        match self.chipset {
            Chipset::Apa102 => apa102::encode_led(slot, color, level),
            Chipset::Ws281x => ws281x::encode_led(slot, color),
        }
        Ok(())
    }

    /// Apply one color to every LED.
    pub fn encode_all(&mut self, color: Rgb) {
        for index in 0..self.num_leds {
            let range = self.slot(index);
            let slot = &mut self.bytes[range];
            match self.chipset {
                Chipset::Apa102 => apa102::encode_led(slot, color, None),
                Chipset::Ws281x => ws281x::encode_led(slot, color),
            }
        }
    }

    /// One-based write used by the external contract.
    ///
    /// # Errors
    /// `WrongIndex` unless `1 <= led_index <= num_leds`.
    pub fn set_led(&mut self, led_index: i64, color: Rgb, level: Option<u8>) -> Result<()> {
        let index = self.validate_index(led_index)?;
        self.encode(index, color, level)
    }

    /// One-based write from a `#RRGGBB` string.
    ///
    /// # Errors
    /// `WrongIndex` for a bad index, `WrongData` for a bad color. Neither
    /// mutates the buffer.
    pub fn set_led_hex(&mut self, led_index: i64, hex: &str) -> Result<()> {
        let index = self.validate_index(led_index)?;
        let color = Rgb::from_hex(hex)?;
        self.encode(index, color, None)
    }

    /// Decode the LED at zero-based `index`.
    ///
    /// `None` when out of range or when the bytes are not a valid encoding.
    #[must_use]
    pub fn decode(&self, index: usize) -> Option<Rgb> {
        if index >= self.num_leds {
            return None;
        }
        let slot = &self.bytes[self.slot(index)];
        match self.chipset {
            Chipset::Apa102 => Some(apa102::decode_led(slot)),
            Chipset::Ws281x => ws281x::decode_led(slot),
        }
    }

    /// Colors of every LED in order.
    #[must_use]
    pub fn colors(&self) -> Vec<Rgb> {
        (0..self.num_leds)
            .map(|index| self.decode(index).unwrap_or_default())
            .collect()
    }

    fn validate_index(&self, led_index: i64) -> Result<usize> {
        usize::try_from(led_index)
            .ok()
            .filter(|index| (1..=self.num_leds).contains(index))
            .map(|index| index - 1)
            .ok_or_else(|| {
                Error::wrong_index(format!(
                    "ledIndex {led_index} must be between 1 and {}",
                    self.num_leds
                ))
            })
    }

    fn slot(&self, index: usize) -> std::ops::Range<usize> {
        let start = match self.chipset {
            Chipset::Apa102 => apa102::led_offset(index),
            Chipset::Ws281x => index * ws281x::BYTES_PER_LED,
        };
        start..start + self.chipset.bytes_per_led()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hwbus_core::ConfigIssue;
    use rstest::rstest;

    #[test]
    fn test_apa102_layout() {
        let buffer = LedBuffer::new(Chipset::Apa102, 3).unwrap();
        let bytes = buffer.as_bytes();

        assert_eq!(bytes.len(), 20);
        assert_eq!(&bytes[..4], &[0x00; 4]);
        assert_eq!(&bytes[16..], &[0xFF; 4]);
        assert_eq!(&bytes[4..8], &[0xFF, 0, 0, 0]);
    }

    #[test]
    fn test_ws281x_off_is_valid_encoding() {
        let buffer = LedBuffer::new(Chipset::Ws281x, 2).unwrap();
        assert_eq!(buffer.as_bytes().len(), 18);
        assert_eq!(&buffer.as_bytes()[..3], &[0x92, 0x49, 0x24]);
        assert_eq!(buffer.colors(), vec![Rgb::OFF, Rgb::OFF]);
    }

    #[rstest]
    #[case(Chipset::Apa102)]
    #[case(Chipset::Ws281x)]
    fn test_out_of_range_leaves_buffer(#[case] chipset: Chipset) {
        let mut buffer = LedBuffer::new(chipset, 4).unwrap();
        buffer.set_led(2, Rgb::new(9, 8, 7), None).unwrap();
        let before = buffer.clone();

        for index in [0, 5, -1] {
            let err = buffer.set_led(index, Rgb::new(1, 1, 1), None).unwrap_err();
            assert_eq!(err.config_issue(), Some(ConfigIssue::WrongIndex));
            assert_eq!(err.code(), 400);
        }
        assert_eq!(buffer, before);
    }

    #[test]
    fn test_ws281x_red_channel() {
        let mut buffer = LedBuffer::new(Chipset::Ws281x, 1).unwrap();
        buffer.set_led(1, Rgb::new(0xFF, 0, 0), None).unwrap();
        assert_eq!(buffer.decode(0).map(|c| c.red), Some(0xFF));

        buffer.set_led(1, Rgb::new(0x00, 0, 0), None).unwrap();
        assert_eq!(buffer.decode(0).map(|c| c.red), Some(0x00));
    }

    #[test]
    fn test_apa102_brightness_level() {
        let mut buffer = LedBuffer::new(Chipset::Apa102, 1).unwrap();
        buffer.set_led(1, Rgb::new(1, 2, 3), Some(4)).unwrap();
        assert_eq!(&buffer.as_bytes()[4..8], &[0xE4, 3, 2, 1]);
    }

    #[test]
    fn test_hex_bad_color_does_not_mutate() {
        let mut buffer = LedBuffer::new(Chipset::Apa102, 2).unwrap();
        let before = buffer.clone();
        let err = buffer.set_led_hex(1, "#zzzzzz").unwrap_err();
        assert_eq!(err.config_issue(), Some(ConfigIssue::WrongData));
        assert_eq!(buffer, before);

        buffer.set_led_hex(2, "#102030").unwrap();
        assert_eq!(buffer.decode(1), Some(Rgb::new(0x10, 0x20, 0x30)));
    }

    #[test]
    fn test_encode_all() {
        let mut buffer = LedBuffer::new(Chipset::Ws281x, 3).unwrap();
        buffer.encode_all(Rgb::new(5, 6, 7));
        assert!(buffer.colors().iter().all(|c| *c == Rgb::new(5, 6, 7)));
    }

    #[test]
    fn test_zero_leds() {
        let mut buffer = LedBuffer::new(Chipset::Apa102, 0).unwrap();
        assert_eq!(buffer.as_bytes().len(), 8);
        assert!(buffer.set_led(1, Rgb::OFF, None).is_err());
        assert!(buffer.colors().is_empty());
    }

    #[rstest]
    #[case(Chipset::Apa102, MAX_LEDS + 1)]
    #[case(Chipset::Ws281x, usize::MAX / 8)]
    #[case(Chipset::Apa102, usize::MAX)]
    fn test_oversized_chain_is_rejected(#[case] chipset: Chipset, #[case] leds: usize) {
        let err = LedBuffer::new(chipset, leds).unwrap_err();
        assert_eq!(err.config_issue(), Some(ConfigIssue::WrongData));
        assert_eq!(err.code(), 400);
    }

    #[test]
    fn test_longest_chain() {
        let buffer = LedBuffer::new(Chipset::Ws281x, MAX_LEDS).unwrap();
        assert_eq!(buffer.as_bytes().len(), MAX_LEDS * 9);
    }
}
