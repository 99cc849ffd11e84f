//! APA102 framing.
//!
//! ```text
//! 00 00 00 00 | Lb B G R | Lb B G R | ... | FF FF FF FF
//!   start        LED 0      LED 1             end
//! ```
//!
//! `Lb` is `0b111` followed by a 5-bit global brightness level.

use crate::Rgb;

pub const CLOCK_HZ: u32 = 4_000_000;

pub const BYTES_PER_LED: usize = 4;

pub const START_FRAME: [u8; 4] = [0x00; 4];

/// Trailing bytes that supply the clock edges needed to latch the last LEDs.
pub const END_FRAME: [u8; 4] = [0xFF; 4];

/// Marker bits of the brightness byte.
pub const BRIGHTNESS_MARKER: u8 = 0b1110_0000;

/// Highest 5-bit brightness level.
pub const MAX_LEVEL: u8 = 0x1F;

/// Brightness byte used when only RGB is exposed.
pub const FIXED_BRIGHTNESS: u8 = BRIGHTNESS_MARKER | MAX_LEVEL;

/// Brightness byte for an optional 5-bit level; levels above 31 saturate.
#[must_use]
pub fn brightness_byte(level: Option<u8>) -> u8 {
    match level {
        Some(level) => BRIGHTNESS_MARKER | level.min(MAX_LEVEL),
        None => FIXED_BRIGHTNESS,
    }
}

/// Byte offset of LED `index` (zero-based) inside the full buffer.
#[must_use]
pub const fn led_offset(index: usize) -> usize {
    START_FRAME.len() + index * BYTES_PER_LED
}

/// Write the start and end frames of a buffer of any LED count.
pub fn write_frames(buffer: &mut [u8]) {
    let len = buffer.len();
    buffer[..START_FRAME.len()].copy_from_slice(&START_FRAME);
    buffer[len - END_FRAME.len()..].copy_from_slice(&END_FRAME);
}

/// Encode one LED into its 4-byte slot.
pub fn encode_led(slot: &mut [u8], color: Rgb, level: Option<u8>) {
    slot[0] = brightness_byte(level);
    slot[1] = color.blue;
    slot[2] = color.green;
    slot[3] = color.red;
}

/// Read one LED back from its 4-byte slot.
#[must_use]
pub fn decode_led(slot: &[u8]) -> Rgb {
    Rgb::new(slot[3], slot[2], slot[1])
}
