//! WS281X pulse encoding over a clocked bus.
//!
//! At 10 MHz every data bit becomes three bus bits `1, bit, 0`: a short high
//! pulse reads as `0`, a long one as `1`. The 24 bus bits of one color byte
//! pack into exactly three output bytes, so an LED (G, R, B) takes nine.

use std::time::Duration;

use crate::Rgb;

pub const CLOCK_HZ: u32 = 10_000_000;

pub const BYTES_PER_LED: usize = 9;

/// Bus bytes per color byte.
pub const BYTES_PER_COLOR: usize = 3;

/// Low time kept after each message so the chips latch.
pub const INTER_MESSAGE_DELAY_US: u16 = 50;

/// The first transfer after the bus opens is unreliable on these chips.
pub const SETTLE_DELAY: Duration = Duration::from_secs(1);

const PULSE_ZERO: u32 = 0b100;
const PULSE_ONE: u32 = 0b110;

/// Expand one color byte into its three bus bytes.
///
/// ```
/// use hwbus_protocol::ws281x::expand;
///
/// assert_eq!(expand(0xFF), [0xDB, 0x6D, 0xB6]);
/// assert_eq!(expand(0x00), [0x92, 0x49, 0x24]);
/// ```
#[must_use]
pub fn expand(byte: u8) -> [u8; BYTES_PER_COLOR] {
    let mut bits: u32 = 0;
    for shift in (0..8).rev() {
        let pulse = if (byte >> shift) & 1 == 1 {
            PULSE_ONE
        } else {
            PULSE_ZERO
        };
        bits = (bits << 3) | pulse;
    }
    [(bits >> 16) as u8, (bits >> 8) as u8, bits as u8]
}

/// Recover a color byte from its bus bytes.
///
/// Returns `None` when any 3-bit group is not a valid `1x0` pulse, e.g. on a
/// zeroed buffer that was never encoded.
#[must_use]
pub fn collapse(bytes: [u8; BYTES_PER_COLOR]) -> Option<u8> {
    let bits = (u32::from(bytes[0]) << 16) | (u32::from(bytes[1]) << 8) | u32::from(bytes[2]);
    let mut byte = 0u8;
    for group in 0..8 {
        let pulse = (bits >> (21 - 3 * group)) & 0b111;
        let bit = match pulse {
            PULSE_ZERO => 0,
            PULSE_ONE => 1,
            _ => return None,
        };
        byte = (byte << 1) | bit;
    }
    Some(byte)
}

/// Encode one LED into its 9-byte slot in G, R, B order.
pub fn encode_led(slot: &mut [u8], color: Rgb) {
    for (chunk, channel) in slot
        .chunks_exact_mut(BYTES_PER_COLOR)
        .zip([color.green, color.red, color.blue])
    {
        chunk.copy_from_slice(&expand(channel));
    }
}

/// Read one LED back from its 9-byte slot.
#[must_use]
pub fn decode_led(slot: &[u8]) -> Option<Rgb> {
    let mut channels = slot
        .chunks_exact(BYTES_PER_COLOR)
        .map(|chunk| collapse([chunk[0], chunk[1], chunk[2]]));
    let green = channels.next()??;
    let red = channels.next()??;
    let blue = channels.next()??;
    Some(Rgb::new(red, green, blue))
}
