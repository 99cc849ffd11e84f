//! Wire-level encoders for the LED peripherals driven by hwbus.
//!
//! Everything in this crate is pure: functions take colors and produce bytes.
//! Bus access lives in `hwbus-hardware`.
//!
//! # Chipsets
//!
//! | chipset | frame | bytes per LED | color order | clock |
//! |---------|-------|---------------|-------------|-------|
//! | APA102  | 4 x `0x00` start, 4 x `0xFF` end | 4 | brightness, B, G, R | 4 MHz |
//! | WS281X  | none | 9 | G, R, B (3 pulse bits per data bit) | 10 MHz |
//!
//! # Example
//!
//! ```
//! use hwbus_protocol::{Chipset, LedBuffer, Rgb};
//!
//! let mut buffer = LedBuffer::new(Chipset::Apa102, 3).unwrap();
//! buffer.set_led(2, Rgb::new(255, 0, 0), None).unwrap();
//!
//! assert_eq!(buffer.as_bytes().len(), 20);
//! assert_eq!(buffer.decode(1), Some(Rgb::new(255, 0, 0)));
//! ```

pub mod apa102;
pub mod buffer;
pub mod chipset;
pub mod color;
pub mod ring;
pub mod ws281x;

pub use buffer::LedBuffer;
pub use chipset::{Chipset, MAX_LEDS};
pub use color::Rgb;
pub use ring::{RingCommand, RingState, VadLedMode};
