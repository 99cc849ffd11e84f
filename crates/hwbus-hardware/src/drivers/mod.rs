//! Device drivers built on the platform primitives.
//!
//! | Driver | Resource | Device kind |
//! |--------|----------|-------------|
//! | [`ButtonDevice`] | input pin with edge watching | `button` |
//! | [`LedDevice`] | output pin | `led` |
//! | [`StripDevice`] | SPI bus (+ aux power pin on 4-mic HATs) | `item` |
//! | [`RingDevice`] | USB vendor control transfers | `item` |

mod pin;
mod ring;
mod strip;

pub use pin::{ButtonDevice, LedDevice};
pub use ring::{RingConfig, RingDevice, RingMode};
pub use strip::{MicHatModel, StripConfig, StripDevice};
