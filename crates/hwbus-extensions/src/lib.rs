//! Extension layer of the hwbus server
//!
//! Inbound messages are routed by `type` to a named extension. Extensions
//! answer immediately and report results through callbacks, which the relay
//! turns into bus events.
//!
//! ```text
//!  Message ──► Router ──► Extension::input ──► reply to sender
//!                              │
//!                              └─► callbacks ──► relay ──► BroadcastBus
//! ```
//!
//! Built-in extensions:
//!
//! - `gpio-interface` ([`GpioInterface`]): buttons, LEDs and driver-backed
//!   items over a device registry.
//! - `broadcaster` ([`Broadcaster`]): re-emits its input to every caller.

pub mod broadcaster;
pub mod extension;
pub mod gpio;
pub mod registry;
pub mod relay;
pub mod router;

pub use broadcaster::Broadcaster;
pub use extension::{
    AnyExtension, BROADCASTER, Extension, ExtensionCallbacks, ExtensionEvent, GPIO_INTERFACE, ReleaseTask,
};
pub use gpio::GpioInterface;
pub use registry::ExtensionRegistry;
pub use relay::spawn_relay;
pub use router::Router;
