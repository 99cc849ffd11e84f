pub mod constants;
pub mod error;
pub mod message;
pub mod types;

pub use error::{ConfigIssue, Error, Result};
pub use message::{ErrorPayload, Message, MsgId};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
