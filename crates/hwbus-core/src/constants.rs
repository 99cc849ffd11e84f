//! Shared constants for the hwbus message contract.
//!
//! # Usage
//!
//! ```
//! use hwbus_core::constants::*;
//!
//! assert_eq!(CODE_CONFLICT, 423);
//! assert_eq!(RESPONSE_SENT, "sent");
//! ```

use std::time::Duration;

// ============================================================================
// Error codes
// ============================================================================

/// Invalid or incomplete configuration.
pub const CODE_INVALID_CONFIG: u16 = 400;

/// Connection has not completed the welcome handshake.
pub const CODE_UNAUTHORIZED: u16 = 401;

/// No live instance with the requested identifier.
pub const CODE_NOT_FOUND: u16 = 404;

/// Identifier already registered.
pub const CODE_CONFLICT: u16 = 423;

/// Operation failed on the device or bus.
pub const CODE_OPERATION_FAILED: u16 = 500;

/// Not supported on this platform or by this driver.
pub const CODE_UNSUPPORTED: u16 = 501;

// ============================================================================
// Reserved message types
// ============================================================================

/// Echo control type, answered by the router itself.
pub const TYPE_MSG: &str = "msg";

/// Transport handshake type.
pub const TYPE_WELCOME: &str = "welcome";

/// Type used in replies to unroutable messages.
pub const TYPE_UNDEFINED: &str = "undefined";

// ============================================================================
// Responses
// ============================================================================

/// Input accepted; the outcome follows as an event.
pub const RESPONSE_SENT: &str = "sent";

/// Input could not be interpreted by the extension.
pub const RESPONSE_INVALID: &str = "unknown or invalid request";

/// Input without usable data.
pub const RESPONSE_UNKNOWN: &str = "unknown request";

// ============================================================================
// Timeouts
// ============================================================================

/// Upper bound for opening a bus, pin or USB device.
pub const OPEN_TIMEOUT: Duration = Duration::from_secs(5);

/// Default bound for draining every device at shutdown.
pub const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 3000;

// ============================================================================
// Server defaults
// ============================================================================

pub const DEFAULT_PORT: u16 = 8443;

pub const DEFAULT_HOSTNAME: &str = "localhost";

pub const DEFAULT_MAX_CONNECTIONS: usize = 100;
