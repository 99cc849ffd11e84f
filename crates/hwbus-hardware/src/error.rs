//! Error types for bus, pin and USB primitives.
//!
//! These describe what went wrong at the primitive level. Drivers convert them
//! into the caller-facing taxonomy with `From<HardwareError> for hwbus_core::Error`.

/// Result type alias for hardware primitives.
pub type Result<T> = std::result::Result<T, HardwareError>;

/// Errors raised by bus, pin and USB handles.
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// The resource could not be opened (missing device node, permissions, busy).
    #[error("Failed to open {resource}: {message}")]
    OpenFailed { resource: String, message: String },

    /// Opening the resource did not finish in time.
    #[error("Opening {resource} timed out after {duration_ms}ms")]
    Timeout { resource: String, duration_ms: u64 },

    /// A bus write or control transfer failed.
    #[error("Transfer on {resource} failed: {message}")]
    TransferFailed { resource: String, message: String },

    /// Closing or unexporting the resource failed.
    #[error("Failed to close {resource}: {message}")]
    CloseFailed { resource: String, message: String },

    /// The handle was already closed.
    #[error("Resource closed: {resource}")]
    Closed { resource: String },

    /// The platform was built without support for this resource.
    #[error("Unsupported on this platform: {operation}")]
    Unsupported { operation: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HardwareError {
    pub fn open_failed(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::OpenFailed {
            resource: resource.into(),
            message: message.into(),
        }
    }

    pub fn timeout(resource: impl Into<String>, duration_ms: u64) -> Self {
        Self::Timeout {
            resource: resource.into(),
            duration_ms,
        }
    }

    pub fn transfer_failed(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TransferFailed {
            resource: resource.into(),
            message: message.into(),
        }
    }

    pub fn close_failed(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CloseFailed {
            resource: resource.into(),
            message: message.into(),
        }
    }

    pub fn closed(resource: impl Into<String>) -> Self {
        Self::Closed {
            resource: resource.into(),
        }
    }

    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported {
            operation: operation.into(),
        }
    }
}

impl From<HardwareError> for hwbus_core::Error {
    fn from(error: HardwareError) -> Self {
        match error {
            HardwareError::OpenFailed { ref resource, .. }
            | HardwareError::Timeout { ref resource, .. } => {
                hwbus_core::Error::unavailable(resource.clone(), error.to_string())
            }
            HardwareError::Unsupported { operation } => hwbus_core::Error::unsupported(operation),
            HardwareError::TransferFailed { .. }
            | HardwareError::CloseFailed { .. }
            | HardwareError::Closed { .. }
            | HardwareError::Io(_) => hwbus_core::Error::transfer(error.to_string()),
        }
    }
}
