//! Error taxonomy shared by every hwbus crate.
//!
//! Each variant maps to a stable [`Error::name`] and an HTTP-style
//! [`Error::code`]; both end up in the `error` object of outbound events.

use std::fmt;

use thiserror::Error;

use crate::constants::{
    CODE_CONFLICT, CODE_INVALID_CONFIG, CODE_NOT_FOUND, CODE_OPERATION_FAILED, CODE_UNSUPPORTED,
};

/// Sub-category of a configuration error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigIssue {
    /// Malformed or inconsistent configuration.
    Invalid,
    /// A required field is absent.
    MissingData,
    /// An LED index outside `[1, N]`.
    WrongIndex,
    /// A field is present but its value is not accepted.
    WrongData,
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid => write!(f, "Invalid"),
            Self::MissingData => write!(f, "MissingData"),
            Self::WrongIndex => write!(f, "WrongIndex"),
            Self::WrongData => write!(f, "WrongData"),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or missing fields, LED index out of range.
    #[error("{issue}: {message}")]
    Config { issue: ConfigIssue, message: String },

    /// The identifier already has a live instance.
    #[error("Already registered: {id}")]
    Conflict { id: String },

    /// No live instance with this identifier.
    #[error("Not found: {id}")]
    NotFound { id: String },

    /// Operation requested before `init` completed (or after release).
    #[error("Interface not yet ready: {id}")]
    NotReady { id: String },

    /// The bus, pin or USB address could not be opened.
    #[error("Device unavailable ({resource}): {message}")]
    DeviceUnavailable { resource: String, message: String },

    /// A bus write failed.
    #[error("Transfer failed: {message}")]
    Transfer { message: String },

    /// Unknown chipset, driver or unsupported platform feature.
    #[error("Not supported: {what}")]
    Unsupported { what: String },

    /// `readData` called before any buffer or state exists.
    #[error("No data found")]
    NoData,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            issue: ConfigIssue::Invalid,
            message: message.into(),
        }
    }

    pub fn missing_data(message: impl Into<String>) -> Self {
        Self::Config {
            issue: ConfigIssue::MissingData,
            message: message.into(),
        }
    }

    pub fn wrong_index(message: impl Into<String>) -> Self {
        Self::Config {
            issue: ConfigIssue::WrongIndex,
            message: message.into(),
        }
    }

    pub fn wrong_data(message: impl Into<String>) -> Self {
        Self::Config {
            issue: ConfigIssue::WrongData,
            message: message.into(),
        }
    }

    pub fn conflict(id: impl Into<String>) -> Self {
        Self::Conflict { id: id.into() }
    }

    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    pub fn not_ready(id: impl Into<String>) -> Self {
        Self::NotReady { id: id.into() }
    }

    pub fn unavailable(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DeviceUnavailable {
            resource: resource.into(),
            message: message.into(),
        }
    }

    pub fn transfer(message: impl Into<String>) -> Self {
        Self::Transfer {
            message: message.into(),
        }
    }

    pub fn unsupported(what: impl Into<String>) -> Self {
        Self::Unsupported { what: what.into() }
    }

    /// Stable taxonomy name used in error events.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Config { .. } => "ConfigError",
            Self::Conflict { .. } => "ConflictError",
            Self::NotFound { .. } => "NotFoundError",
            Self::NotReady { .. } => "NotReadyError",
            Self::DeviceUnavailable { .. } => "DeviceUnavailable",
            Self::Transfer { .. } | Self::Io(_) => "TransferError",
            Self::Unsupported { .. } => "UnsupportedError",
            Self::NoData => "NoData",
        }
    }

    /// HTTP-style status code reported to callers.
    #[must_use]
    pub fn code(&self) -> u16 {
        match self {
            Self::Config { .. } => CODE_INVALID_CONFIG,
            Self::NotFound { .. } => CODE_NOT_FOUND,
            Self::Conflict { .. } => CODE_CONFLICT,
            Self::Unsupported { .. } => CODE_UNSUPPORTED,
            Self::NotReady { .. }
            | Self::DeviceUnavailable { .. }
            | Self::Transfer { .. }
            | Self::NoData
            | Self::Io(_) => CODE_OPERATION_FAILED,
        }
    }

    /// Config sub-category, if this is a configuration error.
    #[must_use]
    pub fn config_issue(&self) -> Option<ConfigIssue> {
        match self {
            Self::Config { issue, .. } => Some(*issue),
            _ => None,
        }
    }
}
