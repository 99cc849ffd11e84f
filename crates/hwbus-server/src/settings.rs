//! Server settings.
//!
//! Read from a JSON file (`settings.json` by default), then overridden by
//! command-line arguments:
//!
//! ```json
//! {
//!   "port": 8443,
//!   "hostname": "localhost",
//!   "ssl": false,
//!   "logger": { "level": "info" },
//!   "xtensions": ["gpio-interface", "broadcaster"],
//!   "serverId": "my-secret",
//!   "platform": "mock",
//!   "shutdownTimeoutMs": 3000,
//!   "maxConnections": 100
//! }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use hwbus_core::constants::{DEFAULT_HOSTNAME, DEFAULT_MAX_CONNECTIONS, DEFAULT_PORT, DEFAULT_SHUTDOWN_TIMEOUT_MS};
use hwbus_hardware::PlatformKind;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cli::Args;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerSettings {
    pub level: String,
}

impl Default for LoggerSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub port: u16,
    pub hostname: String,
    /// TLS is not supported; a `true` value is logged and ignored.
    pub ssl: bool,
    pub logger: LoggerSettings,
    /// Extensions to load, by name.
    pub xtensions: Vec<String>,
    /// Handshake secret expected in the welcome message.
    pub server_id: Option<String>,
    pub platform: PlatformKind,
    pub shutdown_timeout_ms: u64,
    pub max_connections: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            hostname: DEFAULT_HOSTNAME.to_string(),
            ssl: false,
            logger: LoggerSettings::default(),
            xtensions: vec!["gpio-interface".to_string(), "broadcaster".to_string()],
            server_id: None,
            platform: PlatformKind::default(),
            shutdown_timeout_ms: DEFAULT_SHUTDOWN_TIMEOUT_MS,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

impl Settings {
    /// Read a settings file. `Ok(None)` when the file does not exist.
    ///
    /// # Errors
    /// Unreadable or malformed files.
    pub fn read(path: &Path) -> Result<Option<Self>, SettingsError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(SettingsError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|source| SettingsError::Parse {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Apply command-line overrides.
    pub fn apply(&mut self, args: &Args) {
        if let Some(port) = args.port {
            self.port = port;
        }
        if let Some(hostname) = &args.hostname {
            self.hostname.clone_from(hostname);
        }
        if let Some(platform) = args.platform {
            self.platform = platform;
        }
        if let Some(level) = &args.log_level {
            self.logger.level.clone_from(level);
        }
    }

    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// `hostname:port`, ready for name resolution.
    #[must_use]
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.hostname, self.port)
    }
}
