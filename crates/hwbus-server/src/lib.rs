//! The hwbus server: settings, logging, wiring and shutdown.

pub mod app;
pub mod cli;
pub mod logging;
pub mod settings;
pub mod shutdown;

pub use app::App;
pub use cli::Args;
pub use settings::{Settings, SettingsError};
pub use shutdown::{DrainReport, ShutdownCoordinator, SignalSource, Signals, block_on_detached};
