use std::path::PathBuf;

use clap::Parser;

use hwbus_hardware::PlatformKind;

/// hwbus - hardware-control message bus over WebSocket.
#[derive(Parser, Debug)]
#[command(name = "hwbus")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Settings file.
    #[arg(short, long, default_value = "settings.json", env = "HWBUS_SETTINGS")]
    pub settings: PathBuf,

    /// Port to listen on.
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Host name or address to bind to.
    #[arg(long)]
    pub hostname: Option<String>,

    /// Hardware backend: mock or linux.
    #[arg(long)]
    pub platform: Option<PlatformKind>,

    /// Log level or filter directive (overridden by RUST_LOG).
    #[arg(long)]
    pub log_level: Option<String>,
}
