use std::process;

use anyhow::Context;
use clap::Parser;
use hwbus_server::logging::init_logging;
use hwbus_server::{App, Args, Settings, ShutdownCoordinator, Signals, block_on_detached};
use tracing::warn;

fn main() {
    let code = match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("hwbus: {e:#}");
            1
        }
    };
    process::exit(code);
}

fn run() -> anyhow::Result<i32> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?;
    block_on_detached(runtime, serve())
}

async fn serve() -> anyhow::Result<i32> {
    let args = Args::parse();
    let file = Settings::read(&args.settings)?;
    let found = file.is_some();
    let mut settings = file.unwrap_or_default();
    settings.apply(&args);

    init_logging(&settings.logger.level);
    if !found {
        warn!(path = %args.settings.display(), "Settings file not found, using defaults");
    }

    let signals = Signals::new().context("Failed to install signal handlers")?;
    let coordinator = ShutdownCoordinator::new(settings.shutdown_timeout());
    let app = App::start(settings).await?;

    let report = app.run_until_signal(signals, coordinator).await;
    Ok(report.exit_code())
}
