//! Wiring of the running server.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use hwbus_core::VERSION;
use hwbus_extensions::{AnyExtension, ExtensionRegistry, Router, spawn_relay};
use hwbus_hardware::platform::Platform;
use hwbus_network::{BroadcastBus, WsServer, WsServerConfig};
use serde_json::json;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::settings::Settings;
use crate::shutdown::{DrainReport, ShutdownCoordinator, SignalSource};

/// A started server: extensions loaded, relay running, transport accepting.
pub struct App {
    extensions: ExtensionRegistry,
    bus: BroadcastBus,
    local_addr: SocketAddr,
    cancel: CancellationToken,
    server: JoinHandle<()>,
    relay: JoinHandle<()>,
}

impl App {
    /// Start on the platform selected in `settings`.
    pub async fn start(settings: Settings) -> anyhow::Result<Self> {
        let platform = Platform::from_kind(settings.platform);
        Self::start_on(settings, platform).await
    }

    /// Start on an explicit platform.
    pub async fn start_on(settings: Settings, platform: Platform) -> anyhow::Result<Self> {
        if settings.ssl {
            warn!("TLS is not supported, serving plain WebSocket");
        }
        info!(platform = ?platform.kind(), "Using hardware platform");

        let (extensions, events) = ExtensionRegistry::new();
        for name in &settings.xtensions {
            if let Err(e) = extensions.register(name, |cb| AnyExtension::from_name(name, cb, &platform)) {
                error!(extension = %name, error = %e, "Failed to load extension");
            }
        }
        info!(count = extensions.len(), "Loaded extensions");

        let bus = BroadcastBus::new(settings.max_connections);
        let relay = spawn_relay(events, bus.clone());

        let address = settings.listen_address();
        let bind_addr = tokio::net::lookup_host(&address)
            .await
            .with_context(|| format!("Failed to resolve {address}"))?
            .next()
            .with_context(|| format!("No address found for {address}"))?;
        let config = WsServerConfig {
            bind_addr,
            server_id: settings.server_id.clone(),
            info: json!({
                "server": "hwbus",
                "version": VERSION,
                "extensions": extensions.names(),
            }),
        };
        let server = WsServer::bind(config, bus.clone()).await?;
        let local_addr = server.local_addr()?;

        let cancel = CancellationToken::new();
        let router = Arc::new(Router::new(extensions.clone()));
        let server = tokio::spawn(server.serve(router, cancel.clone()));
        info!(addr = %local_addr, "Server running");

        Ok(Self {
            extensions,
            bus,
            local_addr,
            cancel,
            server,
            relay,
        })
    }

    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    #[must_use]
    pub fn extensions(&self) -> &ExtensionRegistry {
        &self.extensions
    }

    #[must_use]
    pub fn bus(&self) -> &BroadcastBus {
        &self.bus
    }

    /// Stop accepting connections, then release everything.
    pub async fn shutdown(self, coordinator: &ShutdownCoordinator) -> DrainReport {
        self.cancel.cancel();
        let report = coordinator.drain(self.extensions.release_all()).await;
        if let Err(e) = self.server.await {
            warn!(error = %e, "Server task ended abnormally");
        }
        self.relay.abort();
        report
    }

    /// Serve until the first termination signal, then drain once.
    pub async fn run_until_signal<S: SignalSource>(
        self,
        mut signals: S,
        coordinator: ShutdownCoordinator,
    ) -> DrainReport {
        let signal = signals.recv().await;
        coordinator.begin();
        info!(signal, "Shutdown requested");

        let drain = self.shutdown(&coordinator);
        tokio::pin!(drain);
        loop {
            tokio::select! {
                report = &mut drain => return report,
                signal = signals.recv() => {
                    if !coordinator.begin() {
                        info!(signal, "Shutdown already in progress");
                    }
                }
            }
        }
    }
}
