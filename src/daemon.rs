//! Standalone runner: hosts the plugin without an IRC client attached.
//!
//! With no host feeding connection events there is nothing to gate on, so
//! the port stays open for the life of the process.

use crate::config;
use crate::config::types::{AppConfig, IdentdConfig};
use crate::connections::{ConnectionEvent, ConnectionRegistry};
use crate::plugin::IdentdPlugin;
use crate::system::HostSystem;
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Capacity of the connection event channel handed to the plugin.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Run until SIGTERM or ctrl-c. SIGHUP re-reads `config_path` when given.
pub async fn run(app_config: AppConfig, config_path: Option<PathBuf>) -> Result<()> {
    let registry = Arc::new(ConnectionRegistry::new());
    let plugin = Arc::new(IdentdPlugin::new(
        standalone(app_config.identd),
        registry,
        Arc::new(HostSystem),
    ));

    // Kept alive so the plugin's subscription stays open.
    let (events_tx, events_rx) = broadcast::channel::<ConnectionEvent>(EVENT_CHANNEL_CAPACITY);
    plugin.on_load(events_rx);

    if !plugin.server().is_running() {
        anyhow::bail!(
            "ident server did not start on port {}",
            plugin.config().port
        );
    }
    if let Some(addr) = plugin.server().local_addr() {
        info!(addr = %addr, "Identd listening");
    }

    let shutdown = CancellationToken::new();
    let signals = tokio::spawn(handle_signals(
        plugin.clone(),
        config_path,
        shutdown.clone(),
    ));

    tokio::select! {
        _ = shutdown.cancelled() => {}
        result = tokio::signal::ctrl_c() => {
            match result {
                Ok(()) => info!("Ctrl-C received, shutting down"),
                Err(e) => error!(error = %e, "Failed to listen for ctrl-c"),
            }
        }
    }

    signals.abort();
    plugin.server().shutdown().await;
    plugin.on_unload();
    drop(events_tx);
    info!("Identd stopped");
    Ok(())
}

fn standalone(mut config: IdentdConfig) -> IdentdConfig {
    if !config.always_on {
        info!("No IRC host attached, keeping the ident port open");
        config.always_on = true;
    }
    config
}

#[cfg(unix)]
async fn handle_signals(
    plugin: Arc<IdentdPlugin>,
    config_path: Option<PathBuf>,
    shutdown: CancellationToken,
) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sighup = match signal(SignalKind::hangup()) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "Failed to install SIGHUP handler");
            return;
        }
    };
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "Failed to install SIGTERM handler");
            return;
        }
    };

    loop {
        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, initiating graceful shutdown");
                shutdown.cancel();
                return;
            }
            _ = sighup.recv() => {
                let Some(path) = config_path.as_ref() else {
                    warn!("SIGHUP received but no config file is in use");
                    continue;
                };
                info!(path = %path.display(), "SIGHUP received, reloading configuration");
                match reload_from(path) {
                    Ok(identd) => {
                        let old_port = plugin.config().port;
                        if identd.port != old_port || identd.listen != plugin.config().listen {
                            warn!(
                                port = old_port,
                                "Listen address changes apply after a restart"
                            );
                        }
                        plugin.reload(standalone(identd));
                    }
                    Err(e) => error!(error = %e, "Failed to reload configuration"),
                }
            }
        }
    }
}

#[cfg(not(unix))]
async fn handle_signals(
    _plugin: Arc<IdentdPlugin>,
    _config_path: Option<PathBuf>,
    _shutdown: CancellationToken,
) {
    std::future::pending::<()>().await;
}

fn reload_from(path: &std::path::Path) -> Result<IdentdConfig> {
    let mut cfg = config::load_config(path)?;
    config::env::apply_env_overrides(&mut cfg);
    config::parse_config_validate(&cfg)?;
    Ok(cfg.identd)
}
