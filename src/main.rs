use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use identd::cli::{Cli, Command};
use identd::config;
use identd::config::types::AppConfig;
use identd::connections::ConnectionRegistry;
use identd::context::{IdentContext, SharedConfig};
use identd::ident::protocol::PortPair;
use identd::system::HostSystem;

fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Some(Command::CheckConfig) => {
            let cfg = config::load_config(&cli.config)?;
            println!("Configuration is valid.");
            println!("  Listen: {}:{}", cfg.identd.listen, cfg.identd.port);
            println!("  Always on: {}", cfg.identd.always_on);
            return Ok(());
        }
        Some(Command::ShowConfig { format }) => {
            let (cfg, _) = load_effective(&cli)?;
            let rendered = match format.as_str() {
                "toml" => toml::to_string_pretty(&cfg).context("rendering TOML")?,
                "json" => serde_json::to_string_pretty(&cfg).context("rendering JSON")?,
                other => anyhow::bail!("unknown format '{}' (available: toml, json)", other),
            };
            println!("{}", rendered);
            return Ok(());
        }
        Some(Command::Get { key }) => {
            let (cfg, _) = load_effective(&cli)?;
            println!("{}", cfg.identd.option(key)?);
            return Ok(());
        }
        Some(Command::Respond { line }) => {
            let (cfg, _) = load_effective(&cli)?;
            let ctx = IdentContext::new(
                Arc::new(SharedConfig::new(cfg.identd)),
                Arc::new(ConnectionRegistry::new()),
                Arc::new(HostSystem),
            );
            print!("{}", ctx.respond(line));
            return Ok(());
        }
        Some(Command::Query {
            addr,
            local,
            remote,
            timeout,
        }) => {
            let ports = PortPair {
                local: *local,
                remote: *remote,
            };
            let rt = tokio::runtime::Runtime::new()?;
            let reply = rt.block_on(identd::ident::client::query(
                addr,
                ports,
                Duration::from_secs(*timeout),
            ))?;
            println!("{}", reply);
            return Ok(());
        }
        Some(Command::Run) | None => {}
    }

    let (app_config, config_path) = load_effective(&cli)?;

    // Setup logging (CLI override > config)
    let log_level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| app_config.logging.level.to_string());
    identd::logging::setup_logging(&log_level, app_config.logging.format);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        listen = %app_config.identd.listen,
        port = app_config.identd.port,
        "Starting identd"
    );

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        if let Err(e) = identd::daemon::run(app_config, config_path).await {
            error!(error = %e, "Server error");
            std::process::exit(1);
        }
    });

    Ok(())
}

/// Config file (when present), then env overrides, then validation.
fn load_effective(cli: &Cli) -> Result<(AppConfig, Option<PathBuf>)> {
    let (mut cfg, path) = if cli.config.exists() {
        (config::load_config(&cli.config)?, Some(cli.config.clone()))
    } else {
        eprintln!(
            "No config file at {}, using defaults",
            cli.config.display()
        );
        (AppConfig::default(), None)
    };
    config::env::apply_env_overrides(&mut cfg);
    config::parse_config_validate(&cfg)?;
    Ok((cfg, path))
}
