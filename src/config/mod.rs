pub mod env;
pub mod keys;
pub mod types;

use anyhow::{Context, Result};
use std::net::IpAddr;
use std::path::Path;
use types::{AppConfig, IdentdConfig};

/// Maximum config file size (1 MB)
const MAX_CONFIG_SIZE: u64 = 1_048_576;

/// Custom names and systems must be shorter than this (RFC 1413 token limit).
pub const MAX_TOKEN_LEN: usize = 513;

/// Accepted range for `identd.max_request_len`.
const REQUEST_LEN_RANGE: std::ops::RangeInclusive<usize> = 16..=8192;

/// Load and validate configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let metadata = std::fs::metadata(path)
        .with_context(|| format!("reading config metadata: {}", path.display()))?;
    if metadata.len() > MAX_CONFIG_SIZE {
        anyhow::bail!(
            "config file too large: {} bytes (max {} bytes)",
            metadata.len(),
            MAX_CONFIG_SIZE
        );
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading config: {}", path.display()))?;
    parse_config(&content)
}

/// Parse configuration from a TOML string
pub fn parse_config(content: &str) -> Result<AppConfig> {
    let config: AppConfig = toml::from_str(content).context("parsing TOML configuration")?;
    validate_config(&config)?;
    Ok(config)
}

/// Validate an already-constructed AppConfig (e.g. after env overrides).
pub fn parse_config_validate(config: &AppConfig) -> Result<()> {
    validate_config(config)
}

fn validate_config(config: &AppConfig) -> Result<()> {
    validate_identd(&config.identd)
}

fn validate_identd(identd: &IdentdConfig) -> Result<()> {
    if identd.port == 0 {
        anyhow::bail!("identd.port must be between 1 and 65535");
    }
    identd
        .listen
        .parse::<IpAddr>()
        .with_context(|| format!("identd.listen is not an IP address: '{}'", identd.listen))?;
    if identd.custom_name.len() >= MAX_TOKEN_LEN {
        anyhow::bail!(
            "identd.custom_name too long: {} characters (max {})",
            identd.custom_name.len(),
            MAX_TOKEN_LEN - 1
        );
    }
    if identd.custom_system.len() >= MAX_TOKEN_LEN {
        anyhow::bail!(
            "identd.custom_system too long: {} characters (max {})",
            identd.custom_system.len(),
            MAX_TOKEN_LEN - 1
        );
    }
    if !REQUEST_LEN_RANGE.contains(&identd.max_request_len) {
        anyhow::bail!(
            "identd.max_request_len must be within {}..={} (got {})",
            REQUEST_LEN_RANGE.start(),
            REQUEST_LEN_RANGE.end(),
            identd.max_request_len
        );
    }

    if identd.use_custom_name && identd.custom_name.is_empty() {
        tracing::warn!("identd.use_custom_name is set but identd.custom_name is empty, ignoring");
    }
    if identd.use_custom_system && identd.custom_system.is_empty() {
        tracing::warn!(
            "identd.use_custom_system is set but identd.custom_system is empty, ignoring"
        );
    }
    if identd.hidden_user && identd.no_user {
        tracing::warn!("identd.hidden_user and identd.no_user are both set, HIDDEN-USER wins");
    }
    Ok(())
}
