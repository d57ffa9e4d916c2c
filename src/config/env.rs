//! Environment variable configuration support.
//!
//! `IDENTD_CONFIG` selects the config file (handled by the CLI); the
//! variables below override individual values after the file is parsed.

use crate::config::types::*;

/// Apply `IDENTD_*` overrides on top of a parsed config.
pub fn apply_env_overrides(config: &mut AppConfig) {
    if let Some(v) = opt_env("IDENTD_LISTEN") {
        config.identd.listen = v;
    }
    if std::env::var("IDENTD_PORT").is_ok() {
        config.identd.port = parse_env("IDENTD_PORT", config.identd.port);
    }
    if std::env::var("IDENTD_ALWAYS_ON").is_ok() {
        config.identd.always_on = parse_bool_env("IDENTD_ALWAYS_ON", config.identd.always_on);
    }
    if let Some(v) = opt_env("IDENTD_CUSTOM_NAME") {
        config.identd.custom_name = v;
        config.identd.use_custom_name = true;
    }

    if let Some(v) = opt_env("IDENTD_LOG_LEVEL") {
        if let Ok(level) = parse_log_level(&v) {
            config.logging.level = level;
        }
    }
    if let Some(v) = opt_env("IDENTD_LOG_FORMAT") {
        if let Ok(format) = parse_log_format(&v) {
            config.logging.format = format;
        }
    }
}

fn opt_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn parse_env<T: std::str::FromStr + Copy>(key: &str, default: T) -> T {
    opt_env(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn parse_bool_env(key: &str, default: bool) -> bool {
    opt_env(key)
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(default)
}

fn parse_log_level(s: &str) -> anyhow::Result<LogLevel> {
    match s.to_ascii_lowercase().as_str() {
        "trace" => Ok(LogLevel::Trace),
        "debug" => Ok(LogLevel::Debug),
        "info" => Ok(LogLevel::Info),
        "warn" => Ok(LogLevel::Warn),
        "error" => Ok(LogLevel::Error),
        _ => anyhow::bail!("invalid log level: '{s}'"),
    }
}

fn parse_log_format(s: &str) -> anyhow::Result<LogFormat> {
    match s.to_ascii_lowercase().as_str() {
        "pretty" => Ok(LogFormat::Pretty),
        "json" => Ok(LogFormat::Json),
        _ => anyhow::bail!("invalid log format: '{s}'"),
    }
}
