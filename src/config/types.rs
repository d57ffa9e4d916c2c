use serde::{Deserialize, Serialize};
use std::fmt;

/// Log level enum (replaces stringly-typed field)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// Log format enum (replaces stringly-typed field)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Pretty => write!(f, "pretty"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub identd: IdentdConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Identd settings. Flags further down the list take priority when a
/// reply is built (custom name over nickname over username).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct IdentdConfig {
    /// Address the listener binds to.
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Keep the port open even without pending connection attempts.
    #[serde(default)]
    pub always_on: bool,
    /// Report the connection's configured username.
    #[serde(default)]
    pub use_username: bool,
    /// Report the connection's current nickname.
    #[serde(default)]
    pub use_nickname: bool,
    #[serde(default)]
    pub use_custom_name: bool,
    #[serde(default)]
    pub custom_name: String,
    #[serde(default)]
    pub use_custom_system: bool,
    #[serde(default)]
    pub custom_system: String,
    /// Answer every matched query with HIDDEN-USER.
    #[serde(default)]
    pub hidden_user: bool,
    /// Answer every matched query with NO-USER.
    #[serde(default)]
    pub no_user: bool,
    /// Seconds a client gets to send its request line (0 = no limit).
    #[serde(default)]
    pub request_timeout_secs: u64,
    /// Longest request line accepted, in bytes.
    #[serde(default = "default_max_request_len")]
    pub max_request_len: usize,
}

impl Default for IdentdConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            port: default_port(),
            always_on: false,
            use_username: false,
            use_nickname: false,
            use_custom_name: false,
            custom_name: String::new(),
            use_custom_system: false,
            custom_system: String::new(),
            hidden_user: false,
            no_user: false,
            request_timeout_secs: 0,
            max_request_len: default_max_request_len(),
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    113
}

fn default_max_request_len() -> usize {
    1000
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: LogLevel,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}
