//! Typed lookup of identd settings by their dotted preference keys.
//!
//! The host application stores plugin settings under keys such as
//! `general.useNickname` or `advanced.port`; this module maps those keys
//! onto [`IdentdConfig`] fields.

use crate::config::types::IdentdConfig;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("unknown setting: {0}")]
    Unknown(String),
    #[error("setting {key} is not a {expected}")]
    WrongType { key: String, expected: &'static str },
    #[error("setting {key} is not a valid port: {value}")]
    InvalidPort { key: String, value: u16 },
}

/// Every key understood by [`IdentdConfig::option_bool`],
/// [`IdentdConfig::option_port`] and [`IdentdConfig::option_str`].
pub const KEYS: &[&str] = &[
    "general.useUsername",
    "general.useNickname",
    "general.useCustomName",
    "general.customName",
    "advanced.alwaysOn",
    "advanced.port",
    "advanced.useCustomSystem",
    "advanced.customSystem",
    "advanced.isHiddenUser",
    "advanced.isNoUser",
];

/// A setting value as returned by [`IdentdConfig::option`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue<'a> {
    Bool(bool),
    Port(u16),
    Text(&'a str),
}

impl std::fmt::Display for OptionValue<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptionValue::Bool(b) => write!(f, "{}", b),
            OptionValue::Port(p) => write!(f, "{}", p),
            OptionValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl IdentdConfig {
    /// Look up any setting by key.
    pub fn option(&self, key: &str) -> Result<OptionValue<'_>, KeyError> {
        let value = match key {
            "general.useUsername" => OptionValue::Bool(self.use_username),
            "general.useNickname" => OptionValue::Bool(self.use_nickname),
            "general.useCustomName" => OptionValue::Bool(self.use_custom_name),
            "general.customName" => OptionValue::Text(&self.custom_name),
            "advanced.alwaysOn" => OptionValue::Bool(self.always_on),
            "advanced.port" => OptionValue::Port(self.port),
            "advanced.useCustomSystem" => OptionValue::Bool(self.use_custom_system),
            "advanced.customSystem" => OptionValue::Text(&self.custom_system),
            "advanced.isHiddenUser" => OptionValue::Bool(self.hidden_user),
            "advanced.isNoUser" => OptionValue::Bool(self.no_user),
            _ => return Err(KeyError::Unknown(key.to_string())),
        };
        Ok(value)
    }

    pub fn option_bool(&self, key: &str) -> Result<bool, KeyError> {
        match self.option(key)? {
            OptionValue::Bool(b) => Ok(b),
            _ => Err(KeyError::WrongType {
                key: key.to_string(),
                expected: "boolean",
            }),
        }
    }

    /// Port-valued setting, validated to 1-65535.
    pub fn option_port(&self, key: &str) -> Result<u16, KeyError> {
        match self.option(key)? {
            OptionValue::Port(0) => Err(KeyError::InvalidPort {
                key: key.to_string(),
                value: 0,
            }),
            OptionValue::Port(p) => Ok(p),
            _ => Err(KeyError::WrongType {
                key: key.to_string(),
                expected: "port",
            }),
        }
    }

    pub fn option_str(&self, key: &str) -> Result<&str, KeyError> {
        match self.option(key)? {
            OptionValue::Text(s) => Ok(s),
            _ => Err(KeyError::WrongType {
                key: key.to_string(),
                expected: "string",
            }),
        }
    }
}
