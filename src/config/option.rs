use std::collections::BTreeMap;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::OptionValue;
use crate::Result;

/// An option value as written in a config file or environment variable
///
/// `true` sets a flag option, `false` leaves it unset.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum ConfiguredOption {
    Flag(bool),
    Int(i64),
    Text(String),
}

impl ConfiguredOption {
    /// The value to apply; `None` for a disabled flag.
    pub fn to_option_value(&self) -> Option<OptionValue> {
        match self {
            ConfiguredOption::Flag(true) => Some(OptionValue::Flag),
            ConfiguredOption::Flag(false) => None,
            ConfiguredOption::Int(v) => Some(OptionValue::Int(*v)),
            ConfiguredOption::Text(s) => Some(OptionValue::Text(s.clone())),
        }
    }
}

impl From<bool> for ConfiguredOption {
    fn from(v: bool) -> Self {
        ConfiguredOption::Flag(v)
    }
}

impl From<i64> for ConfiguredOption {
    fn from(v: i64) -> Self {
        ConfiguredOption::Int(v)
    }
}

impl From<&str> for ConfiguredOption {
    fn from(v: &str) -> Self {
        ConfiguredOption::Text(v.to_string())
    }
}

impl From<String> for ConfiguredOption {
    fn from(v: String) -> Self {
        ConfiguredOption::Text(v)
    }
}

/// Rejects blank option names in one config section.
pub(super) fn validate_option_names(
    section: &str,
    options: &BTreeMap<String, ConfiguredOption>,
) -> Result<()> {
    if options.keys().any(|name| name.trim().is_empty()) {
        return Err(Error::Config(ConfigError::Message(format!(
            "{section}.options contains an empty option name"
        ))));
    }
    Ok(())
}
