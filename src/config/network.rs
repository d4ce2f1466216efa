use std::collections::BTreeMap;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use super::option::validate_option_names;
use super::ConfiguredOption;
use crate::constants::DEFAULT_NETWORK_THREAD_NAME;
use crate::constants::HEADER_API_VERSION;
use crate::constants::MIN_API_VERSION;
use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct NetworkConfig {
    /// Runtime API version passed to `select_api_version`
    #[serde(default = "default_api_version")]
    pub api_version: i32,

    /// Name of the OS thread running the native event loop
    #[serde(default = "default_thread_name")]
    pub thread_name: String,

    /// Network options applied before the network is set up
    #[serde(default)]
    pub options: BTreeMap<String, ConfiguredOption>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            api_version: default_api_version(),
            thread_name: default_thread_name(),
            options: BTreeMap::new(),
        }
    }
}

impl NetworkConfig {
    pub fn validate(&self) -> Result<()> {
        if !(MIN_API_VERSION..=HEADER_API_VERSION).contains(&self.api_version) {
            return Err(Error::Config(ConfigError::Message(format!(
                "api_version {} outside supported range {}..={}",
                self.api_version, MIN_API_VERSION, HEADER_API_VERSION
            ))));
        }

        if self.thread_name.trim().is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "network thread_name must not be empty".to_string(),
            )));
        }

        validate_option_names("network", &self.options)
    }
}

fn default_api_version() -> i32 {
    HEADER_API_VERSION
}
fn default_thread_name() -> String {
    DEFAULT_NETWORK_THREAD_NAME.to_string()
}
