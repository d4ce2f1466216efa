use std::collections::BTreeMap;
use std::path::PathBuf;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use super::option::validate_option_names;
use super::ConfiguredOption;
use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct DatabaseConfig {
    /// Cluster file handed to the native library; its default lookup when unset
    #[serde(default)]
    pub cluster_file: Option<PathBuf>,

    /// Database options applied whenever a database is opened
    #[serde(default)]
    pub options: BTreeMap<String, ConfiguredOption>,
}

impl DatabaseConfig {
    pub fn validate(&self) -> Result<()> {
        if let Some(path) = &self.cluster_file {
            if path.as_os_str().is_empty() {
                return Err(Error::Config(ConfigError::Message(
                    "cluster_file must not be empty when set".to_string(),
                )));
            }
            if path.as_os_str().as_encoded_bytes().contains(&0) {
                return Err(Error::Config(ConfigError::Message(
                    "cluster_file must not contain a NUL byte".to_string(),
                )));
            }
        }
        validate_option_names("database", &self.options)
    }
}
