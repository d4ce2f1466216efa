//! Bridge configuration
//!
//! Loaded hierarchically, later sources overriding earlier ones:
//! - Default values from code
//! - Configuration file named by `FDB_CONFIG_PATH`
//! - Environment variables with the `FDB__` prefix, e.g.
//!   `FDB__NETWORK__API_VERSION=710` or `FDB__DATABASE__OPTIONS__MAX_WATCHES=20000`

mod database;
mod network;
mod option;

pub use database::*;
pub use network::*;
pub use option::*;


use std::env;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::CONFIG_ENV_PREFIX;
use crate::constants::CONFIG_PATH_ENV;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct BridgeConfig {
    /// Native network thread and process-wide options
    #[serde(default)]
    pub network: NetworkConfig,
    /// Database connection and database-scoped options
    #[serde(default)]
    pub database: DatabaseConfig,
}

impl BridgeConfig {
    /// Loads defaults, then the `FDB_CONFIG_PATH` file if set, then `FDB__*`
    /// environment variables.
    ///
    /// Does not validate; call [`BridgeConfig::validate`] once every override
    /// is applied.
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var(CONFIG_PATH_ENV) {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(env_source());

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Layers the file at `path`, then the environment, over this config.
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(env_source())
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    pub fn validate(self) -> Result<Self> {
        self.network.validate()?;
        self.database.validate()?;
        Ok(self)
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(CONFIG_ENV_PREFIX)
        .separator("__")
        .ignore_empty(true)
        .try_parsing(true)
}
