use std::path::PathBuf;
use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::debug;

use super::FdbClient;
use crate::BridgeConfig;
use crate::BridgeContext;
use crate::BuiltinOptions;
use crate::ConfiguredOption;
use crate::Error;
use crate::Multiplexer;
use crate::NativeApi;
use crate::NetworkThread;
use crate::OptionRegistry;
use crate::Result;

pub struct FdbClientBuilder {
    api: Arc<dyn NativeApi>,
    config: BridgeConfig,
    options: Arc<dyn OptionRegistry>,
}

impl FdbClientBuilder {
    /// Create a new builder with default config and the builtin option tables
    pub fn new(api: Arc<dyn NativeApi>) -> Self {
        Self {
            api,
            config: BridgeConfig::default(),
            options: Arc::new(BuiltinOptions),
        }
    }

    /// Completely replaces the configuration
    ///
    /// Discards settings made earlier through the granular methods such as
    /// [`api_version`](FdbClientBuilder::api_version).
    pub fn config(
        mut self,
        config: BridgeConfig,
    ) -> Self {
        self.config = config;
        self
    }

    /// Set the runtime API version (default: 710)
    pub fn api_version(
        mut self,
        version: i32,
    ) -> Self {
        self.config.network.api_version = version;
        self
    }

    /// Set the cluster file used by [`FdbClient::database`]
    pub fn cluster_file(
        mut self,
        path: impl Into<PathBuf>,
    ) -> Self {
        self.config.database.cluster_file = Some(path.into());
        self
    }

    pub fn network_option(
        mut self,
        name: &str,
        value: impl Into<ConfiguredOption>,
    ) -> Self {
        self.config.network.options.insert(name.to_string(), value.into());
        self
    }

    pub fn database_option(
        mut self,
        name: &str,
        value: impl Into<ConfiguredOption>,
    ) -> Self {
        self.config.database.options.insert(name.to_string(), value.into());
        self
    }

    /// Replace the option registry (default: [`BuiltinOptions`])
    pub fn option_registry(
        mut self,
        options: Arc<dyn OptionRegistry>,
    ) -> Self {
        self.options = options;
        self
    }

    /// Validates the config, starts the multiplexer on the current tokio
    /// runtime and boots the network thread.
    pub fn start(self) -> Result<FdbClient> {
        let config = self.config.validate()?;
        Handle::try_current().map_err(|_| Error::NoRuntime)?;

        let mux = Multiplexer::start()?;
        let network = NetworkThread::boot(self.api.clone(), &config.network, self.options.clone())?;
        debug!(?config, "client started");

        Ok(FdbClient {
            config,
            ctx: BridgeContext::new(self.api, mux, self.options),
            network: Arc::new(network),
        })
    }
}
