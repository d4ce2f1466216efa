//! Native network thread lifecycle
//!
//! The native client runs its event loop on one dedicated thread per process.
//! Booting selects the API version, applies network options, sets the network
//! up and spawns the thread; stopping asks the loop to exit and joins it.
//! "Already done" statuses (API version already selected, network already set
//! up, network already stopped) are not failures.

use std::sync::Arc;
use std::thread;
use std::thread::JoinHandle;

use parking_lot::Mutex;
use tracing::debug;
use tracing::error;
use tracing::info;

use crate::constants::ERROR_API_VERSION_ALREADY_SET;
use crate::constants::ERROR_NETWORK_ALREADY_SETUP;
use crate::constants::ERROR_NETWORK_STOPPED;
use crate::constants::HEADER_API_VERSION;
use crate::encode_option;
use crate::errors::check;
use crate::Error;
use crate::FdbErrorCode;
use crate::NativeApi;
use crate::NetworkConfig;
use crate::OptionRegistry;
use crate::OptionScope;
use crate::OptionValue;
use crate::Result;

pub struct NetworkThread {
    api: Arc<dyn NativeApi>,
    options: Arc<dyn OptionRegistry>,
    /// `None` once stopped, or if another owner already runs the network.
    join: Mutex<Option<JoinHandle<FdbErrorCode>>>,
}

impl NetworkThread {
    pub fn boot(
        api: Arc<dyn NativeApi>,
        config: &NetworkConfig,
        options: Arc<dyn OptionRegistry>,
    ) -> Result<Self> {
        match api.select_api_version(config.api_version, HEADER_API_VERSION) {
            ERROR_API_VERSION_ALREADY_SET => debug!("api version already selected"),
            code => check(api.as_ref(), code)?,
        }

        let network = NetworkThread {
            api: api.clone(),
            options,
            join: Mutex::new(None),
        };

        for (name, configured) in &config.options {
            if let Some(value) = configured.to_option_value() {
                network.set_option(name, value)?;
            }
        }

        match api.setup_network() {
            ERROR_NETWORK_ALREADY_SETUP => {
                info!("network already set up by another owner; not starting a thread");
                return Ok(network);
            }
            code => check(api.as_ref(), code)?,
        }

        let runner = api.clone();
        let join = thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || match runner.run_network() {
                ERROR_NETWORK_STOPPED => 0,
                code => code,
            })
            .map_err(|e| Error::NetworkThread(e.to_string()))?;
        *network.join.lock() = Some(join);

        info!(
            api_version = config.api_version,
            thread = %config.thread_name,
            "network thread started"
        );
        Ok(network)
    }

    /// Sets a network-scoped option.
    pub fn set_option(
        &self,
        name: &str,
        value: impl Into<OptionValue>,
    ) -> Result<()> {
        let encoded = encode_option(self.options.as_ref(), OptionScope::Network, name, &value.into())?;
        // SAFETY: the buffer outlives the call and its length is exact.
        let code = unsafe {
            self.api
                .network_set_option(encoded.id, encoded.as_ptr(), encoded.len()?)
        };
        check(self.api.as_ref(), code)?;
        debug!(option = name, "network option set");
        Ok(())
    }

    /// True while this instance owns a running network thread.
    pub fn is_running(&self) -> bool {
        self.join.lock().is_some()
    }

    /// Stops the native network and joins the thread. Idempotent.
    pub fn stop(&self) -> Result<()> {
        let mut guard = self.join.lock();
        let Some(join) = guard.take() else {
            return Ok(());
        };

        match self.api.stop_network() {
            ERROR_NETWORK_STOPPED => {}
            code => {
                if let Err(e) = check(self.api.as_ref(), code) {
                    *guard = Some(join);
                    return Err(e);
                }
            }
        }
        drop(guard);

        let status = join
            .join()
            .map_err(|_| Error::NetworkThread("network thread panicked".to_string()))?;
        check(self.api.as_ref(), status)?;
        info!("network thread stopped");
        Ok(())
    }
}

impl Drop for NetworkThread {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            error!("failed to stop network thread: {:?}", e);
        }
    }
}
