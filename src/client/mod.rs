//! Process-level entry point
//!
//! [`FdbClient`] owns the pieces every handle depends on: the native symbol
//! table, the completion multiplexer and the network thread.
//!
//! # Basic Usage
//! ```ignore
//! use std::sync::Arc;
//! use fdb_bridge::{FdbClient, LibFdbC};
//!
//! #[tokio::main]
//! async fn main() -> fdb_bridge::Result<()> {
//!     let client = FdbClient::builder(Arc::new(LibFdbC))
//!         .cluster_file("/etc/foundationdb/fdb.cluster")
//!         .start()?;
//!
//!     let db = client.database()?;
//!     let tr = db.create_transaction()?;
//!     tr.set(b"foo", b"bar")?;
//!     tr.commit().await?;
//!
//!     drop((tr, db));
//!     client.shutdown().await
//! }
//! ```

mod builder;

pub use builder::*;


use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::gather_text;
use crate::BridgeConfig;
use crate::BridgeContext;
use crate::Database;
use crate::Error;
use crate::Multiplexer;
use crate::NativeApi;
use crate::NetworkThread;
use crate::Result;
use crate::REGISTRY;

pub struct FdbClient {
    config: BridgeConfig,
    ctx: BridgeContext,
    network: Arc<NetworkThread>,
}

impl FdbClient {
    /// Create a builder over the given native library
    pub fn builder(api: Arc<dyn NativeApi>) -> FdbClientBuilder {
        FdbClientBuilder::new(api)
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn context(&self) -> &BridgeContext {
        &self.ctx
    }

    pub fn multiplexer(&self) -> &Arc<Multiplexer> {
        &self.ctx.mux
    }

    pub fn network(&self) -> &NetworkThread {
        &self.network
    }

    /// Outstanding native futures.
    pub fn keep_alive_count(&self) -> usize {
        self.ctx.mux.keep_alive_count()
    }

    /// Text exposition of the process metrics registry.
    pub fn metrics_text(&self) -> String {
        gather_text(&REGISTRY)
    }

    /// Opens a database and applies the configured database options.
    pub fn open_database(
        &self,
        cluster_file: Option<&Path>,
    ) -> Result<Database> {
        let db = Database::create(self.ctx.clone(), cluster_file)?;
        for (name, configured) in &self.config.database.options {
            if let Some(value) = configured.to_option_value() {
                db.set_option(name, value)?;
            }
        }
        Ok(db)
    }

    /// Opens the database named by the configured cluster file.
    pub fn database(&self) -> Result<Database> {
        self.open_database(self.config.database.cluster_file.as_deref())
    }

    /// Refuses new operations, waits for outstanding ones to be disposed,
    /// then stops the network thread.
    pub async fn shutdown(&self) -> Result<()> {
        self.ctx.mux.shutdown();
        self.ctx.mux.wait_idle().await;

        let network = self.network.clone();
        tokio::task::spawn_blocking(move || network.stop())
            .await
            .map_err(|e| Error::NetworkThread(e.to_string()))??;
        info!("client shut down");
        Ok(())
    }
}
