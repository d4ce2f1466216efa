//! Completion bridging
//!
//! - [`Multiplexer`] - the single native wake callback, routed by handle identity
//! - [`FutureAdapter`] - one native future as an awaitable, explicitly disposed value
//! - [`NetworkThread`] - the process-wide native network thread

mod future_adapter;
mod multiplexer;
mod network;

pub use future_adapter::*;
pub use multiplexer::*;
pub use network::*;


use std::sync::Arc;

use tracing::debug;
use tracing::warn;

use crate::NativeApi;
use crate::NativeHandle;
use crate::OptionRegistry;
use crate::ProtocolAnomaly;
use crate::PROTOCOL_ANOMALIES;

/// Shared services every resource handle needs
#[derive(Clone)]
pub struct BridgeContext {
    pub api: Arc<dyn NativeApi>,
    pub mux: Arc<Multiplexer>,
    pub options: Arc<dyn OptionRegistry>,
}

impl BridgeContext {
    pub fn new(
        api: Arc<dyn NativeApi>,
        mux: Arc<Multiplexer>,
        options: Arc<dyn OptionRegistry>,
    ) -> Self {
        Self { api, mux, options }
    }
}

pub(crate) fn report_anomaly(
    kind: ProtocolAnomaly,
    handle: NativeHandle,
) {
    PROTOCOL_ANOMALIES.with_label_values(&[kind.as_str()]).inc();
    match kind {
        ProtocolAnomaly::UntrackedWake => {
            warn!(%handle, "wake for untracked handle: bridge bug or double free");
        }
        ProtocolAnomaly::DuplicateWake => {
            debug!(%handle, "duplicate wake for an already woken operation");
        }
        ProtocolAnomaly::DoubleDispose => {
            debug!(%handle, "dispose of an already disposed future");
        }
    }
}
