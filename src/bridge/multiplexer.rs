//! Completion multiplexer
//!
//! The native library is given one callback, [`on_native_wake`], for every
//! future. The callback runs on the native network thread and only posts the
//! woken handle onto a queue; a tokio task drains the queue and dispatches each
//! wake to the operation registered for that handle.
//!
//! The callback parameter points at a [`WakeSink`]. The sink is pinned by the
//! multiplexer while it is open and by the keep-alive pin while operations
//! are outstanding, so the pointer stays valid for every future that can still
//! be woken. Once the multiplexer is shut down and the last operation is
//! unregistered the sink is released, the queue closes and the drain task
//! exits.

use std::collections::HashMap;
use std::ffi::c_void;
use std::sync::Arc;
use std::sync::Weak;

#[cfg(test)]
use mockall::automock;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tracing::debug;
use tracing::error;
use tracing::trace;

use super::report_anomaly;
use crate::Error;
use crate::FDBFuture;
use crate::FdbCallback;
use crate::NativeHandle;
use crate::ProtocolAnomaly;
use crate::Result;
use crate::PENDING_OPERATIONS;

/// Receiver of a completion wake
#[cfg_attr(test, automock)]
pub trait Waiter: Send + Sync {
    /// Called once per wake, outside the multiplexer's table lock.
    ///
    /// Returns `false` if the native future turned out not to be ready; the
    /// operation then stays armed for the next wake.
    fn on_wake(
        &self,
        handle: NativeHandle,
    ) -> bool;
}

/// Target of the callback parameter
pub struct WakeSink {
    tx: mpsc::UnboundedSender<NativeHandle>,
}

/// The single native callback.
///
/// # Safety
/// `param` must be the pointer from [`RegistrationToken::callback_param`] and
/// its registration must not have been unregistered.
pub unsafe extern "C" fn on_native_wake(
    future: *mut FDBFuture,
    param: *mut c_void,
) {
    if param.is_null() {
        return;
    }
    let sink = &*(param as *const WakeSink);
    if let Some(handle) = NativeHandle::from_ptr(future) {
        // The drain task only stops once the sink is gone, so a send cannot fail here.
        let _ = sink.tx.send(handle);
    }
}

/// Proof of one registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationToken {
    handle: NativeHandle,
    id: u64,
    param: usize,
}

impl RegistrationToken {
    pub fn handle(&self) -> NativeHandle {
        self.handle
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn callback(&self) -> FdbCallback {
        on_native_wake
    }

    pub fn callback_param(&self) -> *mut c_void {
        self.param as *mut c_void
    }
}

struct PendingOperation {
    id: u64,
    waiter: Arc<dyn Waiter>,
    fired: bool,
}

struct Table {
    pending: HashMap<NativeHandle, PendingOperation>,
    next_id: u64,
    /// Open multiplexer's reference to the sink; taken on shutdown.
    sink: Option<Arc<WakeSink>>,
    /// Held while at least one operation is outstanding.
    pin: Option<Arc<WakeSink>>,
}

pub struct Multiplexer {
    table: Mutex<Table>,
    keep_alive: watch::Sender<usize>,
}

impl Multiplexer {
    /// Creates the multiplexer and spawns its drain task on the current runtime.
    pub fn start() -> Result<Arc<Self>> {
        let runtime = Handle::try_current().map_err(|_| Error::NoRuntime)?;

        let (tx, mut rx) = mpsc::unbounded_channel::<NativeHandle>();
        let (keep_alive, _) = watch::channel(0usize);
        let mux = Arc::new(Multiplexer {
            table: Mutex::new(Table {
                pending: HashMap::new(),
                next_id: 1,
                sink: Some(Arc::new(WakeSink { tx })),
                pin: None,
            }),
            keep_alive,
        });

        let weak: Weak<Multiplexer> = Arc::downgrade(&mux);
        runtime.spawn(async move {
            while let Some(handle) = rx.recv().await {
                match weak.upgrade() {
                    Some(mux) => mux.dispatch(handle),
                    None => break,
                }
            }
            debug!("completion multiplexer drained");
        });

        Ok(mux)
    }

    /// Starts tracking `handle`. The first outstanding registration pins the sink.
    pub fn register(
        &self,
        handle: NativeHandle,
        waiter: Arc<dyn Waiter>,
    ) -> Result<RegistrationToken> {
        let mut table = self.table.lock();
        let Some(sink) = table.sink.clone() else {
            return Err(Error::MultiplexerClosed);
        };
        if table.pending.contains_key(&handle) {
            error!(%handle, "handle registered twice");
            return Err(Error::DuplicateHandle(handle));
        }

        let id = table.next_id;
        table.next_id += 1;
        table.pending.insert(
            handle,
            PendingOperation {
                id,
                waiter,
                fired: false,
            },
        );
        if table.pin.is_none() {
            debug!("keep-alive pinned");
            table.pin = Some(sink.clone());
        }
        let count = table.pending.len();
        self.publish(count);
        drop(table);

        trace!(%handle, id, count, "registered");

        Ok(RegistrationToken {
            handle,
            id,
            param: Arc::as_ptr(&sink) as usize,
        })
    }

    /// Stops tracking the token's operation. No-op if already unregistered.
    pub fn unregister(
        &self,
        token: &RegistrationToken,
    ) {
        let mut table = self.table.lock();
        match table.pending.get(&token.handle) {
            Some(op) if op.id == token.id => {}
            _ => return,
        }
        table.pending.remove(&token.handle);

        let count = table.pending.len();
        if count == 0 && table.pin.take().is_some() {
            debug!("keep-alive released");
        }
        self.publish(count);
        drop(table);

        trace!(handle = %token.handle, id = token.id, count, "unregistered");
    }

    /// Routes one wake to its operation.
    pub fn dispatch(
        &self,
        handle: NativeHandle,
    ) {
        let entry = {
            let mut table = self.table.lock();
            match table.pending.get_mut(&handle) {
                None => Err(ProtocolAnomaly::UntrackedWake),
                Some(op) if op.fired => Err(ProtocolAnomaly::DuplicateWake),
                Some(op) => {
                    op.fired = true;
                    Ok((op.id, op.waiter.clone()))
                }
            }
        };
        let (id, waiter) = match entry {
            Ok(entry) => entry,
            Err(kind) => {
                report_anomaly(kind, handle);
                return;
            }
        };

        trace!(%handle, id, "dispatch");
        if waiter.on_wake(handle) {
            return;
        }

        trace!(%handle, id, "spurious wake, re-arming");
        let mut table = self.table.lock();
        if let Some(op) = table.pending.get_mut(&handle) {
            if op.id == id {
                op.fired = false;
            }
        }
    }

    /// Number of outstanding registrations.
    pub fn keep_alive_count(&self) -> usize {
        *self.keep_alive.borrow()
    }

    pub fn is_pinned(&self) -> bool {
        self.table.lock().pin.is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.table.lock().sink.is_none()
    }

    pub fn is_registered(
        &self,
        handle: NativeHandle,
    ) -> bool {
        self.table.lock().pending.contains_key(&handle)
    }

    /// Refuses new registrations. Outstanding ones keep working until they
    /// are unregistered.
    pub fn shutdown(&self) {
        let sink = self.table.lock().sink.take();
        if sink.is_some() {
            debug!("completion multiplexer closed");
        }
    }

    /// Resolves once no registration is outstanding.
    pub async fn wait_idle(&self) {
        let mut rx = self.keep_alive.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|count| *count == 0).await;
    }

    /// Called with the table lock held so published counts stay ordered.
    fn publish(
        &self,
        count: usize,
    ) {
        PENDING_OPERATIONS.set(count as i64);
        self.keep_alive.send_replace(count);
    }
}
