//! Future adapter
//!
//! Wraps one native future handle:
//!
//! ```text
//! Pending --wake--> Ready(value | error)
//!    |                    |
//!    +------dispose-------+--> Disposed
//! ```
//!
//! The payload is copied out of native memory the moment the future becomes
//! ready and `future_release_memory` is called right after, so nothing the
//! caller holds ever aliases memory owned by the handle. `dispose` destroys
//! the handle exactly once; `Drop` disposes as a backstop.

use std::fmt;
use std::ptr;
use std::slice;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::debug;
use tracing::trace;

use super::report_anomaly;
use super::BridgeContext;
use super::Multiplexer;
use super::RegistrationToken;
use super::Waiter;
use crate::errors::check;
use crate::errors::native_failure;
use crate::Error;
use crate::FDBFuture;
use crate::FDBKeyValue;
use crate::FdbBool;
use crate::KeyValue;
use crate::NativeApi;
use crate::NativeError;
use crate::NativeHandle;
use crate::ProtocolAnomaly;
use crate::RangeResult;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FuturePhase {
    Pending,
    Ready,
    Disposed,
}

impl fmt::Display for FuturePhase {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            FuturePhase::Pending => write!(f, "pending"),
            FuturePhase::Ready => write!(f, "ready"),
            FuturePhase::Disposed => write!(f, "disposed"),
        }
    }
}

/// Which native accessor extracts the result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FutureKind {
    /// No payload (commit, watch, on_error)
    Unit,
    /// `future_get_value`
    Value,
    /// `future_get_int64`
    Int64,
    /// `future_get_key`
    Key,
    /// `future_get_keyvalue_array`
    KeyValues,
}

/// Bridge-owned copy of a ready future's payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FutureOutput {
    Unit,
    Value(Option<Bytes>),
    Int64(i64),
    Key(Bytes),
    KeyValues(RangeResult),
}

impl FutureOutput {
    pub fn kind_name(&self) -> &'static str {
        match self {
            FutureOutput::Unit => "unit",
            FutureOutput::Value(_) => "value",
            FutureOutput::Int64(_) => "int64",
            FutureOutput::Key(_) => "key",
            FutureOutput::KeyValues(_) => "keyvalues",
        }
    }

    fn mismatch(
        self,
        expected: &'static str,
    ) -> Error {
        Error::OutputKind {
            expected,
            actual: self.kind_name(),
        }
    }

    pub fn into_unit(self) -> Result<()> {
        match self {
            FutureOutput::Unit => Ok(()),
            other => Err(other.mismatch("unit")),
        }
    }

    pub fn into_value(self) -> Result<Option<Bytes>> {
        match self {
            FutureOutput::Value(v) => Ok(v),
            other => Err(other.mismatch("value")),
        }
    }

    pub fn into_int64(self) -> Result<i64> {
        match self {
            FutureOutput::Int64(v) => Ok(v),
            other => Err(other.mismatch("int64")),
        }
    }

    pub fn into_key(self) -> Result<Bytes> {
        match self {
            FutureOutput::Key(k) => Ok(k),
            other => Err(other.mismatch("key")),
        }
    }

    pub fn into_key_values(self) -> Result<RangeResult> {
        match self {
            FutureOutput::KeyValues(r) => Ok(r),
            other => Err(other.mismatch("keyvalues")),
        }
    }
}

type Outcome = std::result::Result<FutureOutput, NativeError>;

struct AdapterState {
    phase: FuturePhase,
    outcome: Option<Outcome>,
    token: Option<RegistrationToken>,
}

struct FutureCore {
    api: Arc<dyn NativeApi>,
    mux: Arc<Multiplexer>,
    handle: NativeHandle,
    kind: FutureKind,
    state: Mutex<AdapterState>,
    phase: watch::Sender<FuturePhase>,
}

impl FutureCore {
    fn raw(&self) -> *mut FDBFuture {
        self.handle.as_ptr()
    }

    /// Copies the payload out of a ready, not yet released future.
    ///
    /// # Safety
    /// The future must be live and ready.
    unsafe fn extract(&self) -> Outcome {
        let api = self.api.as_ref();
        let fut = self.raw();

        let code = api.future_get_error(fut);
        if code != 0 {
            return Err(native_failure(api, code));
        }

        let output = match self.kind {
            FutureKind::Unit => FutureOutput::Unit,
            FutureKind::Int64 => {
                let mut out = 0i64;
                native_status(api, api.future_get_int64(fut, &mut out))?;
                FutureOutput::Int64(out)
            }
            FutureKind::Key => {
                let mut key: *const u8 = ptr::null();
                let mut len = 0i32;
                native_status(api, api.future_get_key(fut, &mut key, &mut len))?;
                FutureOutput::Key(copy_bytes(key, len))
            }
            FutureKind::Value => {
                let mut present: FdbBool = 0;
                let mut value: *const u8 = ptr::null();
                let mut len = 0i32;
                native_status(api, api.future_get_value(fut, &mut present, &mut value, &mut len))?;
                FutureOutput::Value((present != 0).then(|| copy_bytes(value, len)))
            }
            FutureKind::KeyValues => {
                let mut kvs: *const FDBKeyValue = ptr::null();
                let mut count = 0i32;
                let mut more: FdbBool = 0;
                native_status(api, api.future_get_keyvalue_array(fut, &mut kvs, &mut count, &mut more))?;

                let count = usize::try_from(count).unwrap_or(0);
                let mut out = Vec::with_capacity(count);
                for i in 0..count {
                    let kv = ptr::read_unaligned(kvs.add(i));
                    out.push(KeyValue {
                        key: copy_bytes(kv.key, kv.key_length),
                        value: copy_bytes(kv.value, kv.value_length),
                    });
                }
                FutureOutput::KeyValues(RangeResult {
                    kvs: out,
                    more: more != 0,
                })
            }
        };
        Ok(output)
    }

    fn dispose(
        &self,
        explicit: bool,
    ) {
        let mut state = self.state.lock();
        if state.phase == FuturePhase::Disposed {
            if explicit {
                report_anomaly(ProtocolAnomaly::DoubleDispose, self.handle);
            }
            return;
        }

        // SAFETY: the phase was not Disposed, so the handle has not been destroyed.
        unsafe { self.api.future_destroy(self.raw()) };
        if let Some(token) = state.token.take() {
            self.mux.unregister(&token);
        }
        state.phase = FuturePhase::Disposed;
        state.outcome = None;
        drop(state);

        self.phase.send_replace(FuturePhase::Disposed);
        trace!(handle = %self.handle, "future disposed");
    }
}

impl Waiter for FutureCore {
    fn on_wake(
        &self,
        handle: NativeHandle,
    ) -> bool {
        let mut state = self.state.lock();
        if state.phase != FuturePhase::Pending {
            return true;
        }

        // SAFETY: Pending means the handle is live; the lock keeps dispose out.
        if unsafe { self.api.future_is_ready(self.raw()) } == 0 {
            return false;
        }

        // SAFETY: live and ready; memory is released only after the copy.
        let outcome = unsafe {
            let outcome = self.extract();
            self.api.future_release_memory(self.raw());
            outcome
        };

        state.phase = FuturePhase::Ready;
        state.outcome = Some(outcome);
        drop(state);

        self.phase.send_replace(FuturePhase::Ready);
        trace!(%handle, "future ready");
        true
    }
}

fn native_status(
    api: &dyn NativeApi,
    code: i32,
) -> std::result::Result<(), NativeError> {
    if code == 0 {
        Ok(())
    } else {
        Err(native_failure(api, code))
    }
}

/// # Safety
/// `data` must be valid for `len` bytes unless null.
unsafe fn copy_bytes(
    data: *const u8,
    len: i32,
) -> Bytes {
    match usize::try_from(len) {
        Ok(len) if len > 0 && !data.is_null() => Bytes::copy_from_slice(slice::from_raw_parts(data, len)),
        _ => Bytes::new(),
    }
}

/// Awaitable wrapper around one native future
pub struct FutureAdapter {
    core: Arc<FutureCore>,
}

impl FutureAdapter {
    /// Takes ownership of `raw` and registers it for completion.
    ///
    /// On any failure the native future is destroyed before returning.
    ///
    /// # Safety
    /// `raw` must be null or a future just returned by `ctx.api` that nothing
    /// else owns.
    pub unsafe fn from_raw(
        ctx: &BridgeContext,
        raw: *mut FDBFuture,
        kind: FutureKind,
        call: &'static str,
    ) -> Result<Self> {
        let handle = NativeHandle::from_ptr(raw).ok_or(Error::NullHandle(call))?;

        let (phase, _) = watch::channel(FuturePhase::Pending);
        let core = Arc::new(FutureCore {
            api: ctx.api.clone(),
            mux: ctx.mux.clone(),
            handle,
            kind,
            state: Mutex::new(AdapterState {
                phase: FuturePhase::Pending,
                outcome: None,
                token: None,
            }),
            phase,
        });

        let token = match ctx.mux.register(handle, core.clone()) {
            Ok(token) => token,
            Err(e) => {
                ctx.api.future_destroy(raw);
                return Err(e);
            }
        };
        core.state.lock().token = Some(token.clone());

        // From here on Drop owns cleanup.
        let adapter = FutureAdapter { core };
        let code = ctx
            .api
            .future_set_callback(raw, token.callback(), token.callback_param());
        check(ctx.api.as_ref(), code)?;

        debug!(%handle, ?kind, call, "future created");
        Ok(adapter)
    }

    pub fn handle(&self) -> NativeHandle {
        self.core.handle
    }

    pub fn kind(&self) -> FutureKind {
        self.core.kind
    }

    pub fn phase(&self) -> FuturePhase {
        self.core.state.lock().phase
    }

    /// Waits until the future is ready.
    ///
    /// Fails with [`Error::Cancelled`] if it is disposed first; the result
    /// then means "abandoned", never success.
    pub async fn await_ready(&self) -> Result<()> {
        let mut rx = self.core.phase.subscribe();
        let phase = match rx.wait_for(|p| *p != FuturePhase::Pending).await {
            Ok(phase) => *phase,
            Err(_) => FuturePhase::Disposed,
        };
        match phase {
            FuturePhase::Ready => Ok(()),
            _ => Err(Error::Cancelled),
        }
    }

    /// The ready payload, or the native error the future completed with.
    pub fn value(&self) -> Result<FutureOutput> {
        let state = self.core.state.lock();
        match (&state.phase, &state.outcome) {
            (FuturePhase::Ready, Some(Ok(output))) => Ok(output.clone()),
            (FuturePhase::Ready, Some(Err(e))) => Err(Error::Native(e.clone())),
            (phase, _) => Err(Error::UseAfterDispose(*phase)),
        }
    }

    /// The error the future completed with, `None` if it succeeded.
    pub fn error(&self) -> Result<Option<NativeError>> {
        let state = self.core.state.lock();
        match (&state.phase, &state.outcome) {
            (FuturePhase::Ready, Some(outcome)) => Ok(outcome.as_ref().err().cloned()),
            (phase, _) => Err(Error::UseAfterDispose(*phase)),
        }
    }

    /// Awaits readiness and returns the outcome.
    ///
    /// A dispose that lands between readiness and the read is reported as
    /// [`Error::Cancelled`], the same as one that lands before readiness.
    pub async fn ready_value(&self) -> Result<FutureOutput> {
        self.await_ready().await?;
        match self.value() {
            Err(Error::UseAfterDispose(FuturePhase::Disposed)) => Err(Error::Cancelled),
            other => other,
        }
    }

    /// Cancels the native operation. Waiters see the native cancellation error.
    pub fn cancel(&self) {
        let state = self.core.state.lock();
        if state.phase == FuturePhase::Pending {
            // SAFETY: Pending means the handle is live.
            unsafe { self.core.api.future_cancel(self.core.raw()) };
        }
    }

    /// Destroys the native handle. Idempotent.
    pub fn dispose(&self) {
        self.core.dispose(true);
    }

    /// Awaits readiness, takes the payload and disposes.
    pub async fn resolve(self) -> Result<FutureOutput> {
        self.await_ready().await?;
        let outcome = {
            let mut state = self.core.state.lock();
            match state.outcome.take() {
                Some(outcome) => outcome,
                None if state.phase == FuturePhase::Disposed => return Err(Error::Cancelled),
                None => return Err(Error::UseAfterDispose(state.phase)),
            }
        };
        self.dispose();
        Ok(outcome?)
    }
}

impl fmt::Debug for FutureAdapter {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("FutureAdapter")
            .field("handle", &self.core.handle)
            .field("kind", &self.core.kind)
            .field("phase", &self.phase())
            .finish()
    }
}

impl Drop for FutureAdapter {
    fn drop(&mut self) {
        self.core.dispose(false);
    }
}
