//! Bridge error hierarchy
//!
//! Synchronous native failures are returned at the call site; failures of
//! future-backed operations surface when the caller awaits the result.
//! Nothing in this crate retries.

use std::ffi::CStr;
use std::fmt;

use config::ConfigError;

use crate::bridge::FuturePhase;
use crate::constants::ERROR_PREDICATE_MAYBE_COMMITTED;
use crate::constants::ERROR_PREDICATE_RETRYABLE;
use crate::constants::ERROR_PREDICATE_RETRYABLE_NOT_COMMITTED;
use crate::constants::ERROR_SUCCESS;
use crate::FdbErrorCode;
use crate::NativeApi;
use crate::NativeHandle;
use crate::OptionKind;
use crate::OptionScope;
use crate::NATIVE_ERRORS;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Nonzero status from a native call
    #[error(transparent)]
    Native(#[from] NativeError),

    /// A native call produced a null handle
    #[error("native call {0} returned a null handle")]
    NullHandle(&'static str),

    /// Accessor used while the future is not ready
    #[error("future accessed while {0}")]
    UseAfterDispose(FuturePhase),

    /// Handle already tracked by the multiplexer
    #[error("handle {0} is already registered")]
    DuplicateHandle(NativeHandle),

    #[error("unknown {scope} option: {name}")]
    InvalidOption { scope: OptionScope, name: String },

    #[error("option {name} expects a {expected} value")]
    OptionType { name: String, expected: OptionKind },

    /// The future was disposed before it became ready
    #[error("operation abandoned before completion")]
    Cancelled,

    /// Operation issued on a transaction whose commit is in flight
    #[error("transaction already committed; reset it before reuse")]
    CommitIssued,

    #[error("completion multiplexer is shut down")]
    MultiplexerClosed,

    #[error("no tokio runtime available")]
    NoRuntime,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Future resolved to a different output shape than the operation expects
    #[error("expected {expected} output, got {actual}")]
    OutputKind {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("network thread: {0}")]
    NetworkThread(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Error {
    /// The native error, if this is one.
    pub fn as_native(&self) -> Option<&NativeError> {
        match self {
            Error::Native(e) => Some(e),
            _ => None,
        }
    }

    /// Native status code, if this is a native error.
    pub fn code(&self) -> Option<FdbErrorCode> {
        self.as_native().map(|e| e.code)
    }
}

/// Structured form of a native status code
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("[{code}] {message}")]
pub struct NativeError {
    pub code: FdbErrorCode,
    pub message: String,
    /// Safe to retry with `on_error`
    pub retryable: bool,
    /// The transaction may have committed despite the error
    pub maybe_committed: bool,
    pub retryable_not_committed: bool,
}

impl NativeError {
    pub fn from_code(
        api: &dyn NativeApi,
        code: FdbErrorCode,
    ) -> Self {
        let ptr = api.get_error(code);
        let message = if ptr.is_null() {
            "unknown error".to_string()
        } else {
            // SAFETY: get_error returns a static NUL terminated string owned by the library.
            unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
        };

        NativeError {
            code,
            message,
            retryable: api.error_predicate(ERROR_PREDICATE_RETRYABLE, code) != 0,
            maybe_committed: api.error_predicate(ERROR_PREDICATE_MAYBE_COMMITTED, code) != 0,
            retryable_not_committed: api.error_predicate(ERROR_PREDICATE_RETRYABLE_NOT_COMMITTED, code) != 0,
        }
    }
}

/// Maps a native status to `Ok(())` or a [`NativeError`].
pub(crate) fn check(
    api: &dyn NativeApi,
    code: FdbErrorCode,
) -> Result<()> {
    if code == ERROR_SUCCESS {
        return Ok(());
    }
    Err(native_failure(api, code).into())
}

/// Builds the [`NativeError`] for a nonzero status and counts it.
pub(crate) fn native_failure(
    api: &dyn NativeApi,
    code: FdbErrorCode,
) -> NativeError {
    NATIVE_ERRORS.with_label_values(&[&code.to_string()]).inc();
    NativeError::from_code(api, code)
}

/// Bridge-internal inconsistencies. Logged and counted, never returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolAnomaly {
    /// Wake for a handle with no pending operation
    UntrackedWake,
    /// Wake for an operation that has already been woken
    DuplicateWake,
    /// Dispose of an already disposed future
    DoubleDispose,
}

impl ProtocolAnomaly {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolAnomaly::UntrackedWake => "untracked_wake",
            ProtocolAnomaly::DuplicateWake => "duplicate_wake",
            ProtocolAnomaly::DoubleDispose => "double_dispose",
        }
    }
}

impl fmt::Display for ProtocolAnomaly {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
