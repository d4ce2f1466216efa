//! Native client boundary
//!
//! Everything the bridge knows about `libfdb_c` lives behind [`NativeApi`]: a
//! symbol table with the fixed C signatures of the functions the bridge calls.
//! The bridge never dereferences a native pointer itself; it only passes them
//! back into the table or uses their numeric identity ([`NativeHandle`]).
//!
//! Implementations:
//! - `LibFdbC` (feature `fdb-c`): the linked system library
//! - `SimNative` (tests): an in-memory fake with its own network thread

#[cfg(feature = "fdb-c")]
mod fdb_c;
pub mod options;

#[cfg(feature = "fdb-c")]
pub use fdb_c::*;
pub use options::*;


use std::ffi::c_char;
use std::ffi::c_void;
use std::fmt;
use std::ptr;

use crate::Error;
use crate::Result;

/// `fdb_error_t`
pub type FdbErrorCode = i32;

/// `fdb_bool_t`
pub type FdbBool = i32;

/// `FDBCallback`: invoked by the native network thread once a future is ready
pub type FdbCallback = unsafe extern "C" fn(future: *mut FDBFuture, param: *mut c_void);

#[repr(C)]
pub struct FDBFuture {
    _private: [u8; 0],
}

#[repr(C)]
pub struct FDBDatabase {
    _private: [u8; 0],
}

#[repr(C)]
pub struct FDBTenant {
    _private: [u8; 0],
}

#[repr(C)]
pub struct FDBTransaction {
    _private: [u8; 0],
}

/// `FDBKeyValue`, declared with `#pragma pack(4)` in `fdb_c.h`
#[repr(C, packed(4))]
#[derive(Clone, Copy)]
pub struct FDBKeyValue {
    pub key: *const u8,
    pub key_length: i32,
    pub value: *const u8,
    pub value_length: i32,
}

/// Numeric identity of a live foreign object
///
/// Only ever compared, hashed, or turned back into a pointer for a native
/// call. Never null.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NativeHandle(usize);

impl NativeHandle {
    pub fn from_ptr<T>(ptr: *mut T) -> Option<Self> {
        if ptr.is_null() {
            None
        } else {
            Some(NativeHandle(ptr as usize))
        }
    }

    #[cfg(test)]
    pub(crate) fn from_addr(addr: usize) -> Option<Self> {
        (addr != 0).then_some(NativeHandle(addr))
    }

    pub fn addr(self) -> usize {
        self.0
    }

    pub(crate) fn as_ptr<T>(self) -> *mut T {
        self.0 as *mut T
    }
}

impl fmt::Display for NativeHandle {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Out-param slot: scratch space a native constructor writes a handle into
pub(crate) struct OutSlot<T> {
    ptr: *mut T,
}

impl<T> OutSlot<T> {
    pub(crate) fn new() -> Self {
        Self {
            ptr: ptr::null_mut(),
        }
    }

    pub(crate) fn as_out(&mut self) -> *mut *mut T {
        &mut self.ptr
    }

    /// Reads the written handle back; `call` names the native call for the error.
    pub(crate) fn into_handle(
        self,
        call: &'static str,
    ) -> Result<NativeHandle> {
        NativeHandle::from_ptr(self.ptr).ok_or(Error::NullHandle(call))
    }
}

/// Converts a buffer length to the native `int` length parameter.
pub(crate) fn ffi_len(bytes: &[u8]) -> Result<i32> {
    i32::try_from(bytes.len())
        .map_err(|_| Error::InvalidArgument(format!("buffer of {} bytes exceeds native limit", bytes.len())))
}

/// Fixed-signature symbol table of the native client library.
///
/// Methods taking raw pointers are `unsafe`: callers guarantee every handle is
/// live (created by this table and not yet destroyed) and every buffer is
/// valid for the given length for the duration of the call.
pub trait NativeApi: Send + Sync + 'static {
    fn select_api_version(
        &self,
        runtime_version: i32,
        header_version: i32,
    ) -> FdbErrorCode;

    /// Returns a static, NUL terminated description of `code`.
    fn get_error(
        &self,
        code: FdbErrorCode,
    ) -> *const c_char;

    fn error_predicate(
        &self,
        predicate_test: i32,
        code: FdbErrorCode,
    ) -> FdbBool;

    unsafe fn network_set_option(
        &self,
        option: i32,
        value: *const u8,
        value_length: i32,
    ) -> FdbErrorCode;

    fn setup_network(&self) -> FdbErrorCode;

    /// Blocks the calling thread until [`NativeApi::stop_network`] is called.
    fn run_network(&self) -> FdbErrorCode;

    fn stop_network(&self) -> FdbErrorCode;

    // -
    // Futures

    unsafe fn future_cancel(
        &self,
        future: *mut FDBFuture,
    );

    unsafe fn future_destroy(
        &self,
        future: *mut FDBFuture,
    );

    unsafe fn future_release_memory(
        &self,
        future: *mut FDBFuture,
    );

    unsafe fn future_is_ready(
        &self,
        future: *mut FDBFuture,
    ) -> FdbBool;

    unsafe fn future_set_callback(
        &self,
        future: *mut FDBFuture,
        callback: FdbCallback,
        callback_parameter: *mut c_void,
    ) -> FdbErrorCode;

    unsafe fn future_get_error(
        &self,
        future: *mut FDBFuture,
    ) -> FdbErrorCode;

    unsafe fn future_get_int64(
        &self,
        future: *mut FDBFuture,
        out: *mut i64,
    ) -> FdbErrorCode;

    unsafe fn future_get_key(
        &self,
        future: *mut FDBFuture,
        out_key: *mut *const u8,
        out_key_length: *mut i32,
    ) -> FdbErrorCode;

    unsafe fn future_get_value(
        &self,
        future: *mut FDBFuture,
        out_present: *mut FdbBool,
        out_value: *mut *const u8,
        out_value_length: *mut i32,
    ) -> FdbErrorCode;

    unsafe fn future_get_keyvalue_array(
        &self,
        future: *mut FDBFuture,
        out_kv: *mut *const FDBKeyValue,
        out_count: *mut i32,
        out_more: *mut FdbBool,
    ) -> FdbErrorCode;

    // -
    // Database / tenant

    unsafe fn create_database(
        &self,
        cluster_file_path: *const c_char,
        out_database: *mut *mut FDBDatabase,
    ) -> FdbErrorCode;

    unsafe fn database_destroy(
        &self,
        database: *mut FDBDatabase,
    );

    unsafe fn database_open_tenant(
        &self,
        database: *mut FDBDatabase,
        tenant_name: *const u8,
        tenant_name_length: i32,
        out_tenant: *mut *mut FDBTenant,
    ) -> FdbErrorCode;

    unsafe fn database_create_transaction(
        &self,
        database: *mut FDBDatabase,
        out_transaction: *mut *mut FDBTransaction,
    ) -> FdbErrorCode;

    unsafe fn database_set_option(
        &self,
        database: *mut FDBDatabase,
        option: i32,
        value: *const u8,
        value_length: i32,
    ) -> FdbErrorCode;

    unsafe fn tenant_destroy(
        &self,
        tenant: *mut FDBTenant,
    );

    unsafe fn tenant_create_transaction(
        &self,
        tenant: *mut FDBTenant,
        out_transaction: *mut *mut FDBTransaction,
    ) -> FdbErrorCode;

    // -
    // Transactions

    unsafe fn transaction_destroy(
        &self,
        transaction: *mut FDBTransaction,
    );

    unsafe fn transaction_cancel(
        &self,
        transaction: *mut FDBTransaction,
    );

    unsafe fn transaction_set_option(
        &self,
        transaction: *mut FDBTransaction,
        option: i32,
        value: *const u8,
        value_length: i32,
    ) -> FdbErrorCode;

    unsafe fn transaction_set_read_version(
        &self,
        transaction: *mut FDBTransaction,
        version: i64,
    );

    unsafe fn transaction_get_read_version(
        &self,
        transaction: *mut FDBTransaction,
    ) -> *mut FDBFuture;

    unsafe fn transaction_get(
        &self,
        transaction: *mut FDBTransaction,
        key_name: *const u8,
        key_name_length: i32,
        snapshot: FdbBool,
    ) -> *mut FDBFuture;

    unsafe fn transaction_get_key(
        &self,
        transaction: *mut FDBTransaction,
        key_name: *const u8,
        key_name_length: i32,
        or_equal: FdbBool,
        offset: i32,
        snapshot: FdbBool,
    ) -> *mut FDBFuture;

    #[allow(clippy::too_many_arguments)]
    unsafe fn transaction_get_range(
        &self,
        transaction: *mut FDBTransaction,
        begin_key_name: *const u8,
        begin_key_name_length: i32,
        begin_or_equal: FdbBool,
        begin_offset: i32,
        end_key_name: *const u8,
        end_key_name_length: i32,
        end_or_equal: FdbBool,
        end_offset: i32,
        limit: i32,
        target_bytes: i32,
        mode: i32,
        iteration: i32,
        snapshot: FdbBool,
        reverse: FdbBool,
    ) -> *mut FDBFuture;

    unsafe fn transaction_set(
        &self,
        transaction: *mut FDBTransaction,
        key_name: *const u8,
        key_name_length: i32,
        value: *const u8,
        value_length: i32,
    );

    unsafe fn transaction_atomic_op(
        &self,
        transaction: *mut FDBTransaction,
        key_name: *const u8,
        key_name_length: i32,
        param: *const u8,
        param_length: i32,
        operation_type: i32,
    );

    unsafe fn transaction_clear(
        &self,
        transaction: *mut FDBTransaction,
        key_name: *const u8,
        key_name_length: i32,
    );

    unsafe fn transaction_clear_range(
        &self,
        transaction: *mut FDBTransaction,
        begin_key_name: *const u8,
        begin_key_name_length: i32,
        end_key_name: *const u8,
        end_key_name_length: i32,
    );

    unsafe fn transaction_watch(
        &self,
        transaction: *mut FDBTransaction,
        key_name: *const u8,
        key_name_length: i32,
    ) -> *mut FDBFuture;

    unsafe fn transaction_commit(
        &self,
        transaction: *mut FDBTransaction,
    ) -> *mut FDBFuture;

    unsafe fn transaction_get_committed_version(
        &self,
        transaction: *mut FDBTransaction,
        out_version: *mut i64,
    ) -> FdbErrorCode;

    unsafe fn transaction_on_error(
        &self,
        transaction: *mut FDBTransaction,
        error: FdbErrorCode,
    ) -> *mut FDBFuture;

    unsafe fn transaction_reset(
        &self,
        transaction: *mut FDBTransaction,
    );
}
