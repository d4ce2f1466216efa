//! [`NativeApi`] over the system `libfdb_c`
//!
//! Library discovery is left to the linker (`-l fdb_c`); set `LIBRARY_PATH` /
//! `LD_LIBRARY_PATH` as needed.

use std::ffi::c_char;
use std::ffi::c_void;

use super::FDBDatabase;
use super::FDBFuture;
use super::FDBKeyValue;
use super::FDBTenant;
use super::FDBTransaction;
use super::FdbBool;
use super::FdbCallback;
use super::FdbErrorCode;
use super::NativeApi;

#[link(name = "fdb_c")]
extern "C" {
    fn fdb_select_api_version_impl(
        runtime_version: i32,
        header_version: i32,
    ) -> FdbErrorCode;
    fn fdb_get_error(code: FdbErrorCode) -> *const c_char;
    fn fdb_error_predicate(
        predicate_test: i32,
        code: FdbErrorCode,
    ) -> FdbBool;
    fn fdb_network_set_option(
        option: i32,
        value: *const u8,
        value_length: i32,
    ) -> FdbErrorCode;
    fn fdb_setup_network() -> FdbErrorCode;
    fn fdb_run_network() -> FdbErrorCode;
    fn fdb_stop_network() -> FdbErrorCode;

    fn fdb_future_cancel(f: *mut FDBFuture);
    fn fdb_future_destroy(f: *mut FDBFuture);
    fn fdb_future_release_memory(f: *mut FDBFuture);
    fn fdb_future_is_ready(f: *mut FDBFuture) -> FdbBool;
    fn fdb_future_set_callback(
        f: *mut FDBFuture,
        callback: FdbCallback,
        callback_parameter: *mut c_void,
    ) -> FdbErrorCode;
    fn fdb_future_get_error(f: *mut FDBFuture) -> FdbErrorCode;
    fn fdb_future_get_int64(
        f: *mut FDBFuture,
        out: *mut i64,
    ) -> FdbErrorCode;
    fn fdb_future_get_key(
        f: *mut FDBFuture,
        out_key: *mut *const u8,
        out_key_length: *mut i32,
    ) -> FdbErrorCode;
    fn fdb_future_get_value(
        f: *mut FDBFuture,
        out_present: *mut FdbBool,
        out_value: *mut *const u8,
        out_value_length: *mut i32,
    ) -> FdbErrorCode;
    fn fdb_future_get_keyvalue_array(
        f: *mut FDBFuture,
        out_kv: *mut *const FDBKeyValue,
        out_count: *mut i32,
        out_more: *mut FdbBool,
    ) -> FdbErrorCode;

    fn fdb_create_database(
        cluster_file_path: *const c_char,
        out_database: *mut *mut FDBDatabase,
    ) -> FdbErrorCode;
    fn fdb_database_destroy(d: *mut FDBDatabase);
    fn fdb_database_open_tenant(
        d: *mut FDBDatabase,
        tenant_name: *const u8,
        tenant_name_length: i32,
        out_tenant: *mut *mut FDBTenant,
    ) -> FdbErrorCode;
    fn fdb_database_create_transaction(
        d: *mut FDBDatabase,
        out_transaction: *mut *mut FDBTransaction,
    ) -> FdbErrorCode;
    fn fdb_database_set_option(
        d: *mut FDBDatabase,
        option: i32,
        value: *const u8,
        value_length: i32,
    ) -> FdbErrorCode;
    fn fdb_tenant_destroy(t: *mut FDBTenant);
    fn fdb_tenant_create_transaction(
        t: *mut FDBTenant,
        out_transaction: *mut *mut FDBTransaction,
    ) -> FdbErrorCode;

    fn fdb_transaction_destroy(tr: *mut FDBTransaction);
    fn fdb_transaction_cancel(tr: *mut FDBTransaction);
    fn fdb_transaction_set_option(
        tr: *mut FDBTransaction,
        option: i32,
        value: *const u8,
        value_length: i32,
    ) -> FdbErrorCode;
    fn fdb_transaction_set_read_version(
        tr: *mut FDBTransaction,
        version: i64,
    );
    fn fdb_transaction_get_read_version(tr: *mut FDBTransaction) -> *mut FDBFuture;
    fn fdb_transaction_get(
        tr: *mut FDBTransaction,
        key_name: *const u8,
        key_name_length: i32,
        snapshot: FdbBool,
    ) -> *mut FDBFuture;
    fn fdb_transaction_get_key(
        tr: *mut FDBTransaction,
        key_name: *const u8,
        key_name_length: i32,
        or_equal: FdbBool,
        offset: i32,
        snapshot: FdbBool,
    ) -> *mut FDBFuture;
    fn fdb_transaction_get_range(
        tr: *mut FDBTransaction,
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
    fn fdb_transaction_set(
        tr: *mut FDBTransaction,
        key_name: *const u8,
        key_name_length: i32,
        value: *const u8,
        value_length: i32,
    );
    fn fdb_transaction_atomic_op(
        tr: *mut FDBTransaction,
        key_name: *const u8,
        key_name_length: i32,
        param: *const u8,
        param_length: i32,
        operation_type: i32,
    );
    fn fdb_transaction_clear(
        tr: *mut FDBTransaction,
        key_name: *const u8,
        key_name_length: i32,
    );
    fn fdb_transaction_clear_range(
        tr: *mut FDBTransaction,
        begin_key_name: *const u8,
        begin_key_name_length: i32,
        end_key_name: *const u8,
        end_key_name_length: i32,
    );
    fn fdb_transaction_watch(
        tr: *mut FDBTransaction,
        key_name: *const u8,
        key_name_length: i32,
    ) -> *mut FDBFuture;
    fn fdb_transaction_commit(tr: *mut FDBTransaction) -> *mut FDBFuture;
    fn fdb_transaction_get_committed_version(
        tr: *mut FDBTransaction,
        out_version: *mut i64,
    ) -> FdbErrorCode;
    fn fdb_transaction_on_error(
        tr: *mut FDBTransaction,
        error: FdbErrorCode,
    ) -> *mut FDBFuture;
    fn fdb_transaction_reset(tr: *mut FDBTransaction);
}

/// The linked system client library
#[derive(Debug, Default, Clone, Copy)]
pub struct LibFdbC;

impl NativeApi for LibFdbC {
    fn select_api_version(
        &self,
        runtime_version: i32,
        header_version: i32,
    ) -> FdbErrorCode {
        // SAFETY: plain integer arguments.
        unsafe { fdb_select_api_version_impl(runtime_version, header_version) }
    }

    fn get_error(
        &self,
        code: FdbErrorCode,
    ) -> *const c_char {
        // SAFETY: returns a pointer to a static string owned by the library.
        unsafe { fdb_get_error(code) }
    }

    fn error_predicate(
        &self,
        predicate_test: i32,
        code: FdbErrorCode,
    ) -> FdbBool {
        // SAFETY: plain integer arguments.
        unsafe { fdb_error_predicate(predicate_test, code) }
    }

    unsafe fn network_set_option(
        &self,
        option: i32,
        value: *const u8,
        value_length: i32,
    ) -> FdbErrorCode {
        fdb_network_set_option(option, value, value_length)
    }

    fn setup_network(&self) -> FdbErrorCode {
        // SAFETY: no arguments; the library serializes network setup itself.
        unsafe { fdb_setup_network() }
    }

    fn run_network(&self) -> FdbErrorCode {
        // SAFETY: no arguments; blocks until fdb_stop_network.
        unsafe { fdb_run_network() }
    }

    fn stop_network(&self) -> FdbErrorCode {
        // SAFETY: no arguments.
        unsafe { fdb_stop_network() }
    }

    unsafe fn future_cancel(
        &self,
        future: *mut FDBFuture,
    ) {
        fdb_future_cancel(future)
    }

    unsafe fn future_destroy(
        &self,
        future: *mut FDBFuture,
    ) {
        fdb_future_destroy(future)
    }

    unsafe fn future_release_memory(
        &self,
        future: *mut FDBFuture,
    ) {
        fdb_future_release_memory(future)
    }

    unsafe fn future_is_ready(
        &self,
        future: *mut FDBFuture,
    ) -> FdbBool {
        fdb_future_is_ready(future)
    }

    unsafe fn future_set_callback(
        &self,
        future: *mut FDBFuture,
        callback: FdbCallback,
        callback_parameter: *mut c_void,
    ) -> FdbErrorCode {
        fdb_future_set_callback(future, callback, callback_parameter)
    }

    unsafe fn future_get_error(
        &self,
        future: *mut FDBFuture,
    ) -> FdbErrorCode {
        fdb_future_get_error(future)
    }

    unsafe fn future_get_int64(
        &self,
        future: *mut FDBFuture,
        out: *mut i64,
    ) -> FdbErrorCode {
        fdb_future_get_int64(future, out)
    }

    unsafe fn future_get_key(
        &self,
        future: *mut FDBFuture,
        out_key: *mut *const u8,
        out_key_length: *mut i32,
    ) -> FdbErrorCode {
        fdb_future_get_key(future, out_key, out_key_length)
    }

    unsafe fn future_get_value(
        &self,
        future: *mut FDBFuture,
        out_present: *mut FdbBool,
        out_value: *mut *const u8,
        out_value_length: *mut i32,
    ) -> FdbErrorCode {
        fdb_future_get_value(future, out_present, out_value, out_value_length)
    }

    unsafe fn future_get_keyvalue_array(
        &self,
        future: *mut FDBFuture,
        out_kv: *mut *const FDBKeyValue,
        out_count: *mut i32,
        out_more: *mut FdbBool,
    ) -> FdbErrorCode {
        fdb_future_get_keyvalue_array(future, out_kv, out_count, out_more)
    }

    unsafe fn create_database(
        &self,
        cluster_file_path: *const c_char,
        out_database: *mut *mut FDBDatabase,
    ) -> FdbErrorCode {
        fdb_create_database(cluster_file_path, out_database)
    }

    unsafe fn database_destroy(
        &self,
        database: *mut FDBDatabase,
    ) {
        fdb_database_destroy(database)
    }

    unsafe fn database_open_tenant(
        &self,
        database: *mut FDBDatabase,
        tenant_name: *const u8,
        tenant_name_length: i32,
        out_tenant: *mut *mut FDBTenant,
    ) -> FdbErrorCode {
        fdb_database_open_tenant(database, tenant_name, tenant_name_length, out_tenant)
    }

    unsafe fn database_create_transaction(
        &self,
        database: *mut FDBDatabase,
        out_transaction: *mut *mut FDBTransaction,
    ) -> FdbErrorCode {
        fdb_database_create_transaction(database, out_transaction)
    }

    unsafe fn database_set_option(
        &self,
        database: *mut FDBDatabase,
        option: i32,
        value: *const u8,
        value_length: i32,
    ) -> FdbErrorCode {
        fdb_database_set_option(database, option, value, value_length)
    }

    unsafe fn tenant_destroy(
        &self,
        tenant: *mut FDBTenant,
    ) {
        fdb_tenant_destroy(tenant)
    }

    unsafe fn tenant_create_transaction(
        &self,
        tenant: *mut FDBTenant,
        out_transaction: *mut *mut FDBTransaction,
    ) -> FdbErrorCode {
        fdb_tenant_create_transaction(tenant, out_transaction)
    }

    unsafe fn transaction_destroy(
        &self,
        transaction: *mut FDBTransaction,
    ) {
        fdb_transaction_destroy(transaction)
    }

    unsafe fn transaction_cancel(
        &self,
        transaction: *mut FDBTransaction,
    ) {
        fdb_transaction_cancel(transaction)
    }

    unsafe fn transaction_set_option(
        &self,
        transaction: *mut FDBTransaction,
        option: i32,
        value: *const u8,
        value_length: i32,
    ) -> FdbErrorCode {
        fdb_transaction_set_option(transaction, option, value, value_length)
    }

    unsafe fn transaction_set_read_version(
        &self,
        transaction: *mut FDBTransaction,
        version: i64,
    ) {
        fdb_transaction_set_read_version(transaction, version)
    }

    unsafe fn transaction_get_read_version(
        &self,
        transaction: *mut FDBTransaction,
    ) -> *mut FDBFuture {
        fdb_transaction_get_read_version(transaction)
    }

    unsafe fn transaction_get(
        &self,
        transaction: *mut FDBTransaction,
        key_name: *const u8,
        key_name_length: i32,
        snapshot: FdbBool,
    ) -> *mut FDBFuture {
        fdb_transaction_get(transaction, key_name, key_name_length, snapshot)
    }

    unsafe fn transaction_get_key(
        &self,
        transaction: *mut FDBTransaction,
        key_name: *const u8,
        key_name_length: i32,
        or_equal: FdbBool,
        offset: i32,
        snapshot: FdbBool,
    ) -> *mut FDBFuture {
        fdb_transaction_get_key(transaction, key_name, key_name_length, or_equal, offset, snapshot)
    }

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
    ) -> *mut FDBFuture {
        fdb_transaction_get_range(
            transaction,
            begin_key_name,
            begin_key_name_length,
            begin_or_equal,
            begin_offset,
            end_key_name,
            end_key_name_length,
            end_or_equal,
            end_offset,
            limit,
            target_bytes,
            mode,
            iteration,
            snapshot,
            reverse,
        )
    }

    unsafe fn transaction_set(
        &self,
        transaction: *mut FDBTransaction,
        key_name: *const u8,
        key_name_length: i32,
        value: *const u8,
        value_length: i32,
    ) {
        fdb_transaction_set(transaction, key_name, key_name_length, value, value_length)
    }

    unsafe fn transaction_atomic_op(
        &self,
        transaction: *mut FDBTransaction,
        key_name: *const u8,
        key_name_length: i32,
        param: *const u8,
        param_length: i32,
        operation_type: i32,
    ) {
        fdb_transaction_atomic_op(
            transaction,
            key_name,
            key_name_length,
            param,
            param_length,
            operation_type,
        )
    }

    unsafe fn transaction_clear(
        &self,
        transaction: *mut FDBTransaction,
        key_name: *const u8,
        key_name_length: i32,
    ) {
        fdb_transaction_clear(transaction, key_name, key_name_length)
    }

    unsafe fn transaction_clear_range(
        &self,
        transaction: *mut FDBTransaction,
        begin_key_name: *const u8,
        begin_key_name_length: i32,
        end_key_name: *const u8,
        end_key_name_length: i32,
    ) {
        fdb_transaction_clear_range(
            transaction,
            begin_key_name,
            begin_key_name_length,
            end_key_name,
            end_key_name_length,
        )
    }

    unsafe fn transaction_watch(
        &self,
        transaction: *mut FDBTransaction,
        key_name: *const u8,
        key_name_length: i32,
    ) -> *mut FDBFuture {
        fdb_transaction_watch(transaction, key_name, key_name_length)
    }

    unsafe fn transaction_commit(
        &self,
        transaction: *mut FDBTransaction,
    ) -> *mut FDBFuture {
        fdb_transaction_commit(transaction)
    }

    unsafe fn transaction_get_committed_version(
        &self,
        transaction: *mut FDBTransaction,
        out_version: *mut i64,
    ) -> FdbErrorCode {
        fdb_transaction_get_committed_version(transaction, out_version)
    }

    unsafe fn transaction_on_error(
        &self,
        transaction: *mut FDBTransaction,
        error: FdbErrorCode,
    ) -> *mut FDBFuture {
        fdb_transaction_on_error(transaction, error)
    }

    unsafe fn transaction_reset(
        &self,
        transaction: *mut FDBTransaction,
    ) {
        fdb_transaction_reset(transaction)
    }
}
