use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;
use tracing::trace;

use super::DatabaseInner;
use super::KeySelector;
use super::KeyValue;
use super::MutationType;
use super::RangeOptions;
use super::RangeResult;
use super::TenantInner;
use crate::encode_option;
use crate::errors::check;
use crate::ffi_len;
use crate::scoped_timer::ScopedTimer;
use crate::BridgeContext;
use crate::Error;
use crate::FDBFuture;
use crate::FDBTransaction;
use crate::FdbBool;
use crate::FutureAdapter;
use crate::FutureKind;
use crate::NativeApi;
use crate::NativeError;
use crate::NativeHandle;
use crate::OptionScope;
use crate::OptionValue;
use crate::Result;

/// The capability shared by [`crate::Database`] and [`crate::Tenant`]
pub trait TransactionSource: Send + Sync {
    fn create_transaction(&self) -> Result<Transaction>;
}

impl<T: TransactionSource + ?Sized> TransactionSource for Arc<T> {
    fn create_transaction(&self) -> Result<Transaction> {
        (**self).create_transaction()
    }
}

/// Keeps the parent handle alive for as long as a transaction exists.
#[derive(Clone)]
pub(crate) enum TransactionParent {
    Database(Arc<DatabaseInner>),
    Tenant(Arc<TenantInner>),
}

impl TransactionParent {
    fn ctx(&self) -> &BridgeContext {
        match self {
            TransactionParent::Database(db) => &db.ctx,
            TransactionParent::Tenant(tenant) => &tenant.db.ctx,
        }
    }
}

/// A native transaction
///
/// Operations are issued to the native layer in program order; their futures
/// may complete in any order. Once [`Transaction::commit`] is issued, further
/// operations fail with [`Error::CommitIssued`] until [`Transaction::reset`]
/// or a successful [`Transaction::on_error`].
pub struct Transaction {
    parent: TransactionParent,
    handle: NativeHandle,
    commit_issued: AtomicBool,
}

impl Transaction {
    pub(crate) fn new(
        parent: TransactionParent,
        handle: NativeHandle,
    ) -> Self {
        trace!(%handle, "transaction created");
        Self {
            parent,
            handle,
            commit_issued: AtomicBool::new(false),
        }
    }

    pub fn handle(&self) -> NativeHandle {
        self.handle
    }

    fn api(&self) -> &dyn NativeApi {
        self.parent.ctx().api.as_ref()
    }

    fn raw(&self) -> *mut FDBTransaction {
        self.handle.as_ptr()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.commit_issued.load(Ordering::Acquire) {
            Err(Error::CommitIssued)
        } else {
            Ok(())
        }
    }

    /// Issues a future-returning native call and adopts the future.
    fn issue<F>(
        &self,
        kind: FutureKind,
        call: &'static str,
        native_call: F,
    ) -> Result<FutureAdapter>
    where
        F: FnOnce(&dyn NativeApi, *mut FDBTransaction) -> *mut FDBFuture,
    {
        let ctx = self.parent.ctx();
        let raw = native_call(ctx.api.as_ref(), self.raw());
        // SAFETY: `raw` was just returned by the native call and is owned here.
        unsafe { FutureAdapter::from_raw(ctx, raw, kind, call) }
    }

    /// Reads `key`; `None` if it is absent.
    pub async fn get(
        &self,
        key: &[u8],
        snapshot: bool,
    ) -> Result<Option<Bytes>> {
        self.ensure_open()?;
        let len = ffi_len(key)?;
        let _timer = ScopedTimer::new("get");
        let future = self.issue(FutureKind::Value, "transaction_get", |api, tr| {
            // SAFETY: the transaction is live and `key` outlives the call.
            unsafe { api.transaction_get(tr, key.as_ptr(), len, snapshot as FdbBool) }
        })?;
        future.resolve().await?.into_value()
    }

    /// Resolves `selector` to a key. Past the last key this is `\xff`,
    /// before the first it is empty.
    pub async fn get_key(
        &self,
        selector: &KeySelector,
        snapshot: bool,
    ) -> Result<Bytes> {
        self.ensure_open()?;
        let len = ffi_len(&selector.key)?;
        let _timer = ScopedTimer::new("get_key");
        let future = self.issue(FutureKind::Key, "transaction_get_key", |api, tr| {
            // SAFETY: the transaction is live and the selector key outlives the call.
            unsafe {
                api.transaction_get_key(
                    tr,
                    selector.key.as_ptr(),
                    len,
                    selector.or_equal as FdbBool,
                    selector.offset,
                    snapshot as FdbBool,
                )
            }
        })?;
        future.resolve().await?.into_key()
    }

    pub fn set(
        &self,
        key: &[u8],
        value: &[u8],
    ) -> Result<()> {
        self.ensure_open()?;
        let (key_len, value_len) = (ffi_len(key)?, ffi_len(value)?);
        // SAFETY: the transaction is live; the native call copies both buffers.
        unsafe {
            self.api()
                .transaction_set(self.raw(), key.as_ptr(), key_len, value.as_ptr(), value_len)
        };
        Ok(())
    }

    pub fn clear(
        &self,
        key: &[u8],
    ) -> Result<()> {
        self.ensure_open()?;
        let len = ffi_len(key)?;
        // SAFETY: the transaction is live; the native call copies the key.
        unsafe { self.api().transaction_clear(self.raw(), key.as_ptr(), len) };
        Ok(())
    }

    /// Clears every key in `[begin, end)`.
    pub fn clear_range(
        &self,
        begin: &[u8],
        end: &[u8],
    ) -> Result<()> {
        self.ensure_open()?;
        let (begin_len, end_len) = (ffi_len(begin)?, ffi_len(end)?);
        // SAFETY: the transaction is live; the native call copies both keys.
        unsafe {
            self.api()
                .transaction_clear_range(self.raw(), begin.as_ptr(), begin_len, end.as_ptr(), end_len)
        };
        Ok(())
    }

    pub fn atomic_op(
        &self,
        key: &[u8],
        param: &[u8],
        op: MutationType,
    ) -> Result<()> {
        self.ensure_open()?;
        let (key_len, param_len) = (ffi_len(key)?, ffi_len(param)?);
        // SAFETY: the transaction is live; the native call copies both buffers.
        unsafe {
            self.api()
                .transaction_atomic_op(self.raw(), key.as_ptr(), key_len, param.as_ptr(), param_len, op as i32)
        };
        Ok(())
    }

    /// Reads one batch of the range between two selectors.
    pub async fn get_range(
        &self,
        begin: &KeySelector,
        end: &KeySelector,
        opts: &RangeOptions,
    ) -> Result<RangeResult> {
        self.ensure_open()?;
        let (begin_len, end_len) = (ffi_len(&begin.key)?, ffi_len(&end.key)?);
        let _timer = ScopedTimer::new("get_range");
        let future = self.issue(FutureKind::KeyValues, "transaction_get_range", |api, tr| {
            // SAFETY: the transaction is live and both selector keys outlive the call.
            unsafe {
                api.transaction_get_range(
                    tr,
                    begin.key.as_ptr(),
                    begin_len,
                    begin.or_equal as FdbBool,
                    begin.offset,
                    end.key.as_ptr(),
                    end_len,
                    end.or_equal as FdbBool,
                    end.offset,
                    opts.limit,
                    opts.target_bytes,
                    opts.mode as i32,
                    opts.iteration,
                    opts.snapshot as FdbBool,
                    opts.reverse as FdbBool,
                )
            }
        })?;
        future.resolve().await?.into_key_values()
    }

    /// Reads every pair in `[begin, end)`, batch by batch, honoring `opts.limit`.
    pub async fn get_range_all(
        &self,
        begin: &[u8],
        end: &[u8],
        opts: &RangeOptions,
    ) -> Result<Vec<KeyValue>> {
        let mut begin_sel = KeySelector::first_greater_or_equal(Bytes::copy_from_slice(begin));
        let mut end_sel = KeySelector::first_greater_or_equal(Bytes::copy_from_slice(end));
        let mut batch_opts = *opts;
        let mut out = Vec::new();

        loop {
            let batch = self.get_range(&begin_sel, &end_sel, &batch_opts).await?;
            let Some(last) = batch.kvs.last().map(|kv| kv.key.clone()) else {
                break;
            };
            let fetched = batch.kvs.len();
            out.extend(batch.kvs);

            if opts.limit > 0 {
                let remaining = opts.limit as usize - out.len().min(opts.limit as usize);
                if remaining == 0 {
                    break;
                }
                batch_opts.limit = remaining as i32;
            }
            if !batch.more {
                break;
            }

            if opts.reverse {
                end_sel = KeySelector::first_greater_or_equal(last);
            } else {
                begin_sel = KeySelector::first_greater_than(last);
            }
            batch_opts.iteration += 1;
            trace!(fetched, total = out.len(), "range batch");
        }
        Ok(out)
    }

    pub async fn get_read_version(&self) -> Result<i64> {
        self.ensure_open()?;
        let _timer = ScopedTimer::new("get_read_version");
        let future = self.issue(FutureKind::Int64, "transaction_get_read_version", |api, tr| {
            // SAFETY: the transaction is live.
            unsafe { api.transaction_get_read_version(tr) }
        })?;
        future.resolve().await?.into_int64()
    }

    pub fn set_read_version(
        &self,
        version: i64,
    ) -> Result<()> {
        self.ensure_open()?;
        // SAFETY: the transaction is live.
        unsafe { self.api().transaction_set_read_version(self.raw(), version) };
        Ok(())
    }

    /// Registers a watch on `key`. It becomes active when this transaction
    /// commits and fires once the key's value differs from the value this
    /// transaction sees.
    pub fn watch(
        &self,
        key: &[u8],
    ) -> Result<WatchSubscription> {
        self.ensure_open()?;
        let len = ffi_len(key)?;
        let future = self.issue(FutureKind::Unit, "transaction_watch", |api, tr| {
            // SAFETY: the transaction is live; the native call copies the key.
            unsafe { api.transaction_watch(tr, key.as_ptr(), len) }
        })?;
        Ok(WatchSubscription {
            key: Bytes::copy_from_slice(key),
            future,
            _parent: self.parent.clone(),
        })
    }

    /// Commits. A failure is returned as is; retrying through
    /// [`Transaction::on_error`] is up to the caller.
    pub async fn commit(&self) -> Result<()> {
        if self.commit_issued.swap(true, Ordering::AcqRel) {
            return Err(Error::CommitIssued);
        }
        let _timer = ScopedTimer::new("commit");
        let future = self.issue(FutureKind::Unit, "transaction_commit", |api, tr| {
            // SAFETY: the transaction is live.
            unsafe { api.transaction_commit(tr) }
        })?;
        future.resolve().await?.into_unit()?;
        debug!(handle = %self.handle, "transaction committed");
        Ok(())
    }

    /// Version the commit was written at; -1 for a read-only commit.
    pub fn committed_version(&self) -> Result<i64> {
        let mut version = 0i64;
        // SAFETY: the transaction is live; `version` is a valid out pointer.
        let code = unsafe { self.api().transaction_get_committed_version(self.raw(), &mut version) };
        check(self.api(), code)?;
        Ok(version)
    }

    /// The native retry primitive. Resolves once the transaction has been
    /// reset and may be retried, or fails with the error if it is not
    /// retryable.
    pub async fn on_error(
        &self,
        error: &NativeError,
    ) -> Result<()> {
        let code = error.code;
        let _timer = ScopedTimer::new("on_error");
        let future = self.issue(FutureKind::Unit, "transaction_on_error", |api, tr| {
            // SAFETY: the transaction is live.
            unsafe { api.transaction_on_error(tr, code) }
        })?;
        future.resolve().await?.into_unit()?;
        self.commit_issued.store(false, Ordering::Release);
        debug!(handle = %self.handle, code, "transaction reset for retry");
        Ok(())
    }

    pub fn reset(&self) {
        // SAFETY: the transaction is live.
        unsafe { self.api().transaction_reset(self.raw()) };
        self.commit_issued.store(false, Ordering::Release);
    }

    /// Cancels outstanding operations; they fail with a native cancellation error.
    pub fn cancel(&self) {
        // SAFETY: the transaction is live.
        unsafe { self.api().transaction_cancel(self.raw()) };
    }

    /// Sets a transaction-scoped option.
    pub fn set_option(
        &self,
        name: &str,
        value: impl Into<OptionValue>,
    ) -> Result<()> {
        self.ensure_open()?;
        let ctx = self.parent.ctx();
        let encoded = encode_option(ctx.options.as_ref(), OptionScope::Transaction, name, &value.into())?;
        // SAFETY: the transaction is live and the buffer outlives the call.
        let code = unsafe {
            ctx.api
                .transaction_set_option(self.raw(), encoded.id, encoded.as_ptr(), encoded.len()?)
        };
        check(ctx.api.as_ref(), code)
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        // SAFETY: `parent` is dropped after this body, so the parent is still live.
        unsafe { self.api().transaction_destroy(self.raw()) };
        trace!(handle = %self.handle, "transaction destroyed");
    }
}

/// A pending watch on one key
///
/// Outlives the transaction that created it; keeps the database (and tenant)
/// alive until it is dropped.
pub struct WatchSubscription {
    key: Bytes,
    future: FutureAdapter,
    _parent: TransactionParent,
}

impl WatchSubscription {
    pub fn key(&self) -> &Bytes {
        &self.key
    }

    pub fn handle(&self) -> NativeHandle {
        self.future.handle()
    }

    /// Resolves when the key changes. [`Error::Cancelled`] after [`Self::cancel`].
    pub async fn changed(&self) -> Result<()> {
        let _timer = ScopedTimer::new("watch");
        self.future.ready_value().await?.into_unit()
    }

    /// Releases the native watch. Idempotent.
    pub fn cancel(&self) {
        self.future.dispose();
    }
}
