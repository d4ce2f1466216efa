use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;

use super::DatabaseInner;
use super::Transaction;
use super::TransactionParent;
use super::TransactionSource;
use crate::errors::check;
use crate::Database;
use crate::NativeHandle;
use crate::OutSlot;
use crate::Result;

pub(crate) struct TenantInner {
    pub(crate) db: Arc<DatabaseInner>,
    pub(crate) handle: NativeHandle,
    pub(crate) name: Bytes,
}

impl Drop for TenantInner {
    fn drop(&mut self) {
        // SAFETY: transactions hold an Arc to this value, so none is alive;
        // `db` is dropped after this body, so the database is still live.
        unsafe { self.db.ctx.api.tenant_destroy(self.handle.as_ptr()) };
        debug!(handle = %self.handle, "tenant destroyed");
    }
}

/// Named partition of a database. Transactions created here only see the
/// tenant's keys.
#[derive(Clone)]
pub struct Tenant {
    pub(crate) inner: Arc<TenantInner>,
}

impl Tenant {
    pub fn name(&self) -> &Bytes {
        &self.inner.name
    }

    pub fn handle(&self) -> NativeHandle {
        self.inner.handle
    }

    /// The owning database.
    pub fn database(&self) -> Database {
        Database {
            inner: self.inner.db.clone(),
        }
    }

    pub fn create_transaction(&self) -> Result<Transaction> {
        let api = self.inner.db.ctx.api.as_ref();
        let mut slot = OutSlot::new();
        // SAFETY: the tenant is live; the slot is a valid out pointer.
        let code = unsafe { api.tenant_create_transaction(self.inner.handle.as_ptr(), slot.as_out()) };
        check(api, code)?;
        let handle = slot.into_handle("tenant_create_transaction")?;
        Ok(Transaction::new(TransactionParent::Tenant(self.inner.clone()), handle))
    }
}

impl TransactionSource for Tenant {
    fn create_transaction(&self) -> Result<Transaction> {
        Tenant::create_transaction(self)
    }
}
