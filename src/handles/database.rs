use std::ffi::CString;
use std::path::Path;
use std::ptr;
use std::sync::Arc;

use tracing::debug;

use super::Tenant;
use super::TenantInner;
use super::Transaction;
use super::TransactionParent;
use super::TransactionSource;
use crate::encode_option;
use crate::errors::check;
use crate::ffi_len;
use crate::BridgeContext;
use crate::Error;
use crate::FDBDatabase;
use crate::NativeHandle;
use crate::OptionScope;
use crate::OptionValue;
use crate::OutSlot;
use crate::Result;

pub(crate) struct DatabaseInner {
    pub(crate) ctx: BridgeContext,
    pub(crate) handle: NativeHandle,
}

impl Drop for DatabaseInner {
    fn drop(&mut self) {
        // SAFETY: every tenant and transaction holds an Arc to this value, so
        // none of them is still alive.
        unsafe { self.ctx.api.database_destroy(self.handle.as_ptr()) };
        debug!(handle = %self.handle, "database destroyed");
    }
}

/// Database connection. Cheap to clone; destroyed with the last clone and
/// only after every tenant and transaction created from it.
#[derive(Clone)]
pub struct Database {
    pub(crate) inner: Arc<DatabaseInner>,
}

impl Database {
    /// Connects through `cluster_file`, or the default cluster file when `None`.
    pub fn create(
        ctx: BridgeContext,
        cluster_file: Option<&Path>,
    ) -> Result<Self> {
        let path = match cluster_file {
            Some(p) => {
                let s = p
                    .to_str()
                    .ok_or_else(|| Error::InvalidArgument(format!("cluster file path is not UTF-8: {}", p.display())))?;
                Some(CString::new(s).map_err(|_| Error::InvalidArgument("cluster file path contains NUL".to_string()))?)
            }
            None => None,
        };

        let mut slot = OutSlot::<FDBDatabase>::new();
        // SAFETY: the path outlives the call; the slot is a valid out pointer.
        let code = unsafe {
            ctx.api
                .create_database(path.as_ref().map_or(ptr::null(), |c| c.as_ptr()), slot.as_out())
        };
        check(ctx.api.as_ref(), code)?;
        let handle = slot.into_handle("create_database")?;

        debug!(%handle, cluster_file = ?cluster_file, "database created");
        Ok(Database {
            inner: Arc::new(DatabaseInner { ctx, handle }),
        })
    }

    pub fn handle(&self) -> NativeHandle {
        self.inner.handle
    }

    /// Opens a named tenant. The tenant keeps this database alive.
    pub fn open_tenant(
        &self,
        name: &[u8],
    ) -> Result<Tenant> {
        let api = self.inner.ctx.api.as_ref();
        let mut slot = OutSlot::new();
        // SAFETY: the database is live and the name buffer outlives the call.
        let code = unsafe { api.database_open_tenant(self.inner.handle.as_ptr(), name.as_ptr(), ffi_len(name)?, slot.as_out()) };
        check(api, code)?;
        let handle = slot.into_handle("database_open_tenant")?;

        debug!(%handle, tenant = %String::from_utf8_lossy(name), "tenant opened");
        Ok(Tenant {
            inner: Arc::new(TenantInner {
                db: self.inner.clone(),
                handle,
                name: bytes::Bytes::copy_from_slice(name),
            }),
        })
    }

    pub fn create_transaction(&self) -> Result<Transaction> {
        let api = self.inner.ctx.api.as_ref();
        let mut slot = OutSlot::new();
        // SAFETY: the database is live; the slot is a valid out pointer.
        let code = unsafe { api.database_create_transaction(self.inner.handle.as_ptr(), slot.as_out()) };
        check(api, code)?;
        let handle = slot.into_handle("database_create_transaction")?;
        Ok(Transaction::new(TransactionParent::Database(self.inner.clone()), handle))
    }

    /// Sets a database-scoped option.
    pub fn set_option(
        &self,
        name: &str,
        value: impl Into<OptionValue>,
    ) -> Result<()> {
        let ctx = &self.inner.ctx;
        let encoded = encode_option(ctx.options.as_ref(), OptionScope::Database, name, &value.into())?;
        // SAFETY: the database is live and the buffer outlives the call.
        let code = unsafe {
            ctx.api
                .database_set_option(self.inner.handle.as_ptr(), encoded.id, encoded.as_ptr(), encoded.len()?)
        };
        check(ctx.api.as_ref(), code)?;
        debug!(option = name, "database option set");
        Ok(())
    }
}

impl TransactionSource for Database {
    fn create_transaction(&self) -> Result<Transaction> {
        Database::create_transaction(self)
    }
}
