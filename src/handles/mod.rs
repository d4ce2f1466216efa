//! Resource handles
//!
//! [`Database`], [`Tenant`] and [`Transaction`] each own one native handle.
//! Children hold a reference to their parent's handle, so the native destroy
//! order (transaction, then tenant, then database) follows from ownership and
//! `Drop` is the release path:
//!
//! ```text
//! Transaction --> TenantInner --> DatabaseInner
//!      \______________________________^
//! ```

mod database;
mod range;
mod tenant;
mod transaction;

pub use database::*;
pub use range::*;
pub use tenant::*;
pub use transaction::*;
