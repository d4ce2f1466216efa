//! Async bridge over the FoundationDB C client
//!
//! The native client reports every asynchronous operation as a future handle
//! that must be given a callback and destroyed exactly once. This crate turns
//! those handles into tokio-awaitable results:
//!
//! - [`Multiplexer`] is the one native callback, routing wakes by handle
//! - [`FutureAdapter`] owns one native future and its disposal
//! - [`Database`], [`Tenant`] and [`Transaction`] own native handles whose
//!   destroy order follows from ownership
//! - [`WatchStream`] yields successive values of a key without missing changes
//! - [`FdbClient`] boots the network thread and ties it all together

mod bridge;
mod client;
mod config;
pub mod constants;
mod errors;
mod handles;
mod metrics;
mod native;
mod scoped_timer;
mod watch;

pub use bridge::*;
pub use client::*;
pub use config::*;
pub use errors::*;
pub use handles::*;
pub use metrics::*;
pub use native::*;
pub use watch::*;


//-----------------------------------------------------------
// Test utils
