//! Change notifications for one key
//!
//! [`WatchStream`] is a pull-based sequence: only one native watch is
//! outstanding per stream, and iteration ends when the caller disposes it.

mod watch_stream;

pub use watch_stream::*;
