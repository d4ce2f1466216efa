//! Named native options
//!
//! The native library identifies options by number and expects a raw
//! parameter buffer whose shape depends on the option. [`OptionRegistry`] maps
//! a name to its `(id, kind)`; [`encode_option`] checks the caller's value
//! against that kind and produces the buffer.

use std::collections::HashMap;
use std::fmt;
use std::ptr;

#[cfg(test)]
use mockall::automock;

use lazy_static::lazy_static;

use crate::Error;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionScope {
    Network,
    Database,
    Transaction,
}

impl fmt::Display for OptionScope {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            OptionScope::Network => write!(f, "network"),
            OptionScope::Database => write!(f, "database"),
            OptionScope::Transaction => write!(f, "transaction"),
        }
    }
}

/// Parameter shape of an option
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    /// No parameter
    Flag,
    /// 64-bit signed integer, little endian
    Int,
    /// UTF-8 text, passed with an explicit length
    String,
}

impl fmt::Display for OptionKind {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            OptionKind::Flag => write!(f, "flag"),
            OptionKind::Int => write!(f, "int"),
            OptionKind::String => write!(f, "string"),
        }
    }
}

/// Caller supplied option value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    Flag,
    Int(i64),
    Text(String),
}

impl From<i64> for OptionValue {
    fn from(v: i64) -> Self {
        OptionValue::Int(v)
    }
}

impl From<i32> for OptionValue {
    fn from(v: i32) -> Self {
        OptionValue::Int(v as i64)
    }
}

impl From<&str> for OptionValue {
    fn from(v: &str) -> Self {
        OptionValue::Text(v.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(v: String) -> Self {
        OptionValue::Text(v)
    }
}

impl From<()> for OptionValue {
    fn from(_: ()) -> Self {
        OptionValue::Flag
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionSpec {
    pub id: i32,
    pub kind: OptionKind,
}

impl OptionSpec {
    pub const fn new(
        id: i32,
        kind: OptionKind,
    ) -> Self {
        Self { id, kind }
    }
}

/// Resolves option names to native ids.
#[cfg_attr(test, automock)]
pub trait OptionRegistry: Send + Sync {
    fn lookup(
        &self,
        scope: OptionScope,
        name: &str,
    ) -> Option<OptionSpec>;
}

/// Option id plus the parameter buffer handed to a `*_set_option` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedOption {
    pub id: i32,
    param: Option<Vec<u8>>,
}

impl EncodedOption {
    /// Parameter pointer; null for flags.
    pub fn as_ptr(&self) -> *const u8 {
        match &self.param {
            Some(bytes) => bytes.as_ptr(),
            None => ptr::null(),
        }
    }

    pub fn len(&self) -> Result<i32> {
        match &self.param {
            Some(bytes) => super::ffi_len(bytes),
            None => Ok(0),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.param.as_ref().map_or(true, |b| b.is_empty())
    }

    pub fn param(&self) -> Option<&[u8]> {
        self.param.as_deref()
    }
}

/// Looks up `name` and encodes `value` for it.
pub fn encode_option(
    registry: &dyn OptionRegistry,
    scope: OptionScope,
    name: &str,
    value: &OptionValue,
) -> Result<EncodedOption> {
    let spec = registry.lookup(scope, name).ok_or_else(|| Error::InvalidOption {
        scope,
        name: name.to_string(),
    })?;

    let param = match (spec.kind, value) {
        (OptionKind::Flag, OptionValue::Flag) => None,
        (OptionKind::Int, OptionValue::Int(v)) => Some(v.to_le_bytes().to_vec()),
        (OptionKind::String, OptionValue::Text(s)) => Some(s.as_bytes().to_vec()),
        (expected, _) => {
            return Err(Error::OptionType {
                name: name.to_string(),
                expected,
            })
        }
    };

    Ok(EncodedOption { id: spec.id, param })
}

// -
// Builtin tables (fdb.options, API version 710)

use OptionKind::Flag;
use OptionKind::Int;
use OptionKind::String as Str;

lazy_static! {
    static ref NETWORK_OPTIONS: HashMap<&'static str, OptionSpec> = [
        ("trace_enable", OptionSpec::new(30, Str)),
        ("trace_roll_size", OptionSpec::new(31, Int)),
        ("trace_max_logs_size", OptionSpec::new(32, Int)),
        ("trace_log_group", OptionSpec::new(33, Str)),
        ("trace_format", OptionSpec::new(34, Str)),
        ("trace_clock_source", OptionSpec::new(35, Str)),
        ("trace_file_identifier", OptionSpec::new(36, Str)),
        ("trace_partial_file_suffix", OptionSpec::new(39, Str)),
        ("knob", OptionSpec::new(40, Str)),
        ("tls_cert_path", OptionSpec::new(43, Str)),
        ("tls_key_path", OptionSpec::new(46, Str)),
        ("tls_verify_peers", OptionSpec::new(47, Str)),
        ("buggify_enable", OptionSpec::new(48, Flag)),
        ("buggify_disable", OptionSpec::new(49, Flag)),
        ("tls_ca_path", OptionSpec::new(53, Str)),
        ("tls_password", OptionSpec::new(54, Str)),
        ("disable_multi_version_client_api", OptionSpec::new(60, Flag)),
        ("callbacks_on_external_threads", OptionSpec::new(61, Flag)),
        ("external_client_library", OptionSpec::new(62, Str)),
        ("external_client_directory", OptionSpec::new(63, Str)),
        ("disable_local_client", OptionSpec::new(64, Flag)),
        ("client_threads_per_version", OptionSpec::new(65, Int)),
        ("disable_client_statistics_logging", OptionSpec::new(70, Flag)),
        ("enable_run_loop_profiling", OptionSpec::new(71, Flag)),
        ("distributed_client_tracer", OptionSpec::new(90, Str)),
    ]
    .into_iter()
    .collect();

    static ref DATABASE_OPTIONS: HashMap<&'static str, OptionSpec> = [
        ("location_cache_size", OptionSpec::new(10, Int)),
        ("max_watches", OptionSpec::new(20, Int)),
        ("machine_id", OptionSpec::new(21, Str)),
        ("datacenter_id", OptionSpec::new(22, Str)),
        ("snapshot_ryw_enable", OptionSpec::new(26, Flag)),
        ("snapshot_ryw_disable", OptionSpec::new(27, Flag)),
        ("transaction_logging_max_field_length", OptionSpec::new(405, Int)),
        ("transaction_timeout", OptionSpec::new(500, Int)),
        ("transaction_retry_limit", OptionSpec::new(501, Int)),
        ("transaction_max_retry_delay", OptionSpec::new(502, Int)),
        ("transaction_size_limit", OptionSpec::new(503, Int)),
        ("transaction_causal_read_risky", OptionSpec::new(504, Flag)),
        ("transaction_include_port_in_address", OptionSpec::new(505, Flag)),
        ("transaction_bypass_unreadable", OptionSpec::new(700, Flag)),
    ]
    .into_iter()
    .collect();

    static ref TRANSACTION_OPTIONS: HashMap<&'static str, OptionSpec> = [
        ("causal_write_risky", OptionSpec::new(10, Flag)),
        ("causal_read_risky", OptionSpec::new(20, Flag)),
        ("causal_read_disable", OptionSpec::new(21, Flag)),
        ("include_port_in_address", OptionSpec::new(23, Flag)),
        ("next_write_no_write_conflict_range", OptionSpec::new(30, Flag)),
        ("read_your_writes_disable", OptionSpec::new(51, Flag)),
        ("read_ahead_disable", OptionSpec::new(52, Flag)),
        ("durability_datacenter", OptionSpec::new(110, Flag)),
        ("durability_risky", OptionSpec::new(120, Flag)),
        ("priority_system_immediate", OptionSpec::new(200, Flag)),
        ("priority_batch", OptionSpec::new(201, Flag)),
        ("initialize_new_database", OptionSpec::new(300, Flag)),
        ("access_system_keys", OptionSpec::new(301, Flag)),
        ("read_system_keys", OptionSpec::new(302, Flag)),
        ("debug_transaction_identifier", OptionSpec::new(403, Str)),
        ("log_transaction", OptionSpec::new(404, Flag)),
        ("transaction_logging_max_field_length", OptionSpec::new(405, Int)),
        ("server_request_tracing", OptionSpec::new(406, Flag)),
        ("timeout", OptionSpec::new(500, Int)),
        ("retry_limit", OptionSpec::new(501, Int)),
        ("max_retry_delay", OptionSpec::new(502, Int)),
        ("size_limit", OptionSpec::new(503, Int)),
        ("snapshot_ryw_enable", OptionSpec::new(600, Flag)),
        ("snapshot_ryw_disable", OptionSpec::new(601, Flag)),
        ("lock_aware", OptionSpec::new(700, Flag)),
        ("used_during_commit_protection_disable", OptionSpec::new(701, Flag)),
        ("read_lock_aware", OptionSpec::new(702, Flag)),
        ("use_provisional_proxies", OptionSpec::new(711, Flag)),
        ("report_conflicting_keys", OptionSpec::new(712, Flag)),
        ("special_key_space_relaxed", OptionSpec::new(713, Flag)),
        ("tag", OptionSpec::new(800, Str)),
        ("auto_throttle_tag", OptionSpec::new(801, Str)),
        ("bypass_unreadable", OptionSpec::new(1100, Flag)),
    ]
    .into_iter()
    .collect();
}

/// Registry backed by the option tables shipped with the client headers.
///
/// Names are matched case-insensitively, and `-` is accepted for `_`.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinOptions;

impl OptionRegistry for BuiltinOptions {
    fn lookup(
        &self,
        scope: OptionScope,
        name: &str,
    ) -> Option<OptionSpec> {
        let normalized = name.trim().to_ascii_lowercase().replace('-', "_");
        let table: &HashMap<&'static str, OptionSpec> = match scope {
            OptionScope::Network => &NETWORK_OPTIONS,
            OptionScope::Database => &DATABASE_OPTIONS,
            OptionScope::Transaction => &TRANSACTION_OPTIONS,
        };
        table.get(normalized.as_str()).copied()
    }
}
