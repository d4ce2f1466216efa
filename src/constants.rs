// -
// API versions

/// API version this crate was written against (`FDB_API_VERSION` in `fdb_c.h`)
pub const HEADER_API_VERSION: i32 = 710;

/// Oldest runtime API version accepted by [`crate::NetworkConfig::validate`]
pub const MIN_API_VERSION: i32 = 610;

// -
// Status codes the bridge treats as "already done"

/// `api_version_already_set`: the API version may be selected only once per process
pub const ERROR_API_VERSION_ALREADY_SET: i32 = 2201;

/// `network_already_setup`: the network can be configured only once
pub const ERROR_NETWORK_ALREADY_SETUP: i32 = 2009;

/// `network_cannot_be_restarted`: returned by run/stop once the network has stopped
pub const ERROR_NETWORK_STOPPED: i32 = 2025;

// -
// Well known native error codes

pub const ERROR_SUCCESS: i32 = 0;
pub const ERROR_TRANSACTION_TOO_OLD: i32 = 1007;
pub const ERROR_FUTURE_VERSION: i32 = 1009;
pub const ERROR_NOT_COMMITTED: i32 = 1020;
pub const ERROR_COMMIT_UNKNOWN_RESULT: i32 = 1021;
pub const ERROR_TRANSACTION_CANCELLED: i32 = 1025;
pub const ERROR_OPERATION_CANCELLED: i32 = 1101;
pub const ERROR_CLIENT_INVALID_OPERATION: i32 = 2000;
pub const ERROR_INVALID_OPTION: i32 = 2007;
pub const ERROR_NETWORK_NOT_SETUP: i32 = 2008;
pub const ERROR_USED_DURING_COMMIT: i32 = 2017;
pub const ERROR_API_VERSION_NOT_SUPPORTED: i32 = 2203;
pub const ERROR_UNKNOWN: i32 = 4000;

// -
// fdb_error_predicate ids

pub const ERROR_PREDICATE_RETRYABLE: i32 = 50000;
pub const ERROR_PREDICATE_MAYBE_COMMITTED: i32 = 50001;
pub const ERROR_PREDICATE_RETRYABLE_NOT_COMMITTED: i32 = 50002;

// -
// Defaults

pub(crate) const DEFAULT_NETWORK_THREAD_NAME: &str = "fdb-network";

/// Environment variable naming an optional configuration file
pub(crate) const CONFIG_PATH_ENV: &str = "FDB_CONFIG_PATH";

/// Prefix for configuration environment overrides, e.g. `FDB__NETWORK__API_VERSION`
pub(crate) const CONFIG_ENV_PREFIX: &str = "FDB";
