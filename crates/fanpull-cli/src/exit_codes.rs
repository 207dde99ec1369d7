//! Exit codes for the `fanpull` binary.
//! Failures carrying a `CacheError` use `CacheError::exit_code`.

use fanpull_cache::CacheError;

pub const SUCCESS: i32 = 0;
pub const NOT_CACHED: i32 = 1; // `cache exists` on a missing key
pub const CONFIG_ERROR: i32 = 2;

/// Exit code for a failed command.
pub fn for_error(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<CacheError>())
        .map(CacheError::exit_code)
        .unwrap_or(CONFIG_ERROR)
}
