//! Process-wide configuration, read at decision time.
//!
//! Both knobs are runtime-mutable so operators (and tests) can flip them
//! without rebuilding a `Distributor`.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

/// Reads issued outside any distribution scope go to the primary when true.
static DEFAULT_TO_PRIMARY: AtomicBool = AtomicBool::new(true);

/// Lag-cache time-to-live in milliseconds. Kept below typical lag budgets so
/// a cached measurement can never hide a budget violation for long.
static LAG_CACHE_TTL_MS: AtomicU64 = AtomicU64::new(DEFAULT_LAG_CACHE_TTL_MS);

const DEFAULT_LAG_CACHE_TTL_MS: u64 = 3_000;

/// Whether reads outside any distribution scope are forced to the primary.
pub fn default_to_primary() -> bool {
    DEFAULT_TO_PRIMARY.load(Ordering::SeqCst)
}

/// Set the process-wide default routing for reads outside any scope.
pub fn set_default_to_primary(value: bool) {
    DEFAULT_TO_PRIMARY.store(value, Ordering::SeqCst);
}

/// How long a cached lag measurement stays valid.
pub fn lag_cache_ttl() -> Duration {
    Duration::from_millis(LAG_CACHE_TTL_MS.load(Ordering::SeqCst))
}

/// Tune the lag-cache TTL at runtime. TTLs beyond `u64::MAX` milliseconds
/// saturate rather than wrap.
pub fn set_lag_cache_ttl(ttl: Duration) {
    let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
    LAG_CACHE_TTL_MS.store(millis, Ordering::SeqCst);
}

/// Serializes tests that touch the process-wide flags.
#[cfg(test)]
pub(crate) fn test_guard() -> std::sync::MutexGuard<'static, ()> {
    static LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
    LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
