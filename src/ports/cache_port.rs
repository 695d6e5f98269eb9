//! Key/value cache with per-entry expiry.

use std::time::Duration;

/// Misses (absent or expired keys) are `None`; callers re-derive the value.
pub trait CachePort: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String, ttl: Duration);
    fn invalidate(&self, key: &str);
}
