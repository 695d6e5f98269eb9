//! In-process CachePort with lazy expiry.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::ports::cache_port::CachePort;

#[derive(Debug, Default)]
pub struct MemoryCacheAdapter {
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl MemoryCacheAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live entries; expired ones are dropped as a side effect.
    pub fn len(&self) -> usize {
        let Ok(mut entries) = self.entries.lock() else {
            return 0;
        };
        let now = Instant::now();
        entries.retain(|_, (_, expires_at)| *expires_at > now);
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CachePort for MemoryCacheAdapter {
    fn get(&self, key: &str) -> Option<String> {
        let mut entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(_) => {
                warn!(key, "cache lock poisoned, treating as miss");
                return None;
            }
        };

        match entries.get(key) {
            Some((value, expires_at)) if *expires_at > Instant::now() => Some(value.clone()),
            Some(_) => {
                debug!(key, "cache entry expired");
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn set(&self, key: &str, value: String, ttl: Duration) {
        let Some(expires_at) = Instant::now().checked_add(ttl) else {
            warn!(key, "cache ttl overflow, entry not stored");
            return;
        };
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), (value, expires_at));
        }
    }

    fn invalidate(&self, key: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(key);
        }
    }
}
