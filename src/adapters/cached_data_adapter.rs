//! DataPort decorator that memoizes `fetch_bars` through a CachePort.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use tracing::debug;

use crate::domain::error::TraderError;
use crate::domain::ohlcv::Bar;
use crate::ports::cache_port::CachePort;
use crate::ports::data_port::DataPort;

pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

pub struct CachedDataAdapter<D: DataPort> {
    inner: D,
    cache: Arc<dyn CachePort>,
    ttl: Duration,
}

impl<D: DataPort> CachedDataAdapter<D> {
    pub fn new(inner: D, cache: Arc<dyn CachePort>) -> Self {
        Self::with_ttl(inner, cache, DEFAULT_TTL)
    }

    pub fn with_ttl(inner: D, cache: Arc<dyn CachePort>, ttl: Duration) -> Self {
        Self { inner, cache, ttl }
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }
}

fn cache_key(symbol: &str, start: NaiveDateTime, end: NaiveDateTime) -> String {
    format!("bars:{}:{}:{}", symbol, start, end)
}

impl<D: DataPort> DataPort for CachedDataAdapter<D> {
    fn fetch_bars(
        &self,
        symbol: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<Bar>, TraderError> {
        let key = cache_key(symbol, start, end);

        if let Some(raw) = self.cache.get(&key) {
            match serde_json::from_str::<Vec<Bar>>(&raw) {
                Ok(bars) => {
                    debug!(key, bars = bars.len(), "bar cache hit");
                    return Ok(bars);
                }
                Err(e) => debug!(key, error = %e, "unreadable cache entry, refetching"),
            }
        }

        let bars = self.inner.fetch_bars(symbol, start, end)?;
        if let Ok(raw) = serde_json::to_string(&bars) {
            self.cache.set(&key, raw, self.ttl);
        }
        Ok(bars)
    }

    fn list_symbols(&self) -> Result<Vec<String>, TraderError> {
        self.inner.list_symbols()
    }

    fn get_data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, TraderError> {
        self.inner.get_data_range(symbol)
    }
}
