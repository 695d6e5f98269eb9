#![allow(dead_code)]

use std::cell::Cell;
use std::collections::HashMap;
use std::path::Path;

use chrono::{Duration, NaiveDate, NaiveDateTime};
pub use cryptotrader::domain::ohlcv::Bar;
use cryptotrader::domain::error::TraderError;
use cryptotrader::ports::data_port::DataPort;

/// In-memory bar feed that counts `fetch_bars` calls.
pub struct MockDataPort {
    pub data: HashMap<String, Vec<Bar>>,
    pub errors: HashMap<String, String>,
    pub fetches: Cell<usize>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
            fetches: Cell::new(0),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<Bar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }

    fn check(&self, symbol: &str) -> Result<(), TraderError> {
        match self.errors.get(symbol) {
            Some(reason) => Err(TraderError::Data {
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl DataPort for MockDataPort {
    fn fetch_bars(
        &self,
        symbol: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<Bar>, TraderError> {
        self.fetches.set(self.fetches.get() + 1);
        self.check(symbol)?;
        Ok(self
            .data
            .get(symbol)
            .map(|bars| {
                bars.iter()
                    .filter(|b| b.timestamp >= start && b.timestamp <= end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn list_symbols(&self) -> Result<Vec<String>, TraderError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }

    fn get_data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, TraderError> {
        self.check(symbol)?;
        match self.data.get(symbol) {
            Some(bars) if !bars.is_empty() => {
                let min = bars.iter().map(|b| b.timestamp).min().unwrap();
                let max = bars.iter().map(|b| b.timestamp).max().unwrap();
                Ok(Some((min, max, bars.len())))
            }
            _ => Ok(None),
        }
    }
}

pub fn day(n: i64) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + Duration::days(n)
}

/// Daily bars with a one-unit range around each close.
pub fn make_bars(closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| Bar {
            timestamp: day(i as i64),
            open: close,
            high: close + 0.5,
            low: close - 0.5,
            close,
            volume: 100.0,
        })
        .collect()
}

/// 20 flat bars at 100, then +1 per bar for 100 bars in total.
pub fn linear_uptrend() -> Vec<f64> {
    (0..100)
        .map(|i| if i < 20 { 100.0 } else { 100.0 + (i - 19) as f64 })
        .collect()
}

/// `linear_uptrend` with a +10 gap from bar 55 on.
/// Default parameters buy at bar 55 and take profit at bar 62.
pub fn gap_uptrend() -> Vec<f64> {
    linear_uptrend()
        .into_iter()
        .enumerate()
        .map(|(i, close)| if i >= 55 { close + 10.0 } else { close })
        .collect()
}

pub fn write_csv(dir: &Path, symbol: &str, bars: &[Bar]) {
    let mut content = String::from("timestamp,open,high,low,close,volume\n");
    for b in bars {
        content.push_str(&format!(
            "{},{},{},{},{},{}\n",
            b.timestamp.format("%Y-%m-%d %H:%M:%S"),
            b.open,
            b.high,
            b.low,
            b.close,
            b.volume
        ));
    }
    std::fs::write(dir.join(format!("{}.csv", symbol)), content).unwrap();
}

pub fn exit_code_eq(a: std::process::ExitCode, b: std::process::ExitCode) -> bool {
    format!("{:?}", a) == format!("{:?}", b)
}
