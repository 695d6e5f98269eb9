//! CSV bar feed: one `<SYMBOL>.csv` per symbol under a base directory.
//!
//! Columns: `timestamp,open,high,low,close,volume`. Timestamps may be
//! `%Y-%m-%d %H:%M:%S`, `%Y-%m-%dT%H:%M:%S`, `%Y-%m-%d` or epoch milliseconds.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use tracing::debug;

use crate::domain::error::TraderError;
use crate::domain::ohlcv::Bar;
use crate::ports::data_port::DataPort;

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", symbol))
    }
}

impl DataPort for CsvAdapter {
    fn fetch_bars(
        &self,
        symbol: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<Bar>, TraderError> {
        let bars = load_csv_file(&self.csv_path(symbol))?;
        Ok(bars
            .into_iter()
            .filter(|b| b.timestamp >= start && b.timestamp <= end)
            .collect())
    }

    fn list_symbols(&self) -> Result<Vec<String>, TraderError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| TraderError::Data {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut symbols = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| TraderError::Data {
                reason: format!("directory entry error: {}", e),
            })?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "csv") {
                if let Some(stem) = path.file_stem() {
                    symbols.push(stem.to_string_lossy().into_owned());
                }
            }
        }

        symbols.sort();
        Ok(symbols)
    }

    fn get_data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, TraderError> {
        let bars = load_csv_file(&self.csv_path(symbol))?;
        Ok(match (bars.first(), bars.last()) {
            (Some(first), Some(last)) => Some((first.timestamp, last.timestamp, bars.len())),
            _ => None,
        })
    }
}

/// Every bar in a CSV file, sorted by timestamp.
pub fn load_csv_file(path: &Path) -> Result<Vec<Bar>, TraderError> {
    let content = fs::read_to_string(path).map_err(|e| TraderError::Data {
        reason: format!("failed to read {}: {}", path.display(), e),
    })?;

    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());
    let mut bars = Vec::new();

    for (line, result) in rdr.records().enumerate() {
        let record = result.map_err(|e| TraderError::Data {
            reason: format!("CSV parse error: {}", e),
        })?;

        let raw_ts = field(&record, 0, "timestamp", line)?;
        let timestamp = parse_timestamp(raw_ts).ok_or_else(|| TraderError::Data {
            reason: format!("row {}: invalid timestamp '{}'", line + 1, raw_ts),
        })?;

        bars.push(Bar {
            timestamp,
            open: number(&record, 1, "open", line)?,
            high: number(&record, 2, "high", line)?,
            low: number(&record, 3, "low", line)?,
            close: number(&record, 4, "close", line)?,
            volume: number(&record, 5, "volume", line)?,
        });
    }

    bars.sort_by_key(|b| b.timestamp);
    debug!(path = %path.display(), bars = bars.len(), "loaded csv bars");
    Ok(bars)
}

fn field<'r>(
    record: &'r csv::StringRecord,
    index: usize,
    name: &str,
    line: usize,
) -> Result<&'r str, TraderError> {
    record.get(index).ok_or_else(|| TraderError::Data {
        reason: format!("row {}: missing {} column", line + 1, name),
    })
}

fn number(
    record: &csv::StringRecord,
    index: usize,
    name: &str,
    line: usize,
) -> Result<f64, TraderError> {
    field(record, index, name, line)?
        .parse()
        .map_err(|e| TraderError::Data {
            reason: format!("row {}: invalid {} value: {}", line + 1, name, e),
        })
}

pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(ts);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }
    raw.parse::<i64>()
        .ok()
        .and_then(DateTime::from_timestamp_millis)
        .map(|dt| dt.naive_utc())
}
