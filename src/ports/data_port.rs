//! Bar feed port.

use chrono::NaiveDateTime;

use crate::domain::error::TraderError;
use crate::domain::ohlcv::Bar;

pub trait DataPort {
    /// Bars for `symbol` with `start <= timestamp <= end`, oldest first.
    fn fetch_bars(
        &self,
        symbol: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<Bar>, TraderError>;

    fn list_symbols(&self) -> Result<Vec<String>, TraderError>;

    /// First timestamp, last timestamp and bar count, `None` when empty.
    fn get_data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, TraderError>;
}
