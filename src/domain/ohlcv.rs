//! OHLCV bar representation and series validation.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::error::TraderError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// max(high - low, |high - prev_close|, |low - prev_close|)
    pub fn true_range(&self, prev_close: f64) -> f64 {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }
}

/// Reject series that are not strictly increasing in time or carry unusable prices.
pub fn validate_bars(bars: &[Bar]) -> Result<(), TraderError> {
    for (index, bar) in bars.iter().enumerate() {
        let prices = [bar.open, bar.high, bar.low, bar.close];
        if prices.iter().any(|p| !p.is_finite()) || !bar.volume.is_finite() {
            return Err(TraderError::MalformedBar {
                index,
                reason: "non-finite price or volume".into(),
            });
        }
        if bar.high < bar.low {
            return Err(TraderError::MalformedBar {
                index,
                reason: format!("high {} below low {}", bar.high, bar.low),
            });
        }
        if index > 0 && bar.timestamp <= bars[index - 1].timestamp {
            return Err(TraderError::MalformedBar {
                index,
                reason: format!(
                    "timestamp {} does not follow {}",
                    bar.timestamp,
                    bars[index - 1].timestamp
                ),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn sample_bar() -> Bar {
        Bar {
            timestamp: ts(15),
            open: 100.0,
            high: 110.0,
            low: 90.0,
            close: 105.0,
            volume: 1.5,
        }
    }

    #[test]
    fn true_range_hl_dominates() {
        let bar = sample_bar();
        assert!((bar.true_range(100.0) - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn true_range_gap_up() {
        let bar = sample_bar();
        // high-low=20, |110-70|=40, |90-70|=20 → 40
        assert!((bar.true_range(70.0) - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn true_range_gap_down() {
        let bar = sample_bar();
        assert!((bar.true_range(130.0) - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn validate_accepts_increasing_series() {
        let bars: Vec<Bar> = (1..=3)
            .map(|d| Bar {
                timestamp: ts(d),
                ..sample_bar()
            })
            .collect();
        assert!(validate_bars(&bars).is_ok());
    }

    #[test]
    fn validate_rejects_duplicate_timestamp() {
        let bars = vec![sample_bar(), sample_bar()];
        let err = validate_bars(&bars).unwrap_err();
        assert!(matches!(err, TraderError::MalformedBar { index: 1, .. }));
    }

    #[test]
    fn validate_rejects_inverted_range() {
        let bars = vec![Bar {
            high: 80.0,
            ..sample_bar()
        }];
        assert!(matches!(
            validate_bars(&bars),
            Err(TraderError::MalformedBar { index: 0, .. })
        ));
    }

    #[test]
    fn validate_rejects_nan_close() {
        let bars = vec![Bar {
            close: f64::NAN,
            ..sample_bar()
        }];
        assert!(validate_bars(&bars).is_err());
    }
}
