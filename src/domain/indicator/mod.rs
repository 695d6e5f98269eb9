//! Technical indicator implementations.
//!
//! This module provides types for representing indicator values and series:
//! - `IndicatorPoint`: A single point in an indicator time series
//! - `IndicatorValue`: Enum for different indicator output shapes
//! - `IndicatorType`: Enum for indicator identity + parameters
//! - `IndicatorSeries`: A time series of indicator values
//! - `IndicatorSet`: All strategy inputs for one bar, `NaN` while warming up

pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod rsi;

pub use atr::calculate_atr;
pub use bollinger::calculate_bollinger;
pub use ema::calculate_ema;
pub use macd::calculate_macd;
pub use rsi::calculate_rsi;

use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone)]
pub struct IndicatorPoint {
    pub timestamp: NaiveDateTime,
    pub valid: bool,
    pub value: IndicatorValue,
}

#[derive(Debug, Clone)]
pub enum IndicatorValue {
    Simple(f64),
    Macd {
        line: f64,
        signal: f64,
        histogram: f64,
    },
    Bollinger {
        upper: f64,
        middle: f64,
        lower: f64,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum IndicatorType {
    Ema(usize),
    Rsi(usize),
    Atr(usize),
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
    Bollinger {
        period: usize,
        stddev_mult: f64,
    },
}

#[derive(Debug, Clone)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    pub fn empty(indicator_type: IndicatorType) -> Self {
        IndicatorSeries {
            indicator_type,
            values: Vec::new(),
        }
    }

    /// Value of a single-valued series at `index`, `None` while warming up.
    pub fn simple_at(&self, index: usize) -> Option<f64> {
        match self.values.get(index) {
            Some(IndicatorPoint {
                valid: true,
                value: IndicatorValue::Simple(v),
                ..
            }) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Ema(period) => write!(f, "EMA({})", period),
            IndicatorType::Rsi(period) => write!(f, "RSI({})", period),
            IndicatorType::Atr(period) => write!(f, "ATR({})", period),
            IndicatorType::Macd { fast, slow, signal } => {
                write!(f, "MACD({},{},{})", fast, slow, signal)
            }
            IndicatorType::Bollinger {
                period,
                stddev_mult,
            } => write!(f, "BOLLINGER({},{})", period, stddev_mult),
        }
    }
}

/// Per-bar strategy inputs. Entries still inside their warm-up window are `NaN`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IndicatorSet {
    pub ema_short: f64,
    pub ema_long: f64,
    pub rsi: f64,
    pub atr: f64,
    pub macd: f64,
    pub macd_signal: f64,
    pub macd_histogram: f64,
    pub bollinger_upper: f64,
    pub bollinger_mid: f64,
    pub bollinger_lower: f64,
}

impl IndicatorSet {
    pub fn undefined() -> Self {
        IndicatorSet {
            ema_short: f64::NAN,
            ema_long: f64::NAN,
            rsi: f64::NAN,
            atr: f64::NAN,
            macd: f64::NAN,
            macd_signal: f64::NAN,
            macd_histogram: f64::NAN,
            bollinger_upper: f64::NAN,
            bollinger_mid: f64::NAN,
            bollinger_lower: f64::NAN,
        }
    }

    /// True once every field has left its warm-up window.
    pub fn is_complete(&self) -> bool {
        [
            self.ema_short,
            self.ema_long,
            self.rsi,
            self.atr,
            self.macd,
            self.macd_signal,
            self.macd_histogram,
            self.bollinger_upper,
            self.bollinger_mid,
            self.bollinger_lower,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}
