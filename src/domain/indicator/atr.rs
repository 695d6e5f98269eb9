//! Average True Range.
//!
//! TR[0] = high - low; TR[i] = max(high - low, |high - prev_close|, |low - prev_close|).
//! Seeded with the mean of the first n true ranges, then Wilder smoothing:
//! ATR[i] = (ATR[i-1] * (n-1) + TR[i]) / n.
//! Warmup: first (n-1) bars are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::Bar;

pub fn calculate_atr(bars: &[Bar], period: usize) -> IndicatorSeries {
    if period == 0 || bars.is_empty() {
        return IndicatorSeries::empty(IndicatorType::Atr(period));
    }

    let true_ranges: Vec<f64> = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| match i {
            0 => bar.high - bar.low,
            _ => bar.true_range(bars[i - 1].close),
        })
        .collect();

    let mut values = Vec::with_capacity(bars.len());
    let mut atr = 0.0;
    let mut seed_sum = 0.0;

    for (i, (bar, tr)) in bars.iter().zip(&true_ranges).enumerate() {
        let valid = i + 1 >= period;
        if i + 1 < period {
            seed_sum += tr;
        } else if i + 1 == period {
            atr = (seed_sum + tr) / period as f64;
        } else {
            atr = (atr * (period - 1) as f64 + tr) / period as f64;
        }

        values.push(IndicatorPoint {
            timestamp: bar.timestamp,
            valid,
            value: IndicatorValue::Simple(if valid { atr } else { 0.0 }),
        });
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Atr(period),
        values,
    }
}
