//! Exponential Moving Average indicator.
//!
//! k = 2/(n+1), seeded with the first close, then EMA[i] = C[i]*k + EMA[i-1]*(1-k).
//! Warmup: first (n-1) bars are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::Bar;

pub fn calculate_ema(bars: &[Bar], period: usize) -> IndicatorSeries {
    if period == 0 || bars.is_empty() {
        return IndicatorSeries::empty(IndicatorType::Ema(period));
    }

    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let values = ema_values(&closes, period)
        .into_iter()
        .zip(bars)
        .enumerate()
        .map(|(i, (ema, bar))| IndicatorPoint {
            timestamp: bar.timestamp,
            valid: i + 1 >= period,
            value: IndicatorValue::Simple(ema),
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Ema(period),
        values,
    }
}

/// Raw recursive EMA over any input, seeded with `input[0]`. No warm-up masking.
pub(crate) fn ema_values(input: &[f64], period: usize) -> Vec<f64> {
    let mut out = Vec::with_capacity(input.len());
    let Some(&first) = input.first() else {
        return out;
    };
    let k = 2.0 / (period as f64 + 1.0);
    let mut ema = first;
    out.push(ema);
    for &value in &input[1..] {
        ema = value * k + ema * (1.0 - k);
        out.push(ema);
    }
    out
}
