//! Builds the per-bar `IndicatorSet` table the signal generator consumes.

use tracing::debug;

use crate::domain::error::TraderError;
use crate::domain::indicator::{
    calculate_atr, calculate_bollinger, calculate_ema, calculate_macd, calculate_rsi,
    IndicatorSeries, IndicatorSet, IndicatorValue,
};
use crate::domain::ohlcv::Bar;
use crate::domain::strategy::StrategyParams;

/// One `IndicatorSet` per bar, index-aligned with `bars`.
///
/// Fails with `InsufficientData` when the series is shorter than the largest
/// configured period. Warm-up entries are `NaN`.
pub fn compute_indicator_sets(
    bars: &[Bar],
    params: &StrategyParams,
) -> Result<Vec<IndicatorSet>, TraderError> {
    let minimum = params.largest_period();
    if bars.len() < minimum {
        return Err(TraderError::InsufficientData {
            bars: bars.len(),
            minimum,
        });
    }

    let ema_short = calculate_ema(bars, params.ema_short);
    let ema_long = calculate_ema(bars, params.ema_long);
    let rsi = calculate_rsi(bars, params.rsi_period);
    let atr = calculate_atr(bars, params.atr_period);
    let macd = calculate_macd(bars, params.macd_fast, params.macd_slow, params.macd_signal);
    let bollinger = calculate_bollinger(bars, params.bb_period, params.bb_std);

    let sets: Vec<IndicatorSet> = (0..bars.len())
        .map(|i| {
            let mut set = IndicatorSet::undefined();
            set.ema_short = simple_or_nan(&ema_short, i);
            set.ema_long = simple_or_nan(&ema_long, i);
            set.rsi = simple_or_nan(&rsi, i);
            set.atr = simple_or_nan(&atr, i);

            if let Some(point) = macd.values.get(i).filter(|p| p.valid) {
                if let IndicatorValue::Macd {
                    line,
                    signal,
                    histogram,
                } = point.value
                {
                    set.macd = line;
                    set.macd_signal = signal;
                    set.macd_histogram = histogram;
                }
            }

            if let Some(point) = bollinger.values.get(i).filter(|p| p.valid) {
                if let IndicatorValue::Bollinger {
                    upper,
                    middle,
                    lower,
                } = point.value
                {
                    set.bollinger_upper = upper;
                    set.bollinger_mid = middle;
                    set.bollinger_lower = lower;
                }
            }
            set
        })
        .collect();

    debug!(
        bars = bars.len(),
        first_complete = sets.iter().position(IndicatorSet::is_complete),
        "computed indicator sets"
    );
    Ok(sets)
}

fn simple_or_nan(series: &IndicatorSeries, index: usize) -> f64 {
    series.simple_at(index).unwrap_or(f64::NAN)
}
