//! Rule-based signal generation over a bar and its indicator set.
//!
//! Buy: EMA_short > EMA_long AND MACD > signal AND (close > upper band OR RSI < oversold).
//! Sell: EMA_short < EMA_long AND RSI > overbought AND MACD < signal.
//! Any undefined indicator suppresses both.

use serde::Serialize;

use crate::domain::indicator::IndicatorSet;
use crate::domain::ohlcv::Bar;
use crate::domain::strategy::StrategyParams;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Signal {
    pub buy: bool,
    pub sell: bool,
    /// close - atr_multiplier * ATR; `NaN` while ATR is warming up.
    pub stop_loss: f64,
}

impl Signal {
    pub fn none(stop_loss: f64) -> Self {
        Signal {
            buy: false,
            sell: false,
            stop_loss,
        }
    }
}

pub fn generate_signal(bar: &Bar, set: &IndicatorSet, params: &StrategyParams) -> Signal {
    let stop_loss = bar.close - params.atr_multiplier * set.atr;

    if !bar.close.is_finite() || !set.is_complete() {
        return Signal::none(stop_loss);
    }

    let trend_up = set.ema_short > set.ema_long;
    let trend_down = set.ema_short < set.ema_long;
    let momentum_up = set.macd > set.macd_signal;
    let momentum_down = set.macd < set.macd_signal;
    let breakout = bar.close > set.bollinger_upper;
    let oversold = set.rsi < params.rsi_oversold;
    let overbought = set.rsi > params.rsi_overbought;

    Signal {
        buy: trend_up && momentum_up && (breakout || oversold),
        sell: trend_down && overbought && momentum_down,
        stop_loss,
    }
}

/// Signals for a whole series; `sets` must be index-aligned with `bars`.
pub fn generate_signals(
    bars: &[Bar],
    sets: &[IndicatorSet],
    params: &StrategyParams,
) -> Vec<Signal> {
    bars.iter()
        .zip(sets)
        .map(|(bar, set)| generate_signal(bar, set, params))
        .collect()
}
