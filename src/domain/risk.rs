//! Position sizing, ATR stops and reward/risk targets.
//!
//! Sizing risks a fraction of capital between entry and stop: either a fixed
//! fraction (2% by default) or a conservatively scaled Kelly fraction when
//! win/loss statistics are available.

use serde::Serialize;
use tracing::warn;

use crate::domain::error::TraderError;
use crate::domain::position::TradeRecord;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskConfig {
    /// Multiplier applied to the clamped Kelly fraction (0.5 = half-Kelly).
    pub kelly_fraction: f64,
    pub fixed_risk_fraction: f64,
    pub reward_ratio: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        RiskConfig {
            kelly_fraction: 0.5,
            fixed_risk_fraction: 0.02,
            reward_ratio: 2.0,
        }
    }
}

impl RiskConfig {
    pub fn validate(&self) -> Result<(), TraderError> {
        if !(0.0..=1.0).contains(&self.kelly_fraction) {
            return Err(TraderError::invalid("risk", "kelly_fraction", "must be within [0, 1]"));
        }
        if !(self.fixed_risk_fraction > 0.0 && self.fixed_risk_fraction <= 1.0) {
            return Err(TraderError::invalid(
                "risk",
                "fixed_risk_fraction",
                "must be within (0, 1]",
            ));
        }
        if !(self.reward_ratio.is_finite() && self.reward_ratio > 0.0) {
            return Err(TraderError::invalid("risk", "reward_ratio", "must be positive"));
        }
        Ok(())
    }
}

/// Historical win statistics feeding the Kelly criterion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TradeStats {
    pub win_rate: f64,
    pub win_loss_ratio: f64,
}

impl TradeStats {
    /// Realised statistics from a ledger. `None` until there is at least one
    /// winning and one losing closed trade.
    pub fn from_trades(trades: &[TradeRecord]) -> Option<TradeStats> {
        let closed: Vec<f64> = trades
            .iter()
            .filter(|t| t.is_closing())
            .map(|t| t.pnl)
            .collect();
        let wins: Vec<f64> = closed.iter().copied().filter(|p| *p > 0.0).collect();
        let losses: Vec<f64> = closed.iter().copied().filter(|p| *p < 0.0).collect();
        if wins.is_empty() || losses.is_empty() {
            return None;
        }

        let avg_win = wins.iter().sum::<f64>() / wins.len() as f64;
        let avg_loss = losses.iter().sum::<f64>().abs() / losses.len() as f64;
        Some(TradeStats {
            win_rate: wins.len() as f64 / closed.len() as f64,
            win_loss_ratio: avg_win / avg_loss,
        })
    }
}

/// Entry plan for a single candidate trade.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TradeSetup {
    pub stop_loss: f64,
    pub take_profit: f64,
    pub size: f64,
}

#[derive(Debug, Clone, Default)]
pub struct RiskManager {
    config: RiskConfig,
}

impl RiskManager {
    pub fn new(config: RiskConfig) -> Self {
        RiskManager { config }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// f* = (w - (1 - w) / b) / b, clamped to [0, 1], scaled by `kelly_fraction`.
    pub fn kelly_fraction(&self, win_rate: f64, win_loss_ratio: f64) -> Result<f64, TraderError> {
        if !(0.0..=1.0).contains(&win_rate) {
            return Err(TraderError::InvalidInput {
                reason: format!("win_rate {} outside [0, 1]", win_rate),
            });
        }
        if !(win_loss_ratio > 0.0) {
            return Err(TraderError::InvalidInput {
                reason: format!("win_loss_ratio {} must be positive", win_loss_ratio),
            });
        }

        let raw = (win_rate - (1.0 - win_rate) / win_loss_ratio) / win_loss_ratio;
        let clamped = if raw.is_nan() { 0.0 } else { raw.clamp(0.0, 1.0) };
        Ok(clamped * self.config.kelly_fraction)
    }

    /// Units to buy so that hitting `stop_loss` loses the risk budget.
    ///
    /// Returns 0 (and warns) when the stop is not below entry or capital is
    /// not positive. Malformed win statistics are an error.
    pub fn position_size(
        &self,
        capital: f64,
        entry_price: f64,
        stop_loss: f64,
        stats: Option<&TradeStats>,
    ) -> Result<f64, TraderError> {
        let risk_per_unit = entry_price - stop_loss;
        if !(risk_per_unit > 0.0) {
            warn!(entry_price, stop_loss, "stop-loss is not below entry, size 0");
            return Ok(0.0);
        }
        if !(capital > 0.0) {
            warn!(capital, "non-positive capital, size 0");
            return Ok(0.0);
        }

        let risk_fraction = match stats {
            Some(s) => self.kelly_fraction(s.win_rate, s.win_loss_ratio)?,
            None => self.config.fixed_risk_fraction,
        };
        Ok(capital * risk_fraction / risk_per_unit)
    }

    /// entry + reward_ratio * (entry - stop)
    pub fn take_profit(&self, entry_price: f64, stop_loss: f64) -> f64 {
        take_profit(entry_price, stop_loss, self.config.reward_ratio)
    }

    pub fn analyze_trade_setup(
        &self,
        entry_price: f64,
        atr: f64,
        atr_multiplier: f64,
        capital: f64,
        stats: Option<&TradeStats>,
    ) -> Result<TradeSetup, TraderError> {
        let stop_loss = dynamic_stop_loss(entry_price, atr, atr_multiplier);
        let take_profit = self.take_profit(entry_price, stop_loss);
        let size = self.position_size(capital, entry_price, stop_loss, stats)?;
        Ok(TradeSetup {
            stop_loss,
            take_profit,
            size,
        })
    }
}

pub fn take_profit(entry_price: f64, stop_loss: f64, reward_ratio: f64) -> f64 {
    entry_price + reward_ratio * (entry_price - stop_loss)
}

/// entry - multiplier * atr
pub fn dynamic_stop_loss(entry_price: f64, atr: f64, multiplier: f64) -> f64 {
    entry_price - multiplier * atr
}
