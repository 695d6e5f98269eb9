//! Performance metrics computed from the trade ledger.

use std::collections::BTreeMap;

use serde::Serialize;

use super::portfolio::Portfolio;
use super::position::TradeRecord;
use super::stats::{mean, sample_stddev};

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metrics {
    pub total_return: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub total_trades: usize,
    pub trades_won: usize,
    pub trades_lost: usize,
    pub trades_breakeven: usize,
    pub avg_trade: f64,
    pub std_trade: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub final_equity: f64,
}

impl Metrics {
    pub fn compute(portfolio: &Portfolio) -> Self {
        Self::from_ledger(&portfolio.ledger, portfolio.initial_capital)
    }

    /// Zero closing trades yield a zeroed report with `final_equity` = capital.
    pub fn from_ledger(ledger: &[TradeRecord], initial_capital: f64) -> Self {
        let final_equity = ledger
            .last()
            .map(|t| t.equity_after)
            .unwrap_or(initial_capital);

        let total_return = if initial_capital > 0.0 {
            final_equity / initial_capital - 1.0
        } else {
            0.0
        };

        let closing: Vec<&TradeRecord> = ledger.iter().filter(|t| t.is_closing()).collect();
        let pnls: Vec<f64> = closing.iter().map(|t| t.pnl).collect();
        let returns: Vec<f64> = closing.iter().filter_map(|t| t.trade_return()).collect();

        let mut trades_won = 0usize;
        let mut trades_lost = 0usize;
        let mut trades_breakeven = 0usize;
        let mut total_wins = 0.0_f64;
        let mut total_losses = 0.0_f64;
        let mut largest_win = 0.0_f64;
        let mut largest_loss = 0.0_f64;

        for &pnl in &pnls {
            if pnl > 0.0 {
                trades_won += 1;
                total_wins += pnl;
                largest_win = largest_win.max(pnl);
            } else if pnl < 0.0 {
                trades_lost += 1;
                total_losses += pnl.abs();
                largest_loss = largest_loss.max(pnl.abs());
            } else {
                trades_breakeven += 1;
            }
        }

        let total_trades = pnls.len();
        let win_rate = if total_trades > 0 {
            trades_won as f64 / total_trades as f64
        } else {
            0.0
        };

        let profit_factor = if total_losses > 0.0 {
            total_wins / total_losses
        } else if total_wins > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        let avg_win = if trades_won > 0 {
            total_wins / trades_won as f64
        } else {
            0.0
        };
        let avg_loss = if trades_lost > 0 {
            total_losses / trades_lost as f64
        } else {
            0.0
        };

        Metrics {
            total_return,
            sharpe_ratio: sharpe_ratio(&returns),
            max_drawdown: max_drawdown(initial_capital, ledger),
            win_rate,
            profit_factor,
            total_trades,
            trades_won,
            trades_lost,
            trades_breakeven,
            avg_trade: mean(&pnls),
            std_trade: sample_stddev(&pnls),
            avg_win,
            avg_loss,
            largest_win,
            largest_loss,
            final_equity,
        }
    }

    /// Flat numeric mapping for dashboards. Non-finite values are kept as-is.
    pub fn to_metric_map(&self) -> BTreeMap<String, f64> {
        [
            ("total_return", self.total_return),
            ("sharpe_ratio", self.sharpe_ratio),
            ("max_drawdown", self.max_drawdown),
            ("win_rate", self.win_rate),
            ("profit_factor", self.profit_factor),
            ("total_trades", self.total_trades as f64),
            ("trades_won", self.trades_won as f64),
            ("trades_lost", self.trades_lost as f64),
            ("trades_breakeven", self.trades_breakeven as f64),
            ("avg_trade", self.avg_trade),
            ("std_trade", self.std_trade),
            ("avg_win", self.avg_win),
            ("avg_loss", self.avg_loss),
            ("largest_win", self.largest_win),
            ("largest_loss", self.largest_loss),
            ("final_equity", self.final_equity),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }
}

/// sqrt(252) * mean / sample stddev of per-trade returns.
fn sharpe_ratio(returns: &[f64]) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let stddev = sample_stddev(returns);
    if stddev > 0.0 {
        TRADING_DAYS_PER_YEAR.sqrt() * mean(returns) / stddev
    } else {
        0.0
    }
}

/// Largest peak-to-trough fall over the ledger's equity, starting from capital.
fn max_drawdown(initial_capital: f64, ledger: &[TradeRecord]) -> f64 {
    let mut peak = initial_capital;
    let mut max_dd = 0.0_f64;
    for equity in ledger.iter().map(|t| t.equity_after) {
        peak = peak.max(equity);
        if peak > 0.0 {
            max_dd = max_dd.max((peak - equity) / peak);
        }
    }
    max_dd
}
