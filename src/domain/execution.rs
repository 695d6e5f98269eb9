//! Fill simulation for long entries and exits.
//!
//! Applies slippage and percentage commission, moves cash, and appends the
//! resulting ledger records to the portfolio.

use chrono::NaiveDateTime;
use serde::Serialize;

use super::portfolio::Portfolio;
use super::position::{ExitReason, Position, TradeKind, TradeRecord};

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ExecutionConfig {
    pub commission_pct: f64,
    pub slippage_pct: f64,
}

/// Commission on `trade_value`: trade_value * pct / 100.
pub fn calculate_commission(trade_value: f64, config: &ExecutionConfig) -> f64 {
    trade_value * config.commission_pct / 100.0
}

/// Buy fills above the market: market_price * (1 + slippage_pct / 100)
pub fn apply_slippage_long_entry(market_price: f64, slippage_pct: f64) -> f64 {
    market_price * (1.0 + slippage_pct / 100.0)
}

/// Sell fills below the market: market_price * (1 - slippage_pct / 100)
pub fn apply_slippage_long_exit(market_price: f64, slippage_pct: f64) -> f64 {
    market_price * (1.0 - slippage_pct / 100.0)
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntryResult {
    Entered {
        size: f64,
        execution_price: f64,
        cost: f64,
        commission: f64,
    },
    /// Nothing affordable or a non-positive requested size.
    Rejected,
}

/// Request for a long entry. `size` is capped to what cash can pay for.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryOrder {
    pub market_price: f64,
    pub size: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub timestamp: NaiveDateTime,
}

pub fn enter_long(
    portfolio: &mut Portfolio,
    order: &EntryOrder,
    config: &ExecutionConfig,
) -> EntryResult {
    if portfolio.position.is_some() || !(order.size > 0.0) || !(order.market_price > 0.0) {
        return EntryResult::Rejected;
    }

    let execution_price = apply_slippage_long_entry(order.market_price, config.slippage_pct);
    let per_unit = execution_price * (1.0 + config.commission_pct / 100.0);
    let affordable = (portfolio.cash / per_unit).max(0.0);
    let size = order.size.min(affordable);
    if !(size > 0.0) {
        return EntryResult::Rejected;
    }

    let cost = size * execution_price;
    let commission = calculate_commission(cost, config);
    portfolio.cash -= cost + commission;

    portfolio.open_position(Position {
        entry_price: execution_price,
        size,
        stop_loss: order.stop_loss,
        take_profit: order.take_profit,
        opened_at: order.timestamp,
    });

    let equity_after = portfolio.total_equity(execution_price);
    portfolio.record_trade(TradeRecord {
        kind: TradeKind::Buy,
        exit_reason: None,
        timestamp: order.timestamp,
        price: execution_price,
        size,
        pnl: 0.0,
        equity_after,
        stop_loss: order.stop_loss,
        take_profit: order.take_profit,
    });

    EntryResult::Entered {
        size,
        execution_price,
        cost,
        commission,
    }
}

/// Close the open position, if any, and append the exit record.
///
/// PnL includes both legs' commissions, so `equity_after - pnl` is the
/// equity the trade started from.
pub fn exit_long(
    portfolio: &mut Portfolio,
    market_price: f64,
    timestamp: NaiveDateTime,
    reason: ExitReason,
    entry_commission: f64,
    config: &ExecutionConfig,
) -> Option<TradeRecord> {
    let position = portfolio.take_position()?;

    let exit_price = apply_slippage_long_exit(market_price, config.slippage_pct);
    let exit_value = position.size * exit_price;
    let exit_commission = calculate_commission(exit_value, config);
    let pnl = position.size * (exit_price - position.entry_price) - entry_commission - exit_commission;

    portfolio.cash += exit_value - exit_commission;

    let record = TradeRecord {
        kind: reason.trade_kind(),
        exit_reason: Some(reason),
        timestamp,
        price: exit_price,
        size: position.size,
        pnl,
        equity_after: portfolio.cash,
        stop_loss: position.stop_loss,
        take_profit: position.take_profit,
    };
    portfolio.record_trade(record.clone());
    Some(record)
}
