//! Open position and the append-only trade ledger records.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt;

/// A single long position; at most one is open at a time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Position {
    pub entry_price: f64,
    pub size: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub opened_at: NaiveDateTime,
}

impl Position {
    pub fn market_value(&self, price: f64) -> f64 {
        self.size * price
    }

    /// An undefined stop never triggers.
    pub fn should_stop_loss(&self, price: f64) -> bool {
        self.stop_loss.is_finite() && price <= self.stop_loss
    }

    pub fn should_take_profit(&self, price: f64) -> bool {
        self.take_profit.is_finite() && price >= self.take_profit
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeKind {
    Buy,
    /// Exit driven by a sell signal.
    Sell,
    /// Exit driven by a protective level or the end of the data.
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    StopLoss,
    Signal,
    TakeProfit,
    EndOfData,
}

impl ExitReason {
    pub fn trade_kind(self) -> TradeKind {
        match self {
            ExitReason::Signal => TradeKind::Sell,
            _ => TradeKind::Close,
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ExitReason::StopLoss => "stop_loss",
            ExitReason::Signal => "signal",
            ExitReason::TakeProfit => "take_profit",
            ExitReason::EndOfData => "end_of_data",
        };
        f.write_str(label)
    }
}

/// One ledger line. Never mutated once appended.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeRecord {
    pub kind: TradeKind,
    pub exit_reason: Option<ExitReason>,
    pub timestamp: NaiveDateTime,
    pub price: f64,
    pub size: f64,
    pub pnl: f64,
    pub equity_after: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
}

impl TradeRecord {
    pub fn is_closing(&self) -> bool {
        self.kind != TradeKind::Buy
    }

    /// Realised return of a closing trade relative to equity before the close.
    pub fn trade_return(&self) -> Option<f64> {
        if !self.is_closing() {
            return None;
        }
        let equity_before = self.equity_after - self.pnl;
        if equity_before <= 0.0 {
            return None;
        }
        Some(self.pnl / equity_before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn opened() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
    }

    fn sample_position() -> Position {
        Position {
            entry_price: 50.0,
            size: 2.5,
            stop_loss: 45.0,
            take_profit: 60.0,
            opened_at: opened(),
        }
    }

    fn record(kind: TradeKind, pnl: f64, equity_after: f64) -> TradeRecord {
        TradeRecord {
            kind,
            exit_reason: None,
            timestamp: opened(),
            price: 55.0,
            size: 2.5,
            pnl,
            equity_after,
            stop_loss: 45.0,
            take_profit: 60.0,
        }
    }

    #[test]
    fn market_value_scales_with_size() {
        let pos = sample_position();
        assert!((pos.market_value(55.0) - 137.5).abs() < f64::EPSILON);
    }

    #[test]
    fn stop_loss_triggers_at_or_below() {
        let pos = sample_position();
        assert!(pos.should_stop_loss(45.0));
        assert!(pos.should_stop_loss(40.0));
        assert!(!pos.should_stop_loss(45.01));
    }

    #[test]
    fn take_profit_triggers_at_or_above() {
        let pos = sample_position();
        assert!(pos.should_take_profit(60.0));
        assert!(!pos.should_take_profit(59.99));
    }

    #[test]
    fn undefined_levels_never_trigger() {
        let pos = Position {
            stop_loss: f64::NAN,
            take_profit: f64::NAN,
            ..sample_position()
        };
        assert!(!pos.should_stop_loss(0.0));
        assert!(!pos.should_take_profit(1e9));
    }

    #[test]
    fn exit_reason_kind() {
        assert_eq!(ExitReason::Signal.trade_kind(), TradeKind::Sell);
        assert_eq!(ExitReason::StopLoss.trade_kind(), TradeKind::Close);
        assert_eq!(ExitReason::EndOfData.to_string(), "end_of_data");
    }

    #[test]
    fn trade_return_of_closing_record() {
        let close = record(TradeKind::Close, 100.0, 10100.0);
        assert!((close.trade_return().unwrap() - 0.01).abs() < 1e-12);
        assert!(record(TradeKind::Buy, 0.0, 10000.0).trade_return().is_none());
    }
}
