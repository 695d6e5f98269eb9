//! Bar-by-bar backtest loop.
//!
//! One long position at most. Per bar the open position is checked for a
//! stop-loss breach, then a sell signal, then the take-profit; a flat book
//! enters on a buy signal sized by the risk manager. Any position left open
//! at the end is closed at the final close.

use std::ops::Range;

use serde::Serialize;
use tracing::{debug, info};

use crate::domain::error::TraderError;
use crate::domain::execution::{enter_long, exit_long, EntryOrder, EntryResult, ExecutionConfig};
use crate::domain::indicator_helpers::compute_indicator_sets;
use crate::domain::metrics::Metrics;
use crate::domain::ohlcv::{validate_bars, Bar};
use crate::domain::portfolio::{EquityPoint, Portfolio};
use crate::domain::position::{ExitReason, TradeRecord};
use crate::domain::risk::{RiskConfig, RiskManager, TradeStats};
use crate::domain::safety::{SafetyConfig, SafetyManager, TripReason};
use crate::domain::signal::generate_signal;
use crate::domain::strategy::{StopPolicy, StrategyParams};

/// Where the win statistics for Kelly sizing come from.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub enum SizingMode {
    /// Fixed fraction of capital at risk per trade.
    #[default]
    FixedFraction,
    /// Kelly sizing from externally supplied statistics.
    Kelly(TradeStats),
    /// Fixed fraction until `min_trades` trades have closed, then Kelly from
    /// the run's own ledger.
    Adaptive { min_trades: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub initial_capital: f64,
    pub strategy: StrategyParams,
    pub risk: RiskConfig,
    pub execution: ExecutionConfig,
    pub sizing: SizingMode,
    /// Gate entries through a circuit breaker when set.
    pub safety: Option<SafetyConfig>,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            initial_capital: 10_000.0,
            strategy: StrategyParams::default(),
            risk: RiskConfig::default(),
            execution: ExecutionConfig::default(),
            sizing: SizingMode::default(),
            safety: None,
        }
    }
}

impl BacktestConfig {
    pub fn validate(&self) -> Result<(), TraderError> {
        if !(self.initial_capital.is_finite() && self.initial_capital > 0.0) {
            return Err(TraderError::invalid(
                "backtest",
                "initial_capital",
                "initial_capital must be positive",
            ));
        }
        if !(self.execution.commission_pct >= 0.0) {
            return Err(TraderError::invalid(
                "backtest",
                "commission_pct",
                "commission_pct must be non-negative",
            ));
        }
        if !(self.execution.slippage_pct >= 0.0) {
            return Err(TraderError::invalid(
                "backtest",
                "slippage_pct",
                "slippage_pct must be non-negative",
            ));
        }
        self.strategy.validate()?;
        self.risk.validate()?;
        if let Some(safety) = &self.safety {
            safety.validate()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestResult {
    pub ledger: Vec<TradeRecord>,
    pub equity_curve: Vec<EquityPoint>,
    pub metrics: Metrics,
    pub bars_processed: usize,
    /// First circuit-breaker trip of the run, if any.
    pub trip_reason: Option<TripReason>,
}

impl BacktestResult {
    pub fn buys(&self) -> usize {
        self.ledger.iter().filter(|t| !t.is_closing()).count()
    }
}

pub fn run_backtest(bars: &[Bar], config: &BacktestConfig) -> Result<BacktestResult, TraderError> {
    run_backtest_window(bars, 0..bars.len(), config)
}

/// Trade only bars inside `window`; bars before it still warm up the indicators.
pub fn run_backtest_window(
    bars: &[Bar],
    window: Range<usize>,
    config: &BacktestConfig,
) -> Result<BacktestResult, TraderError> {
    config.validate()?;
    if window.start > window.end || window.end > bars.len() {
        return Err(TraderError::InvalidInput {
            reason: format!(
                "window {}..{} outside series of {} bars",
                window.start,
                window.end,
                bars.len()
            ),
        });
    }

    let history = &bars[..window.end];
    validate_bars(history)?;
    let sets = compute_indicator_sets(history, &config.strategy)?;

    let params = &config.strategy;
    let risk = RiskManager::new(config.risk.clone());
    let mut safety = config.safety.clone().map(SafetyManager::new);
    let mut trip_reason = None;

    let mut portfolio = Portfolio::new(config.initial_capital);
    let mut entry_commission = 0.0;
    let mut prev_stop = window
        .start
        .checked_sub(1)
        .map(|i| generate_signal(&bars[i], &sets[i], params).stop_loss)
        .unwrap_or(f64::NAN);

    for i in window.clone() {
        let bar = &bars[i];
        let signal = generate_signal(bar, &sets[i], params);
        let equity = portfolio.total_equity(bar.close);

        let trading_allowed = match safety.as_mut() {
            Some(guard) => {
                if guard.is_halted() {
                    guard.can_resume_trading(bar.timestamp);
                }
                let allowed = guard.check_risk(equity, bar.timestamp);
                if trip_reason.is_none() {
                    trip_reason = guard.state().trip_reason;
                }
                allowed
            }
            None => true,
        };

        if let Some(position) = portfolio.position.as_mut() {
            if params.stop_policy == StopPolicy::Recomputed && prev_stop.is_finite() {
                position.stop_loss = prev_stop;
            }

            let exit = if position.should_stop_loss(bar.close) {
                Some(ExitReason::StopLoss)
            } else if signal.sell {
                Some(ExitReason::Signal)
            } else if position.should_take_profit(bar.close) {
                Some(ExitReason::TakeProfit)
            } else {
                None
            };

            if let Some(reason) = exit {
                if let Some(record) = exit_long(
                    &mut portfolio,
                    bar.close,
                    bar.timestamp,
                    reason,
                    entry_commission,
                    &config.execution,
                ) {
                    debug!(bar = i, %reason, pnl = record.pnl, "position closed");
                }
            }
        } else if signal.buy && trading_allowed {
            let stats = sizing_stats(&config.sizing, &portfolio.ledger);
            let setup = risk.analyze_trade_setup(
                bar.close,
                sets[i].atr,
                params.atr_multiplier,
                equity,
                stats.as_ref(),
            )?;
            let size = setup.size.min(equity / bar.close);

            let size_ok = safety
                .as_ref()
                .is_none_or(|guard| guard.check_position_size(size * bar.close, equity));

            if size > 0.0 && size_ok {
                let order = EntryOrder {
                    market_price: bar.close,
                    size,
                    stop_loss: setup.stop_loss,
                    take_profit: setup.take_profit,
                    timestamp: bar.timestamp,
                };
                if let EntryResult::Entered {
                    size, commission, ..
                } = enter_long(&mut portfolio, &order, &config.execution)
                {
                    entry_commission = commission;
                    debug!(bar = i, size, stop = setup.stop_loss, "position opened");
                }
            } else {
                debug!(bar = i, size, size_ok, "buy signal skipped");
            }
        }

        prev_stop = signal.stop_loss;
        portfolio.record_equity(bar.timestamp, portfolio.total_equity(bar.close));
    }

    if let Some(last) = window.clone().last().map(|i| &bars[i]) {
        if exit_long(
            &mut portfolio,
            last.close,
            last.timestamp,
            ExitReason::EndOfData,
            entry_commission,
            &config.execution,
        )
        .is_some()
        {
            let cash = portfolio.cash;
            if let Some(point) = portfolio.equity_curve.last_mut() {
                point.equity = cash;
            }
        }
    }

    let metrics = Metrics::compute(&portfolio);
    info!(
        bars = window.len(),
        trades = metrics.total_trades,
        total_return = metrics.total_return,
        "backtest complete"
    );

    Ok(BacktestResult {
        ledger: portfolio.ledger,
        equity_curve: portfolio.equity_curve,
        metrics,
        bars_processed: window.len(),
        trip_reason,
    })
}

fn sizing_stats(mode: &SizingMode, ledger: &[TradeRecord]) -> Option<TradeStats> {
    match mode {
        SizingMode::FixedFraction => None,
        SizingMode::Kelly(stats) => Some(*stats),
        SizingMode::Adaptive { min_trades } => {
            let closed = ledger.iter().filter(|t| t.is_closing()).count();
            if closed >= *min_trades {
                TradeStats::from_trades(ledger)
            } else {
                None
            }
        }
    }
}
