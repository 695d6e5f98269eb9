//! Typed configuration built from a ConfigPort.
//!
//! Every key is optional and falls back to the documented default. Values
//! that are present but unparsable or out of range are rejected with
//! `ConfigInvalid`, never silently replaced.

use tracing::debug;

use crate::domain::backtest::{BacktestConfig, SizingMode};
use crate::domain::error::TraderError;
use crate::domain::execution::ExecutionConfig;
use crate::domain::optimizer::{OptimizerConfig, ParamGrid, ScoreMetric};
use crate::domain::risk::{RiskConfig, TradeStats};
use crate::domain::safety::SafetyConfig;
use crate::domain::strategy::{StopPolicy, StrategyParams};
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_ADAPTIVE_MIN_TRADES: usize = 10;

/// Everything the CLI needs, validated.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub backtest: BacktestConfig,
    pub optimizer: OptimizerConfig,
}

pub fn load_app_config(config: &dyn ConfigPort) -> Result<AppConfig, TraderError> {
    let backtest = backtest_config_from(config)?;
    let optimizer = optimizer_config_from(config)?;
    debug!(
        sizing = ?backtest.sizing,
        circuit_breaker = backtest.safety.is_some(),
        grid = optimizer.grid.size(),
        "configuration loaded"
    );
    Ok(AppConfig {
        backtest,
        optimizer,
    })
}

pub fn validate_config(config: &dyn ConfigPort) -> Result<(), TraderError> {
    load_app_config(config).map(|_| ())
}

pub fn strategy_params_from(config: &dyn ConfigPort) -> Result<StrategyParams, TraderError> {
    let d = StrategyParams::default();
    let s = "strategy";
    let stop_policy = match config.get_string(s, "stop_policy") {
        Some(raw) => raw.parse::<StopPolicy>()?,
        None => d.stop_policy,
    };

    let params = StrategyParams {
        ema_short: read_usize(config, s, "ema_short", d.ema_short)?,
        ema_long: read_usize(config, s, "ema_long", d.ema_long)?,
        rsi_period: read_usize(config, s, "rsi_period", d.rsi_period)?,
        rsi_overbought: read_f64(config, s, "rsi_overbought", d.rsi_overbought)?,
        rsi_oversold: read_f64(config, s, "rsi_oversold", d.rsi_oversold)?,
        atr_period: read_usize(config, s, "atr_period", d.atr_period)?,
        atr_multiplier: read_f64(config, s, "atr_multiplier", d.atr_multiplier)?,
        macd_fast: read_usize(config, s, "macd_fast", d.macd_fast)?,
        macd_slow: read_usize(config, s, "macd_slow", d.macd_slow)?,
        macd_signal: read_usize(config, s, "macd_signal", d.macd_signal)?,
        bb_period: read_usize(config, s, "bb_period", d.bb_period)?,
        bb_std: read_f64(config, s, "bb_std", d.bb_std)?,
        stop_policy,
    };
    params.validate()?;
    Ok(params)
}

pub fn risk_config_from(config: &dyn ConfigPort) -> Result<RiskConfig, TraderError> {
    let d = RiskConfig::default();
    let risk = RiskConfig {
        kelly_fraction: read_f64(config, "risk", "kelly_fraction", d.kelly_fraction)?,
        fixed_risk_fraction: read_f64(config, "risk", "fixed_risk_fraction", d.fixed_risk_fraction)?,
        reward_ratio: read_f64(config, "risk", "reward_ratio", d.reward_ratio)?,
    };
    risk.validate()?;
    Ok(risk)
}

/// `[risk] sizing`: `fixed` (default), `kelly` with supplied statistics, or
/// `adaptive` which switches to the run's own statistics after `min_trades`.
pub fn sizing_mode_from(config: &dyn ConfigPort) -> Result<SizingMode, TraderError> {
    let mode = config
        .get_string("risk", "sizing")
        .map(|s| s.trim().to_ascii_lowercase())
        .unwrap_or_else(|| "fixed".to_string());

    match mode.as_str() {
        "fixed" | "fixed_fraction" => Ok(SizingMode::FixedFraction),
        "kelly" => {
            let win_rate = require_f64(config, "risk", "win_rate")?;
            let win_loss_ratio = require_f64(config, "risk", "win_loss_ratio")?;
            if !(0.0..=1.0).contains(&win_rate) {
                return Err(TraderError::invalid("risk", "win_rate", "must be within [0, 1]"));
            }
            if !(win_loss_ratio.is_finite() && win_loss_ratio > 0.0) {
                return Err(TraderError::invalid("risk", "win_loss_ratio", "must be positive"));
            }
            Ok(SizingMode::Kelly(TradeStats {
                win_rate,
                win_loss_ratio,
            }))
        }
        "adaptive" => {
            let min_trades = read_usize(config, "risk", "min_trades", DEFAULT_ADAPTIVE_MIN_TRADES)?;
            if min_trades == 0 {
                return Err(TraderError::invalid("risk", "min_trades", "must be at least 1"));
            }
            Ok(SizingMode::Adaptive { min_trades })
        }
        other => Err(TraderError::invalid(
            "risk",
            "sizing",
            format!("unknown sizing mode '{}', expected fixed, kelly or adaptive", other),
        )),
    }
}

pub fn safety_config_from(config: &dyn ConfigPort) -> Result<SafetyConfig, TraderError> {
    let d = SafetyConfig::default();
    let s = "safety";
    let recovery_days = read_usize(config, s, "recovery_days", d.recovery_days.max(0) as usize)?;
    let safety = SafetyConfig {
        max_drawdown: read_f64(config, s, "max_drawdown", d.max_drawdown)?,
        max_daily_loss: read_f64(config, s, "max_daily_loss", d.max_daily_loss)?,
        max_position_size: read_f64(config, s, "max_position_size", d.max_position_size)?,
        volatility_threshold: read_f64(config, s, "volatility_threshold", d.volatility_threshold)?,
        lookback: read_usize(config, s, "lookback", d.lookback)?,
        recovery_days: i64::try_from(recovery_days)
            .map_err(|_| TraderError::invalid(s, "recovery_days", "value too large"))?,
        history_capacity: read_usize(config, s, "history_capacity", d.history_capacity)?,
    };
    safety.validate()?;
    Ok(safety)
}

pub fn backtest_config_from(config: &dyn ConfigPort) -> Result<BacktestConfig, TraderError> {
    let d = BacktestConfig::default();
    let safety = if config.get_bool("backtest", "circuit_breaker", false) {
        Some(safety_config_from(config)?)
    } else {
        None
    };

    let backtest = BacktestConfig {
        initial_capital: read_f64(config, "backtest", "initial_capital", d.initial_capital)?,
        strategy: strategy_params_from(config)?,
        risk: risk_config_from(config)?,
        execution: ExecutionConfig {
            commission_pct: read_f64(config, "backtest", "commission_pct", 0.0)?,
            slippage_pct: read_f64(config, "backtest", "slippage_pct", 0.0)?,
        },
        sizing: sizing_mode_from(config)?,
        safety,
    };
    backtest.validate()?;
    Ok(backtest)
}

pub fn optimizer_config_from(config: &dyn ConfigPort) -> Result<OptimizerConfig, TraderError> {
    let d = OptimizerConfig::default();
    let o = "optimizer";

    let grid = ParamGrid {
        ema_short: read_list(config, o, "ema_short", parse_usize)?,
        ema_long: read_list(config, o, "ema_long", parse_usize)?,
        rsi_period: read_list(config, o, "rsi_period", parse_usize)?,
        rsi_overbought: read_list(config, o, "rsi_overbought", parse_f64)?,
        rsi_oversold: read_list(config, o, "rsi_oversold", parse_f64)?,
        atr_period: read_list(config, o, "atr_period", parse_usize)?,
        atr_multiplier: read_list(config, o, "atr_multiplier", parse_f64)?,
        macd_fast: read_list(config, o, "macd_fast", parse_usize)?,
        macd_slow: read_list(config, o, "macd_slow", parse_usize)?,
        macd_signal: read_list(config, o, "macd_signal", parse_usize)?,
        bb_period: read_list(config, o, "bb_period", parse_usize)?,
        bb_std: read_list(config, o, "bb_std", parse_f64)?,
    };

    let splits = read_usize(config, o, "splits", d.splits)?;
    if splits == 0 {
        return Err(TraderError::invalid(o, "splits", "must be at least 1"));
    }

    let metric = match config.get_string(o, "metric") {
        Some(raw) => raw.parse::<ScoreMetric>()?,
        None => d.metric,
    };

    let min_score = match config.get_string(o, "min_score") {
        Some(raw) => Some(
            parse_f64(&raw).ok_or_else(|| TraderError::invalid(o, "min_score", "not a number"))?,
        ),
        None => None,
    };

    Ok(OptimizerConfig {
        grid,
        splits,
        metric,
        min_score,
        min_trades: read_usize(config, o, "min_trades", d.min_trades)?,
    })
}

fn parse_f64(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Accepts `12` and `12.0`; rejects fractions and negatives.
fn parse_usize(raw: &str) -> Option<usize> {
    let value = parse_f64(raw)?;
    if value < 0.0 || value.fract() != 0.0 || value > u32::MAX as f64 {
        return None;
    }
    Some(value as usize)
}

fn read_f64(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, TraderError> {
    match config.get_string(section, key) {
        Some(raw) => parse_f64(&raw).ok_or_else(|| {
            TraderError::invalid(section, key, format!("'{}' is not a number", raw.trim()))
        }),
        None => Ok(default),
    }
}

fn require_f64(config: &dyn ConfigPort, section: &str, key: &str) -> Result<f64, TraderError> {
    if config.get_string(section, key).is_none() {
        return Err(TraderError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        });
    }
    read_f64(config, section, key, f64::NAN)
}

fn read_usize(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: usize,
) -> Result<usize, TraderError> {
    match config.get_string(section, key) {
        Some(raw) => parse_usize(&raw).ok_or_else(|| {
            TraderError::invalid(
                section,
                key,
                format!("'{}' is not a non-negative integer", raw.trim()),
            )
        }),
        None => Ok(default),
    }
}

fn read_list<T>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    parse: fn(&str) -> Option<T>,
) -> Result<Vec<T>, TraderError> {
    config
        .get_list(section, key)
        .iter()
        .map(|item| {
            parse(item).ok_or_else(|| {
                TraderError::invalid(section, key, format!("invalid list entry '{}'", item))
            })
        })
        .collect()
}
