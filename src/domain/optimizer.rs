//! Offline parameter search and A/B variant comparison.
//!
//! Grid candidates are scored by the mean of a chosen metric across
//! expanding-window folds: each fold trades only its test range, with every
//! earlier bar available for indicator warm-up, so no fold sees the future.

use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::domain::backtest::{run_backtest, run_backtest_window, BacktestConfig};
use crate::domain::error::TraderError;
use crate::domain::metrics::Metrics;
use crate::domain::ohlcv::{validate_bars, Bar};
use crate::domain::strategy::StrategyParams;

/// Values to try for each tunable parameter. An empty vector keeps the base value.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ParamGrid {
    pub ema_short: Vec<usize>,
    pub ema_long: Vec<usize>,
    pub rsi_period: Vec<usize>,
    pub rsi_overbought: Vec<f64>,
    pub rsi_oversold: Vec<f64>,
    pub atr_period: Vec<usize>,
    pub atr_multiplier: Vec<f64>,
    pub macd_fast: Vec<usize>,
    pub macd_slow: Vec<usize>,
    pub macd_signal: Vec<usize>,
    pub bb_period: Vec<usize>,
    pub bb_std: Vec<f64>,
}

impl ParamGrid {
    /// Number of combinations before invalid ones are dropped.
    pub fn size(&self) -> usize {
        [
            self.ema_short.len(),
            self.ema_long.len(),
            self.rsi_period.len(),
            self.rsi_overbought.len(),
            self.rsi_oversold.len(),
            self.atr_period.len(),
            self.atr_multiplier.len(),
            self.macd_fast.len(),
            self.macd_slow.len(),
            self.macd_signal.len(),
            self.bb_period.len(),
            self.bb_std.len(),
        ]
        .iter()
        .map(|&n| n.max(1))
        .product()
    }

    /// Cartesian product over `base`, skipping invalid combinations.
    ///
    /// Grid order: the first field varies slowest, `bb_std` fastest.
    pub fn candidates(&self, base: &StrategyParams) -> Vec<StrategyParams> {
        let mut out = vec![base.clone()];
        out = expand(out, &self.ema_short, |p, v| p.ema_short = v);
        out = expand(out, &self.ema_long, |p, v| p.ema_long = v);
        out = expand(out, &self.rsi_period, |p, v| p.rsi_period = v);
        out = expand(out, &self.rsi_overbought, |p, v| p.rsi_overbought = v);
        out = expand(out, &self.rsi_oversold, |p, v| p.rsi_oversold = v);
        out = expand(out, &self.atr_period, |p, v| p.atr_period = v);
        out = expand(out, &self.atr_multiplier, |p, v| p.atr_multiplier = v);
        out = expand(out, &self.macd_fast, |p, v| p.macd_fast = v);
        out = expand(out, &self.macd_slow, |p, v| p.macd_slow = v);
        out = expand(out, &self.macd_signal, |p, v| p.macd_signal = v);
        out = expand(out, &self.bb_period, |p, v| p.bb_period = v);
        out = expand(out, &self.bb_std, |p, v| p.bb_std = v);
        out.retain(StrategyParams::is_valid);
        out
    }
}

fn expand<T: Copy>(
    params: Vec<StrategyParams>,
    values: &[T],
    set: impl Fn(&mut StrategyParams, T),
) -> Vec<StrategyParams> {
    if values.is_empty() {
        return params;
    }
    let mut out = Vec::with_capacity(params.len() * values.len());
    for p in &params {
        for &value in values {
            let mut candidate = p.clone();
            set(&mut candidate, value);
            out.push(candidate);
        }
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreMetric {
    #[default]
    Sharpe,
    TotalReturn,
    ProfitFactor,
    WinRate,
}

impl ScoreMetric {
    pub fn score(self, metrics: &Metrics) -> f64 {
        match self {
            ScoreMetric::Sharpe => metrics.sharpe_ratio,
            ScoreMetric::TotalReturn => metrics.total_return,
            ScoreMetric::ProfitFactor => metrics.profit_factor,
            ScoreMetric::WinRate => metrics.win_rate,
        }
    }
}

impl FromStr for ScoreMetric {
    type Err = TraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sharpe" | "sharpe_ratio" => Ok(ScoreMetric::Sharpe),
            "total_return" | "return" => Ok(ScoreMetric::TotalReturn),
            "profit_factor" => Ok(ScoreMetric::ProfitFactor),
            "win_rate" => Ok(ScoreMetric::WinRate),
            other => Err(TraderError::invalid(
                "optimizer",
                "metric",
                format!("unknown metric '{}'", other),
            )),
        }
    }
}

impl fmt::Display for ScoreMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScoreMetric::Sharpe => "sharpe",
            ScoreMetric::TotalReturn => "total_return",
            ScoreMetric::ProfitFactor => "profit_factor",
            ScoreMetric::WinRate => "win_rate",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train: Range<usize>,
    pub test: Range<usize>,
}

/// Expanding-window splits of `n` samples into `splits` consecutive test blocks.
///
/// Each test block has `n / (splits + 1)` samples; the last block ends at `n`
/// and the training range is every sample before its test block. Empty when
/// the series is too short for the requested splits.
pub fn expanding_window_folds(n: usize, splits: usize) -> Vec<Fold> {
    if splits == 0 {
        return Vec::new();
    }
    let test_size = n / (splits + 1);
    if test_size == 0 {
        return Vec::new();
    }
    let first_test = n - splits * test_size;
    (0..splits)
        .map(|k| {
            let start = first_test + k * test_size;
            Fold {
                train: 0..start,
                test: start..start + test_size,
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizerConfig {
    pub grid: ParamGrid,
    pub splits: usize,
    pub metric: ScoreMetric,
    /// Candidates scoring below this are not viable.
    pub min_score: Option<f64>,
    /// Minimum closed trades summed over all folds.
    pub min_trades: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        OptimizerConfig {
            grid: ParamGrid::default(),
            splits: 5,
            metric: ScoreMetric::Sharpe,
            min_score: None,
            min_trades: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateScore {
    pub params: StrategyParams,
    pub score: f64,
    pub folds: usize,
    pub trades: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum OptimizationOutcome {
    Best {
        params: StrategyParams,
        score: f64,
        /// Metrics of the winning parameters over the whole series.
        metrics: Metrics,
        evaluated: usize,
    },
    NoViableParameters { evaluated: usize },
}

pub fn optimize(
    bars: &[Bar],
    base: &BacktestConfig,
    config: &OptimizerConfig,
) -> Result<OptimizationOutcome, TraderError> {
    base.validate()?;
    validate_bars(bars)?;

    let candidates = config.grid.candidates(&base.strategy);
    let folds = expanding_window_folds(bars.len(), config.splits);
    info!(
        candidates = candidates.len(),
        folds = folds.len(),
        metric = %config.metric,
        "starting grid search"
    );

    let scores: Vec<Option<CandidateScore>> = candidates
        .par_iter()
        .map(|params| score_candidate(bars, base, params, &folds, config.metric))
        .collect();
    let evaluated = scores.iter().filter(|s| s.is_some()).count();

    let mut best: Option<&CandidateScore> = None;
    for candidate in scores.iter().flatten() {
        if candidate.score.is_nan() || candidate.trades < config.min_trades {
            continue;
        }
        if config.min_score.is_some_and(|min| candidate.score < min) {
            continue;
        }
        // strict comparison keeps the earliest candidate on ties
        if best.is_none_or(|b| candidate.score > b.score) {
            best = Some(candidate);
        }
    }

    let Some(best) = best else {
        warn!(evaluated, "no candidate met the viability thresholds");
        return Ok(OptimizationOutcome::NoViableParameters { evaluated });
    };

    let full = run_backtest(
        bars,
        &BacktestConfig {
            strategy: best.params.clone(),
            ..base.clone()
        },
    )?;
    info!(score = best.score, "best parameters selected");

    Ok(OptimizationOutcome::Best {
        params: best.params.clone(),
        score: best.score,
        metrics: full.metrics,
        evaluated,
    })
}

/// Mean fold score; `None` when no fold could be evaluated.
fn score_candidate(
    bars: &[Bar],
    base: &BacktestConfig,
    params: &StrategyParams,
    folds: &[Fold],
    metric: ScoreMetric,
) -> Option<CandidateScore> {
    let config = BacktestConfig {
        strategy: params.clone(),
        ..base.clone()
    };

    let mut total = 0.0;
    let mut evaluated = 0usize;
    let mut trades = 0usize;
    for fold in folds {
        match run_backtest_window(bars, fold.test.clone(), &config) {
            Ok(result) => {
                total += metric.score(&result.metrics);
                trades += result.metrics.total_trades;
                evaluated += 1;
            }
            Err(err) => debug!(?fold, error = %err, "fold skipped"),
        }
    }

    (evaluated > 0).then(|| CandidateScore {
        params: params.clone(),
        score: total / evaluated as f64,
        folds: evaluated,
        trades,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    Base,
    Aggressive,
    Conservative,
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Variant::Base => "base",
            Variant::Aggressive => "aggressive",
            Variant::Conservative => "conservative",
        };
        f.write_str(name)
    }
}

/// The base parameters plus its aggressive and conservative perturbations.
/// Perturbations that fall outside the valid ranges are dropped.
pub fn ab_variants(base: &StrategyParams) -> Vec<(Variant, StrategyParams)> {
    let shift = |sign: i64| -> Option<StrategyParams> {
        let offset = |value: usize, by: i64| usize::try_from(value as i64 - sign * by).ok();
        let params = StrategyParams {
            ema_short: offset(base.ema_short, 2)?,
            ema_long: offset(base.ema_long, 5)?,
            rsi_period: offset(base.rsi_period, 2)?,
            rsi_overbought: base.rsi_overbought + sign as f64 * 2.0,
            rsi_oversold: base.rsi_oversold - sign as f64 * 2.0,
            ..base.clone()
        };
        params.is_valid().then_some(params)
    };

    let mut variants = vec![(Variant::Base, base.clone())];
    if let Some(p) = shift(1) {
        variants.push((Variant::Aggressive, p));
    }
    if let Some(p) = shift(-1) {
        variants.push((Variant::Conservative, p));
    }
    variants
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariantResult {
    pub variant: Variant,
    pub params: StrategyParams,
    pub metrics: Metrics,
}

/// Runs every variant over the full series and ranks them by Sharpe, best
/// first. Variants that cannot run on this series are skipped.
pub fn compare_variants(
    bars: &[Bar],
    base: &BacktestConfig,
) -> Result<Vec<VariantResult>, TraderError> {
    base.validate()?;

    let mut results: Vec<VariantResult> = ab_variants(&base.strategy)
        .into_par_iter()
        .filter_map(|(variant, params)| {
            let config = BacktestConfig {
                strategy: params.clone(),
                ..base.clone()
            };
            match run_backtest(bars, &config) {
                Ok(result) => Some(VariantResult {
                    variant,
                    params,
                    metrics: result.metrics,
                }),
                Err(err) => {
                    warn!(%variant, error = %err, "variant skipped");
                    None
                }
            }
        })
        .collect();

    results.sort_by(|a, b| b.metrics.sharpe_ratio.total_cmp(&a.metrics.sharpe_ratio));
    Ok(results)
}
