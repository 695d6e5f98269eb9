//! Report sink port.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::domain::backtest::BacktestResult;
use crate::domain::error::TraderError;
use crate::domain::optimizer::{OptimizationOutcome, VariantResult};
use crate::domain::safety::RiskMetrics;
use crate::domain::strategy::StrategyParams;

/// Anything the CLI can hand to a report sink.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Report {
    Backtest {
        symbol: String,
        params: StrategyParams,
        result: BacktestResult,
    },
    Optimization {
        symbol: String,
        outcome: OptimizationOutcome,
    },
    AbTest {
        symbol: String,
        variants: Vec<VariantResult>,
    },
    Safety {
        metrics: Option<RiskMetrics>,
        halted: bool,
    },
}

impl Report {
    /// Flat numeric view for dashboards.
    pub fn metric_map(&self) -> BTreeMap<String, f64> {
        match self {
            Report::Backtest { result, .. } => result.metrics.to_metric_map(),
            Report::Optimization { outcome, .. } => match outcome {
                OptimizationOutcome::Best { score, metrics, .. } => {
                    let mut map = metrics.to_metric_map();
                    map.insert("score".to_string(), *score);
                    map
                }
                OptimizationOutcome::NoViableParameters { evaluated } => {
                    BTreeMap::from([("evaluated".to_string(), *evaluated as f64)])
                }
            },
            Report::AbTest { variants, .. } => variants
                .iter()
                .flat_map(|v| {
                    v.metrics
                        .to_metric_map()
                        .into_iter()
                        .map(move |(k, value)| (format!("{}.{}", v.variant, k), value))
                })
                .collect(),
            Report::Safety { metrics, .. } => metrics
                .as_ref()
                .map(RiskMetrics::to_metric_map)
                .unwrap_or_default(),
        }
    }
}

pub trait ReportPort {
    fn write(&self, report: &Report, output_path: &str) -> Result<(), TraderError>;
}
