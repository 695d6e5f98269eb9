//! JSON report adapter implementing ReportPort.
//!
//! Output shape: `{ "report": <Report>, "metrics": { name: value } }`.
//! Non-finite floats (an infinite profit factor, say) serialize as `null`.

use std::fs;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::domain::error::TraderError;
use crate::ports::report_port::{Report, ReportPort};

#[derive(Serialize)]
struct ReportDocument<'a> {
    report: &'a Report,
    metrics: std::collections::BTreeMap<String, f64>,
}

#[derive(Debug)]
pub struct JsonReportAdapter {
    pretty: bool,
}

impl Default for JsonReportAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonReportAdapter {
    pub fn new() -> Self {
        Self { pretty: true }
    }

    pub fn compact() -> Self {
        Self { pretty: false }
    }

    pub fn render(&self, report: &Report) -> Result<String, TraderError> {
        let document = ReportDocument {
            report,
            metrics: report.metric_map(),
        };
        let rendered = if self.pretty {
            serde_json::to_string_pretty(&document)
        } else {
            serde_json::to_string(&document)
        };
        rendered.map_err(|e| TraderError::Io(std::io::Error::other(e)))
    }
}

impl ReportPort for JsonReportAdapter {
    fn write(&self, report: &Report, output_path: &str) -> Result<(), TraderError> {
        let json = self.render(report)?;

        let path = Path::new(output_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, json)?;

        info!(path = output_path, "report written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::metrics::Metrics;
    use crate::domain::optimizer::OptimizationOutcome;
    use crate::domain::safety::RiskMetrics;
    use tempfile::tempdir;

    fn safety_report() -> Report {
        Report::Safety {
            metrics: Some(RiskMetrics {
                current_value: 9500.0,
                peak_value: 10000.0,
                drawdown: 0.05,
                volatility: 0.0,
                emergency_stop_active: false,
                stop_date: None,
                days_since_stop: 0,
            }),
            halted: false,
        }
    }

    #[test]
    fn render_includes_report_and_metric_map() {
        let json = JsonReportAdapter::compact().render(&safety_report()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["report"]["kind"], "safety");
        assert_eq!(value["report"]["halted"], false);
        assert_eq!(value["metrics"]["drawdown"], 0.05);
        assert_eq!(value["metrics"]["peak_value"], 10000.0);
    }

    #[test]
    fn no_viable_parameters_is_explicit() {
        let report = Report::Optimization {
            symbol: "BTCUSDT".to_string(),
            outcome: OptimizationOutcome::NoViableParameters { evaluated: 12 },
        };
        let json = JsonReportAdapter::compact().render(&report).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["report"]["outcome"]["outcome"], "no_viable_parameters");
        assert_eq!(value["metrics"]["evaluated"], 12.0);
    }

    #[test]
    fn infinite_values_become_null() {
        let mut metrics = Metrics::from_ledger(&[], 1000.0);
        metrics.profit_factor = f64::INFINITY;
        let report = Report::Optimization {
            symbol: "ETHUSDT".to_string(),
            outcome: OptimizationOutcome::Best {
                params: Default::default(),
                score: 1.5,
                metrics,
                evaluated: 4,
            },
        };
        let json = JsonReportAdapter::compact().render(&report).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert!(value["metrics"]["profit_factor"].is_null());
        assert_eq!(value["metrics"]["score"], 1.5);
    }

    #[test]
    fn write_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let output_path = dir.path().join("nested/deep/report.json");

        JsonReportAdapter::new()
            .write(&safety_report(), output_path.to_str().unwrap())
            .unwrap();

        let contents = fs::read_to_string(&output_path).unwrap();
        assert!(contents.contains("\"current_value\": 9500.0"));
    }
}
