//! Strategy parameter bundle shared by the signal generator, backtest and optimizer.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::domain::error::TraderError;

/// How the protective stop of an open position evolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StopPolicy {
    /// Stop set once from the entry bar's signal and never moved.
    #[default]
    FixedAtEntry,
    /// Stop replaced each bar by the previous bar's signal stop.
    Recomputed,
}

impl FromStr for StopPolicy {
    type Err = TraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fixed" | "fixed_at_entry" => Ok(StopPolicy::FixedAtEntry),
            "recomputed" | "trailing" => Ok(StopPolicy::Recomputed),
            other => Err(TraderError::invalid(
                "strategy",
                "stop_policy",
                format!("unknown stop policy '{}', expected fixed or recomputed", other),
            )),
        }
    }
}

impl fmt::Display for StopPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopPolicy::FixedAtEntry => write!(f, "fixed"),
            StopPolicy::Recomputed => write!(f, "recomputed"),
        }
    }
}

/// Every recognised strategy parameter. Construct with `Default` and override,
/// then call `validate` before use.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyParams {
    pub ema_short: usize,
    pub ema_long: usize,
    pub rsi_period: usize,
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    pub atr_period: usize,
    pub atr_multiplier: f64,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub bb_period: usize,
    pub bb_std: f64,
    pub stop_policy: StopPolicy,
}

impl Default for StrategyParams {
    fn default() -> Self {
        StrategyParams {
            ema_short: 20,
            ema_long: 50,
            rsi_period: 14,
            rsi_overbought: 70.0,
            rsi_oversold: 30.0,
            atr_period: 14,
            atr_multiplier: 1.5,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            bb_period: 20,
            bb_std: 2.0,
            stop_policy: StopPolicy::FixedAtEntry,
        }
    }
}

impl StrategyParams {
    pub fn validate(&self) -> Result<(), TraderError> {
        let periods = [
            ("ema_short", self.ema_short),
            ("ema_long", self.ema_long),
            ("rsi_period", self.rsi_period),
            ("atr_period", self.atr_period),
            ("macd_fast", self.macd_fast),
            ("macd_slow", self.macd_slow),
            ("macd_signal", self.macd_signal),
            ("bb_period", self.bb_period),
        ];
        for (key, value) in periods {
            if value == 0 {
                return Err(TraderError::invalid("strategy", key, "period must be at least 1"));
            }
        }

        if self.ema_short >= self.ema_long {
            return Err(TraderError::invalid(
                "strategy",
                "ema_short",
                format!(
                    "ema_short ({}) must be below ema_long ({})",
                    self.ema_short, self.ema_long
                ),
            ));
        }
        if self.macd_fast >= self.macd_slow {
            return Err(TraderError::invalid(
                "strategy",
                "macd_fast",
                format!(
                    "macd_fast ({}) must be below macd_slow ({})",
                    self.macd_fast, self.macd_slow
                ),
            ));
        }
        for (key, value) in [
            ("rsi_oversold", self.rsi_oversold),
            ("rsi_overbought", self.rsi_overbought),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(TraderError::invalid("strategy", key, "must be within [0, 100]"));
            }
        }
        if self.rsi_oversold >= self.rsi_overbought {
            return Err(TraderError::invalid(
                "strategy",
                "rsi_oversold",
                "rsi_oversold must be below rsi_overbought",
            ));
        }
        if !(self.atr_multiplier.is_finite() && self.atr_multiplier > 0.0) {
            return Err(TraderError::invalid(
                "strategy",
                "atr_multiplier",
                "must be positive",
            ));
        }
        if !(self.bb_std.is_finite() && self.bb_std > 0.0) {
            return Err(TraderError::invalid("strategy", "bb_std", "must be positive"));
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Largest configured lookback; shorter series cannot be evaluated.
    pub fn largest_period(&self) -> usize {
        [
            self.ema_short,
            self.ema_long,
            self.rsi_period,
            self.atr_period,
            self.macd_fast,
            self.macd_slow,
            self.macd_signal,
            self.bb_period,
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }

    /// First bar index at which every indicator is defined.
    pub fn warmup_bars(&self) -> usize {
        [
            self.ema_short.saturating_sub(1),
            self.ema_long.saturating_sub(1),
            self.rsi_period,
            self.atr_period.saturating_sub(1),
            self.macd_slow.saturating_sub(1) + self.macd_signal.saturating_sub(1),
            self.bb_period.saturating_sub(1),
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let params = StrategyParams::default();
        assert!(params.validate().is_ok());
        assert_eq!(params.largest_period(), 50);
        assert_eq!(params.warmup_bars(), 49);
        assert_eq!(params.stop_policy, StopPolicy::FixedAtEntry);
    }

    #[test]
    fn zero_period_rejected() {
        let params = StrategyParams {
            rsi_period: 0,
            ..Default::default()
        };
        match params.validate() {
            Err(TraderError::ConfigInvalid { key, .. }) => assert_eq!(key, "rsi_period"),
            other => panic!("expected ConfigInvalid, got {:?}", other),
        }
    }

    #[test]
    fn crossed_emas_rejected() {
        let params = StrategyParams {
            ema_short: 50,
            ema_long: 20,
            ..Default::default()
        };
        assert!(!params.is_valid());
    }

    #[test]
    fn rsi_bounds_rejected() {
        let params = StrategyParams {
            rsi_oversold: 75.0,
            ..Default::default()
        };
        assert!(!params.is_valid());

        let params = StrategyParams {
            rsi_overbought: 120.0,
            ..Default::default()
        };
        assert!(!params.is_valid());
    }

    #[test]
    fn non_positive_multipliers_rejected() {
        let params = StrategyParams {
            atr_multiplier: 0.0,
            ..Default::default()
        };
        assert!(!params.is_valid());

        let params = StrategyParams {
            bb_std: f64::NAN,
            ..Default::default()
        };
        assert!(!params.is_valid());
    }

    #[test]
    fn warmup_dominated_by_macd() {
        let params = StrategyParams {
            ema_short: 5,
            ema_long: 10,
            ..Default::default()
        };
        assert_eq!(params.warmup_bars(), 33);
        assert_eq!(params.largest_period(), 26);
    }

    #[test]
    fn stop_policy_parse() {
        assert_eq!("fixed".parse::<StopPolicy>().unwrap(), StopPolicy::FixedAtEntry);
        assert_eq!(
            "Recomputed".parse::<StopPolicy>().unwrap(),
            StopPolicy::Recomputed
        );
        assert!("sometimes".parse::<StopPolicy>().is_err());
        assert_eq!(StopPolicy::Recomputed.to_string(), "recomputed");
    }
}
