//! Drawdown / volatility circuit breaker.
//!
//! Two states: active (trading permitted) and halted. `check_risk` records a
//! snapshot on every call and halts on the first breached limit; halting is
//! advisory, callers must treat `false` as "open nothing new". Recovery is
//! polled through `can_resume_trading`.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use tracing::{info, warn};

use crate::domain::error::TraderError;
use crate::domain::stats::{deltas, mean, population_stddev};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SafetyConfig {
    pub max_drawdown: f64,
    pub max_daily_loss: f64,
    pub max_position_size: f64,
    pub volatility_threshold: f64,
    /// Trailing window for the volatility and stability checks.
    pub lookback: usize,
    pub recovery_days: i64,
    pub history_capacity: usize,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        SafetyConfig {
            max_drawdown: 0.08,
            max_daily_loss: 0.03,
            max_position_size: 0.2,
            volatility_threshold: 0.02,
            lookback: 20,
            recovery_days: 5,
            history_capacity: 10_000,
        }
    }
}

impl SafetyConfig {
    pub fn validate(&self) -> Result<(), TraderError> {
        for (key, value) in [
            ("max_drawdown", self.max_drawdown),
            ("max_daily_loss", self.max_daily_loss),
            ("max_position_size", self.max_position_size),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(TraderError::invalid("safety", key, "must be within (0, 1]"));
            }
        }
        if !(self.volatility_threshold > 0.0) {
            return Err(TraderError::invalid(
                "safety",
                "volatility_threshold",
                "must be positive",
            ));
        }
        if self.lookback < 2 {
            return Err(TraderError::invalid("safety", "lookback", "must be at least 2"));
        }
        if self.recovery_days < 0 {
            return Err(TraderError::invalid(
                "safety",
                "recovery_days",
                "must be non-negative",
            ));
        }
        if self.history_capacity < self.lookback {
            return Err(TraderError::invalid(
                "safety",
                "history_capacity",
                "must hold at least one lookback window",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PortfolioSnapshot {
    pub timestamp: NaiveDateTime,
    pub equity_value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TripReason {
    Drawdown,
    DailyLoss,
    Volatility,
}

impl fmt::Display for TripReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TripReason::Drawdown => write!(f, "maximum drawdown exceeded"),
            TripReason::DailyLoss => write!(f, "maximum daily loss exceeded"),
            TripReason::Volatility => write!(f, "excessive volatility"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct RiskState {
    pub emergency_stop_triggered: bool,
    pub stop_date: Option<NaiveDateTime>,
    pub daily_high: f64,
    pub daily_start: f64,
    pub current_day: Option<NaiveDate>,
    pub trip_reason: Option<TripReason>,
}

/// Point-in-time view for dashboards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskMetrics {
    pub current_value: f64,
    pub peak_value: f64,
    pub drawdown: f64,
    pub volatility: f64,
    pub emergency_stop_active: bool,
    pub stop_date: Option<NaiveDateTime>,
    pub days_since_stop: i64,
}

impl RiskMetrics {
    pub fn to_metric_map(&self) -> BTreeMap<String, f64> {
        let mut map = BTreeMap::new();
        map.insert("current_value".to_string(), self.current_value);
        map.insert("peak_value".to_string(), self.peak_value);
        map.insert("drawdown".to_string(), self.drawdown);
        map.insert("volatility".to_string(), self.volatility);
        map.insert(
            "emergency_stop_active".to_string(),
            if self.emergency_stop_active { 1.0 } else { 0.0 },
        );
        map.insert("days_since_stop".to_string(), self.days_since_stop as f64);
        map
    }
}

#[derive(Debug, Clone)]
pub struct SafetyManager {
    config: SafetyConfig,
    history: VecDeque<PortfolioSnapshot>,
    peak: f64,
    snapshots_since_halt: usize,
    state: RiskState,
}

impl SafetyManager {
    pub fn new(config: SafetyConfig) -> Self {
        let capacity = config.history_capacity.max(1);
        SafetyManager {
            config,
            history: VecDeque::with_capacity(capacity.min(1024)),
            peak: 0.0,
            snapshots_since_halt: 0,
            state: RiskState::default(),
        }
    }

    pub fn config(&self) -> &SafetyConfig {
        &self.config
    }

    pub fn state(&self) -> &RiskState {
        &self.state
    }

    pub fn is_halted(&self) -> bool {
        self.state.emergency_stop_triggered
    }

    pub fn history(&self) -> impl Iterator<Item = &PortfolioSnapshot> {
        self.history.iter()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Record `value` and return whether trading may continue.
    pub fn check_risk(&mut self, value: f64, timestamp: NaiveDateTime) -> bool {
        self.record(value, timestamp);

        if self.state.emergency_stop_triggered {
            self.snapshots_since_halt += 1;
            return false;
        }

        let drawdown = self.drawdown(value);
        if drawdown > self.config.max_drawdown {
            warn!(drawdown, limit = self.config.max_drawdown, "maximum drawdown reached");
            self.trip(TripReason::Drawdown, timestamp);
            return false;
        }

        let daily_loss = if self.state.daily_high > 0.0 {
            (self.state.daily_high - value) / self.state.daily_high
        } else {
            0.0
        };
        if daily_loss > self.config.max_daily_loss {
            warn!(daily_loss, limit = self.config.max_daily_loss, "maximum daily loss reached");
            self.trip(TripReason::DailyLoss, timestamp);
            return false;
        }

        let volatility = self.trailing_volatility();
        if volatility > self.config.volatility_threshold {
            warn!(volatility, limit = self.config.volatility_threshold, "excessive volatility");
            self.trip(TripReason::Volatility, timestamp);
            return false;
        }

        true
    }

    /// Rejects positions larger than `max_position_size` of the portfolio.
    pub fn check_position_size(&self, position_value: f64, portfolio_value: f64) -> bool {
        if !(portfolio_value > 0.0) {
            return false;
        }
        position_value / portfolio_value <= self.config.max_position_size
    }

    /// Re-evaluates a halt. Resets to active and returns `true` once enough days
    /// and snapshots have passed and the recent equity is stable.
    pub fn can_resume_trading(&mut self, now: NaiveDateTime) -> bool {
        if !self.state.emergency_stop_triggered {
            return true;
        }
        let Some(stop_date) = self.state.stop_date else {
            return false;
        };
        if (now - stop_date).num_days() < self.config.recovery_days {
            return false;
        }
        if self.snapshots_since_halt < self.config.lookback {
            return false;
        }

        let recent = self.recent_values();
        let avg = mean(&recent);
        if !(avg > 0.0) {
            return false;
        }
        let stability = population_stddev(&recent) / avg;
        if stability > self.config.volatility_threshold {
            return false;
        }

        let latest = recent.last().copied().unwrap_or(avg);
        self.state.emergency_stop_triggered = false;
        self.state.stop_date = None;
        self.state.trip_reason = None;
        self.snapshots_since_halt = 0;
        self.peak = latest;
        self.state.daily_high = latest;
        info!(stability, "trading may resume");
        true
    }

    /// `None` before the first snapshot.
    pub fn risk_metrics(&self, now: NaiveDateTime) -> Option<RiskMetrics> {
        let current = self.history.back()?.equity_value;
        Some(RiskMetrics {
            current_value: current,
            peak_value: self.peak,
            drawdown: self.drawdown(current),
            volatility: self.trailing_volatility(),
            emergency_stop_active: self.state.emergency_stop_triggered,
            stop_date: self.state.stop_date,
            days_since_stop: self
                .state
                .stop_date
                .map_or(0, |stop| (now - stop).num_days()),
        })
    }

    fn record(&mut self, value: f64, timestamp: NaiveDateTime) {
        if self.history.len() >= self.config.history_capacity.max(1) {
            self.history.pop_front();
        }
        self.history.push_back(PortfolioSnapshot {
            timestamp,
            equity_value: value,
        });
        self.peak = self.peak.max(value);

        let day = timestamp.date();
        if self.state.current_day != Some(day) {
            self.state.current_day = Some(day);
            self.state.daily_start = value;
            self.state.daily_high = value;
        } else {
            self.state.daily_high = self.state.daily_high.max(value);
        }
    }

    fn drawdown(&self, value: f64) -> f64 {
        if self.peak > 0.0 {
            (self.peak - value) / self.peak
        } else {
            0.0
        }
    }

    fn recent_values(&self) -> Vec<f64> {
        let skip = self.history.len().saturating_sub(self.config.lookback);
        self.history.iter().skip(skip).map(|s| s.equity_value).collect()
    }

    /// std(deltas) / |mean(deltas)| over the lookback window. Only a window
    /// that is net losing counts; flat or rising windows report zero.
    fn trailing_volatility(&self) -> f64 {
        let changes = deltas(&self.recent_values());
        if changes.is_empty() {
            return 0.0;
        }
        let avg = mean(&changes);
        if avg >= 0.0 {
            return 0.0;
        }
        population_stddev(&changes) / avg.abs()
    }

    fn trip(&mut self, reason: TripReason, timestamp: NaiveDateTime) {
        self.state.emergency_stop_triggered = true;
        self.state.stop_date = Some(timestamp);
        self.snapshots_since_halt = 0;
        if self.state.trip_reason.is_none() {
            self.state.trip_reason = Some(reason);
        }
        warn!(%reason, %timestamp, "emergency stop triggered");
        warn!("liquidation requested; no execution layer attached");
    }
}
