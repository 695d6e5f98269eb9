//! Core domain types and logic.

pub mod ohlcv;
pub mod error;
pub mod stats;
pub mod indicator;
pub mod indicator_helpers;
pub mod strategy;
pub mod signal;
pub mod risk;
pub mod safety;
pub mod position;
pub mod portfolio;
pub mod execution;
pub mod backtest;
pub mod metrics;
pub mod optimizer;
pub mod config_validation;
