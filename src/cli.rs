//! CLI definition and dispatch.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use chrono::NaiveDateTime;
use clap::{Args, Parser, Subcommand};

use crate::adapters::cached_data_adapter::CachedDataAdapter;
use crate::adapters::csv_adapter::{parse_timestamp, CsvAdapter};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_config_adapter::JsonConfigAdapter;
use crate::adapters::json_report_adapter::JsonReportAdapter;
use crate::domain::backtest::{run_backtest, BacktestConfig};
use crate::domain::config_validation::{load_app_config, AppConfig};
use crate::domain::error::TraderError;
use crate::domain::metrics::Metrics;
use crate::domain::ohlcv::Bar;
use crate::domain::optimizer::{compare_variants, optimize, OptimizationOutcome, OptimizerConfig};
use crate::domain::safety::SafetyManager;
use crate::ports::cache_port::CachePort;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::{Report, ReportPort};

#[derive(Parser, Debug)]
#[command(name = "cryptotrader", about = "Indicator strategy backtester for crypto bars")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Where bars come from and which slice of them to use.
#[derive(Args, Debug, Clone)]
pub struct DataArgs {
    /// Directory holding one `<SYMBOL>.csv` per symbol
    #[arg(short, long)]
    pub data_dir: PathBuf,
    #[arg(long)]
    pub symbol: String,
    /// Inclusive lower bound (date, datetime or epoch millis)
    #[arg(long)]
    pub start: Option<String>,
    /// Inclusive upper bound
    #[arg(long)]
    pub end: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a single backtest
    Backtest {
        #[command(flatten)]
        data: DataArgs,
        /// INI or JSON configuration; defaults apply when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Write a JSON report here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Grid-search strategy parameters with walk-forward folds
    Optimize {
        #[command(flatten)]
        data: DataArgs,
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Compare base, aggressive and conservative parameter variants
    AbTest {
        #[command(flatten)]
        data: DataArgs,
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Replay a backtest's equity curve through the circuit breaker
    Safety {
        #[command(flatten)]
        data: DataArgs,
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show available symbols and their data ranges
    Info {
        #[arg(short, long)]
        data_dir: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            data,
            config,
            output,
        } => with_context(&data, config.as_ref(), |bars, app| {
            run_backtest_pipeline(&data.symbol, bars, &app.backtest, output.as_deref())
        }),
        Command::Optimize {
            data,
            config,
            output,
        } => with_context(&data, config.as_ref(), |bars, app| {
            run_optimize_pipeline(
                &data.symbol,
                bars,
                &app.backtest,
                &app.optimizer,
                output.as_deref(),
            )
        }),
        Command::AbTest {
            data,
            config,
            output,
        } => with_context(&data, config.as_ref(), |bars, app| {
            run_ab_pipeline(&data.symbol, bars, &app.backtest, output.as_deref())
        }),
        Command::Safety {
            data,
            config,
            output,
        } => with_context(&data, config.as_ref(), |bars, app| {
            run_safety_pipeline(bars, &app.backtest, output.as_deref())
        }),
        Command::Validate { config } => run_validate(&config),
        Command::Info { data_dir, symbol } => {
            run_info(&open_data_port(&data_dir), symbol.as_deref())
        }
    }
}

/// INI unless the extension is `.json`.
pub fn load_config(path: &Path) -> Result<Box<dyn ConfigPort>, TraderError> {
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        Ok(Box::new(JsonConfigAdapter::from_file(path)?))
    } else {
        Ok(Box::new(FileConfigAdapter::from_file(path)?))
    }
}

/// Config file if given, otherwise every default.
pub fn resolve_app_config(path: Option<&PathBuf>) -> Result<AppConfig, TraderError> {
    match path {
        Some(path) => {
            eprintln!("Loading config from {}", path.display());
            let adapter = load_config(path)?;
            load_app_config(adapter.as_ref())
        }
        None => Ok(AppConfig {
            backtest: BacktestConfig::default(),
            optimizer: OptimizerConfig::default(),
        }),
    }
}

/// Bar feed for a single CLI invocation, which reads each series once.
pub fn open_data_port(data_dir: &Path) -> CsvAdapter {
    CsvAdapter::new(data_dir.to_path_buf())
}

/// CSV feed behind a caller-owned cache. Ports built over the same cache
/// share entries, so long-lived callers avoid re-reading files.
pub fn open_cached_data_port(
    data_dir: &Path,
    cache: Arc<dyn CachePort>,
) -> CachedDataAdapter<CsvAdapter> {
    CachedDataAdapter::new(open_data_port(data_dir), cache)
}

fn parse_bound(
    raw: Option<&str>,
    flag: &str,
    default: NaiveDateTime,
) -> Result<NaiveDateTime, TraderError> {
    match raw {
        Some(raw) => parse_timestamp(raw.trim()).ok_or_else(|| TraderError::InvalidInput {
            reason: format!("--{} '{}' is not a date, datetime or epoch millis", flag, raw),
        }),
        None => Ok(default),
    }
}

/// Bars for `symbol` within the optional bounds; an empty result is an error.
pub fn fetch_series(
    data_port: &dyn DataPort,
    symbol: &str,
    start: Option<&str>,
    end: Option<&str>,
) -> Result<Vec<Bar>, TraderError> {
    let start = parse_bound(start, "start", NaiveDateTime::MIN)?;
    let end = parse_bound(end, "end", NaiveDateTime::MAX)?;
    if start > end {
        return Err(TraderError::InvalidInput {
            reason: "--start must not be after --end".to_string(),
        });
    }

    let bars = data_port.fetch_bars(symbol, start, end)?;
    if bars.is_empty() {
        return Err(TraderError::Data {
            reason: format!("no bars for {} in the requested range", symbol),
        });
    }
    Ok(bars)
}

fn fail(err: &TraderError) -> ExitCode {
    eprintln!("error: {err}");
    err.into()
}

/// Loads config and bars, then hands both to `pipeline`.
fn with_context<F>(data: &DataArgs, config: Option<&PathBuf>, pipeline: F) -> ExitCode
where
    F: FnOnce(&[Bar], &AppConfig) -> ExitCode,
{
    let app = match resolve_app_config(config) {
        Ok(app) => app,
        Err(e) => return fail(&e),
    };

    let port = open_data_port(&data.data_dir);
    eprintln!("Loading {} from {}", data.symbol, data.data_dir.display());
    let bars = match fetch_series(&port, &data.symbol, data.start.as_deref(), data.end.as_deref()) {
        Ok(bars) => bars,
        Err(e) => return fail(&e),
    };
    eprintln!("  {} bars loaded", bars.len());

    pipeline(&bars, &app)
}

fn write_report(report: &Report, output: Option<&Path>) -> Result<(), TraderError> {
    let Some(path) = output else {
        return Ok(());
    };
    JsonReportAdapter::new().write(report, &path.display().to_string())?;
    eprintln!("\nReport written to: {}", path.display());
    Ok(())
}

pub fn print_metrics(metrics: &Metrics) {
    eprintln!("Total Return:     {:.2}%", metrics.total_return * 100.0);
    eprintln!("Sharpe Ratio:     {:.2}", metrics.sharpe_ratio);
    eprintln!("Max Drawdown:     -{:.1}%", metrics.max_drawdown * 100.0);
    eprintln!("Total Trades:     {}", metrics.total_trades);
    eprintln!("Win Rate:         {:.1}%", metrics.win_rate * 100.0);
    eprintln!("Profit Factor:    {:.2}", metrics.profit_factor);
    eprintln!("Final Equity:     {:.2}", metrics.final_equity);
}

pub fn run_backtest_pipeline(
    symbol: &str,
    bars: &[Bar],
    config: &BacktestConfig,
    output: Option<&Path>,
) -> ExitCode {
    eprintln!(
        "Running backtest on {} ({} bars, stop policy {})",
        symbol,
        bars.len(),
        config.strategy.stop_policy
    );
    let result = match run_backtest(bars, config) {
        Ok(r) => r,
        Err(e) => return fail(&e),
    };

    eprintln!("\n=== Results ===");
    print_metrics(&result.metrics);
    if let Some(reason) = result.trip_reason {
        eprintln!("Circuit Breaker:  tripped ({})", reason);
    }

    let report = Report::Backtest {
        symbol: symbol.to_string(),
        params: config.strategy.clone(),
        result,
    };
    match write_report(&report, output) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fail(&e),
    }
}

pub fn run_optimize_pipeline(
    symbol: &str,
    bars: &[Bar],
    config: &BacktestConfig,
    optimizer: &OptimizerConfig,
    output: Option<&Path>,
) -> ExitCode {
    eprintln!(
        "Optimizing {} over {} parameter sets ({} folds, metric {})",
        symbol,
        optimizer.grid.size(),
        optimizer.splits,
        optimizer.metric
    );
    let outcome = match optimize(bars, config, optimizer) {
        Ok(o) => o,
        Err(e) => return fail(&e),
    };

    match &outcome {
        OptimizationOutcome::Best {
            params,
            score,
            metrics,
            evaluated,
        } => {
            eprintln!("\n=== Best Parameters ({} evaluated) ===", evaluated);
            eprintln!(
                "  ema {}/{}  rsi {} ({}/{})  atr x{}",
                params.ema_short,
                params.ema_long,
                params.rsi_period,
                params.rsi_oversold,
                params.rsi_overbought,
                params.atr_multiplier
            );
            eprintln!("  {} score: {:.4}", optimizer.metric, score);
            eprintln!("\n=== Full-Series Results ===");
            print_metrics(metrics);
        }
        OptimizationOutcome::NoViableParameters { evaluated } => {
            eprintln!(
                "\nNo viable parameters: {} candidates evaluated, none met the thresholds",
                evaluated
            );
        }
    }

    let report = Report::Optimization {
        symbol: symbol.to_string(),
        outcome,
    };
    match write_report(&report, output) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fail(&e),
    }
}

pub fn run_ab_pipeline(
    symbol: &str,
    bars: &[Bar],
    config: &BacktestConfig,
    output: Option<&Path>,
) -> ExitCode {
    let variants = match compare_variants(bars, config) {
        Ok(v) => v,
        Err(e) => return fail(&e),
    };
    if variants.is_empty() {
        return fail(&TraderError::InsufficientData {
            bars: bars.len(),
            minimum: config.strategy.largest_period(),
        });
    }

    eprintln!("\n=== Variants (best Sharpe first) ===");
    for v in &variants {
        eprintln!(
            "  {:<13} sharpe {:>7.2}  return {:>7.2}%  trades {}",
            v.variant.to_string(),
            v.metrics.sharpe_ratio,
            v.metrics.total_return * 100.0,
            v.metrics.total_trades
        );
    }

    let report = Report::AbTest {
        symbol: symbol.to_string(),
        variants,
    };
    match write_report(&report, output) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fail(&e),
    }
}

pub fn run_safety_pipeline(
    bars: &[Bar],
    config: &BacktestConfig,
    output: Option<&Path>,
) -> ExitCode {
    let result = match run_backtest(bars, config) {
        Ok(r) => r,
        Err(e) => return fail(&e),
    };

    let safety_config = config.safety.clone().unwrap_or_default();
    let mut manager = SafetyManager::new(safety_config);
    let mut trips = 0usize;
    for point in &result.equity_curve {
        if manager.is_halted() {
            manager.can_resume_trading(point.timestamp);
        }
        let was_halted = manager.is_halted();
        if !manager.check_risk(point.equity, point.timestamp) && !was_halted {
            trips += 1;
        }
    }

    let metrics = result
        .equity_curve
        .last()
        .and_then(|p| manager.risk_metrics(p.timestamp));
    let halted = manager.is_halted();

    eprintln!("\n=== Circuit Breaker ===");
    eprintln!("Snapshots:        {}", manager.history_len());
    eprintln!("Trips:            {}", trips);
    if let Some(m) = &metrics {
        eprintln!("Current Value:    {:.2}", m.current_value);
        eprintln!("Peak Value:       {:.2}", m.peak_value);
        eprintln!("Drawdown:         {:.2}%", m.drawdown * 100.0);
        eprintln!("Volatility:       {:.4}", m.volatility);
    }
    match manager.state().trip_reason {
        Some(reason) if halted => eprintln!("Status:           HALTED ({})", reason),
        _ => eprintln!("Status:           trading"),
    }

    let report = Report::Safety { metrics, halted };
    match write_report(&report, output) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fail(&e),
    }
}

pub fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let app = match load_config(config_path).and_then(|c| load_app_config(c.as_ref())) {
        Ok(app) => app,
        Err(e) => return fail(&e),
    };

    let s = &app.backtest.strategy;
    eprintln!("\nStrategy:");
    eprintln!(
        "  ema {}/{}, rsi {} ({}/{})",
        s.ema_short, s.ema_long, s.rsi_period, s.rsi_oversold, s.rsi_overbought
    );
    eprintln!(
        "  atr {} x{}, stop policy {}",
        s.atr_period, s.atr_multiplier, s.stop_policy
    );
    eprintln!(
        "  macd {}/{}/{}, bollinger {} x{}",
        s.macd_fast, s.macd_slow, s.macd_signal, s.bb_period, s.bb_std
    );
    eprintln!("  warm-up: {} bars", s.warmup_bars());
    eprintln!("\nBacktest:");
    eprintln!("  initial capital {:.2}", app.backtest.initial_capital);
    eprintln!("  sizing {:?}", app.backtest.sizing);
    eprintln!(
        "  circuit breaker {}",
        if app.backtest.safety.is_some() { "on" } else { "off" }
    );
    eprintln!("\nOptimizer:");
    eprintln!(
        "  {} combinations, {} folds",
        app.optimizer.grid.size(),
        app.optimizer.splits
    );

    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}

pub fn run_info(data_port: &dyn DataPort, symbol: Option<&str>) -> ExitCode {
    let symbols = match symbol {
        Some(s) => vec![s.to_string()],
        None => match data_port.list_symbols() {
            Ok(list) => list,
            Err(e) => return fail(&e),
        },
    };

    if symbols.is_empty() {
        eprintln!("No symbols found");
        return ExitCode::SUCCESS;
    }

    for s in &symbols {
        match data_port.get_data_range(s) {
            Ok(Some((first, last, count))) => {
                println!("{}: {} bars, {} to {}", s, count, first, last);
            }
            Ok(None) => eprintln!("{}: no data found", s),
            Err(e) => eprintln!("error querying {}: {}", s, e),
        }
    }
    ExitCode::SUCCESS
}
