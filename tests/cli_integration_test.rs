//! CLI orchestration tests: config loading, pipelines and report output
//! against CSV files on disk.

mod common;

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use common::*;
use cryptotrader::adapters::memory_cache_adapter::MemoryCacheAdapter;
use cryptotrader::cli::{self, Cli, Command};
use cryptotrader::domain::backtest::SizingMode;
use cryptotrader::domain::error::TraderError;
use cryptotrader::domain::strategy::StopPolicy;

fn write_temp_config(content: &str, suffix: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

const VALID_INI: &str = r#"
[strategy]
ema_short = 20
ema_long = 50
stop_policy = recomputed

[risk]
sizing = adaptive
min_trades = 5

[backtest]
initial_capital = 25000
commission_pct = 0.1

[optimizer]
ema_short = 10,20
splits = 4
"#;

const VALID_JSON: &str = r#"{
    "strategy": { "ema_short": 12, "ema_long": 26, "atr_multiplier": 2.0 },
    "backtest": { "initial_capital": 5000, "circuit_breaker": true },
    "safety": { "max_drawdown": 0.1 },
    "optimizer": { "atr_multiplier": [1.5, 2.0, 2.5], "metric": "total_return" }
}"#;

fn data_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    write_csv(dir.path(), "BTCUSDT", &make_bars(&gap_uptrend()));
    dir
}

fn data_args(dir: &tempfile::TempDir) -> cli::DataArgs {
    cli::DataArgs {
        data_dir: dir.path().to_path_buf(),
        symbol: "BTCUSDT".to_string(),
        start: None,
        end: None,
    }
}

mod config_loading {
    use super::*;

    #[test]
    fn ini_config_by_default() {
        let file = write_temp_config(VALID_INI, ".ini");
        let app = cli::resolve_app_config(Some(&file.path().to_path_buf())).unwrap();

        assert_eq!(app.backtest.initial_capital, 25_000.0);
        assert_eq!(app.backtest.execution.commission_pct, 0.1);
        assert_eq!(app.backtest.strategy.stop_policy, StopPolicy::Recomputed);
        assert_eq!(app.backtest.sizing, SizingMode::Adaptive { min_trades: 5 });
        assert!(app.backtest.safety.is_none());
        assert_eq!(app.optimizer.grid.ema_short, vec![10, 20]);
        assert_eq!(app.optimizer.splits, 4);
    }

    #[test]
    fn json_config_by_extension() {
        let file = write_temp_config(VALID_JSON, ".json");
        let app = cli::resolve_app_config(Some(&file.path().to_path_buf())).unwrap();

        assert_eq!(app.backtest.strategy.ema_short, 12);
        assert_eq!(app.backtest.strategy.atr_multiplier, 2.0);
        assert_eq!(app.backtest.initial_capital, 5_000.0);
        assert_eq!(app.backtest.safety.as_ref().unwrap().max_drawdown, 0.1);
        assert_eq!(app.optimizer.grid.atr_multiplier, vec![1.5, 2.0, 2.5]);
    }

    #[test]
    fn no_config_means_defaults() {
        let app = cli::resolve_app_config(None).unwrap();
        assert_eq!(app.backtest.initial_capital, 10_000.0);
        assert_eq!(app.optimizer.splits, 5);
    }

    #[test]
    fn missing_file_is_config_parse_error() {
        let path = PathBuf::from("/nonexistent/cryptotrader.ini");
        assert!(matches!(
            cli::resolve_app_config(Some(&path)),
            Err(TraderError::ConfigParse { .. })
        ));
    }

    #[test]
    fn invalid_json_is_config_parse_error() {
        let file = write_temp_config("{ \"strategy\": ", ".json");
        assert!(matches!(
            cli::load_config(file.path()),
            Err(TraderError::ConfigParse { .. })
        ));
    }
}

mod validate_command {
    use super::*;

    #[test]
    fn valid_config_succeeds() {
        let file = write_temp_config(VALID_INI, ".ini");
        assert!(exit_code_eq(cli::run_validate(file.path()), ExitCode::SUCCESS));
    }

    #[test]
    fn out_of_range_value_exits_with_config_code() {
        let file = write_temp_config("[strategy]\nrsi_overbought = 120\n", ".ini");
        assert!(exit_code_eq(cli::run_validate(file.path()), ExitCode::from(2)));
    }

    #[test]
    fn dispatch_through_run() {
        let file = write_temp_config(VALID_JSON, ".json");
        let code = cli::run(Cli {
            command: Command::Validate {
                config: file.path().to_path_buf(),
            },
        });
        assert!(exit_code_eq(code, ExitCode::SUCCESS));
    }
}

mod pipelines {
    use super::*;

    #[test]
    fn backtest_writes_json_report() {
        let dir = data_dir();
        let output = dir.path().join("reports/backtest.json");
        let code = cli::run(Cli {
            command: Command::Backtest {
                data: data_args(&dir),
                config: None,
                output: Some(output.clone()),
            },
        });
        assert!(exit_code_eq(code, ExitCode::SUCCESS));

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(value["report"]["kind"], "backtest");
        assert_eq!(value["metrics"]["total_trades"], 1.0);
    }

    #[test]
    fn optimize_writes_outcome() {
        let dir = data_dir();
        let output = dir.path().join("optimize.json");
        let code = cli::run(Cli {
            command: Command::Optimize {
                data: data_args(&dir),
                config: None,
                output: Some(output.clone()),
            },
        });
        assert!(exit_code_eq(code, ExitCode::SUCCESS));

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(value["report"]["kind"], "optimization");
        assert_eq!(value["report"]["outcome"]["outcome"], "best");
    }

    #[test]
    fn ab_test_reports_three_variants() {
        let dir = data_dir();
        let output = dir.path().join("ab.json");
        let code = cli::run(Cli {
            command: Command::AbTest {
                data: data_args(&dir),
                config: None,
                output: Some(output.clone()),
            },
        });
        assert!(exit_code_eq(code, ExitCode::SUCCESS));

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(value["report"]["variants"].as_array().unwrap().len(), 3);
        assert!(value["metrics"]["base.sharpe_ratio"].is_number());
    }

    #[test]
    fn safety_replay_reports_state() {
        let dir = data_dir();
        let output = dir.path().join("safety.json");
        let code = cli::run(Cli {
            command: Command::Safety {
                data: data_args(&dir),
                config: None,
                output: Some(output.clone()),
            },
        });
        assert!(exit_code_eq(code, ExitCode::SUCCESS));

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(value["report"]["kind"], "safety");
        assert!(value["report"]["halted"].is_boolean());
        assert!(value["metrics"]["peak_value"].as_f64().unwrap() >= 10_000.0);
    }

    #[test]
    fn unknown_symbol_exits_with_data_code() {
        let dir = data_dir();
        let mut args = data_args(&dir);
        args.symbol = "DOGEUSDT".to_string();
        let code = cli::run(Cli {
            command: Command::Backtest {
                data: args,
                config: None,
                output: None,
            },
        });
        assert!(exit_code_eq(code, ExitCode::from(3)));
    }

    #[test]
    fn short_window_exits_with_insufficient_data_code() {
        let dir = data_dir();
        let mut args = data_args(&dir);
        args.end = Some("2024-01-20".to_string());
        let code = cli::run(Cli {
            command: Command::Backtest {
                data: args,
                config: None,
                output: None,
            },
        });
        assert!(exit_code_eq(code, ExitCode::from(5)));
    }

    #[test]
    fn cached_ports_share_one_cache() {
        let dir = data_dir();
        let cache = Arc::new(MemoryCacheAdapter::new());

        let first = cli::open_cached_data_port(dir.path(), cache.clone());
        let bars = cli::fetch_series(&first, "BTCUSDT", None, None).unwrap();
        assert_eq!(cache.len(), 1);

        // the second port is served from the cache, not the file
        std::fs::remove_file(dir.path().join("BTCUSDT.csv")).unwrap();
        let second = cli::open_cached_data_port(dir.path(), cache.clone());
        assert_eq!(
            cli::fetch_series(&second, "BTCUSDT", None, None).unwrap(),
            bars
        );

        assert!(matches!(
            cli::fetch_series(&cli::open_data_port(dir.path()), "BTCUSDT", None, None),
            Err(TraderError::Data { .. })
        ));
    }

    #[test]
    fn info_lists_symbols() {
        let dir = data_dir();
        let port = cli::open_data_port(dir.path());
        assert!(exit_code_eq(cli::run_info(&port, None), ExitCode::SUCCESS));
    }
}
