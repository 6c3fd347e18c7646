//! CLI integration tests for config loading and command orchestration.
//!
//! Tests cover:
//! - Building a RunConfig from INI files on disk
//! - Command-line overrides for symbols and max values
//! - Validation failures mapped to exit codes
//! - Opening the CSV provider and the SQLite cache from config
//! - Full batch over CSV files written to a temp directory

mod common;

use common::*;
use emapyramid::adapters::file_config_adapter::FileConfigAdapter;
use emapyramid::adapters::table_report_adapter::TableReportAdapter;
use emapyramid::cli::{self, Overrides};
use emapyramid::domain::error::BacktestError;
use emapyramid::domain::ledger::LotUnwind;
use emapyramid::domain::ohlcv::TIMESTAMP_FORMAT;
use emapyramid::domain::runner::run_batch;
use emapyramid::ports::report_port::ReportPort;
use std::io::Write;
use std::path::Path;
use std::process::ExitCode;

fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn load(content: &str) -> FileConfigAdapter {
    FileConfigAdapter::from_string(content).unwrap()
}

fn same_code(a: ExitCode, b: ExitCode) -> bool {
    format!("{a:?}") == format!("{b:?}")
}

const VALID_INI: &str = r#"
[backtest]
symbols = BTC-USD,ETH-USD,LINK-USD
timeframes = 1D:1d,4H:4h,8H:8h
max_adds = 5,3,8,13
initial_cash = 100000
commission_rate = 0.001
start_date = 2024-01-01
end_date = 2025-01-01
base_interval = 1h

[strategy]
ema_period = 89
lot_unwind = pop_oldest

[data]
csv_dir = data

[logging]
level = warn
"#;

mod config_loading {
    use super::*;

    #[test]
    fn build_run_config_reads_every_key() {
        let file = write_temp_ini(VALID_INI);
        let adapter = cli::load_config(file.path()).unwrap();
        let config = cli::build_run_config(&adapter).unwrap();

        assert_eq!(config.symbols, vec!["BTC-USD", "ETH-USD", "LINK-USD"]);
        let labels: Vec<&str> = config.timeframes.iter().map(|t| t.label.as_str()).collect();
        assert_eq!(labels, vec!["1D", "4H", "8H"]);
        assert_eq!(config.timeframes[1].interval.minutes(), 240);
        assert_eq!(config.max_allowed_adds, vec![5, 3, 8, 13]);
        assert_eq!(config.initial_cash, 100_000.0);
        assert_eq!(config.commission_rate, 0.001);
        assert_eq!(config.ema_period, 89);
        assert_eq!(config.unwind, LotUnwind::PopOldest);
        assert_eq!(config.start, date(2024, 1, 1));
        assert_eq!(config.end, date(2025, 1, 1));
        assert_eq!(config.base_interval.minutes(), 60);
    }

    #[test]
    fn defaults_apply_for_optional_keys() {
        let adapter = load(
            "[backtest]\nsymbols = BTC-USD\ntimeframes = 4h\nmax_adds = 5\n\
             start_date = 2024-01-01\nend_date = 2024-06-01\n[data]\ncsv_dir = d\n",
        );
        let config = cli::build_run_config(&adapter).unwrap();

        assert_eq!(config.timeframes[0].label, "4H");
        assert_eq!(config.initial_cash, 100_000.0);
        assert_eq!(config.commission_rate, 0.001);
        assert_eq!(config.ema_period, 89);
        assert_eq!(config.unwind, LotUnwind::PopOldest);
        assert_eq!(config.base_interval.minutes(), 60);
    }

    #[test]
    fn missing_file_is_config_error() {
        let code = cli::load_config(Path::new("/nonexistent/emapyramid.ini"))
            .err()
            .unwrap();
        assert!(same_code(code, ExitCode::from(2)));
    }

    #[test]
    fn missing_symbols_is_reported() {
        let adapter = load("[backtest]\ntimeframes = 4h\nmax_adds = 5\n");
        let err = cli::build_run_config(&adapter).unwrap_err();
        assert!(matches!(
            err,
            BacktestError::ConfigMissing { ref key, .. } if key == "symbols"
        ));
    }

    #[test]
    fn drain_all_is_parsed() {
        let ini = VALID_INI.replace("pop_oldest", "drain_all");
        let config = cli::build_run_config(&load(&ini)).unwrap();
        assert_eq!(config.unwind, LotUnwind::DrainAll);
    }
}

mod overrides {
    use super::*;

    #[test]
    fn symbol_override_replaces_list() {
        let overrides = Overrides {
            symbol: Some("eth-usd"),
            max_adds: &[],
        };
        let config = cli::resolve_run_config(&load(VALID_INI), &overrides).unwrap();
        assert_eq!(config.symbols, vec!["ETH-USD"]);
        assert_eq!(config.max_allowed_adds, vec![5, 3, 8, 13]);
    }

    #[test]
    fn max_override_replaces_list() {
        let overrides = Overrides {
            symbol: None,
            max_adds: &[2],
        };
        let config = cli::resolve_run_config(&load(VALID_INI), &overrides).unwrap();
        assert_eq!(config.max_allowed_adds, vec![2]);
        assert_eq!(config.symbols.len(), 3);
    }

    #[test]
    fn zero_max_override_is_rejected() {
        let overrides = Overrides {
            symbol: None,
            max_adds: &[0],
        };
        let err = cli::resolve_run_config(&load(VALID_INI), &overrides).unwrap_err();
        assert!(matches!(err, BacktestError::InvalidConfiguration { .. }));
    }

    #[test]
    fn resolve_symbols_prefers_override() {
        let adapter = load(VALID_INI);
        assert_eq!(cli::resolve_symbols(Some(" link-usd "), &adapter), vec!["LINK-USD"]);
        assert_eq!(cli::resolve_symbols(None, &adapter).len(), 3);
        assert!(cli::resolve_symbols(None, &load("[backtest]\n")).is_empty());
    }
}

mod validation {
    use super::*;

    #[test]
    fn valid_config_succeeds() {
        assert!(same_code(cli::run_validate(&load(VALID_INI)), ExitCode::SUCCESS));
    }

    #[test]
    fn bad_timeframe_exits_with_config_code() {
        let ini = VALID_INI.replace("8H:8h", "8H:8x");
        assert!(same_code(cli::run_validate(&load(&ini)), ExitCode::from(2)));
    }

    #[test]
    fn reversed_dates_exit_with_config_code() {
        let ini = VALID_INI.replace("end_date = 2025-01-01", "end_date = 2023-01-01");
        assert!(same_code(cli::run_validate(&load(&ini)), ExitCode::from(2)));
    }

    #[test]
    fn dry_run_accepts_valid_config() {
        let code = cli::run_dry_run(&load(VALID_INI), &Overrides::default());
        assert!(same_code(code, ExitCode::SUCCESS));
    }

    #[test]
    fn dry_run_rejects_invalid_commission() {
        let ini = VALID_INI.replace("commission_rate = 0.001", "commission_rate = 2");
        let code = cli::run_dry_run(&load(&ini), &Overrides::default());
        assert!(same_code(code, ExitCode::from(2)));
    }
}

mod csv_pipeline {
    use super::*;

    fn write_csv(dir: &Path, symbol: &str, bars: &[Bar]) {
        let mut content = String::from("timestamp,open,high,low,close,volume\n");
        for b in bars {
            content.push_str(&format!(
                "{},{},{},{},{},{}\n",
                b.timestamp.format(TIMESTAMP_FORMAT),
                b.open,
                b.high,
                b.low,
                b.close,
                b.volume
            ));
        }
        std::fs::write(dir.join(format!("{symbol}_1h.csv")), content).unwrap();
    }

    fn ini_for(dir: &Path, extra: &str) -> String {
        format!(
            "[backtest]\nsymbols = BTC-USD,ETH-USD\ntimeframes = 1H:1h,4H:4h\nmax_adds = 5,3\n\
             start_date = 2024-01-01\nend_date = 2025-01-01\n\n[data]\ncsv_dir = {}\n{extra}",
            dir.display()
        )
    }

    #[test]
    fn batch_over_csv_files() {
        let dir = tempfile::TempDir::new().unwrap();
        write_csv(dir.path(), "BTC-USD", &wave_bars(800));

        let adapter = load(&ini_for(dir.path(), ""));
        let config = cli::resolve_run_config(&adapter, &Overrides::default()).unwrap();
        let port = cli::open_data_port(&adapter).unwrap();

        let report = run_batch(port.as_ref(), &config, true).unwrap();

        assert_eq!(report.records.len(), 4);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].symbol, "ETH-USD");

        let table = TableReportAdapter::new().render(&report.records).unwrap();
        assert!(table.contains("Results for MAX = 5:"));
        assert!(table.contains("Results for MAX = 3:"));
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn sqlite_cache_matches_csv() {
        let dir = tempfile::TempDir::new().unwrap();
        write_csv(dir.path(), "BTC-USD", &wave_bars(800));
        write_csv(dir.path(), "ETH-USD", &wave_bars(500));

        let plain = load(&ini_for(dir.path(), ""));
        let cache_path = dir.path().join("bars.sqlite");
        let cached = load(&ini_for(
            dir.path(),
            &format!("cache_path = {}\ncache_max_age_hours = 24\n", cache_path.display()),
        ));

        let config = cli::resolve_run_config(&plain, &Overrides::default()).unwrap();
        let from_csv = run_batch(cli::open_data_port(&plain).unwrap().as_ref(), &config, false).unwrap();

        let port = cli::open_data_port(&cached).unwrap();
        let first = run_batch(port.as_ref(), &config, false).unwrap();
        let second = run_batch(port.as_ref(), &config, false).unwrap();

        assert!(cache_path.exists());
        assert_eq!(from_csv.records, first.records);
        assert_eq!(first.records, second.records);
    }

    #[test]
    fn csv_data_range_via_port() {
        let dir = tempfile::TempDir::new().unwrap();
        write_csv(dir.path(), "BTC-USD", &wave_bars(48));

        let adapter = load(&ini_for(dir.path(), ""));
        let port = cli::open_data_port(&adapter).unwrap();

        let (first, last, count) = port.get_data_range("BTC-USD", "1h").unwrap().unwrap();
        assert_eq!(first, ts(0));
        assert_eq!(last, ts(47));
        assert_eq!(count, 48);
        assert_eq!(port.list_symbols("1h").unwrap(), vec!["BTC-USD"]);
    }

    #[test]
    fn missing_csv_dir_key() {
        let adapter = load("[data]\n");
        let err = cli::open_data_port(&adapter).err().unwrap();
        assert!(matches!(err, BacktestError::ConfigMissing { .. }));
    }
}
