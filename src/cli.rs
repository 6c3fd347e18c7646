//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::table_report_adapter::TableReportAdapter;
use crate::domain::config_validation::{self, parse_date, parse_max_adds, validate_run_config};
use crate::domain::error::BacktestError;
use crate::domain::ledger::LotUnwind;
use crate::domain::runner::{self, RunConfig};
use crate::domain::strategy::DEFAULT_EMA_PERIOD;
use crate::domain::timeframe::parse_timeframes;
use crate::domain::universe::parse_symbols;
use crate::logging;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "emapyramid", about = "EMA-band pyramiding backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the batch of backtests described by a config file
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Run a single symbol instead of the configured list
        #[arg(long)]
        symbol: Option<String>,
        /// Replace the configured max_adds values (repeatable)
        #[arg(long = "max-adds")]
        max_adds: Vec<usize>,
        /// Write a CSV report here
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Run backtests one at a time
        #[arg(long)]
        sequential: bool,
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate a config file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show the data range for symbol(s)
    Info {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
    },
}

impl Command {
    fn config_path(&self) -> &Path {
        match self {
            Command::Backtest { config, .. }
            | Command::Validate { config }
            | Command::Info { config, .. } => config,
        }
    }
}

pub fn run(cli: Cli) -> ExitCode {
    let adapter = match load_config(cli.command.config_path()) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let level = adapter
        .get_string("logging", "level")
        .unwrap_or_else(|| "info".to_string());
    if let Err(e) = logging::init_logging(&level) {
        eprintln!("warning: {e}");
    }

    match cli.command {
        Command::Backtest {
            symbol,
            max_adds,
            output,
            sequential,
            dry_run,
            ..
        } => {
            let overrides = Overrides {
                symbol: symbol.as_deref(),
                max_adds: &max_adds,
            };
            if dry_run {
                run_dry_run(&adapter, &overrides)
            } else {
                run_backtest(&adapter, &overrides, output.as_deref(), !sequential)
            }
        }
        Command::Validate { .. } => run_validate(&adapter),
        Command::Info { symbol, .. } => run_info(&adapter, symbol.as_deref()),
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = BacktestError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

/// Command-line replacements for configured values.
#[derive(Debug, Default, Clone, Copy)]
pub struct Overrides<'a> {
    pub symbol: Option<&'a str>,
    pub max_adds: &'a [usize],
}

impl Overrides<'_> {
    pub fn apply(&self, config: &mut RunConfig) {
        if let Some(symbol) = self.symbol {
            config.symbols = vec![symbol.trim().to_uppercase()];
        }
        if !self.max_adds.is_empty() {
            config.max_allowed_adds = self.max_adds.to_vec();
        }
    }
}

fn required(adapter: &dyn ConfigPort, section: &str, key: &str) -> Result<String, BacktestError> {
    adapter
        .get_string(section, key)
        .ok_or_else(|| BacktestError::ConfigMissing {
            section: section.into(),
            key: key.into(),
        })
}

pub fn build_run_config(adapter: &dyn ConfigPort) -> Result<RunConfig, BacktestError> {
    let symbols = parse_symbols(&required(adapter, "backtest", "symbols")?)
        .map_err(|e| e.into_config_error("backtest", "symbols"))?;
    let timeframes = parse_timeframes(&required(adapter, "backtest", "timeframes")?)?;
    let max_allowed_adds = parse_max_adds(&required(adapter, "backtest", "max_adds")?)?;

    let start = parse_date(
        adapter.get_string("backtest", "start_date").as_deref(),
        "start_date",
    )?;
    let end = parse_date(
        adapter.get_string("backtest", "end_date").as_deref(),
        "end_date",
    )?;

    let ema_period = adapter.get_int("strategy", "ema_period", DEFAULT_EMA_PERIOD as i64)?;
    let ema_period = usize::try_from(ema_period).map_err(|_| {
        BacktestError::invalid("strategy", "ema_period", "ema_period must be at least 1")
    })?;
    let unwind = match adapter.get_string("strategy", "lot_unwind") {
        Some(raw) => raw.parse::<LotUnwind>()?,
        None => LotUnwind::default(),
    };

    Ok(RunConfig {
        symbols,
        timeframes,
        max_allowed_adds,
        initial_cash: adapter.get_double("backtest", "initial_cash", 100_000.0)?,
        commission_rate: adapter.get_double("backtest", "commission_rate", 0.001)?,
        ema_period,
        unwind,
        start,
        end,
        base_interval: config_validation::base_interval(adapter)?,
    })
}

/// Validate the file, build the run config and apply overrides.
pub fn resolve_run_config(
    adapter: &dyn ConfigPort,
    overrides: &Overrides<'_>,
) -> Result<RunConfig, BacktestError> {
    validate_run_config(adapter)?;
    let mut config = build_run_config(adapter)?;
    overrides.apply(&mut config);
    config.validate()?;
    Ok(config)
}

/// CSV provider, wrapped in the SQLite cache when `[data] cache_path` is set.
pub fn open_data_port(adapter: &dyn ConfigPort) -> Result<Box<dyn DataPort>, BacktestError> {
    let csv_dir = required(adapter, "data", "csv_dir")?;
    let csv = CsvAdapter::new(PathBuf::from(csv_dir));

    if adapter.get_string("data", "cache_path").is_none() {
        return Ok(Box::new(csv));
    }

    #[cfg(feature = "sqlite")]
    {
        use crate::adapters::sqlite_adapter::SqliteBarCache;

        let cache = SqliteBarCache::from_config(adapter, csv)?;
        cache.initialize_schema()?;
        Ok(Box::new(cache))
    }

    #[cfg(not(feature = "sqlite"))]
    {
        warn!("sqlite feature disabled, ignoring [data] cache_path");
        Ok(Box::new(csv))
    }
}

fn run_backtest(
    adapter: &FileConfigAdapter,
    overrides: &Overrides<'_>,
    output_path: Option<&Path>,
    parallel: bool,
) -> ExitCode {
    let config = match resolve_run_config(adapter, overrides) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let data_port = match open_data_port(adapter) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    info!(
        symbols = config.symbols.len(),
        timeframes = config.timeframes.len(),
        max_values = config.max_allowed_adds.len(),
        start = %config.start,
        end = %config.end,
        "starting batch"
    );

    let report = match runner::run_batch(data_port.as_ref(), &config, parallel) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    for skipped in &report.skipped {
        match &skipped.timeframe {
            Some(tf) => warn!(symbol = %skipped.symbol, timeframe = %tf, reason = %skipped.reason, "skipped"),
            None => warn!(symbol = %skipped.symbol, reason = %skipped.reason, "skipped"),
        }
    }

    if report.records.is_empty() {
        eprintln!("error: no symbol produced a result");
        return ExitCode::from(5);
    }

    match TableReportAdapter::new().render(&report.records) {
        Ok(table) => print!("{table}"),
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    }

    let output = output_path
        .map(Path::to_path_buf)
        .or_else(|| adapter.get_string("report", "output").map(PathBuf::from));
    if let Some(output) = output {
        if let Err(e) = CsvReportAdapter::new().write(&report.records, &output) {
            eprintln!("error: {e}");
            return (&e).into();
        }
        eprintln!("\nReport written to: {}", output.display());
    }

    ExitCode::SUCCESS
}

pub fn run_dry_run(adapter: &dyn ConfigPort, overrides: &Overrides<'_>) -> ExitCode {
    let config = match resolve_run_config(adapter, overrides) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let timeframes: Vec<String> = config
        .timeframes
        .iter()
        .map(|tf| format!("{} ({})", tf.label, tf.interval))
        .collect();
    let maxes: Vec<String> = config
        .max_allowed_adds
        .iter()
        .map(|m| m.to_string())
        .collect();

    eprintln!("Config validated successfully");
    eprintln!("\nUniverse:");
    eprintln!("  symbols:    {}", config.symbols.join(", "));
    eprintln!("  timeframes: {}", timeframes.join(", "));
    eprintln!("  base:       {}", config.base_interval);
    eprintln!("  window:     {} to {}", config.start, config.end);
    eprintln!("\nStrategy:");
    eprintln!("  ema_period: {}", config.ema_period);
    eprintln!("  max_adds:   {}", maxes.join(", "));
    eprintln!("  lot_unwind: {}", config.unwind);
    eprintln!(
        "\nDry run complete: {} backtests would run",
        config.symbols.len() * config.timeframes.len() * config.max_allowed_adds.len()
    );
    ExitCode::SUCCESS
}

pub fn run_validate(adapter: &dyn ConfigPort) -> ExitCode {
    match resolve_run_config(adapter, &Overrides::default()) {
        Ok(_) => {
            eprintln!("Configuration is valid.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

fn run_info(adapter: &FileConfigAdapter, symbol: Option<&str>) -> ExitCode {
    let symbols = resolve_symbols(symbol, adapter);
    let base = match config_validation::base_interval(adapter) {
        Ok(b) => b.to_string(),
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let data_port = match open_data_port(adapter) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let symbols = if symbols.is_empty() {
        match data_port.list_symbols(&base) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        }
    } else {
        symbols
    };

    for s in &symbols {
        match data_port.get_data_range(s, &base) {
            Ok(Some((first, last, count))) => {
                println!("{} ({}): {} bars, {} to {}", s, base, count, first, last);
            }
            Ok(None) => eprintln!("{} ({}): no data found", s, base),
            Err(e) => eprintln!("error querying {} ({}): {}", s, base, e),
        }
    }
    ExitCode::SUCCESS
}

pub fn resolve_symbols(symbol_override: Option<&str>, config: &dyn ConfigPort) -> Vec<String> {
    if let Some(s) = symbol_override {
        return vec![s.trim().to_uppercase()];
    }

    config
        .get_string("backtest", "symbols")
        .map(|list| {
            list.split(',')
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}
