//! CLI definition and dispatch.

use chrono::{Duration, NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::paper_broker::PaperBroker;
use crate::adapters::system_clock::SystemClock;
use crate::adapters::text_report_adapter::{LogReportSink, TextReportSink};
use crate::domain::cleaner::DataCleaner;
use crate::domain::config_validation::{load_cycle_config, sqlite_pool_size};
use crate::domain::daily_cycle::{load_sessions, run_daily_cycle, CycleConfig, CycleContext, DailyReport};
use crate::domain::eod_backtest::EodBacktester;
use crate::domain::error::TraderError;
use crate::domain::execution::ExecutionEngine;
use crate::domain::intraday_backtest::{IntradayBacktester, Simulation};
use crate::domain::panel::DailyPanel;
use crate::domain::performance::{PerformanceSummary, ReturnSeries};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::PriceProvider;
use crate::ports::report_port::{FillStore, ReportSink};

#[derive(Parser, Debug)]
#[command(name = "dailytrader", about = "Daily equities execution and simulation engine")]
pub struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the daily cycle: risk estimate, optional execution, report
    Run {
        #[arg(short, long)]
        config: PathBuf,
        /// Cycle date (YYYY-MM-DD); defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Skip order placement even when live
        #[arg(long)]
        dry_run: bool,
    },
    /// Backtest the configured weights over the whole weights file
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long, value_enum, default_value_t = BacktestMode::Eod)]
        mode: BacktestMode,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BacktestMode {
    Eod,
    Intraday,
}

/// Installs the global subscriber. `RUST_LOG` overrides the INFO default.
pub fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    // a second init (tests) keeps the first subscriber
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

pub fn run(cli: Cli) -> ExitCode {
    init_logging(cli.log_json);

    let result = match cli.command {
        Command::Run {
            config,
            date,
            dry_run,
        } => run_cycle(&config, date, dry_run).map(|report| {
            println!("{}", crate::domain::daily_cycle::format_report(&report));
        }),
        Command::Backtest { config, mode } => run_backtest(&config, mode).map(|(series, summary)| {
            print_summary(mode, &series, &summary);
        }),
        Command::Validate { config } => run_validate(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// File locations from the `[data]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct DataPaths {
    pub daily: PathBuf,
    pub minute: Option<PathBuf>,
    pub weights: PathBuf,
}

pub fn data_paths(config: &dyn ConfigPort) -> Result<DataPaths, TraderError> {
    let required = |key: &str| {
        config
            .get_string("data", key)
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .ok_or_else(|| TraderError::ConfigMissing {
                section: "data".into(),
                key: key.into(),
            })
    };
    Ok(DataPaths {
        daily: required("daily_csv")?,
        minute: config
            .get_string("data", "minute_csv")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from),
        weights: required("weights_csv")?,
    })
}

fn csv_adapter(paths: &DataPaths) -> CsvAdapter {
    let adapter = CsvAdapter::new(paths.daily.clone());
    match &paths.minute {
        Some(minute) => adapter.with_minutes(minute.clone()),
        None => adapter,
    }
}

fn load(config_path: &Path) -> Result<(FileConfigAdapter, CycleConfig, DataPaths), TraderError> {
    info!(path = %config_path.display(), "loading config");
    let adapter = FileConfigAdapter::from_file(config_path)?;
    let cycle = load_cycle_config(&adapter)?;
    let paths = data_paths(&adapter)?;
    Ok((adapter, cycle, paths))
}

fn build_engine(
    cycle: &CycleConfig,
    prices: &dyn PriceProvider,
    date: NaiveDate,
) -> Result<ExecutionEngine, TraderError> {
    let start = date - Duration::days(cycle.history_days);
    let reference = DailyPanel::from_bars(prices.fetch_daily(&cycle.tickers, start, date)?);
    let broker = PaperBroker::from_panel(&reference, date, cycle.costs.slippage());
    ExecutionEngine::new(Arc::new(broker), Arc::new(SystemClock), cycle.execution.clone())
}

pub fn run_cycle(config_path: &Path, date: Option<NaiveDate>, dry_run: bool) -> Result<DailyReport, TraderError> {
    let (adapter, cycle, paths) = load(config_path)?;
    let data = csv_adapter(&paths);
    let weights = CsvAdapter::load_weights(&paths.weights)?;
    let date = date.unwrap_or_else(|| Utc::now().date_naive());

    let engine = if cycle.live && !dry_run {
        Some(build_engine(&cycle, &data, date)?)
    } else {
        None
    };

    #[cfg(feature = "sqlite")]
    let store = match adapter.get_string("sqlite", "path") {
        Some(_) => Some(crate::adapters::sqlite_fill_store::SqliteFillStore::from_config(
            &adapter,
            cycle.costs,
        )?),
        None => None,
    };
    #[cfg(feature = "sqlite")]
    let fill_store = store.as_ref().map(|s| s as &dyn FillStore);
    #[cfg(not(feature = "sqlite"))]
    let fill_store: Option<&dyn FillStore> = None;

    let mut sinks: Vec<Box<dyn ReportSink>> = vec![Box::new(LogReportSink)];
    if let Some(path) = adapter.get_string("report", "path") {
        sinks.push(Box::new(TextReportSink::new(PathBuf::from(path))));
    }

    let ctx = CycleContext {
        config: &cycle,
        date,
        dry_run,
        prices: &data,
        minutes: &data,
        weights: &weights,
        engine: engine.as_ref(),
        fill_store,
        sinks: &sinks,
    };
    run_daily_cycle(&ctx)
}

pub fn run_backtest(config_path: &Path, mode: BacktestMode) -> Result<(ReturnSeries, PerformanceSummary), TraderError> {
    let (_, cycle, paths) = load(config_path)?;
    let data = csv_adapter(&paths);
    let weights = CsvAdapter::load_weights(&paths.weights)?;

    let (Some(first), Some(last)) = (weights.dates().next(), weights.latest_date()) else {
        return Err(TraderError::Data {
            reason: format!("no weights in {}", paths.weights.display()),
        });
    };
    let start = first - Duration::days(cycle.history_days);
    let daily = DataCleaner.clean(data.fetch_daily(&cycle.tickers, start, last)?)?;
    info!(?mode, from = %first, to = %last, "running backtest");

    match mode {
        BacktestMode::Eod => Ok(EodBacktester::new(cycle.costs).summarize(&daily, &weights)),
        BacktestMode::Intraday => {
            let sessions = load_sessions(&data, &cycle.tickers, weights.dates())?;
            let backtester = IntradayBacktester::new(cycle.costs, cycle.intraday)?;
            match backtester.run(&weights, &daily, &sessions) {
                Simulation::Series { series, .. } => {
                    let summary = PerformanceSummary::from_returns(&series);
                    Ok((series, summary))
                }
                Simulation::Empty => Err(TraderError::Data {
                    reason: "no minute data for any date with exposure".into(),
                }),
            }
        }
    }
}

fn print_summary(mode: BacktestMode, series: &ReturnSeries, summary: &PerformanceSummary) {
    println!("Mode: {mode:?}");
    println!("Days: {}", series.len());
    println!("Sharpe: {:.2}", summary.sharpe);
    println!("MaxDD: {:.2}%", summary.max_drawdown * 100.0);
    println!("ProfitFactor: {:.2}", summary.profit_factor);
}

pub fn run_validate(config_path: &Path) -> Result<(), TraderError> {
    let (adapter, cycle, paths) = load(config_path)?;
    sqlite_pool_size(&adapter)?;
    let files = [
        ("daily_csv", Some(&paths.daily)),
        ("minute_csv", paths.minute.as_ref()),
        ("weights_csv", Some(&paths.weights)),
    ];
    for (key, path) in files {
        if let Some(path) = path.filter(|p| !p.exists()) {
            return Err(TraderError::ConfigInvalid {
                section: "data".into(),
                key: key.into(),
                reason: format!("{} does not exist", path.display()),
            });
        }
    }
    eprintln!(
        "Configuration is valid: {} tickers, method {:?}, live {}",
        cycle.tickers.len(),
        cycle.execution.method,
        cycle.live
    );
    Ok(())
}
