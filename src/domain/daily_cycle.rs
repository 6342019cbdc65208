//! One trading day end to end: clean prices, estimate risk, execute, report.

use chrono::{Duration, NaiveDate};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, error, info, warn};

use super::cleaner::DataCleaner;
use super::cost::CostModel;
use super::eod_backtest::EodBacktester;
use super::error::TraderError;
use super::execution::{ExecutionConfig, ExecutionEngine, ExecutionReport};
use super::intraday_backtest::{IntradayBacktester, IntradayConfig, Simulation};
use super::panel::{DailyPanel, MinutePanel};
use super::performance::{PerformanceSummary, ReturnSeries};
use super::weight::WeightTable;
use crate::ports::data_port::{MinuteProvider, PriceProvider};
use crate::ports::report_port::{FillStore, ReportSink};

pub const DEFAULT_HISTORY_DAYS: i64 = 730;
pub const DEFAULT_LOOKBACK_DAYS: usize = 1;

#[derive(Debug, Clone, PartialEq)]
pub struct CycleConfig {
    pub tickers: Vec<String>,
    pub costs: CostModel,
    pub intraday: IntradayConfig,
    pub execution: ExecutionConfig,
    /// Calendar days of daily history fetched before the cycle date.
    pub history_days: i64,
    /// Most recent weight dates replayed intraday.
    pub lookback_days: usize,
    pub live: bool,
}

impl CycleConfig {
    pub fn validate(&self) -> Result<(), TraderError> {
        if self.tickers.is_empty() {
            return Err(TraderError::invalid_config("ticker universe is empty"));
        }
        if self.history_days <= 0 {
            return Err(TraderError::invalid_config("history_days must be positive"));
        }
        if self.lookback_days == 0 {
            return Err(TraderError::invalid_config("lookback_days must be positive"));
        }
        self.intraday.validate()?;
        self.execution.validate()
    }
}

/// Which backtester produced the day's risk statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskSource {
    Intraday,
    Eod,
}

impl fmt::Display for RiskSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskSource::Intraday => f.write_str("intraday"),
            RiskSource::Eod => f.write_str("eod"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DailyReport {
    pub date: NaiveDate,
    pub source: RiskSource,
    pub summary: PerformanceSummary,
    /// Sum of quantity times average fill price over all fills.
    pub total_notional: f64,
    pub num_trades: usize,
    pub failed_slices: usize,
}

impl DailyReport {
    fn new(date: NaiveDate, source: RiskSource, summary: PerformanceSummary, execution: &ExecutionReport) -> Self {
        DailyReport {
            date,
            source,
            summary,
            total_notional: execution.fills.iter().map(|f| f.notional()).sum(),
            num_trades: execution.fills.len(),
            failed_slices: execution.failures.len(),
        }
    }
}

fn ratio(value: f64) -> String {
    if value.is_nan() { "n/a".to_string() } else { format!("{value:.2}") }
}

fn percent(value: f64) -> String {
    if value.is_nan() { "n/a".to_string() } else { format!("{:.2}%", value * 100.0) }
}

/// Plain-text rendering shared by the report sinks.
pub fn format_report(report: &DailyReport) -> String {
    let mut text = format!(
        "*Daily Report {}*\n\
         > Source: {}\n\
         > Sharpe: {}\n\
         > MaxDD: {}\n\
         > ProfitFactor: {}\n\
         > TotalNotional: ${:.2}\n\
         > Trades: {}\n",
        report.date,
        report.source,
        ratio(report.summary.sharpe),
        percent(report.summary.max_drawdown),
        ratio(report.summary.profit_factor),
        report.total_notional,
        report.num_trades,
    );
    if report.failed_slices > 0 {
        text.push_str(&format!("> FailedSlices: {}\n", report.failed_slices));
    }
    text
}

/// Everything one cycle reads from or writes to.
pub struct CycleContext<'a> {
    pub config: &'a CycleConfig,
    pub date: NaiveDate,
    pub dry_run: bool,
    pub prices: &'a dyn PriceProvider,
    pub minutes: &'a dyn MinuteProvider,
    pub weights: &'a WeightTable,
    /// `None` when no broker is configured; live runs then skip execution.
    pub engine: Option<&'a ExecutionEngine>,
    pub fill_store: Option<&'a dyn FillStore>,
    pub sinks: &'a [Box<dyn ReportSink>],
}

pub fn run_daily_cycle(ctx: &CycleContext<'_>) -> Result<DailyReport, TraderError> {
    let config = ctx.config;
    info!(date = %ctx.date, tickers = config.tickers.len(), "starting daily cycle");

    let start = ctx.date - Duration::days(config.history_days);
    let raw = ctx.prices.fetch_daily(&config.tickers, start, ctx.date)?;
    let daily = DataCleaner.clean(raw)?;
    if daily.is_empty() {
        return Err(TraderError::Data {
            reason: format!("no daily prices between {start} and {}", ctx.date),
        });
    }

    let weights = ctx.weights.until(ctx.date);
    let recent = weights.tail(config.lookback_days);
    let sessions = fetch_sessions(ctx, &recent);

    let (source, returns) = estimate_risk(config, &weights, &recent, &daily, sessions.as_ref())?;
    let summary = PerformanceSummary::from_returns(&returns);
    info!(
        source = %source,
        days = returns.len(),
        sharpe = summary.sharpe,
        max_drawdown = summary.max_drawdown,
        profit_factor = summary.profit_factor,
        "risk estimate"
    );

    let execution = execute(ctx, &weights, &daily, sessions.as_ref());

    let ledger = match ctx.fill_store {
        Some(store) if !execution.fills.is_empty() => store.save_fills(ctx.date, &execution.fills),
        _ => Ok(()),
    };
    if let Err(e) = &ledger {
        error!(error = %e, fills = execution.fills.len(), "failed to persist fills");
    }

    let report = DailyReport::new(ctx.date, source, summary, &execution);
    for sink in ctx.sinks {
        if let Err(e) = sink.publish(&report) {
            warn!(sink = sink.name(), error = %e, "report sink failed");
        }
    }

    ledger?;
    Ok(report)
}

/// One minute panel per date, holding only that session's bars.
/// Dates without bars are left out.
pub fn load_sessions(
    minutes: &dyn MinuteProvider,
    tickers: &[String],
    dates: impl IntoIterator<Item = NaiveDate>,
) -> Result<BTreeMap<NaiveDate, MinutePanel>, TraderError> {
    let mut sessions = BTreeMap::new();
    for date in dates {
        let panel = MinutePanel::from_bars(minutes.fetch_minute(tickers, date)?).for_session(date);
        if panel.is_empty() {
            debug!(%date, "no minute data");
            continue;
        }
        sessions.insert(date, panel);
    }
    Ok(sessions)
}

/// Minute sessions for the replay dates, or `None` when the provider fails.
fn fetch_sessions(ctx: &CycleContext<'_>, recent: &WeightTable) -> Option<BTreeMap<NaiveDate, MinutePanel>> {
    match load_sessions(ctx.minutes, &ctx.config.tickers, recent.dates()) {
        Ok(sessions) => Some(sessions),
        Err(e) => {
            warn!(error = %e, "minute data unavailable");
            None
        }
    }
}

fn estimate_risk(
    config: &CycleConfig,
    weights: &WeightTable,
    recent: &WeightTable,
    daily: &DailyPanel,
    sessions: Option<&BTreeMap<NaiveDate, MinutePanel>>,
) -> Result<(RiskSource, ReturnSeries), TraderError> {
    if let Some(sessions) = sessions {
        let intraday = IntradayBacktester::new(config.costs, config.intraday)?;
        if let Simulation::Series { series, .. } = intraday.run(recent, daily, sessions) {
            return Ok((RiskSource::Intraday, series));
        }
    }
    info!("intraday replay unavailable; falling back to end-of-day backtest");
    let eod = EodBacktester::new(config.costs);
    Ok((RiskSource::Eod, eod.run(daily, weights)))
}

fn execute(
    ctx: &CycleContext<'_>,
    weights: &WeightTable,
    daily: &DailyPanel,
    sessions: Option<&BTreeMap<NaiveDate, MinutePanel>>,
) -> ExecutionReport {
    if !ctx.config.live || ctx.dry_run {
        info!(live = ctx.config.live, dry_run = ctx.dry_run, "order placement skipped");
        return ExecutionReport::default();
    }
    let Some(engine) = ctx.engine else {
        warn!("live run without a broker; order placement skipped");
        return ExecutionReport::default();
    };

    let minutes = weights
        .latest_date()
        .and_then(|date| sessions.and_then(|s| s.get(&date)))
        .cloned()
        .unwrap_or_default();
    engine.execute(weights, daily, &minutes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(summary: PerformanceSummary, failed_slices: usize) -> DailyReport {
        DailyReport {
            date: NaiveDate::from_ymd_opt(2025, 1, 2).unwrap(),
            source: RiskSource::Intraday,
            summary,
            total_notional: 1500.0,
            num_trades: 3,
            failed_slices,
        }
    }

    #[test]
    fn formats_report_lines() {
        let text = format_report(&report(
            PerformanceSummary {
                sharpe: 1.234,
                max_drawdown: -0.0512,
                profit_factor: 2.5,
            },
            0,
        ));
        assert!(text.starts_with("*Daily Report 2025-01-02*\n"));
        assert!(text.contains("> Source: intraday\n"));
        assert!(text.contains("> Sharpe: 1.23\n"));
        assert!(text.contains("> MaxDD: -5.12%\n"));
        assert!(text.contains("> ProfitFactor: 2.50\n"));
        assert!(text.contains("> TotalNotional: $1500.00\n"));
        assert!(text.contains("> Trades: 3\n"));
        assert!(!text.contains("FailedSlices"));
    }

    #[test]
    fn undefined_metrics_render_as_na() {
        let text = format_report(&report(
            PerformanceSummary {
                sharpe: f64::NAN,
                max_drawdown: 0.0,
                profit_factor: f64::NAN,
            },
            2,
        ));
        assert!(text.contains("> Sharpe: n/a\n"));
        assert!(text.contains("> MaxDD: 0.00%\n"));
        assert!(text.contains("> ProfitFactor: n/a\n"));
        assert!(text.contains("> FailedSlices: 2\n"));
    }

    #[test]
    fn config_validation() {
        let good = CycleConfig {
            tickers: vec!["AAPL".into()],
            costs: CostModel::zero(),
            intraday: IntradayConfig::default(),
            execution: ExecutionConfig::default(),
            history_days: DEFAULT_HISTORY_DAYS,
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            live: false,
        };
        assert!(good.validate().is_ok());

        let empty = CycleConfig {
            tickers: vec![],
            ..good.clone()
        };
        assert!(matches!(empty.validate(), Err(TraderError::InvalidConfiguration { .. })));

        let no_lookback = CycleConfig {
            lookback_days: 0,
            ..good
        };
        assert!(no_lookback.validate().is_err());
    }
}
