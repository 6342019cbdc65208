//! Order execution: target weights to timed child orders and broker fills.
//!
//! Target quantity per ticker is round(weight * capital / close) on the most
//! recent weight date. Each non-zero target is sliced (TWAP or VWAP) over the
//! session's minute-data span, or placed as one immediate order when no span
//! exists. Tickers run in parallel on a bounded worker pool; one ticker's
//! slices always go out sequentially in timestamp order, and a broker call
//! that outlives its timeout is settled before the ticker's next slice.

use chrono::{DateTime, NaiveDate, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rayon::prelude::*;
use tracing::{debug, error, info, warn};

use super::error::TraderError;
use super::panel::{DailyPanel, MinutePanel};
use super::slicer::{OrderSlice, OrderSlicer, TwapSlicer, VwapSlicer};
use super::weight::WeightTable;
use crate::ports::broker_port::Broker;
use crate::ports::clock_port::Clock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn for_quantity(quantity: i64) -> Self {
        if quantity > 0 { Side::Buy } else { Side::Sell }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = TraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "BUY" => Ok(Side::Buy),
            "SELL" => Ok(Side::Sell),
            other => Err(TraderError::Data {
                reason: format!("unknown order side: {other}"),
            }),
        }
    }
}

/// A filled child order. `slice_time` is the scheduled time of the slice
/// that produced it, stamped by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub ticker: String,
    pub side: Side,
    pub quantity: u64,
    pub avg_fill_price: f64,
    pub slice_time: Option<DateTime<Utc>>,
}

impl Fill {
    pub fn notional(&self) -> f64 {
        self.quantity as f64 * self.avg_fill_price
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlicingMethod {
    Twap,
    Vwap,
}

impl FromStr for SlicingMethod {
    type Err = TraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "TWAP" => Ok(SlicingMethod::Twap),
            "VWAP" => Ok(SlicingMethod::Vwap),
            other => Err(TraderError::invalid_config(format!(
                "unknown slicing method {other:?}, expected TWAP or VWAP"
            ))),
        }
    }
}

/// When a timed slice may be submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulePolicy {
    /// Submit every slice as soon as its worker reaches it.
    Eager,
    /// Sleep until each slice's scheduled timestamp before submitting.
    WaitUntilDue,
}

impl FromStr for SchedulePolicy {
    type Err = TraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "eager" => Ok(SchedulePolicy::Eager),
            "wait" | "wait_until_due" => Ok(SchedulePolicy::WaitUntilDue),
            other => Err(TraderError::invalid_config(format!(
                "unknown schedule policy {other:?}, expected eager or wait"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionConfig {
    pub method: SlicingMethod,
    pub twap_intervals: i64,
    pub total_capital: f64,
    pub workers: usize,
    pub schedule: SchedulePolicy,
    /// `None` calls the broker directly on the worker thread.
    pub broker_timeout: Option<Duration>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            method: SlicingMethod::Twap,
            twap_intervals: 10,
            total_capital: 1_000_000.0,
            workers: 4,
            schedule: SchedulePolicy::Eager,
            broker_timeout: Some(Duration::from_secs(30)),
        }
    }
}

impl ExecutionConfig {
    pub fn validate(&self) -> Result<(), TraderError> {
        TwapSlicer::new(self.twap_intervals)?;
        if !self.total_capital.is_finite() || self.total_capital <= 0.0 {
            return Err(TraderError::invalid_config(format!(
                "total capital must be positive, got {}",
                self.total_capital
            )));
        }
        if self.workers == 0 {
            return Err(TraderError::invalid_config("worker count must be positive"));
        }
        if self.broker_timeout.is_some_and(|t| t.is_zero()) {
            return Err(TraderError::invalid_config("broker timeout must be positive"));
        }
        Ok(())
    }
}

/// The schedule for one ticker.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderPlan {
    pub ticker: String,
    pub target_quantity: i64,
    pub slices: Vec<OrderSlice>,
}

/// A slice the broker did not fill. Never retried.
#[derive(Debug)]
pub struct SliceFailure {
    pub ticker: String,
    pub slice_time: Option<DateTime<Utc>>,
    pub quantity: i64,
    pub error: TraderError,
}

#[derive(Debug, Default)]
pub struct ExecutionReport {
    pub fills: Vec<Fill>,
    pub failures: Vec<SliceFailure>,
}

impl ExecutionReport {
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Integer share targets for the most recent weight date.
///
/// Tickers without a close on that date are skipped.
pub fn target_quantities(
    weights: &WeightTable,
    prices: &DailyPanel,
    total_capital: f64,
) -> Option<(NaiveDate, BTreeMap<String, i64>)> {
    let date = weights.latest_date()?;
    let row = weights.on(date)?;
    let mut targets = BTreeMap::new();

    for (ticker, &weight) in row {
        match prices.close(ticker, date) {
            Some(close) if close > 0.0 => {
                let quantity = (weight * total_capital / close).round_ties_even() as i64;
                targets.insert(ticker.clone(), quantity);
            }
            _ => {
                let gap = TraderError::DataGap {
                    ticker: ticker.clone(),
                    date,
                };
                warn!(error = %gap, "no close price; ticker not traded");
            }
        }
    }
    Some((date, targets))
}

pub struct ExecutionEngine {
    broker: Arc<dyn Broker>,
    clock: Arc<dyn Clock>,
    config: ExecutionConfig,
    pool: rayon::ThreadPool,
}

impl ExecutionEngine {
    pub fn new(
        broker: Arc<dyn Broker>,
        clock: Arc<dyn Clock>,
        config: ExecutionConfig,
    ) -> Result<Self, TraderError> {
        config.validate()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers)
            .thread_name(|i| format!("exec-worker-{i}"))
            .build()
            .map_err(|e| TraderError::invalid_config(format!("cannot build worker pool: {e}")))?;
        Ok(Self {
            broker,
            clock,
            config,
            pool,
        })
    }

    /// Slice schedules for every ticker with a non-zero target.
    pub fn plan(&self, weights: &WeightTable, prices: &DailyPanel, minutes: &MinutePanel) -> Vec<OrderPlan> {
        let Some((date, targets)) = target_quantities(weights, prices, self.config.total_capital) else {
            return Vec::new();
        };

        let session = minutes.for_session(date);
        let span = session.span();
        if span.is_none() {
            debug!(%date, "no minute data for session; placing immediate orders");
        }

        targets
            .into_iter()
            .filter(|(_, quantity)| *quantity != 0)
            .map(|(ticker, quantity)| {
                let slices = self.schedule_for(&ticker, quantity, &session, span);
                OrderPlan {
                    ticker,
                    target_quantity: quantity,
                    slices,
                }
            })
            .collect()
    }

    fn schedule_for(
        &self,
        ticker: &str,
        quantity: i64,
        session: &MinutePanel,
        span: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Vec<OrderSlice> {
        let Some((start, end)) = span else {
            return OrderSlice::immediate(quantity);
        };
        match self.config.method {
            SlicingMethod::Vwap if session.window(ticker, start, end).is_empty() => {
                debug!(ticker, "no minute bars in window; VWAP falls back to immediate order");
                OrderSlice::immediate(quantity)
            }
            SlicingMethod::Vwap => VwapSlicer::new(session).slice_order(ticker, quantity, start, end),
            SlicingMethod::Twap => match TwapSlicer::new(self.config.twap_intervals) {
                Ok(twap) => twap.slice_order(ticker, quantity, start, end),
                // validated at construction
                Err(_) => OrderSlice::immediate(quantity),
            },
        }
    }

    /// Plans and submits every order; returns the fills and the failed slices.
    pub fn execute(&self, weights: &WeightTable, prices: &DailyPanel, minutes: &MinutePanel) -> ExecutionReport {
        let plans = self.plan(weights, prices, minutes);
        info!(orders = plans.len(), method = ?self.config.method, "submitting orders");

        let per_ticker: Vec<ExecutionReport> =
            self.pool.install(|| plans.par_iter().map(|plan| self.submit_plan(plan)).collect());

        let mut report = ExecutionReport::default();
        for part in per_ticker {
            report.fills.extend(part.fills);
            report.failures.extend(part.failures);
        }
        if report.is_partial() {
            warn!(
                filled = report.fills.len(),
                failed = report.failures.len(),
                "execution finished with failed slices"
            );
        }
        report
    }

    fn submit_plan(&self, plan: &OrderPlan) -> ExecutionReport {
        let mut slices: Vec<&OrderSlice> = plan.slices.iter().filter(|s| s.quantity != 0).collect();
        slices.sort_by_key(|s| s.timestamp);

        let mut report = ExecutionReport::default();
        let mut in_flight: Option<InFlight> = None;
        for slice in slices {
            // the previous order for this ticker must settle first
            if let Some(pending) = in_flight.take() {
                let (slice_time, quantity, result) = pending.settle();
                record(&mut report, &plan.ticker, slice_time, quantity, result);
            }

            if let (SchedulePolicy::WaitUntilDue, Some(due)) = (self.config.schedule, slice.timestamp) {
                if self.clock.now() < due {
                    self.clock.sleep_until(due);
                }
            }

            match self.submit_with_timeout(&plan.ticker, slice) {
                Submission::Done(result) => {
                    record(&mut report, &plan.ticker, slice.timestamp, slice.quantity, result)
                }
                Submission::TimedOut(pending) => in_flight = Some(pending),
            }
        }
        if let Some(pending) = in_flight.take() {
            let (slice_time, quantity, result) = pending.settle();
            record(&mut report, &plan.ticker, slice_time, quantity, result);
        }
        report
    }

    /// Runs the broker call on a helper thread. A call that outlives the
    /// timeout is handed back still running so the caller can settle it.
    fn submit_with_timeout(&self, ticker: &str, slice: &OrderSlice) -> Submission {
        let quantity = slice.quantity.unsigned_abs();
        let side = Side::for_quantity(slice.quantity);
        let Some(timeout) = self.config.broker_timeout else {
            return Submission::Done(self.broker.submit_market_order(ticker, quantity, side));
        };

        let (tx, rx) = mpsc::channel();
        let broker = Arc::clone(&self.broker);
        let owned = ticker.to_string();
        let spawned = thread::Builder::new()
            .name(format!("broker-{ticker}"))
            .spawn(move || {
                let _ = tx.send(broker.submit_market_order(&owned, quantity, side));
            });
        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                return Submission::Done(Err(TraderError::BrokerUnavailable {
                    ticker: ticker.to_string(),
                    reason: e.to_string(),
                }));
            }
        };

        match rx.recv_timeout(timeout) {
            Ok(result) => {
                let _ = handle.join();
                Submission::Done(result)
            }
            Err(RecvTimeoutError::Timeout) => {
                let error = TraderError::BrokerTimeout {
                    ticker: ticker.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                };
                warn!(ticker, quantity = slice.quantity, %error, "order still in flight");
                Submission::TimedOut(InFlight {
                    ticker: ticker.to_string(),
                    slice_time: slice.timestamp,
                    quantity: slice.quantity,
                    handle,
                    rx,
                })
            }
            Err(RecvTimeoutError::Disconnected) => {
                let _ = handle.join();
                Submission::Done(Err(TraderError::BrokerUnavailable {
                    ticker: ticker.to_string(),
                    reason: "broker call ended without a response".into(),
                }))
            }
        }
    }
}

enum Submission {
    Done(Result<Fill, TraderError>),
    TimedOut(InFlight),
}

/// A broker call that outlived its timeout and has not reported back yet.
struct InFlight {
    ticker: String,
    slice_time: Option<DateTime<Utc>>,
    quantity: i64,
    handle: thread::JoinHandle<()>,
    rx: mpsc::Receiver<Result<Fill, TraderError>>,
}

impl InFlight {
    /// Blocks until the broker answers; the broker port blocks until a terminal state.
    fn settle(self) -> (Option<DateTime<Utc>>, i64, Result<Fill, TraderError>) {
        let result = self.rx.recv().unwrap_or_else(|_| {
            Err(TraderError::BrokerUnavailable {
                ticker: self.ticker.clone(),
                reason: "broker call ended without a response".into(),
            })
        });
        let _ = self.handle.join();
        if result.is_ok() {
            warn!(ticker = %self.ticker, quantity = self.quantity, "late fill recorded after timeout");
        }
        (self.slice_time, self.quantity, result)
    }
}

fn record(
    report: &mut ExecutionReport,
    ticker: &str,
    slice_time: Option<DateTime<Utc>>,
    quantity: i64,
    result: Result<Fill, TraderError>,
) {
    match result {
        Ok(mut fill) => {
            fill.slice_time = slice_time;
            debug!(
                ticker,
                side = %fill.side,
                quantity = fill.quantity,
                price = fill.avg_fill_price,
                "slice filled"
            );
            report.fills.push(fill);
        }
        Err(error) => {
            if error.is_broker_failure() {
                warn!(ticker, quantity, %error, "slice failed");
            } else {
                error!(ticker, quantity, %error, "slice failed unexpectedly");
            }
            report.failures.push(SliceFailure {
                ticker: ticker.to_string(),
                slice_time,
                quantity,
                error,
            });
        }
    }
}
