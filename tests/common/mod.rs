#![allow(dead_code)]

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use dailytrader::domain::bar::{MinuteBar, PricePoint};
use dailytrader::domain::daily_cycle::DailyReport;
use dailytrader::domain::error::TraderError;
use dailytrader::domain::execution::{Fill, Side};
use dailytrader::ports::broker_port::Broker;
use dailytrader::ports::clock_port::Clock;
use dailytrader::ports::data_port::{MinuteProvider, PriceProvider};
use dailytrader::ports::report_port::{FillStore, ReportSink};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

pub struct MockPriceProvider {
    pub bars: Vec<PricePoint>,
    pub error: Option<String>,
}

impl MockPriceProvider {
    pub fn new(bars: Vec<PricePoint>) -> Self {
        Self { bars, error: None }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            bars: Vec::new(),
            error: Some(reason.to_string()),
        }
    }
}

impl PriceProvider for MockPriceProvider {
    fn fetch_daily(
        &self,
        tickers: &[String],
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PricePoint>, TraderError> {
        if let Some(reason) = &self.error {
            return Err(TraderError::Data {
                reason: reason.clone(),
            });
        }
        Ok(self
            .bars
            .iter()
            .filter(|b| tickers.contains(&b.ticker) && b.date >= start_date && b.date <= end_date)
            .cloned()
            .collect())
    }
}

pub struct MockMinuteProvider {
    pub sessions: HashMap<NaiveDate, Vec<MinuteBar>>,
    pub fail: bool,
}

impl MockMinuteProvider {
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            sessions: HashMap::new(),
            fail: true,
        }
    }

    pub fn with_session(mut self, date: NaiveDate, bars: Vec<MinuteBar>) -> Self {
        self.sessions.entry(date).or_default().extend(bars);
        self
    }
}

impl MinuteProvider for MockMinuteProvider {
    fn fetch_minute(&self, tickers: &[String], date: NaiveDate) -> Result<Vec<MinuteBar>, TraderError> {
        if self.fail {
            return Err(TraderError::Data {
                reason: "minute feed down".into(),
            });
        }
        Ok(self
            .sessions
            .get(&date)
            .map(|bars| bars.iter().filter(|b| tickers.contains(&b.ticker)).cloned().collect())
            .unwrap_or_default())
    }
}

/// Fills every order at a fixed price; rejects tickers listed in `reject`.
pub struct RecordingBroker {
    pub price: f64,
    pub orders: Mutex<Vec<(String, u64, Side)>>,
    pub reject: HashSet<String>,
}

impl RecordingBroker {
    pub fn new(price: f64) -> Self {
        Self {
            price,
            orders: Mutex::new(Vec::new()),
            reject: HashSet::new(),
        }
    }

    pub fn rejecting(mut self, ticker: &str) -> Self {
        self.reject.insert(ticker.to_string());
        self
    }

    pub fn orders(&self) -> Vec<(String, u64, Side)> {
        self.orders.lock().unwrap().clone()
    }
}

impl Broker for RecordingBroker {
    fn submit_market_order(&self, ticker: &str, quantity: u64, side: Side) -> Result<Fill, TraderError> {
        if self.reject.contains(ticker) {
            return Err(TraderError::OrderRejected {
                ticker: ticker.to_string(),
                reason: "symbol halted".into(),
            });
        }
        self.orders.lock().unwrap().push((ticker.to_string(), quantity, side));
        Ok(Fill {
            ticker: ticker.to_string(),
            side,
            quantity,
            avg_fill_price: self.price,
            slice_time: None,
        })
    }
}

/// Never sleeps; records what it was asked to wait for.
#[derive(Default)]
pub struct ManualClock {
    pub sleeps: Mutex<Vec<DateTime<Utc>>>,
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap()
    }

    fn sleep_until(&self, due: DateTime<Utc>) {
        self.sleeps.lock().unwrap().push(due);
    }
}

#[derive(Clone, Default)]
pub struct RecordingSink {
    pub reports: Arc<Mutex<Vec<DailyReport>>>,
}

impl RecordingSink {
    pub fn reports(&self) -> Vec<DailyReport> {
        self.reports.lock().unwrap().clone()
    }
}

impl ReportSink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    fn publish(&self, report: &DailyReport) -> Result<(), TraderError> {
        self.reports.lock().unwrap().push(report.clone());
        Ok(())
    }
}

pub struct FailingSink;

impl ReportSink for FailingSink {
    fn name(&self) -> &str {
        "failing"
    }

    fn publish(&self, _report: &DailyReport) -> Result<(), TraderError> {
        Err(TraderError::Io(std::io::Error::other("webhook unreachable")))
    }
}

#[derive(Default)]
pub struct MemoryFillStore {
    pub saved: Mutex<Vec<(NaiveDate, Fill)>>,
}

impl FillStore for MemoryFillStore {
    fn save_fills(&self, date: NaiveDate, fills: &[Fill]) -> Result<(), TraderError> {
        let mut saved = self.saved.lock().unwrap();
        saved.extend(fills.iter().cloned().map(|f| (date, f)));
        Ok(())
    }
}

pub struct FailingFillStore;

impl FillStore for FailingFillStore {
    fn save_fills(&self, _date: NaiveDate, _fills: &[Fill]) -> Result<(), TraderError> {
        Err(TraderError::DatabaseQuery {
            reason: "disk full".into(),
        })
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn make_bar(ticker: &str, date: NaiveDate, close: f64) -> PricePoint {
    PricePoint {
        date,
        ticker: ticker.to_string(),
        open: close,
        high: close + 1.0,
        low: close - 1.0,
        close,
        volume: 1000,
    }
}

/// `count` consecutive calendar days of bars, close moving by `step` per day.
pub fn generate_bars(ticker: &str, start: NaiveDate, count: usize, start_price: f64, step: f64) -> Vec<PricePoint> {
    (0..count)
        .map(|i| make_bar(ticker, start + Duration::days(i as i64), start_price + step * i as f64))
        .collect()
}

pub fn minute_bar(ticker: &str, date: NaiveDate, minute: u32, close: f64, low: f64, volume: i64) -> MinuteBar {
    let timestamp = Utc
        .from_utc_datetime(&date.and_hms_opt(14, 30, 0).unwrap())
        + Duration::minutes(minute as i64);
    MinuteBar {
        timestamp,
        ticker: ticker.to_string(),
        open: close,
        high: close.max(low),
        low,
        close,
        volume,
    }
}

/// A quiet session: one bar per close, lows one cent under each close.
pub fn session(ticker: &str, date: NaiveDate, closes: &[f64]) -> Vec<MinuteBar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| minute_bar(ticker, date, i as u32, close, close - 0.01, 100))
        .collect()
}
