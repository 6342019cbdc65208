//! Intraday replay with ATR stops.
//!
//! For each date and each ticker with a non-zero weight:
//! 1. Enter at the first minute close of the session.
//! 2. Stop level = entry - ATR(window) * multiplier, from daily bars dated
//!    strictly before the session. The same subtraction applies to short
//!    weights.
//! 3. Scan minute bars in timestamp order; the first bar whose low is at or
//!    below the stop exits the whole remaining weight at the stop price.
//! 4. Anything still held settles at the session's last close.
//!
//! Costs are charged on the gross weight at entry and again on the weight
//! realized at each exit. The day's return is the weight-scaled sum of
//! ticker returns minus costs.

use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use super::atr::latest_atr;
use super::bar::MinuteBar;
use super::cost::CostModel;
use super::error::TraderError;
use super::panel::{DailyPanel, MinutePanel};
use super::performance::{ReturnPoint, ReturnSeries};
use super::weight::WeightTable;

pub const DEFAULT_ATR_WINDOW: usize = 14;
pub const DEFAULT_ATR_MULTIPLIER: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntradayConfig {
    pub atr_window: usize,
    pub atr_multiplier: f64,
}

impl Default for IntradayConfig {
    fn default() -> Self {
        IntradayConfig {
            atr_window: DEFAULT_ATR_WINDOW,
            atr_multiplier: DEFAULT_ATR_MULTIPLIER,
        }
    }
}

impl IntradayConfig {
    pub fn validate(&self) -> Result<(), TraderError> {
        if self.atr_window == 0 {
            return Err(TraderError::invalid_config("ATR window must be positive"));
        }
        if !self.atr_multiplier.is_finite() || self.atr_multiplier <= 0.0 {
            return Err(TraderError::invalid_config(format!(
                "ATR multiplier must be positive, got {}",
                self.atr_multiplier
            )));
        }
        Ok(())
    }
}

/// Lifecycle of one (date, ticker) position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionState {
    Entered,
    Stopped,
    Held,
    Settled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitKind {
    Stop,
    EndOfDay,
}

/// Final record for one ticker on one date.
#[derive(Debug, Clone, PartialEq)]
pub struct TickerOutcome {
    pub ticker: String,
    pub weight: f64,
    pub entry_price: f64,
    pub stop_price: Option<f64>,
    pub exit_price: f64,
    pub exit: ExitKind,
    pub realized_return: f64,
}

/// Result of replaying one date.
#[derive(Debug, Clone, PartialEq)]
pub enum DayOutcome {
    /// Every weight was zero; minute data was not consulted.
    Flat,
    /// Non-zero weights but no minute bars for any of them.
    NoMinuteData,
    Simulated {
        gross: f64,
        cost: f64,
        tickers: Vec<TickerOutcome>,
    },
}

impl DayOutcome {
    pub fn net_return(&self) -> f64 {
        match self {
            DayOutcome::Flat | DayOutcome::NoMinuteData => 0.0,
            DayOutcome::Simulated { gross, cost, .. } => gross - cost,
        }
    }
}

/// Output of a multi-date replay.
#[derive(Debug, Clone, PartialEq)]
pub enum Simulation {
    Series {
        series: ReturnSeries,
        days: Vec<(NaiveDate, DayOutcome)>,
    },
    /// Nothing could be simulated: no date with exposure had minute data.
    Empty,
}

struct TickerBook<'a> {
    weight: f64,
    remaining: f64,
    entry_price: f64,
    stop_price: Option<f64>,
    bars: &'a [MinuteBar],
    state: PositionState,
    gross: f64,
    exit_price: f64,
    exit: ExitKind,
}

impl TickerBook<'_> {
    fn realize(&mut self, price: f64, costs: &CostModel) -> f64 {
        let r = (price - self.entry_price) / self.entry_price;
        self.gross += self.remaining * r;
        let cost = costs.charge(self.remaining);
        self.remaining = 0.0;
        self.exit_price = price;
        cost
    }

    fn scan_for_stop(&mut self, costs: &CostModel) -> f64 {
        let Some(stop) = self.stop_price else {
            self.state = PositionState::Held;
            return 0.0;
        };
        for bar in self.bars {
            if self.remaining != 0.0 && bar.low <= stop {
                self.state = PositionState::Stopped;
                self.exit = ExitKind::Stop;
                return self.realize(stop, costs);
            }
        }
        self.state = PositionState::Held;
        0.0
    }

    fn settle(&mut self, costs: &CostModel) -> f64 {
        let cost = if self.state == PositionState::Held && self.remaining != 0.0 {
            let last_close = self.bars.last().map_or(self.entry_price, |b| b.close);
            self.realize(last_close, costs)
        } else {
            0.0
        };
        self.state = PositionState::Settled;
        cost
    }
}

#[derive(Debug, Clone)]
pub struct IntradayBacktester {
    costs: CostModel,
    config: IntradayConfig,
}

impl IntradayBacktester {
    pub fn new(costs: CostModel, config: IntradayConfig) -> Result<Self, TraderError> {
        config.validate()?;
        Ok(Self { costs, config })
    }

    /// Replays every weight date; dates absent from `sessions` have no minute data.
    pub fn run(
        &self,
        weights: &WeightTable,
        daily: &DailyPanel,
        sessions: &BTreeMap<NaiveDate, MinutePanel>,
    ) -> Simulation {
        let empty = MinutePanel::default();
        let mut days = Vec::new();
        let mut simulated = 0usize;
        let mut exposed = 0usize;

        for date in weights.dates() {
            let Some(row) = weights.on(date) else { continue };
            let minutes = sessions.get(&date).unwrap_or(&empty);
            let outcome = self.simulate_day(date, row, daily, minutes);
            match outcome {
                DayOutcome::Simulated { .. } => {
                    simulated += 1;
                    exposed += 1;
                }
                DayOutcome::NoMinuteData => exposed += 1,
                DayOutcome::Flat => {}
            }
            days.push((date, outcome));
        }

        if simulated == 0 && (exposed > 0 || days.is_empty()) {
            return Simulation::Empty;
        }

        let series = ReturnSeries::new(
            days.iter()
                .map(|(date, outcome)| ReturnPoint {
                    date: *date,
                    value: outcome.net_return(),
                })
                .collect(),
        );
        Simulation::Series { series, days }
    }

    pub fn simulate_day(
        &self,
        date: NaiveDate,
        weights: &BTreeMap<String, f64>,
        daily: &DailyPanel,
        minutes: &MinutePanel,
    ) -> DayOutcome {
        if weights.values().all(|w| *w == 0.0) {
            return DayOutcome::Flat;
        }

        let mut books: BTreeMap<&str, TickerBook> = BTreeMap::new();
        for (ticker, &weight) in weights.iter().filter(|(_, w)| **w != 0.0) {
            let bars = minutes.bars(ticker);
            let Some(first) = bars.first() else {
                warn!(ticker = %ticker, %date, "no minute bars; ticker skipped");
                continue;
            };
            let stop_price = daily
                .history(ticker)
                .and_then(|h| latest_atr(h.bars_before(date), self.config.atr_window))
                .map(|atr| first.close - atr * self.config.atr_multiplier);
            if stop_price.is_none() {
                debug!(ticker = %ticker, %date, "insufficient daily history for ATR stop");
            }
            books.insert(
                ticker.as_str(),
                TickerBook {
                    weight,
                    remaining: weight,
                    entry_price: first.close,
                    stop_price,
                    bars,
                    state: PositionState::Entered,
                    gross: 0.0,
                    exit_price: first.close,
                    exit: ExitKind::EndOfDay,
                },
            );
        }

        if books.is_empty() {
            return DayOutcome::NoMinuteData;
        }

        let mut cost: f64 = books.values().map(|b| self.costs.charge(b.weight)).sum();
        for book in books.values_mut() {
            cost += book.scan_for_stop(&self.costs);
            cost += book.settle(&self.costs);
        }

        let gross = books.values().map(|b| b.gross).sum();
        let tickers = books
            .into_iter()
            .map(|(ticker, book)| TickerOutcome {
                ticker: ticker.to_string(),
                weight: book.weight,
                entry_price: book.entry_price,
                stop_price: book.stop_price,
                exit_price: book.exit_price,
                exit: book.exit,
                realized_return: (book.exit_price - book.entry_price) / book.entry_price,
            })
            .collect();

        DayOutcome::Simulated {
            gross,
            cost,
            tickers,
        }
    }
}
