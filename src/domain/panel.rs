//! Per-ticker price panels and the unified daily timeline.

use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::bar::{MinuteBar, PricePoint};

/// Daily bars for one ticker, sorted by date.
#[derive(Debug, Clone)]
pub struct TickerHistory {
    pub ticker: String,
    pub bars: Vec<PricePoint>,
    pub date_index: HashMap<NaiveDate, usize>,
}

impl TickerHistory {
    pub fn new(ticker: String, mut bars: Vec<PricePoint>) -> Self {
        bars.sort_by_key(|b| b.date);
        bars.dedup_by_key(|b| b.date);
        let date_index = bars
            .iter()
            .enumerate()
            .map(|(i, bar)| (bar.date, i))
            .collect();
        Self {
            ticker,
            bars,
            date_index,
        }
    }

    pub fn get_bar(&self, date: NaiveDate) -> Option<&PricePoint> {
        self.date_index.get(&date).map(|&i| &self.bars[i])
    }

    /// Bars dated strictly before `date`.
    pub fn bars_before(&self, date: NaiveDate) -> &[PricePoint] {
        let end = self.bars.partition_point(|b| b.date < date);
        &self.bars[..end]
    }

    /// Close on `date`, or the most recent earlier close.
    pub fn close_on_or_before(&self, date: NaiveDate) -> Option<f64> {
        let end = self.bars.partition_point(|b| b.date <= date);
        end.checked_sub(1).map(|i| self.bars[i].close)
    }
}

/// Daily bars for a universe, keyed by ticker.
#[derive(Debug, Clone, Default)]
pub struct DailyPanel {
    histories: BTreeMap<String, TickerHistory>,
}

impl DailyPanel {
    pub fn from_bars(bars: Vec<PricePoint>) -> Self {
        let mut grouped: BTreeMap<String, Vec<PricePoint>> = BTreeMap::new();
        for bar in bars {
            grouped.entry(bar.ticker.clone()).or_default().push(bar);
        }
        let histories = grouped
            .into_iter()
            .map(|(ticker, bars)| (ticker.clone(), TickerHistory::new(ticker, bars)))
            .collect();
        Self { histories }
    }

    pub fn is_empty(&self) -> bool {
        self.histories.is_empty()
    }

    pub fn tickers(&self) -> impl Iterator<Item = &str> + '_ {
        self.histories.keys().map(String::as_str)
    }

    pub fn history(&self, ticker: &str) -> Option<&TickerHistory> {
        self.histories.get(ticker)
    }

    pub fn close(&self, ticker: &str, date: NaiveDate) -> Option<f64> {
        self.history(ticker)
            .and_then(|h| h.get_bar(date))
            .map(|b| b.close)
    }

    /// Sorted union of every ticker's dates.
    pub fn timeline(&self) -> Vec<NaiveDate> {
        let unique: BTreeSet<NaiveDate> = self
            .histories
            .values()
            .flat_map(|h| h.bars.iter().map(|b| b.date))
            .collect();
        unique.into_iter().collect()
    }

    pub fn into_bars(self) -> Vec<PricePoint> {
        self.histories.into_values().flat_map(|h| h.bars).collect()
    }
}

/// Minute bars keyed by ticker, each ticker's bars in ascending timestamp order.
#[derive(Debug, Clone, Default)]
pub struct MinutePanel {
    by_ticker: BTreeMap<String, Vec<MinuteBar>>,
}

impl MinutePanel {
    pub fn from_bars(bars: Vec<MinuteBar>) -> Self {
        let mut by_ticker: BTreeMap<String, Vec<MinuteBar>> = BTreeMap::new();
        for bar in bars {
            by_ticker.entry(bar.ticker.clone()).or_default().push(bar);
        }
        for bars in by_ticker.values_mut() {
            bars.sort_by_key(|b| b.timestamp);
        }
        Self { by_ticker }
    }

    /// Only the bars belonging to `date`.
    pub fn for_session(&self, date: NaiveDate) -> MinutePanel {
        let by_ticker = self
            .by_ticker
            .iter()
            .filter_map(|(ticker, bars)| {
                let day: Vec<MinuteBar> = bars
                    .iter()
                    .filter(|b| b.session_date() == date)
                    .cloned()
                    .collect();
                (!day.is_empty()).then(|| (ticker.clone(), day))
            })
            .collect();
        MinutePanel { by_ticker }
    }

    pub fn is_empty(&self) -> bool {
        self.by_ticker.values().all(Vec::is_empty)
    }

    pub fn bars(&self, ticker: &str) -> &[MinuteBar] {
        self.by_ticker.get(ticker).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Bars for `ticker` with `start <= timestamp <= end`.
    pub fn window(&self, ticker: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> &[MinuteBar] {
        let bars = self.bars(ticker);
        let lo = bars.partition_point(|b| b.timestamp < start);
        let hi = bars.partition_point(|b| b.timestamp <= end);
        if lo >= hi { &[] } else { &bars[lo..hi] }
    }

    /// Earliest and latest timestamp across all tickers.
    pub fn span(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let first = self.by_ticker.values().filter_map(|b| b.first()).map(|b| b.timestamp).min()?;
        let last = self.by_ticker.values().filter_map(|b| b.last()).map(|b| b.timestamp).max()?;
        Some((first, last))
    }
}
