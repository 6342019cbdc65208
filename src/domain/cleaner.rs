//! Daily bar validation and gap filling.

use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

use super::bar::PricePoint;
use super::error::TraderError;
use super::panel::DailyPanel;

/// Fraction of the universe that must report a bar for a date to be kept.
pub const MIN_COVERAGE: f64 = 0.95;

#[derive(Debug, Clone, Copy, Default)]
pub struct DataCleaner;

impl DataCleaner {
    /// Validates every bar, drops thinly covered dates, then forward- and
    /// back-fills each ticker so every kept date has one row per ticker.
    pub fn clean(&self, bars: Vec<PricePoint>) -> Result<DailyPanel, TraderError> {
        for bar in &bars {
            bar.validate()?;
        }

        let tickers: BTreeSet<String> = bars.iter().map(|b| b.ticker.clone()).collect();
        if tickers.is_empty() {
            return Ok(DailyPanel::default());
        }
        let threshold = (tickers.len() as f64 * MIN_COVERAGE).floor() as usize;

        let mut coverage: BTreeMap<NaiveDate, usize> = BTreeMap::new();
        for bar in &bars {
            *coverage.entry(bar.date).or_default() += 1;
        }
        let kept: Vec<NaiveDate> = coverage
            .iter()
            .filter(|&(_, &count)| count >= threshold)
            .map(|(&date, _)| date)
            .collect();
        let dropped = coverage.len() - kept.len();
        if dropped > 0 {
            warn!(dropped, threshold, "dropping thinly covered dates");
        }

        let raw = DailyPanel::from_bars(bars);
        let mut cleaned = Vec::with_capacity(kept.len() * tickers.len());

        for ticker in &tickers {
            let Some(history) = raw.history(ticker) else {
                continue;
            };
            let first_known = kept.iter().find_map(|&date| history.get_bar(date));
            let mut last: Option<&PricePoint> = None;
            let mut filled = 0usize;

            for &date in &kept {
                let source = match history.get_bar(date) {
                    Some(bar) => {
                        last = Some(bar);
                        bar
                    }
                    None => match last.or(first_known) {
                        Some(bar) => {
                            filled += 1;
                            bar
                        }
                        None => continue,
                    },
                };
                cleaned.push(PricePoint {
                    date,
                    ..source.clone()
                });
            }
            if filled > 0 {
                debug!(ticker = %ticker, filled, "filled missing daily bars");
            }
        }

        Ok(DailyPanel::from_bars(cleaned))
    }
}
