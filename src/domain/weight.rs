//! Target position weights produced by the signal generator.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use super::error::TraderError;

#[derive(Debug, Clone, PartialEq)]
pub struct Weight {
    pub date: NaiveDate,
    pub ticker: String,
    pub value: f64,
}

/// Weights keyed by date, then ticker.
///
/// Both levels are ordered maps, so every consumer iterates tickers in the
/// same order no matter how the input rows were arranged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeightTable {
    by_date: BTreeMap<NaiveDate, BTreeMap<String, f64>>,
}

impl WeightTable {
    pub fn from_weights(weights: Vec<Weight>) -> Result<Self, TraderError> {
        let mut by_date: BTreeMap<NaiveDate, BTreeMap<String, f64>> = BTreeMap::new();
        for w in weights {
            if !w.value.is_finite() || !(-1.0..=1.0).contains(&w.value) {
                return Err(TraderError::Data {
                    reason: format!(
                        "weight {} for {} on {} outside [-1, 1]",
                        w.value, w.ticker, w.date
                    ),
                });
            }
            by_date.entry(w.date).or_default().insert(w.ticker, w.value);
        }
        Ok(Self { by_date })
    }

    pub fn is_empty(&self) -> bool {
        self.by_date.is_empty()
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.by_date.keys().copied()
    }

    pub fn latest_date(&self) -> Option<NaiveDate> {
        self.by_date.keys().next_back().copied()
    }

    pub fn on(&self, date: NaiveDate) -> Option<&BTreeMap<String, f64>> {
        self.by_date.get(&date)
    }

    /// Weight for a (date, ticker); absent entries read as flat.
    pub fn get(&self, date: NaiveDate, ticker: &str) -> f64 {
        self.by_date
            .get(&date)
            .and_then(|row| row.get(ticker))
            .copied()
            .unwrap_or(0.0)
    }

    /// A table without any date after `date`.
    pub fn until(&self, date: NaiveDate) -> WeightTable {
        WeightTable {
            by_date: self.by_date.range(..=date).map(|(d, row)| (*d, row.clone())).collect(),
        }
    }

    /// A table holding only the most recent `count` dates.
    pub fn tail(&self, count: usize) -> WeightTable {
        let skip = self.by_date.len().saturating_sub(count);
        WeightTable {
            by_date: self
                .by_date
                .iter()
                .skip(skip)
                .map(|(date, row)| (*date, row.clone()))
                .collect(),
        }
    }
}
