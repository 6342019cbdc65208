//! CSV file data adapter.
//!
//! Daily file columns: `date,ticker,open,high,low,close,volume`.
//! Minute file columns: `timestamp,ticker,open,high,low,close,volume` with
//! RFC 3339 timestamps. Weights file columns: `date,ticker,weight`.

use crate::domain::bar::{MinuteBar, PricePoint};
use crate::domain::error::TraderError;
use crate::domain::weight::{Weight, WeightTable};
use crate::ports::data_port::{MinuteProvider, PriceProvider};
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub struct CsvAdapter {
    daily_path: PathBuf,
    minute_path: Option<PathBuf>,
}

impl CsvAdapter {
    pub fn new(daily_path: PathBuf) -> Self {
        Self {
            daily_path,
            minute_path: None,
        }
    }

    /// Without a minute file every session reads as having no minute data.
    pub fn with_minutes(mut self, minute_path: PathBuf) -> Self {
        self.minute_path = Some(minute_path);
        self
    }

    pub fn load_weights(path: &Path) -> Result<WeightTable, TraderError> {
        let weights = read_records(path)?
            .iter()
            .map(|record| {
                Ok(Weight {
                    date: parse_date(record, 0)?,
                    ticker: text(record, 1, "ticker")?.to_uppercase(),
                    value: field(record, 2, "weight")?,
                })
            })
            .collect::<Result<Vec<_>, TraderError>>()?;
        WeightTable::from_weights(weights)
    }
}

fn read_records(path: &Path) -> Result<Vec<csv::StringRecord>, TraderError> {
    let content = fs::read_to_string(path).map_err(|e| TraderError::Data {
        reason: format!("failed to read {}: {}", path.display(), e),
    })?;

    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());
    rdr.records()
        .map(|r| {
            r.map_err(|e| TraderError::Data {
                reason: format!("CSV parse error in {}: {}", path.display(), e),
            })
        })
        .collect()
}

fn text<'r>(record: &'r csv::StringRecord, idx: usize, name: &str) -> Result<&'r str, TraderError> {
    record.get(idx).ok_or_else(|| TraderError::Data {
        reason: format!("missing {name} column"),
    })
}

fn field<T: FromStr>(record: &csv::StringRecord, idx: usize, name: &str) -> Result<T, TraderError>
where
    T::Err: std::fmt::Display,
{
    text(record, idx, name)?
        .parse()
        .map_err(|e| TraderError::Data {
            reason: format!("invalid {name} value: {e}"),
        })
}

fn parse_date(record: &csv::StringRecord, idx: usize) -> Result<NaiveDate, TraderError> {
    NaiveDate::parse_from_str(text(record, idx, "date")?, "%Y-%m-%d").map_err(|e| TraderError::Data {
        reason: format!("invalid date format: {e}"),
    })
}

fn parse_timestamp(record: &csv::StringRecord, idx: usize) -> Result<DateTime<Utc>, TraderError> {
    DateTime::parse_from_rfc3339(text(record, idx, "timestamp")?)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| TraderError::Data {
            reason: format!("invalid timestamp: {e}"),
        })
}

fn wanted(tickers: &[String]) -> HashSet<String> {
    tickers.iter().map(|t| t.to_uppercase()).collect()
}

impl PriceProvider for CsvAdapter {
    fn fetch_daily(
        &self,
        tickers: &[String],
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PricePoint>, TraderError> {
        let wanted = wanted(tickers);
        let mut bars = Vec::new();

        for record in read_records(&self.daily_path)? {
            let date = parse_date(&record, 0)?;
            if date < start_date || date > end_date {
                continue;
            }
            let ticker = text(&record, 1, "ticker")?.to_uppercase();
            if !wanted.contains(&ticker) {
                continue;
            }
            bars.push(PricePoint {
                date,
                ticker,
                open: field(&record, 2, "open")?,
                high: field(&record, 3, "high")?,
                low: field(&record, 4, "low")?,
                close: field(&record, 5, "close")?,
                volume: field(&record, 6, "volume")?,
            });
        }

        bars.sort_by(|a, b| (a.date, &a.ticker).cmp(&(b.date, &b.ticker)));
        Ok(bars)
    }
}

impl MinuteProvider for CsvAdapter {
    fn fetch_minute(&self, tickers: &[String], date: NaiveDate) -> Result<Vec<MinuteBar>, TraderError> {
        let Some(path) = &self.minute_path else {
            return Ok(Vec::new());
        };
        let wanted = wanted(tickers);
        let mut bars = Vec::new();

        for record in read_records(path)? {
            let timestamp = parse_timestamp(&record, 0)?;
            if timestamp.date_naive() != date {
                continue;
            }
            let ticker = text(&record, 1, "ticker")?.to_uppercase();
            if !wanted.contains(&ticker) {
                continue;
            }
            bars.push(MinuteBar {
                timestamp,
                ticker,
                open: field(&record, 2, "open")?,
                high: field(&record, 3, "high")?,
                low: field(&record, 4, "low")?,
                close: field(&record, 5, "close")?,
                volume: field(&record, 6, "volume")?,
            });
        }

        bars.sort_by(|a, b| (a.timestamp, &a.ticker).cmp(&(b.timestamp, &b.ticker)));
        Ok(bars)
    }
}
