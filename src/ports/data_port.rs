//! Market data ports.

use crate::domain::bar::{MinuteBar, PricePoint};
use crate::domain::error::TraderError;
use chrono::NaiveDate;

pub trait PriceProvider {
    /// Daily bars for `tickers` between `start_date` and `end_date` inclusive,
    /// ordered by (date, ticker).
    fn fetch_daily(
        &self,
        tickers: &[String],
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PricePoint>, TraderError>;
}

pub trait MinuteProvider {
    /// Minute bars for `tickers` on `date`, ordered by (timestamp, ticker).
    /// An empty vector is a legitimate answer, not an error.
    fn fetch_minute(&self, tickers: &[String], date: NaiveDate) -> Result<Vec<MinuteBar>, TraderError>;
}
