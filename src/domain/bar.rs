//! Daily and minute price bars.

use chrono::{DateTime, NaiveDate, Utc};

use super::error::TraderError;

/// One daily OHLCV bar for a (date, ticker).
#[derive(Debug, Clone, PartialEq)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub ticker: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

impl PricePoint {
    /// max(high - low, |high - prev_close|, |low - prev_close|)
    pub fn true_range(&self, prev_close: f64) -> f64 {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }

    /// Prices strictly positive, volume non-negative, high >= low.
    pub fn validate(&self) -> Result<(), TraderError> {
        let prices = [self.open, self.high, self.low, self.close];
        if prices.iter().any(|p| !p.is_finite() || *p <= 0.0) {
            return Err(TraderError::Data {
                reason: format!("non-positive price for {} on {}", self.ticker, self.date),
            });
        }
        if self.volume < 0 {
            return Err(TraderError::Data {
                reason: format!("negative volume for {} on {}", self.ticker, self.date),
            });
        }
        if self.high < self.low {
            return Err(TraderError::Data {
                reason: format!("high below low for {} on {}", self.ticker, self.date),
            });
        }
        Ok(())
    }
}

/// One intraday (minute) bar.
#[derive(Debug, Clone, PartialEq)]
pub struct MinuteBar {
    pub timestamp: DateTime<Utc>,
    pub ticker: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

impl MinuteBar {
    /// The trading session (calendar date in UTC) this bar belongs to.
    pub fn session_date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_bar() -> PricePoint {
        PricePoint {
            date: NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
            ticker: "AAPL".into(),
            open: 100.0,
            high: 110.0,
            low: 90.0,
            close: 105.0,
            volume: 50_000,
        }
    }

    #[test]
    fn true_range_hl_dominates() {
        let bar = sample_bar();
        assert!((bar.true_range(100.0) - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn true_range_gap_up() {
        let bar = sample_bar();
        // |110-70| = 40 beats high-low
        assert!((bar.true_range(70.0) - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn true_range_gap_down() {
        let bar = sample_bar();
        assert!((bar.true_range(130.0) - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn validate_accepts_sane_bar() {
        assert!(sample_bar().validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_bars() {
        let zero_close = PricePoint {
            close: 0.0,
            ..sample_bar()
        };
        assert!(matches!(zero_close.validate(), Err(TraderError::Data { .. })));

        let negative_volume = PricePoint {
            volume: -1,
            ..sample_bar()
        };
        assert!(negative_volume.validate().is_err());

        let inverted = PricePoint {
            high: 80.0,
            ..sample_bar()
        };
        assert!(inverted.validate().is_err());
    }

    #[test]
    fn minute_bar_session_date() {
        let bar = MinuteBar {
            timestamp: Utc.with_ymd_and_hms(2025, 1, 2, 14, 30, 0).unwrap(),
            ticker: "AAPL".into(),
            open: 1.0,
            high: 1.0,
            low: 1.0,
            close: 1.0,
            volume: 10,
        };
        assert_eq!(
            bar.session_date(),
            NaiveDate::from_ymd_opt(2025, 1, 2).unwrap()
        );
    }
}
