//! Lagged-signal daily backtest.
//!
//! The weight set on day t-1 is the position held through day t. Each
//! ticker earns position * close-to-close return, pays
//! |position change| * (slippage + commission), and the portfolio return is
//! the mean over tickers that held or traded that day.

use chrono::NaiveDate;
use tracing::debug;

use super::cost::CostModel;
use super::panel::DailyPanel;
use super::performance::{PerformanceSummary, ReturnPoint, ReturnSeries};
use super::weight::WeightTable;

#[derive(Debug, Clone)]
pub struct EodBacktester {
    costs: CostModel,
}

impl EodBacktester {
    pub fn new(costs: CostModel) -> Self {
        Self { costs }
    }

    /// One return per timeline date after the first; the first date has no
    /// lagged signal and no prior close to measure against.
    pub fn run(&self, prices: &DailyPanel, weights: &WeightTable) -> ReturnSeries {
        let timeline = prices.timeline();
        if timeline.len() < 2 {
            return ReturnSeries::default();
        }

        let tickers: Vec<&str> = prices.tickers().collect();
        let mut points = Vec::with_capacity(timeline.len() - 1);

        for pair in timeline.windows(2) {
            let (prev, today) = (pair[0], pair[1]);
            let mut sum = 0.0;
            let mut active = 0usize;

            for ticker in &tickers {
                let position = weights.get(prev, ticker);
                let previous_position = previous_weight(&timeline, weights, prev, ticker);
                let traded = position - previous_position;
                if position == 0.0 && traded == 0.0 {
                    continue;
                }
                let ret = close_to_close(prices, ticker, prev, today);
                sum += position * ret - self.costs.charge(traded);
                active += 1;
            }

            let value = if active > 0 { sum / active as f64 } else { 0.0 };
            points.push(ReturnPoint { date: today, value });
        }

        debug!(days = points.len(), "eod backtest complete");
        ReturnSeries::new(points)
    }

    pub fn summarize(&self, prices: &DailyPanel, weights: &WeightTable) -> (ReturnSeries, PerformanceSummary) {
        let series = self.run(prices, weights);
        let summary = PerformanceSummary::from_returns(&series);
        (series, summary)
    }
}

/// Weight on the timeline date before `date`, zero at the start of data.
fn previous_weight(timeline: &[NaiveDate], weights: &WeightTable, date: NaiveDate, ticker: &str) -> f64 {
    match timeline.binary_search(&date) {
        Ok(i) if i > 0 => weights.get(timeline[i - 1], ticker),
        _ => 0.0,
    }
}

/// Missing closes are forward-filled, so a gap day returns 0.
fn close_to_close(prices: &DailyPanel, ticker: &str, prev: NaiveDate, today: NaiveDate) -> f64 {
    let Some(history) = prices.history(ticker) else {
        return 0.0;
    };
    match (history.close_on_or_before(prev), history.close_on_or_before(today)) {
        (Some(p), Some(c)) if p > 0.0 => c / p - 1.0,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bar::PricePoint;
    use crate::domain::weight::Weight;
    use approx::assert_relative_eq;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, day).unwrap()
    }

    fn bar(ticker: &str, day: u32, close: f64) -> PricePoint {
        PricePoint {
            date: d(day),
            ticker: ticker.into(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 100,
        }
    }

    fn weights(rows: &[(u32, &str, f64)]) -> WeightTable {
        WeightTable::from_weights(
            rows.iter()
                .map(|&(day, ticker, value)| Weight {
                    date: d(day),
                    ticker: ticker.into(),
                    value,
                })
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn uptrend_constant_long() {
        let prices = DailyPanel::from_bars(vec![bar("X", 1, 100.0), bar("X", 2, 101.0), bar("X", 3, 102.0)]);
        let w = weights(&[(1, "X", 1.0), (2, "X", 1.0), (3, "X", 1.0)]);
        let bt = EodBacktester::new(CostModel::zero());

        let (series, summary) = bt.summarize(&prices, &w);
        assert_eq!(series.len(), 2);
        assert_relative_eq!(series.values()[0], 0.01, epsilon = 1e-12);
        assert!(summary.sharpe > 0.0);
    }

    #[test]
    fn costs_charged_on_position_changes() {
        let prices = DailyPanel::from_bars(vec![bar("X", 1, 100.0), bar("X", 2, 100.0), bar("X", 3, 100.0)]);
        let w = weights(&[(1, "X", 1.0), (2, "X", 0.0)]);
        let bt = EodBacktester::new(CostModel::new(0.001, 0.001).unwrap());

        let values = bt.run(&prices, &w).values();
        // entry on day 2, exit on day 3
        assert_relative_eq!(values[0], -0.002, epsilon = 1e-12);
        assert_relative_eq!(values[1], -0.002, epsilon = 1e-12);
    }

    #[test]
    fn averages_over_active_tickers_only() {
        let prices = DailyPanel::from_bars(vec![
            bar("A", 1, 100.0),
            bar("A", 2, 110.0),
            bar("B", 1, 50.0),
            bar("B", 2, 40.0),
            bar("C", 1, 10.0),
            bar("C", 2, 20.0),
        ]);
        let w = weights(&[(1, "A", 1.0), (1, "B", -1.0)]);
        let bt = EodBacktester::new(CostModel::zero());
        // A: +10%, B: short through -20% => +20%; C flat and excluded
        assert_relative_eq!(bt.run(&prices, &w).values()[0], 0.15, epsilon = 1e-12);
    }

    #[test]
    fn missing_close_is_forward_filled() {
        let prices = DailyPanel::from_bars(vec![
            bar("A", 1, 100.0),
            bar("A", 3, 100.0),
            bar("B", 1, 100.0),
            bar("B", 2, 100.0),
            bar("B", 3, 100.0),
        ]);
        let w = weights(&[(1, "A", 1.0), (2, "A", 1.0)]);
        let values = EodBacktester::new(CostModel::zero()).run(&prices, &w).values();
        assert_eq!(values, vec![0.0, 0.0]);
    }

    #[test]
    fn no_positions_yield_zero() {
        let prices = DailyPanel::from_bars(vec![bar("X", 1, 100.0), bar("X", 2, 120.0)]);
        let values = EodBacktester::new(CostModel::zero())
            .run(&prices, &WeightTable::default())
            .values();
        assert_eq!(values, vec![0.0]);
    }

    #[test]
    fn rerun_is_bit_identical() {
        let prices = DailyPanel::from_bars(vec![
            bar("X", 1, 100.0),
            bar("X", 2, 103.0),
            bar("X", 3, 99.0),
            bar("X", 6, 104.0),
        ]);
        let w = weights(&[(1, "X", 0.7), (2, "X", -0.3), (3, "X", 1.0)]);
        let bt = EodBacktester::new(CostModel::new(0.0005, 0.0002).unwrap());
        let (_, a) = bt.summarize(&prices, &w);
        let (_, b) = bt.summarize(&prices, &w);
        assert_eq!(a.sharpe.to_bits(), b.sharpe.to_bits());
        assert_eq!(a.max_drawdown.to_bits(), b.max_drawdown.to_bits());
        assert_eq!(a.profit_factor.to_bits(), b.profit_factor.to_bits());
    }
}
