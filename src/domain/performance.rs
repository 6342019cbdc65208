//! Return series and derived risk/return statistics.
//!
//! Undefined ratios are `NaN`, never an error: a quiet period with no
//! variance or no losing days still produces a printable summary.

use chrono::NaiveDate;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReturnPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// Daily portfolio returns in date order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReturnSeries {
    points: Vec<ReturnPoint>,
}

impl ReturnSeries {
    pub fn new(mut points: Vec<ReturnPoint>) -> Self {
        points.sort_by_key(|p| p.date);
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[ReturnPoint] {
        &self.points
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn get(&self, date: NaiveDate) -> Option<f64> {
        self.points
            .binary_search_by_key(&date, |p| p.date)
            .ok()
            .map(|i| self.points[i].value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerformanceSummary {
    pub sharpe: f64,
    pub max_drawdown: f64,
    pub profit_factor: f64,
}

impl PerformanceSummary {
    pub fn from_returns(series: &ReturnSeries) -> Self {
        let returns = series.values();
        PerformanceSummary {
            sharpe: sharpe_ratio(&returns),
            max_drawdown: max_drawdown(&returns),
            profit_factor: profit_factor(&returns),
        }
    }
}

/// mean / sample stddev * sqrt(252); `NaN` when the stddev is zero or undefined.
pub fn sharpe_ratio(returns: &[f64]) -> f64 {
    if returns.len() < 2 {
        return f64::NAN;
    }
    // Identical values can leave a rounding residue in the variance.
    if returns.iter().all(|r| *r == returns[0]) {
        return f64::NAN;
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let stddev = variance.sqrt();

    if stddev > 0.0 {
        mean / stddev * TRADING_DAYS_PER_YEAR.sqrt()
    } else {
        f64::NAN
    }
}

/// Worst peak-to-trough fall of the compounded curve; always <= 0.
pub fn max_drawdown(returns: &[f64]) -> f64 {
    let mut equity = 1.0_f64;
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0_f64;

    for r in returns {
        equity *= 1.0 + r;
        if equity > peak {
            peak = equity;
        }
        let dd = equity / peak - 1.0;
        if dd < worst {
            worst = dd;
        }
    }
    worst
}

/// Sum of gains over |sum of losses|; `NaN` when there are no losses.
pub fn profit_factor(returns: &[f64]) -> f64 {
    let wins: f64 = returns.iter().filter(|r| **r > 0.0).sum();
    let losses: f64 = -returns.iter().filter(|r| **r < 0.0).sum::<f64>();
    if losses > 0.0 { wins / losses } else { f64::NAN }
}
