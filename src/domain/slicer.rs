//! Child-order schedules for a parent quantity.
//!
//! Every schedule conserves the parent quantity exactly: the slice
//! quantities always sum to the signed quantity that was sliced.

use chrono::{DateTime, Utc};

use super::error::TraderError;
use super::panel::MinutePanel;

/// One child order. `timestamp` is `None` only for immediate placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderSlice {
    pub timestamp: Option<DateTime<Utc>>,
    pub quantity: i64,
}

impl OrderSlice {
    pub fn immediate(quantity: i64) -> Vec<OrderSlice> {
        vec![OrderSlice {
            timestamp: None,
            quantity,
        }]
    }
}

pub trait OrderSlicer {
    fn slice_order(
        &self,
        ticker: &str,
        quantity: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<OrderSlice>;
}

/// Equal-time slicing over `intervals` sub-windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TwapSlicer {
    intervals: usize,
}

impl TwapSlicer {
    pub fn new(intervals: i64) -> Result<Self, TraderError> {
        if intervals <= 0 {
            return Err(TraderError::invalid_config(format!(
                "TWAP intervals must be positive, got {intervals}"
            )));
        }
        Ok(Self {
            intervals: intervals as usize,
        })
    }

    pub fn intervals(&self) -> usize {
        self.intervals
    }
}

impl OrderSlicer for TwapSlicer {
    fn slice_order(
        &self,
        _ticker: &str,
        quantity: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<OrderSlice> {
        let n = self.intervals as i64;
        let sign = quantity.signum();
        let magnitude = quantity.abs();
        let base = magnitude / n;
        let remainder = magnitude - base * n;
        let delta = (end - start) / self.intervals as i32;

        (0..n)
            .map(|i| {
                let extra = if i < remainder { 1 } else { 0 };
                OrderSlice {
                    timestamp: Some(start + delta * i as i32),
                    quantity: sign * (base + extra),
                }
            })
            .collect()
    }
}

/// Volume-profile slicing from the ticker's minute bars in the window.
#[derive(Debug, Clone, Copy)]
pub struct VwapSlicer<'a> {
    minutes: &'a MinutePanel,
}

impl<'a> VwapSlicer<'a> {
    pub fn new(minutes: &'a MinutePanel) -> Self {
        Self { minutes }
    }
}

impl OrderSlicer for VwapSlicer<'_> {
    fn slice_order(
        &self,
        ticker: &str,
        quantity: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<OrderSlice> {
        let window = self.minutes.window(ticker, start, end);
        let total: i64 = window.iter().map(|b| b.volume.max(0)).sum();
        if total == 0 {
            return vec![OrderSlice {
                timestamp: Some(start),
                quantity,
            }];
        }

        let mut slices: Vec<OrderSlice> = window
            .iter()
            .map(|bar| {
                let share = bar.volume.max(0) as f64 / total as f64;
                OrderSlice {
                    timestamp: Some(bar.timestamp),
                    quantity: (share * quantity as f64).round_ties_even() as i64,
                }
            })
            .collect();

        let residual = quantity - slices.iter().map(|s| s.quantity).sum::<i64>();
        slices[0].quantity += residual;
        slices
    }
}
