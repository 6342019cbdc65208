//! Flat-rate transaction cost model.

use super::error::TraderError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostModel {
    slippage: f64,
    commission: f64,
}

impl CostModel {
    /// Negative or non-finite rates are rejected, never clamped.
    pub fn new(slippage: f64, commission: f64) -> Result<Self, TraderError> {
        if !slippage.is_finite() || slippage < 0.0 {
            return Err(TraderError::invalid_config(format!(
                "slippage must be a non-negative number, got {slippage}"
            )));
        }
        if !commission.is_finite() || commission < 0.0 {
            return Err(TraderError::invalid_config(format!(
                "commission must be a non-negative number, got {commission}"
            )));
        }
        Ok(Self {
            slippage,
            commission,
        })
    }

    pub fn zero() -> Self {
        Self {
            slippage: 0.0,
            commission: 0.0,
        }
    }

    pub fn slippage(&self) -> f64 {
        self.slippage
    }

    pub fn commission(&self) -> f64 {
        self.commission
    }

    /// slippage + commission
    pub fn rate(&self) -> f64 {
        self.slippage + self.commission
    }

    /// Cost of trading `traded` units of weight in either direction.
    pub fn charge(&self, traded: f64) -> f64 {
        traded.abs() * self.rate()
    }
}
