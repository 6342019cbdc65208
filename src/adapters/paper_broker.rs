//! In-process broker that fills every order at a reference price.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::domain::error::TraderError;
use crate::domain::execution::{Fill, Side};
use crate::domain::panel::DailyPanel;
use crate::ports::broker_port::Broker;

/// Buys fill `slippage` above the reference price, sells the same amount below.
pub struct PaperBroker {
    reference: HashMap<String, f64>,
    slippage: f64,
}

impl PaperBroker {
    pub fn new(reference: HashMap<String, f64>, slippage: f64) -> Self {
        Self { reference, slippage }
    }

    /// Reference prices are each ticker's last close on or before `date`.
    pub fn from_panel(prices: &DailyPanel, date: NaiveDate, slippage: f64) -> Self {
        let reference = prices
            .tickers()
            .filter_map(|ticker| {
                prices
                    .history(ticker)
                    .and_then(|h| h.close_on_or_before(date))
                    .map(|close| (ticker.to_string(), close))
            })
            .collect();
        Self::new(reference, slippage)
    }
}

impl Broker for PaperBroker {
    fn submit_market_order(&self, ticker: &str, quantity: u64, side: Side) -> Result<Fill, TraderError> {
        if quantity == 0 {
            return Err(TraderError::OrderRejected {
                ticker: ticker.to_string(),
                reason: "zero quantity".into(),
            });
        }
        let Some(&price) = self.reference.get(ticker) else {
            return Err(TraderError::OrderRejected {
                ticker: ticker.to_string(),
                reason: "no reference price".into(),
            });
        };
        let avg_fill_price = match side {
            Side::Buy => price * (1.0 + self.slippage),
            Side::Sell => price * (1.0 - self.slippage),
        };
        Ok(Fill {
            ticker: ticker.to_string(),
            side,
            quantity,
            avg_fill_price,
            slice_time: None,
        })
    }
}
