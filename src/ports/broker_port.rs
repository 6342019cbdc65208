//! Broker port.

use crate::domain::error::TraderError;
use crate::domain::execution::{Fill, Side};

/// Places market orders. Implementations block until the order is filled.
///
/// Calls may arrive from several worker threads at once, but never two at a
/// time for the same ticker.
pub trait Broker: Send + Sync {
    /// `quantity` is always at least 1. Failures are
    /// [`TraderError::BrokerUnavailable`] or [`TraderError::OrderRejected`].
    fn submit_market_order(&self, ticker: &str, quantity: u64, side: Side) -> Result<Fill, TraderError>;
}
