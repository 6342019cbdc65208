//! Core domain types and logic.

pub mod atr;
pub mod bar;
pub mod cleaner;
pub mod config_validation;
pub mod cost;
pub mod daily_cycle;
pub mod eod_backtest;
pub mod error;
pub mod execution;
pub mod intraday_backtest;
pub mod panel;
pub mod performance;
pub mod slicer;
pub mod weight;
