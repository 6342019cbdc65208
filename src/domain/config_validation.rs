//! Configuration validation and loading.
//!
//! Every key is checked before anything runs. Out-of-range values are
//! rejected, never clamped.

use std::str::FromStr;
use std::time::Duration;

use crate::domain::cost::CostModel;
use crate::domain::daily_cycle::{CycleConfig, DEFAULT_HISTORY_DAYS, DEFAULT_LOOKBACK_DAYS};
use crate::domain::error::TraderError;
use crate::domain::execution::{ExecutionConfig, SchedulePolicy, SlicingMethod};
use crate::domain::intraday_backtest::{DEFAULT_ATR_MULTIPLIER, DEFAULT_ATR_WINDOW, IntradayConfig};
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_SLIPPAGE: f64 = 0.0005;
pub const DEFAULT_COMMISSION: f64 = 0.0002;
pub const DEFAULT_BROKER_TIMEOUT_MS: i64 = 30_000;
pub const DEFAULT_SQLITE_POOL_SIZE: i64 = 4;

/// Checks every section; returns the first violation.
pub fn validate_cycle_config(config: &dyn ConfigPort) -> Result<(), TraderError> {
    load_cycle_config(config)?;
    sqlite_pool_size(config)?;
    Ok(())
}

/// `[sqlite] pool_size`, checked like every other key.
pub fn sqlite_pool_size(config: &dyn ConfigPort) -> Result<u32, TraderError> {
    let size = positive(config, "sqlite", "pool_size", DEFAULT_SQLITE_POOL_SIZE)?;
    u32::try_from(size).map_err(|_| invalid("sqlite", "pool_size", format!("pool_size {size} is too large")))
}

pub fn load_cycle_config(config: &dyn ConfigPort) -> Result<CycleConfig, TraderError> {
    Ok(CycleConfig {
        tickers: load_tickers(config)?,
        costs: load_costs(config)?,
        intraday: load_intraday(config)?,
        execution: load_execution(config)?,
        history_days: positive(config, "data", "history_days", DEFAULT_HISTORY_DAYS)?,
        lookback_days: positive(config, "intraday", "lookback_days", DEFAULT_LOOKBACK_DAYS as i64)? as usize,
        live: flag(config, "execution", "live", false)?,
    })
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> TraderError {
    TraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

/// Parses the raw value so that typos surface instead of silently
/// falling back to the default.
fn parsed<T: FromStr>(config: &dyn ConfigPort, section: &str, key: &str, default: T) -> Result<T, TraderError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(raw) if raw.trim().is_empty() => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| invalid(section, key, format!("cannot parse {raw:?}"))),
    }
}

fn positive(config: &dyn ConfigPort, section: &str, key: &str, default: i64) -> Result<i64, TraderError> {
    let value = parsed(config, section, key, default)?;
    if value <= 0 {
        return Err(invalid(section, key, format!("{key} must be positive")));
    }
    Ok(value)
}

fn non_negative_rate(config: &dyn ConfigPort, key: &str, default: f64) -> Result<f64, TraderError> {
    let value: f64 = parsed(config, "costs", key, default)?;
    if !value.is_finite() || value < 0.0 {
        return Err(invalid("costs", key, format!("{key} must be non-negative")));
    }
    Ok(value)
}

fn flag(config: &dyn ConfigPort, section: &str, key: &str, default: bool) -> Result<bool, TraderError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(raw) => match raw.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(true),
            "false" | "no" | "0" => Ok(false),
            _ => Err(invalid(section, key, format!("expected true or false, got {raw:?}"))),
        },
    }
}

fn load_tickers(config: &dyn ConfigPort) -> Result<Vec<String>, TraderError> {
    let tickers = config.get_list("universe", "tickers");
    if tickers.is_empty() {
        return Err(TraderError::ConfigMissing {
            section: "universe".to_string(),
            key: "tickers".to_string(),
        });
    }
    Ok(tickers.into_iter().map(|t| t.to_uppercase()).collect())
}

fn load_costs(config: &dyn ConfigPort) -> Result<CostModel, TraderError> {
    let slippage = non_negative_rate(config, "slippage", DEFAULT_SLIPPAGE)?;
    let commission = non_negative_rate(config, "commission", DEFAULT_COMMISSION)?;
    CostModel::new(slippage, commission)
}

fn load_intraday(config: &dyn ConfigPort) -> Result<IntradayConfig, TraderError> {
    let atr_window = positive(config, "intraday", "atr_window", DEFAULT_ATR_WINDOW as i64)? as usize;
    let atr_multiplier: f64 = parsed(config, "intraday", "atr_multiplier", DEFAULT_ATR_MULTIPLIER)?;
    if !atr_multiplier.is_finite() || atr_multiplier <= 0.0 {
        return Err(invalid("intraday", "atr_multiplier", "atr_multiplier must be positive"));
    }
    Ok(IntradayConfig {
        atr_window,
        atr_multiplier,
    })
}

fn load_execution(config: &dyn ConfigPort) -> Result<ExecutionConfig, TraderError> {
    let defaults = ExecutionConfig::default();

    let method = match config.get_string("execution", "method") {
        None => defaults.method,
        Some(raw) => raw
            .parse::<SlicingMethod>()
            .map_err(|e| invalid("execution", "method", e.to_string()))?,
    };
    let schedule = match config.get_string("execution", "schedule") {
        None => defaults.schedule,
        Some(raw) => raw
            .parse::<SchedulePolicy>()
            .map_err(|e| invalid("execution", "schedule", e.to_string()))?,
    };

    let twap_intervals = positive(config, "execution", "twap_intervals", defaults.twap_intervals)?;
    let workers = positive(config, "execution", "workers", defaults.workers as i64)? as usize;
    let timeout_ms = positive(config, "execution", "broker_timeout_ms", DEFAULT_BROKER_TIMEOUT_MS)?;

    let total_capital: f64 = parsed(config, "execution", "total_capital", defaults.total_capital)?;
    if !total_capital.is_finite() || total_capital <= 0.0 {
        return Err(invalid("execution", "total_capital", "total_capital must be positive"));
    }

    match config.get_string("execution", "broker") {
        None => {}
        Some(raw) if raw.trim().eq_ignore_ascii_case("paper") => {}
        Some(raw) => return Err(invalid("execution", "broker", format!("unsupported broker {raw:?}"))),
    }

    Ok(ExecutionConfig {
        method,
        twap_intervals,
        total_capital,
        workers,
        schedule,
        broker_timeout: Some(Duration::from_millis(timeout_ms as u64)),
    })
}
