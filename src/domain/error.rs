//! Domain error types.

use chrono::NaiveDate;

/// Top-level error type for dailytrader.
///
/// Undefined performance ratios are not errors: they surface as `NaN` in
/// [`PerformanceSummary`](crate::domain::performance::PerformanceSummary).
#[derive(Debug, thiserror::Error)]
pub enum TraderError {
    #[error("no data for {ticker} on {date}")]
    DataGap { ticker: String, date: NaiveDate },

    #[error("invalid configuration: {reason}")]
    InvalidConfiguration { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("broker unavailable for {ticker}: {reason}")]
    BrokerUnavailable { ticker: String, reason: String },

    #[error("order rejected for {ticker}: {reason}")]
    OrderRejected { ticker: String, reason: String },

    #[error("broker call for {ticker} timed out after {timeout_ms} ms")]
    BrokerTimeout { ticker: String, timeout_ms: u64 },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TraderError {
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        TraderError::InvalidConfiguration {
            reason: reason.into(),
        }
    }

    /// Broker-side failures are reported per slice and never retried.
    pub fn is_broker_failure(&self) -> bool {
        matches!(
            self,
            TraderError::BrokerUnavailable { .. }
                | TraderError::OrderRejected { .. }
                | TraderError::BrokerTimeout { .. }
        )
    }
}

impl From<&TraderError> for std::process::ExitCode {
    fn from(err: &TraderError) -> Self {
        let code: u8 = match err {
            TraderError::Io(_) => 1,
            TraderError::InvalidConfiguration { .. }
            | TraderError::ConfigParse { .. }
            | TraderError::ConfigMissing { .. }
            | TraderError::ConfigInvalid { .. } => 2,
            TraderError::Database { .. } | TraderError::DatabaseQuery { .. } => 3,
            TraderError::BrokerUnavailable { .. }
            | TraderError::OrderRejected { .. }
            | TraderError::BrokerTimeout { .. } => 4,
            TraderError::DataGap { .. } | TraderError::Data { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
