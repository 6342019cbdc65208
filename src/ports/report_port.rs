//! Output sinks for finished runs.

use chrono::NaiveDate;

use crate::domain::daily_cycle::DailyReport;
use crate::domain::error::TraderError;
use crate::domain::execution::Fill;

/// Consumes the day's summary. Errors are logged by the caller and never
/// abort the cycle.
pub trait ReportSink {
    fn name(&self) -> &str;

    fn publish(&self, report: &DailyReport) -> Result<(), TraderError>;
}

/// Persists the fill ledger.
pub trait FillStore {
    fn save_fills(&self, date: NaiveDate, fills: &[Fill]) -> Result<(), TraderError>;
}
