//! Report sinks: plain-text file and structured log line.

use std::fs;
use std::path::PathBuf;

use tracing::info;

use crate::domain::daily_cycle::{format_report, DailyReport};
use crate::domain::error::TraderError;
use crate::ports::report_port::ReportSink;

/// Writes the formatted report to a file, replacing any previous content.
pub struct TextReportSink {
    path: PathBuf,
}

impl TextReportSink {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl ReportSink for TextReportSink {
    fn name(&self) -> &str {
        "text"
    }

    fn publish(&self, report: &DailyReport) -> Result<(), TraderError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, format_report(report))?;
        info!(path = %self.path.display(), "report written");
        Ok(())
    }
}

pub struct LogReportSink;

impl ReportSink for LogReportSink {
    fn name(&self) -> &str {
        "log"
    }

    fn publish(&self, report: &DailyReport) -> Result<(), TraderError> {
        info!(
            date = %report.date,
            source = %report.source,
            sharpe = report.summary.sharpe,
            max_drawdown = report.summary.max_drawdown,
            profit_factor = report.summary.profit_factor,
            total_notional = report.total_notional,
            num_trades = report.num_trades,
            failed_slices = report.failed_slices,
            "daily report"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::daily_cycle::RiskSource;
    use crate::domain::performance::PerformanceSummary;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn report() -> DailyReport {
        DailyReport {
            date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            source: RiskSource::Eod,
            summary: PerformanceSummary {
                sharpe: 0.5,
                max_drawdown: -0.1,
                profit_factor: 1.2,
            },
            total_notional: 0.0,
            num_trades: 0,
            failed_slices: 0,
        }
    }

    #[test]
    fn writes_report_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("reports").join("daily.txt");
        let sink = TextReportSink::new(path.clone());

        sink.publish(&report()).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("*Daily Report 2024-01-15*"));
        assert!(content.contains("> Source: eod"));
        assert!(content.contains("> MaxDD: -10.00%"));
    }

    #[test]
    fn unwritable_path_errors() {
        let dir = TempDir::new().unwrap();
        // a directory cannot be overwritten as a file
        let sink = TextReportSink::new(dir.path().to_path_buf());
        assert!(matches!(sink.publish(&report()), Err(TraderError::Io(_))));
    }

    #[test]
    fn log_sink_never_fails() {
        assert!(LogReportSink.publish(&report()).is_ok());
        assert_eq!(LogReportSink.name(), "log");
    }
}
