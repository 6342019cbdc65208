//! Concrete adapter implementations for ports.

pub mod csv_adapter;
pub mod file_config_adapter;
pub mod paper_broker;
#[cfg(feature = "sqlite")]
pub mod sqlite_fill_store;
pub mod system_clock;
pub mod text_report_adapter;
