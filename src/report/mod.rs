//! Scan results and machine-readable reports.
//!
//! [`ScanResult`] fully determines every report; renderers never touch the
//! network.

pub mod csv;
mod files;
pub mod json;
mod result;

pub use files::{report_base_name, write_log, write_reports, ReportPaths};
pub use result::{ScanMeta, ScanResult, ScanSummary};
