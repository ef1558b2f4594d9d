//! Output formatting module.
//!
//! Prints scan results as a plain text table, JSON or CSV.

mod plain;

pub use plain::{print_error, print_scan_header, print_success, print_warning, render_plain};

use crate::cli::OutputFormat;
use crate::error::ReportResult;
use crate::report::{self, ScanResult};
use std::io;

/// Format and print scan results to stdout according to `format`.
pub fn print_results(result: &ScanResult, format: OutputFormat) -> ReportResult<()> {
    let stdout = io::stdout();
    let out = stdout.lock();
    match format {
        OutputFormat::Plain => render_plain(result, out)?,
        OutputFormat::Json => report::json::to_writer(result, out)?,
        OutputFormat::Csv => report::csv::write_hosts(result.hosts(), out)?,
    }
    Ok(())
}
