//! Report folders on disk.
//!
//! Each scan gets its own folder named after the target and the start time,
//! holding a JSON and a CSV file with the same base name, and optionally the
//! run's `.log`.

use super::ScanResult;
use crate::error::ReportResult;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::info;

/// Locations of the files written for one scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPaths {
    pub folder: PathBuf,
    pub json: PathBuf,
    pub csv: PathBuf,
    /// Only written by [`write_log`].
    pub log: PathBuf,
}

/// `10.0.0.0/24` started 2026-03-01 12:00:00 UTC becomes
/// `10.0.0.0_24_scan_20260301_120000`.
pub fn report_base_name(result: &ScanResult) -> String {
    // IPv6 colons are not valid in file names everywhere.
    let target: String = result
        .target()
        .chars()
        .map(|c| if c == '/' || c == ':' { '_' } else { c })
        .collect();
    format!(
        "{}_scan_{}",
        target,
        result.started_at().format("%Y%m%d_%H%M%S")
    )
}

/// Write the JSON and CSV reports for `result` under `dir`.
pub fn write_reports(result: &ScanResult, dir: &Path) -> ReportResult<ReportPaths> {
    let base = report_base_name(result);
    let folder = dir.join(&base);
    fs::create_dir_all(&folder)?;

    let paths = ReportPaths {
        json: folder.join(format!("{}.json", base)),
        csv: folder.join(format!("{}.csv", base)),
        log: folder.join(format!("{}.log", base)),
        folder,
    };

    super::json::to_writer(result, BufWriter::new(File::create(&paths.json)?))?;
    super::csv::write_hosts(result.hosts(), BufWriter::new(File::create(&paths.csv)?))?;

    info!(folder = %paths.folder.display(), "reports written");
    Ok(paths)
}

/// Save the run's log next to the reports written by [`write_reports`].
pub fn write_log(paths: &ReportPaths, contents: &[u8]) -> ReportResult<()> {
    fs::write(&paths.log, contents)?;
    Ok(())
}
