//! JSON report format.
//!
//! The document is the serialized [`ScanResult`]; reading it back
//! re-normalizes ordering and the summary.

use super::ScanResult;
use crate::error::ReportResult;
use std::io::{Read, Write};

pub fn to_string(result: &ScanResult) -> ReportResult<String> {
    Ok(serde_json::to_string_pretty(result)?)
}

pub fn to_writer<W: Write>(result: &ScanResult, mut writer: W) -> ReportResult<()> {
    serde_json::to_writer_pretty(&mut writer, result)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

pub fn from_str(json: &str) -> ReportResult<ScanResult> {
    let result: ScanResult = serde_json::from_str(json)?;
    Ok(result.normalized())
}

pub fn from_reader<R: Read>(reader: R) -> ReportResult<ScanResult> {
    let result: ScanResult = serde_json::from_reader(reader)?;
    Ok(result.normalized())
}
