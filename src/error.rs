//! Error types for hostsweep.
//!
//! Uses `thiserror` for ergonomic error definitions. Only a malformed target
//! (or an unusable configuration) aborts a scan; every other variant of
//! [`ScanError`] is produced by a collaborator and folded into the record it
//! concerns.

use crate::types::{PortError, TargetError};
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for scanning operations.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("invalid target: {0}")]
    InvalidTarget(#[from] TargetError),

    #[error("no liveness response from {0}")]
    ProbeTimeout(std::net::IpAddr),

    #[error("connection to {addr} failed: {reason}")]
    PortConnectFailure {
        addr: std::net::SocketAddr,
        reason: String,
    },

    #[error("no response from {0} within timeout")]
    PortProbeTimeout(std::net::SocketAddr),

    #[error("MAC resolution unavailable: {0}")]
    MacResolution(String),

    #[error("banner read from {addr} failed: {reason}")]
    BannerRead {
        addr: std::net::SocketAddr,
        reason: String,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while loading or validating settings.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not determine a configuration directory")]
    DirectoryNotFound,

    #[error("failed to read {path}: {reason}")]
    ReadFailed { path: PathBuf, reason: String },

    #[error("invalid settings format: {0}")]
    InvalidFormat(String),

    #[error("{0}")]
    Invalid(String),

    #[error("invalid port list: {0}")]
    Ports(#[from] PortError),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while writing or reading scan reports.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("malformed report row {row}: {reason}")]
    MalformedRow { row: usize, reason: String },
}

pub type ReportResult<T> = Result<T, ReportError>;
