//! # hostsweep - Host Discovery and Port Scanning
//!
//! hostsweep takes an IP address or CIDR block, finds the hosts that are
//! alive, scans them for open TCP ports, names the services it finds and
//! resolves hardware addresses for hosts on the local link.
//!
//! ## Features
//!
//! - **Target Expansion**: single IPv4/IPv6 addresses and CIDR blocks
//! - **Liveness Probing**: system ping with a TCP fallback, retried on timeout
//! - **Bounded Concurrency**: every stage runs as a bounded worker pool
//! - **Service Identification**: well-known ports plus banner signatures
//! - **MAC Resolution**: from the local neighbor table
//! - **Reports**: JSON and CSV, both readable back into records
//! - **Cancellation**: interrupted scans keep what they finished
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use hostsweep::config::ScanSettings;
//! use hostsweep::scanner::run_scan;
//! use hostsweep::types::PortSpec;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() {
//!     let ports: PortSpec = "22,80,443".parse().unwrap();
//!     let settings = ScanSettings::default();
//!     let cancel = CancellationToken::new();
//!     let result = run_scan("192.168.1.0/24", &ports, &settings, &cancel)
//!         .await
//!         .unwrap();
//!
//!     for host in result.alive_hosts() {
//!         println!("{} has {} open ports", host.address, host.open_ports().count());
//!     }
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`types`] - Ports, targets and the per-host records
//! - [`scanner`] - The scan engine, its stages and their network collaborators
//! - [`services`] - Service catalog and identification
//! - [`report`] - The aggregated result and its JSON/CSV reports
//! - [`config`] - Scan settings and file locations
//! - [`error`] - Error types
//! - [`logging`] - Tracing setup and the saved scan log
//! - [`output`] - Terminal output

pub mod banner;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod output;
pub mod report;
pub mod scanner;
pub mod services;
pub mod types;

// Re-export commonly used types
pub use config::ScanSettings;
pub use error::{ConfigError, ReportError, ScanError};
pub use report::{ScanResult, ScanSummary};
pub use scanner::{run_scan, Collaborators, Engine};
pub use services::ServiceCatalog;
pub use types::{HostRecord, MacAddr, Port, PortRecord, PortSpec, PortState, TargetSpec};
