//! Configuration management for hostsweep.
//!
//! Provides XDG-compliant paths and the scan settings every stage reads.

mod settings;

pub use settings::{Paths, ProbeMethod, ScanSettings, MAX_TIMEOUT_MS};
