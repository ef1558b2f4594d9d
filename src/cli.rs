//! Command-line interface definitions for hostsweep.
//!
//! Uses `clap` derive macros for declarative argument parsing. Flags override
//! individual fields of the settings file.

use crate::config::{ProbeMethod, ScanSettings};
use crate::error::ConfigResult;
use crate::types::PortSpec;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Discover live hosts on a network and the services they expose.
#[derive(Parser, Debug)]
#[command(name = "hostsweep")]
#[command(version)]
#[command(about = "Host discovery and port scanning for IP ranges", long_about = None)]
pub struct Args {
    /// Target to scan: an IP address or CIDR block
    ///
    /// Examples:
    ///   192.168.1.10       Single address
    ///   192.168.1.0/24     Every usable address in the block
    #[arg(value_name = "TARGET")]
    pub target: String,

    /// Ports to scan (e.g., "80", "22,80,443", "8000-8010"); defaults to
    /// the common port list
    #[arg(short, long)]
    pub ports: Option<String>,

    /// How to decide whether a host is alive
    #[arg(long, value_enum)]
    pub probe: Option<ProbeMethod>,

    /// Port used by the TCP liveness probe
    #[arg(long)]
    pub probe_port: Option<u16>,

    /// Liveness probe timeout in milliseconds
    #[arg(long)]
    pub probe_timeout: Option<u64>,

    /// Extra liveness attempts after a timeout
    #[arg(long)]
    pub retries: Option<u32>,

    /// Maximum simultaneous liveness probes
    #[arg(long)]
    pub probe_concurrency: Option<usize>,

    /// Maximum hosts port-scanned at once
    #[arg(long)]
    pub host_concurrency: Option<usize>,

    /// Maximum simultaneous port probes per host
    #[arg(short = 'c', long)]
    pub concurrency: Option<usize>,

    /// Port connect timeout in milliseconds
    #[arg(short = 't', long)]
    pub timeout: Option<u64>,

    /// Rate limit in port probes per second (0 = unlimited)
    #[arg(short = 'r', long = "rate")]
    pub rate_limit: Option<u32>,

    /// Also capture banners from ports with a well-known service
    #[arg(short = 'b', long)]
    pub grab_banners: bool,

    /// Skip hardware address lookup
    #[arg(long)]
    pub no_mac: bool,

    /// Settings file to use instead of the default location
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Output format for results
    #[arg(short, long, value_enum, default_value = "plain")]
    pub output: OutputFormat,

    /// Directory for the JSON and CSV report folder
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Don't write report files
    #[arg(long)]
    pub no_save: bool,

    /// Suppress the header and progress spinner
    #[arg(short, long)]
    pub quiet: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable plain text
    Plain,
    /// JSON structured output
    Json,
    /// CSV format for data analysis
    Csv,
}

impl Args {
    /// Settings from the config file with command-line overrides applied.
    pub fn settings(&self) -> ConfigResult<ScanSettings> {
        let base = match &self.config {
            Some(path) => ScanSettings::load_from(path)?,
            None => ScanSettings::load()?,
        };
        let settings = self.apply(base);
        settings.validate()?;
        Ok(settings)
    }

    /// Overlay the flags that were given onto `settings`.
    pub fn apply(&self, mut settings: ScanSettings) -> ScanSettings {
        if let Some(method) = self.probe {
            settings.probe_method = method;
        }
        if let Some(port) = self.probe_port {
            settings.fallback_port = port;
        }
        if let Some(ms) = self.probe_timeout {
            settings.probe_timeout_ms = ms;
        }
        if let Some(retries) = self.retries {
            settings.probe_retries = retries;
        }
        if let Some(n) = self.probe_concurrency {
            settings.probe_concurrency = n;
        }
        if let Some(n) = self.host_concurrency {
            settings.host_concurrency = n;
        }
        if let Some(n) = self.concurrency {
            settings.port_concurrency = n;
        }
        if let Some(ms) = self.timeout {
            settings.connect_timeout_ms = ms;
        }
        if let Some(rate) = self.rate_limit {
            settings.rate_limit = rate;
        }
        if self.grab_banners {
            settings.grab_banners = true;
        }
        if self.no_mac {
            settings.resolve_mac = false;
        }
        settings
    }

    /// The requested port set, or the common ports.
    pub fn port_spec(&self) -> ConfigResult<PortSpec> {
        match &self.ports {
            Some(list) => Ok(list.parse()?),
            None => Ok(PortSpec::common()),
        }
    }

    /// Where report folders go: `--output-dir` or the data directory.
    pub fn reports_dir(&self) -> ConfigResult<PathBuf> {
        match &self.output_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(crate::config::Paths::new()?.reports_dir()),
        }
    }
}
