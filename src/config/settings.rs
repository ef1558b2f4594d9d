//! Scan settings and paths.
//!
//! Settings are read from `settings.json` in the XDG configuration directory
//! when it exists; every field falls back to its default.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application directory paths following the XDG Base Directory Specification.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Configuration directory (~/.config/hostsweep)
    pub config_dir: PathBuf,
    /// Data directory (~/.local/share/hostsweep), default home for reports
    pub data_dir: PathBuf,
}

impl Paths {
    pub fn new() -> ConfigResult<Self> {
        let project =
            ProjectDirs::from("", "", "hostsweep").ok_or(ConfigError::DirectoryNotFound)?;

        Ok(Self {
            config_dir: project.config_dir().to_path_buf(),
            data_dir: project.data_dir().to_path_buf(),
        })
    }

    pub fn settings_file(&self) -> PathBuf {
        self.config_dir.join("settings.json")
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.data_dir.join("reports")
    }
}

/// How liveness is established.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProbeMethod {
    /// System ping, falling back to a TCP connect when ping is unavailable.
    #[default]
    Auto,
    /// System ping only.
    Icmp,
    /// TCP connect to the fallback port only.
    Tcp,
}

/// Longest accepted value for any `*_timeout_ms` setting.
pub const MAX_TIMEOUT_MS: u64 = 600_000;

/// Tunables for a scan run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    /// Maximum simultaneous liveness probes.
    pub probe_concurrency: usize,
    /// Per-attempt liveness timeout in milliseconds.
    pub probe_timeout_ms: u64,
    /// Extra liveness attempts after a timeout.
    pub probe_retries: u32,
    pub probe_method: ProbeMethod,
    /// Port used by the TCP liveness fallback.
    pub fallback_port: u16,
    /// Maximum hosts being port-scanned at once.
    pub host_concurrency: usize,
    /// Maximum simultaneous port probes per host.
    pub port_concurrency: usize,
    /// Per-port connect timeout in milliseconds.
    pub connect_timeout_ms: u64,
    /// Banner read window in milliseconds.
    pub banner_timeout_ms: u64,
    /// Also read banners from ports that already have a static service name.
    pub grab_banners: bool,
    pub resolve_mac: bool,
    /// Maximum simultaneous neighbor table lookups.
    pub mac_concurrency: usize,
    /// Port probes per second across the whole scan, 0 for unlimited.
    pub rate_limit: u32,
    /// Largest target expansion accepted.
    pub max_hosts: u64,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            probe_concurrency: 50,
            probe_timeout_ms: 1000,
            probe_retries: 1,
            probe_method: ProbeMethod::Auto,
            fallback_port: 80,
            host_concurrency: 16,
            port_concurrency: 64,
            connect_timeout_ms: 500,
            banner_timeout_ms: 1000,
            grab_banners: false,
            resolve_mac: true,
            mac_concurrency: 50,
            rate_limit: 0,
            max_hosts: 65_536,
        }
    }
}

impl ScanSettings {
    /// Load settings from the default location, or defaults when absent.
    pub fn load() -> ConfigResult<Self> {
        let file = Paths::new()?.settings_file();
        if !file.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&file)
    }

    /// Load settings from a specific file.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let settings: Self =
            serde_json::from_str(&content).map_err(|e| ConfigError::InvalidFormat(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings that would stall or never start a stage.
    pub fn validate(&self) -> ConfigResult<()> {
        let limits = [
            ("probe_concurrency", self.probe_concurrency),
            ("host_concurrency", self.host_concurrency),
            ("port_concurrency", self.port_concurrency),
            ("mac_concurrency", self.mac_concurrency),
        ];
        if let Some((name, _)) = limits.iter().find(|(_, v)| *v == 0) {
            return Err(ConfigError::Invalid(format!("{} must be at least 1", name)));
        }

        let timeouts = [
            ("probe_timeout_ms", self.probe_timeout_ms),
            ("connect_timeout_ms", self.connect_timeout_ms),
            ("banner_timeout_ms", self.banner_timeout_ms),
        ];
        if let Some((name, _)) = timeouts.iter().find(|(_, v)| *v == 0) {
            return Err(ConfigError::Invalid(format!("{} must be non-zero", name)));
        }
        if let Some((name, _)) = timeouts.iter().find(|(_, v)| *v > MAX_TIMEOUT_MS) {
            return Err(ConfigError::Invalid(format!(
                "{} must be at most {}",
                name, MAX_TIMEOUT_MS
            )));
        }

        if self.fallback_port == 0 {
            return Err(ConfigError::Invalid("fallback_port must be 1-65535".to_string()));
        }
        Ok(())
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn banner_timeout(&self) -> Duration {
        Duration::from_millis(self.banner_timeout_ms)
    }
}
