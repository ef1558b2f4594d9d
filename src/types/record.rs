//! Per-port and per-host scan records.
//!
//! A [`HostRecord`] starts life as a shell produced by the host prober and is
//! filled in by the port scanner (ports) and the MAC resolver (mac). Each
//! field has exactly one writer.

use super::Port;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use uuid::Uuid;

/// Terminal state of a single port probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortState {
    /// Connection completed within the timeout.
    Open,
    /// Connection actively refused.
    Closed,
    /// No response within the timeout.
    Filtered,
}

impl fmt::Display for PortState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
            Self::Filtered => write!(f, "filtered"),
        }
    }
}

impl FromStr for PortState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "closed" => Ok(Self::Closed),
            "filtered" => Ok(Self::Filtered),
            other => Err(format!("unknown port state: {}", other)),
        }
    }
}

/// Result of probing one port on one host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRecord {
    pub port: Port,
    pub state: PortState,
    /// Service name, assigned to open ports only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    /// Sanitised banner, when one was read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banner: Option<String>,
}

impl PortRecord {
    pub fn new(port: Port, state: PortState) -> Self {
        Self {
            port,
            state,
            service: None,
            banner: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.state == PortState::Open
    }
}

/// A hardware (link-layer) address, normalised to lowercase colon form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddr([u8; 6]);

impl MacAddr {
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    pub const fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// All-zero entries show up for incomplete neighbor table rows.
    pub fn is_zero(&self) -> bool {
        self.0 == [0; 6]
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}", a, b, c, d, e, g)
    }
}

impl FromStr for MacAddr {
    type Err = String;

    /// Accepts `aa:bb:cc:dd:ee:ff` and `aa-bb-cc-dd-ee-ff`, with one- or
    /// two-digit groups (`arp` on macOS drops leading zeros).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let groups: Vec<&str> = s.trim().split(|c| c == ':' || c == '-').collect();
        if groups.len() != 6 {
            return Err(format!("invalid MAC address: {}", s));
        }
        let mut octets = [0u8; 6];
        for (slot, group) in octets.iter_mut().zip(&groups) {
            if group.is_empty() || group.len() > 2 {
                return Err(format!("invalid MAC address: {}", s));
            }
            *slot = u8::from_str_radix(group, 16)
                .map_err(|_| format!("invalid MAC address: {}", s))?;
        }
        Ok(Self(octets))
    }
}

impl Serialize for MacAddr {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MacAddr {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Everything learned about one candidate address.
///
/// `alive == false` implies `ports` is empty and `mac` is `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRecord {
    pub address: IpAddr,
    pub alive: bool,
    #[serde(default)]
    pub mac: Option<MacAddr>,
    /// One record per requested port, ascending by port number.
    #[serde(default)]
    pub ports: Vec<PortRecord>,
    /// Time spent establishing liveness, in milliseconds.
    #[serde(default)]
    pub probe_duration_ms: u64,
    /// Set when an interrupted scan left this host's port list or MAC
    /// lookup unfinished.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub partial: bool,
}

impl HostRecord {
    /// A fresh record as emitted by the host prober.
    pub fn shell(address: IpAddr, alive: bool, probe_duration_ms: u64) -> Self {
        Self {
            address,
            alive,
            mac: None,
            ports: Vec::new(),
            probe_duration_ms,
            partial: false,
        }
    }

    pub fn open_ports(&self) -> impl Iterator<Item = &PortRecord> {
        self.ports.iter().filter(|p| p.is_open())
    }
}

/// A unique identifier for a scan result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScanId(Uuid);

impl ScanId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// First eight characters, for display.
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for ScanId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ScanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ScanId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}
