//! Port types with validation and parsing.
//!
//! The `Port` newtype ensures values are always valid port numbers (1-65535).
//! `PortSpec` turns either an explicit list or the default common-port set
//! into the finalized, sorted and de-duplicated list the scanner consumes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A validated network port number (1-65535).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct Port(u16);

impl Port {
    /// Minimum valid port number.
    pub const MIN: u16 = 1;
    /// Maximum valid port number.
    pub const MAX: u16 = 65535;

    /// Create a new Port from a u16, returning None if invalid.
    #[inline]
    pub const fn new(port: u16) -> Option<Self> {
        if port >= Self::MIN {
            Some(Self(port))
        } else {
            None
        }
    }

    /// Get the raw port number.
    #[inline]
    pub const fn as_u16(self) -> u16 {
        self.0
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u16> for Port {
    type Error = PortError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(PortError::OutOfRange(value))
    }
}

impl From<Port> for u16 {
    fn from(port: Port) -> Self {
        port.0
    }
}

/// Error type for port parsing and validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("port {0} is out of valid range (1-65535)")]
    OutOfRange(u16),
    #[error("invalid port number: {0}")]
    InvalidFormat(String),
    #[error("invalid port range: start ({0}) > end ({1})")]
    InvalidRange(u16, u16),
    #[error("empty port specification")]
    Empty,
}

/// Ports probed when the caller does not supply an explicit list.
const COMMON_PORTS: &[u16] = &[
    20, 21, 22, 23, 25, 53, 67, 68, 69, 80, 110, 119, 123, 135, 137, 138, 139, 143, 161, 162,
    194, 389, 443, 445, 465, 514, 636, 1025, 1433, 1521, 1720, 1723, 2049, 2121, 2222, 2375,
    3000, 3306, 3389, 5000, 5001, 5002, 5003, 5060, 5140, 5173, 5432, 5500, 5501, 5502, 5900,
    5901, 5902, 5903, 6000, 6001, 6002, 6003, 6379, 8000, 8001, 8002, 8003, 8004, 8080, 8081,
    8082, 8083, 8084, 8085, 8443, 8880, 8881, 8882, 8883, 8888, 9000, 9090, 9091, 9092, 9093,
    9094, 10000, 10002, 10003, 10004, 10005, 11211, 11212, 11213, 11214, 11215, 27017, 27018,
    27019, 27020, 27021,
];

/// The set of ports to probe on every live host.
///
/// Supports formats like:
/// - Single port: "80"
/// - Comma-separated: "80,443,8080"
/// - Range: "8000-8010"
/// - Mixed: "22,80,443,8000-9000"
///
/// Whatever the input, [`PortSpec::to_ports`] yields an ascending list with no
/// duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortSpec {
    ports: Vec<Port>,
}

impl PortSpec {
    /// Build a spec from an explicit list of ports.
    pub fn from_ports(ports: impl IntoIterator<Item = Port>) -> Result<Self, PortError> {
        let mut ports: Vec<Port> = ports.into_iter().collect();
        if ports.is_empty() {
            return Err(PortError::Empty);
        }
        ports.sort_unstable();
        ports.dedup();
        Ok(Self { ports })
    }

    /// The default common-port set.
    pub fn common() -> Self {
        let mut ports: Vec<Port> = COMMON_PORTS.iter().filter_map(|&p| Port::new(p)).collect();
        ports.sort_unstable();
        ports.dedup();
        Self { ports }
    }

    /// Get all ports as a sorted, deduplicated slice.
    pub fn to_ports(&self) -> Vec<Port> {
        self.ports.clone()
    }

    /// Get the total number of unique ports.
    pub fn count(&self) -> usize {
        self.ports.len()
    }

    pub fn contains(&self, port: Port) -> bool {
        self.ports.binary_search(&port).is_ok()
    }
}

impl Default for PortSpec {
    fn default() -> Self {
        Self::common()
    }
}

fn parse_port(s: &str) -> Result<Port, PortError> {
    let value: u16 = s
        .trim()
        .parse()
        .map_err(|_| PortError::InvalidFormat(s.trim().to_string()))?;
    Port::new(value).ok_or(PortError::OutOfRange(value))
}

impl FromStr for PortSpec {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(PortError::Empty);
        }

        let mut ports = Vec::new();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            match part.split_once('-') {
                Some((start, end)) => {
                    let start = parse_port(start)?;
                    let end = parse_port(end)?;
                    if start > end {
                        return Err(PortError::InvalidRange(start.0, end.0));
                    }
                    ports.extend((start.0..=end.0).map(Port));
                }
                None => ports.push(parse_port(part)?),
            }
        }

        Self::from_ports(ports)
    }
}

impl fmt::Display for PortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.ports.iter().map(|p| p.to_string()).collect();
        write!(f, "{}", parts.join(","))
    }
}
