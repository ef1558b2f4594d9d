//! Target expressions and their expansion into concrete addresses.
//!
//! A target is either a single IP address (IPv4 or IPv6) or a CIDR block.
//! Expansion is pure and yields addresses in ascending numeric order. For IPv4
//! blocks with a prefix of /30 or shorter the network and broadcast addresses
//! are skipped; /31 and /32 blocks are expanded in full.

use ipnetwork::IpNetwork;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

/// Error type for target parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TargetError {
    #[error("'{0}' is not a valid IP address or CIDR block")]
    InvalidFormat(String),
    #[error("invalid CIDR notation: {0}")]
    InvalidCidr(String),
    #[error("target expands to {0} addresses (max: {1})")]
    TooLarge(u128, u128),
}

/// A parsed target expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetSpec {
    /// A single IP address.
    Single(IpAddr),
    /// A CIDR network range.
    Cidr(IpNetwork),
}

impl TargetSpec {
    /// Parse a target specification from a string.
    pub fn parse(s: &str) -> Result<Self, TargetError> {
        let s = s.trim();

        if let Ok(ip) = s.parse::<IpAddr>() {
            return Ok(Self::Single(ip));
        }

        if s.contains('/') {
            let network: IpNetwork = s
                .parse()
                .map_err(|_| TargetError::InvalidCidr(s.to_string()))?;
            return Ok(Self::Cidr(network));
        }

        Err(TargetError::InvalidFormat(s.to_string()))
    }

    /// Number of addresses [`TargetSpec::addresses`] will yield.
    pub fn host_count(&self) -> u128 {
        match self {
            Self::Single(_) => 1,
            Self::Cidr(IpNetwork::V4(net)) => {
                let size = 1u128 << (32 - u32::from(net.prefix()));
                if net.prefix() <= 30 {
                    size - 2
                } else {
                    size
                }
            }
            Self::Cidr(IpNetwork::V6(net)) => match net.prefix() {
                0 => u128::MAX,
                prefix => 1u128 << (128 - u32::from(prefix)),
            },
        }
    }

    /// Lazily iterate the candidate addresses in ascending order.
    pub fn addresses(&self) -> Box<dyn Iterator<Item = IpAddr> + Send> {
        match *self {
            Self::Single(ip) => Box::new(std::iter::once(ip)),
            Self::Cidr(IpNetwork::V4(net)) if net.prefix() <= 30 => {
                let (network, broadcast) = (net.network(), net.broadcast());
                Box::new(
                    net.iter()
                        .filter(move |addr| *addr != network && *addr != broadcast)
                        .map(IpAddr::V4),
                )
            }
            Self::Cidr(IpNetwork::V4(net)) => Box::new(net.iter().map(IpAddr::V4)),
            Self::Cidr(IpNetwork::V6(net)) => Box::new(net.iter().map(IpAddr::V6)),
        }
    }

    /// Expand into the full ordered address list.
    pub fn expand(&self) -> Vec<IpAddr> {
        self.addresses().collect()
    }
}

impl FromStr for TargetSpec {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for TargetSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(ip) => write!(f, "{}", ip),
            Self::Cidr(network) => write!(f, "{}", network),
        }
    }
}
