//! Network collaborator abstractions.
//!
//! Every network operation the engine performs goes through one of these
//! traits, so platform mechanisms (system ping, `/proc/net/arp`, tokio
//! sockets) can be swapped for deterministic test doubles. Implementations
//! must bound every call by the timeout they are given.

use crate::error::ScanError;
use crate::types::{MacAddr, PortState};
use async_trait::async_trait;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

/// What a liveness probe heard back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeReply {
    /// The host answered the probe.
    Echo,
    /// The host's stack rejected the probe (e.g. RST). Still proof of life.
    Refused,
}

/// A mechanism for checking whether a host responds at all.
///
/// Return [`ScanError::ProbeTimeout`] when nothing answered in time; the
/// prober retries only on that error. Any other error means the mechanism
/// itself failed for this attempt.
#[async_trait]
pub trait LivenessProbe: Send + Sync {
    async fn probe(&self, addr: IpAddr, timeout: Duration) -> Result<ProbeReply, ScanError>;

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}

/// A TCP connect primitive.
///
/// `Ok(())` means the handshake completed. A refusal or reset is reported
/// as [`ScanError::PortConnectFailure`], silence as
/// [`ScanError::PortProbeTimeout`].
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, addr: SocketAddr, timeout: Duration) -> Result<(), ScanError>;
}

/// Reads the first bytes a service sends after a connection is opened.
#[async_trait]
pub trait BannerReader: Send + Sync {
    /// Connect and read for at most `window`. When the service stays silent
    /// and `nudge` is given, send it and read once more. Returns the bytes
    /// received, possibly none.
    async fn read_banner(
        &self,
        addr: SocketAddr,
        window: Duration,
        nudge: Option<&'static [u8]>,
    ) -> Result<Vec<u8>, ScanError>;
}

/// Local neighbor (ARP/NDP) table lookup.
///
/// `Ok(None)` when the table simply has no entry; `Err` is reserved for the
/// lookup mechanism being unavailable.
#[async_trait]
pub trait NeighborTable: Send + Sync {
    async fn lookup(&self, addr: IpAddr) -> Result<Option<MacAddr>, ScanError>;
}

/// The full set of collaborators a scan needs.
#[derive(Clone)]
pub struct Collaborators {
    pub probe: Arc<dyn LivenessProbe>,
    pub connector: Arc<dyn Connector>,
    pub banners: Arc<dyn BannerReader>,
    pub neighbors: Arc<dyn NeighborTable>,
}

/// Map a connect outcome onto the terminal port state.
pub fn classify_connect(outcome: &Result<(), ScanError>) -> PortState {
    match outcome {
        Ok(()) => PortState::Open,
        Err(ScanError::PortConnectFailure { .. }) => PortState::Closed,
        Err(_) => PortState::Filtered,
    }
}
