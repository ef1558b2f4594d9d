//! Scan engine - coordinates the scanning stages.
//!
//! A scan runs as a pipeline of bounded worker pools:
//!
//! 1. the target expression is expanded into candidate addresses,
//! 2. [`HostProber`] decides which of them are alive,
//! 3. [`PortScanner`] and [`MacResolver`] run side by side over the live
//!    hosts,
//! 4. the merged host records are folded into a [`ScanResult`].
//!
//! Each stage returns its own collection and the next stage only starts
//! once the previous one is complete, so host records are never written
//! concurrently. Network access goes through the [`Collaborators`], which
//! tests replace with in-memory doubles.

pub mod mac;
pub mod ports;
pub mod probe;
pub mod rate_limiter;
pub mod tcp;
pub mod traits;

pub use mac::{platform_neighbor_table, ArpCommand, MacResolver, ProcNetArp};
pub use ports::{HostPorts, PortScanner};
pub use probe::{probe_for, AutoProbe, HostProber, PingProbe, TcpProbe};
pub use rate_limiter::RateLimiter;
pub use tcp::TcpConnector;
pub use traits::{
    classify_connect, BannerReader, Collaborators, Connector, LivenessProbe, NeighborTable,
    ProbeReply,
};

use crate::config::ScanSettings;
use crate::error::ScanError;
use crate::report::{ScanMeta, ScanResult};
use crate::services::{ServiceCatalog, ServiceIdentifier};
use crate::types::{HostRecord, MacAddr, PortSpec, ScanId, TargetError, TargetSpec};
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

impl Collaborators {
    /// Real network collaborators for this platform.
    pub fn platform(settings: &ScanSettings) -> Self {
        let tcp = Arc::new(TcpConnector::new());
        Self {
            probe: probe_for(settings),
            connector: tcp.clone(),
            banners: tcp,
            neighbors: platform_neighbor_table(),
        }
    }
}

/// Runs scans with one set of settings, catalog and collaborators.
pub struct Engine {
    settings: ScanSettings,
    catalog: Arc<ServiceCatalog>,
    collaborators: Collaborators,
}

impl Engine {
    /// Engine backed by the platform's real network collaborators.
    pub fn new(settings: ScanSettings, catalog: Arc<ServiceCatalog>) -> Result<Self, ScanError> {
        let collaborators = Collaborators::platform(&settings);
        Self::with_collaborators(settings, catalog, collaborators)
    }

    pub fn with_collaborators(
        settings: ScanSettings,
        catalog: Arc<ServiceCatalog>,
        collaborators: Collaborators,
    ) -> Result<Self, ScanError> {
        settings.validate()?;
        Ok(Self {
            settings,
            catalog,
            collaborators,
        })
    }

    pub fn settings(&self) -> &ScanSettings {
        &self.settings
    }

    /// Scan `target` for `ports`.
    ///
    /// Only a malformed or oversized target fails the scan; every per-host
    /// and per-port problem is recorded in the result instead. When `cancel`
    /// fires, no new work starts: unprobed addresses are left out, live hosts
    /// with unfinished port lists or a skipped MAC lookup are marked
    /// `partial`, and the result is flagged as interrupted.
    pub async fn run(
        &self,
        target: &str,
        ports: &PortSpec,
        cancel: &CancellationToken,
    ) -> Result<ScanResult, ScanError> {
        let spec = TargetSpec::parse(target)?;
        let host_count = spec.host_count();
        let limit = u128::from(self.settings.max_hosts);
        if host_count > limit {
            return Err(TargetError::TooLarge(host_count, limit).into());
        }

        let id = ScanId::new();
        let started_at = Utc::now();
        let ports = ports.to_ports();
        info!(scan = %id.short(), %spec, hosts = %host_count, ports = ports.len(), "scan started");

        // Liveness
        let prober = HostProber::new(Arc::clone(&self.collaborators.probe), &self.settings);
        let shells = prober.probe_all(spec.addresses(), cancel).await;
        let mut alive: Vec<IpAddr> = shells.iter().filter(|h| h.alive).map(|h| h.address).collect();
        alive.sort();
        info!(probed = shells.len(), alive = alive.len(), "liveness stage finished");

        // Ports and MAC addresses
        let identifier = Arc::new(ServiceIdentifier::new(
            Arc::clone(&self.catalog),
            Arc::clone(&self.collaborators.banners),
            self.settings.banner_timeout(),
            self.settings.grab_banners,
        ));
        let scanner = PortScanner::new(
            Arc::clone(&self.collaborators.connector),
            identifier,
            ports.clone(),
            &self.settings,
        );
        let resolver = MacResolver::new(
            Arc::clone(&self.collaborators.neighbors),
            self.settings.mac_concurrency,
        );

        let (port_results, macs) = tokio::join!(scanner.scan_hosts(alive.clone(), cancel), async {
            if self.settings.resolve_mac {
                Some(resolver.resolve_all(alive.clone(), cancel).await)
            } else {
                None
            }
        });
        info!(
            scanned = port_results.len(),
            macs = macs.iter().flatten().filter(|(_, mac)| mac.is_some()).count(),
            "port and MAC stages finished"
        );

        let probed = shells.len();
        let hosts = merge(shells, port_results, macs);
        let interrupted = (probed as u128) < host_count || hosts.iter().any(|h| h.partial);

        let result = ScanResult::aggregate(
            ScanMeta {
                id,
                target: target.trim().to_string(),
                ports_requested: ports,
                started_at,
                finished_at: Utc::now(),
                interrupted,
            },
            hosts,
        );

        let summary = result.summary();
        info!(
            scan = %id.short(),
            alive = summary.alive_count,
            open_ports = summary.total_open_ports,
            interrupted,
            duration_ms = result.duration_ms(),
            "scan finished"
        );
        Ok(result)
    }
}

/// Fold the port and MAC stage outputs into the prober's host shells.
///
/// A live host starts out `partial` and only loses the flag once its full
/// port list arrives. When MAC lookup ran (`macs` is `Some`), a live host
/// it never reached is marked `partial` as well.
fn merge(
    shells: Vec<HostRecord>,
    port_results: Vec<HostPorts>,
    macs: Option<Vec<(IpAddr, Option<MacAddr>)>>,
) -> Vec<HostRecord> {
    let mut hosts: HashMap<IpAddr, HostRecord> = shells
        .into_iter()
        .map(|mut host| {
            host.partial = host.alive;
            (host.address, host)
        })
        .collect();

    for result in port_results {
        if let Some(host) = hosts.get_mut(&result.address) {
            host.ports = result.ports;
            host.partial = !result.complete;
        }
    }

    if let Some(macs) = macs {
        let mut unresolved: HashSet<IpAddr> = hosts
            .values()
            .filter(|h| h.alive)
            .map(|h| h.address)
            .collect();
        for (addr, mac) in macs {
            if let Some(host) = hosts.get_mut(&addr) {
                host.mac = mac;
                unresolved.remove(&addr);
            }
        }
        for addr in unresolved {
            if let Some(host) = hosts.get_mut(&addr) {
                host.partial = true;
            }
        }
    }

    let partial = hosts.values().filter(|h| h.partial).count();
    if partial > 0 {
        debug!(partial, "hosts left with incomplete port lists");
    }
    hosts.into_values().collect()
}

/// Scan with the platform collaborators and the built-in service catalog.
pub async fn run_scan(
    target: &str,
    ports: &PortSpec,
    settings: &ScanSettings,
    cancel: &CancellationToken,
) -> Result<ScanResult, ScanError> {
    Engine::new(settings.clone(), Arc::new(ServiceCatalog::default()))?
        .run(target, ports, cancel)
        .await
}
