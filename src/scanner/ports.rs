//! Port scanning for live hosts.
//!
//! Concurrency is bounded at two levels: at most `host_concurrency` hosts
//! are scanned at once, and each of them has at most `port_concurrency`
//! port probes in flight. Open ports are handed to the
//! [`ServiceIdentifier`] before the record is emitted.

use crate::config::ScanSettings;
use crate::error::ScanError;
use crate::scanner::rate_limiter::RateLimiter;
use crate::scanner::traits::{classify_connect, Connector};
use crate::services::ServiceIdentifier;
use crate::types::{Port, PortRecord, PortState};
use futures::stream::{self, StreamExt};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Port records collected for one host.
#[derive(Debug, Clone)]
pub struct HostPorts {
    pub address: IpAddr,
    /// Ascending by port number.
    pub ports: Vec<PortRecord>,
    /// False when cancellation stopped the host before every port finished.
    pub complete: bool,
}

/// Probes the configured port set on live hosts.
pub struct PortScanner {
    connector: Arc<dyn Connector>,
    identifier: Arc<ServiceIdentifier>,
    ports: Arc<[Port]>,
    host_concurrency: usize,
    port_concurrency: usize,
    timeout: Duration,
    limiter: Option<RateLimiter>,
}

impl PortScanner {
    /// `ports` must already be sorted and de-duplicated.
    pub fn new(
        connector: Arc<dyn Connector>,
        identifier: Arc<ServiceIdentifier>,
        ports: Vec<Port>,
        settings: &ScanSettings,
    ) -> Self {
        Self {
            connector,
            identifier,
            ports: ports.into(),
            host_concurrency: settings.host_concurrency.max(1),
            port_concurrency: settings.port_concurrency.max(1),
            timeout: settings.connect_timeout(),
            limiter: RateLimiter::new(settings.rate_limit),
        }
    }

    /// Probe one port and, if it is open, name its service.
    pub async fn scan_port(&self, addr: IpAddr, port: Port) -> PortRecord {
        if let Some(limiter) = &self.limiter {
            limiter.wait().await;
        }

        let target = SocketAddr::new(addr, port.as_u16());
        let ceiling = self.timeout.saturating_mul(2);
        let outcome = timeout(ceiling, self.connector.connect(target, self.timeout))
            .await
            .unwrap_or(Err(ScanError::PortProbeTimeout(target)));

        let state = classify_connect(&outcome);
        let mut record = PortRecord::new(port, state);
        if state == PortState::Open {
            let found = self.identifier.identify(target, port).await;
            debug!(%target, service = %found.service, "open port");
            record.service = Some(found.service);
            record.banner = found.banner;
        }
        record
    }

    /// Probe every configured port on one host.
    pub async fn scan_host(&self, addr: IpAddr, cancel: &CancellationToken) -> HostPorts {
        let mut ports: Vec<PortRecord> = stream::iter(self.ports.iter().copied())
            .take_until(cancel.cancelled())
            .map(|port| self.scan_port(addr, port))
            .buffer_unordered(self.port_concurrency)
            .collect()
            .await;
        ports.sort_by_key(|p| p.port);

        let complete = ports.len() == self.ports.len();
        debug!(
            %addr,
            open = ports.iter().filter(|p| p.is_open()).count(),
            complete,
            "host port scan finished"
        );

        HostPorts {
            address: addr,
            ports,
            complete,
        }
    }

    /// Scan every host. Hosts not started before `cancel` fires are left out.
    pub async fn scan_hosts(
        &self,
        hosts: Vec<IpAddr>,
        cancel: &CancellationToken,
    ) -> Vec<HostPorts> {
        stream::iter(hosts)
            .take_until(cancel.cancelled())
            .map(|addr| self.scan_host(addr, cancel))
            .buffer_unordered(self.host_concurrency)
            .collect()
            .await
    }
}
