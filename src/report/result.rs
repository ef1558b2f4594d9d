//! Aggregated scan results.
//!
//! [`ScanResult::aggregate`] is the last stage of a scan: it takes the merged
//! host records and produces the immutable result handed to renderers. It
//! performs no I/O, so the same inputs always give the same result.

use crate::types::{HostRecord, Port, ScanId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};

/// Counts derived from the host set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSummary {
    /// Candidate addresses that were probed.
    pub hosts_scanned: usize,
    pub alive_count: usize,
    pub total_open_ports: usize,
    /// Open ports per service name. Ports without a name are not counted.
    pub per_service_counts: BTreeMap<String, usize>,
    /// Highest count wins; ties go to the alphabetically first name.
    pub most_common_service: Option<String>,
}

impl ScanSummary {
    pub fn from_hosts(hosts: &[HostRecord]) -> Self {
        let mut summary = Self {
            hosts_scanned: hosts.len(),
            ..Self::default()
        };

        for host in hosts.iter().filter(|h| h.alive) {
            summary.alive_count += 1;
            for port in host.open_ports() {
                summary.total_open_ports += 1;
                if let Some(name) = &port.service {
                    *summary.per_service_counts.entry(name.clone()).or_insert(0) += 1;
                }
            }
        }

        summary.most_common_service = summary
            .per_service_counts
            .iter()
            .max_by_key(|(name, count)| (**count, Reverse(*name)))
            .map(|(name, _)| name.clone());

        summary
    }
}

/// Scan-level facts the aggregator needs besides the hosts.
#[derive(Debug, Clone)]
pub struct ScanMeta {
    pub id: ScanId,
    /// The target expression as the caller wrote it.
    pub target: String,
    pub ports_requested: Vec<Port>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub interrupted: bool,
}

/// The complete, ordered outcome of one scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    id: ScanId,
    target: String,
    ports_requested: BTreeSet<Port>,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    #[serde(default)]
    interrupted: bool,
    #[serde(default)]
    summary: ScanSummary,
    hosts: Vec<HostRecord>,
}

impl ScanResult {
    /// Assemble the final result.
    ///
    /// Hosts are ordered by address and ports by number. A host that is not
    /// alive never carries ports or a MAC address.
    pub fn aggregate(meta: ScanMeta, hosts: Vec<HostRecord>) -> Self {
        let hosts = normalize_hosts(hosts);
        let summary = ScanSummary::from_hosts(&hosts);

        Self {
            id: meta.id,
            target: meta.target,
            ports_requested: meta.ports_requested.into_iter().collect(),
            started_at: meta.started_at,
            finished_at: meta.finished_at,
            interrupted: meta.interrupted,
            summary,
            hosts,
        }
    }

    /// Re-establish ordering and recompute the summary, e.g. after
    /// deserializing a report that may have been edited by hand.
    pub fn normalized(self) -> Self {
        let meta = ScanMeta {
            id: self.id,
            target: self.target,
            ports_requested: self.ports_requested.into_iter().collect(),
            started_at: self.started_at,
            finished_at: self.finished_at,
            interrupted: self.interrupted,
        };
        Self::aggregate(meta, self.hosts)
    }

    pub fn id(&self) -> ScanId {
        self.id
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn ports_requested(&self) -> &BTreeSet<Port> {
        &self.ports_requested
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> DateTime<Utc> {
        self.finished_at
    }

    pub fn duration_ms(&self) -> u64 {
        (self.finished_at - self.started_at)
            .num_milliseconds()
            .max(0) as u64
    }

    /// True when cancellation left hosts unprobed or port lists incomplete.
    pub fn interrupted(&self) -> bool {
        self.interrupted
    }

    pub fn summary(&self) -> &ScanSummary {
        &self.summary
    }

    /// All probed hosts, ascending by address.
    pub fn hosts(&self) -> &[HostRecord] {
        &self.hosts
    }

    pub fn alive_hosts(&self) -> impl Iterator<Item = &HostRecord> {
        self.hosts.iter().filter(|h| h.alive)
    }
}

fn normalize_hosts(mut hosts: Vec<HostRecord>) -> Vec<HostRecord> {
    hosts.sort_by_key(|h| h.address);
    hosts.dedup_by_key(|h| h.address);

    for host in &mut hosts {
        if host.alive {
            host.ports.sort_by_key(|p| p.port);
            host.ports.dedup_by_key(|p| p.port);
        } else {
            host.ports.clear();
            host.mac = None;
            host.partial = false;
        }
    }
    hosts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PortRecord, PortState};

    fn port(n: u16) -> Port {
        Port::new(n).unwrap()
    }

    fn open(n: u16, service: &str) -> PortRecord {
        let mut record = PortRecord::new(port(n), PortState::Open);
        record.service = Some(service.to_string());
        record
    }

    fn meta() -> ScanMeta {
        let now = Utc::now();
        ScanMeta {
            id: ScanId::new(),
            target: "10.0.0.0/29".to_string(),
            ports_requested: vec![port(443), port(22), port(80)],
            started_at: now,
            finished_at: now + chrono::Duration::milliseconds(1500),
            interrupted: false,
        }
    }

    fn sample_hosts() -> Vec<HostRecord> {
        let mut web = HostRecord::shell("10.0.0.9".parse().unwrap(), true, 3);
        web.ports = vec![
            open(443, "https"),
            PortRecord::new(port(22), PortState::Closed),
            open(80, "http"),
        ];

        let mut gateway = HostRecord::shell("10.0.0.1".parse().unwrap(), true, 1);
        gateway.ports = vec![
            open(80, "http"),
            PortRecord::new(port(22), PortState::Filtered),
            PortRecord::new(port(443), PortState::Closed),
        ];

        let dead = HostRecord::shell("10.0.0.3".parse().unwrap(), false, 1000);
        vec![web, dead, gateway]
    }

    #[test]
    fn test_hosts_and_ports_are_ordered() {
        let result = ScanResult::aggregate(meta(), sample_hosts());

        let addrs: Vec<String> = result.hosts().iter().map(|h| h.address.to_string()).collect();
        assert_eq!(addrs, vec!["10.0.0.1", "10.0.0.3", "10.0.0.9"]);

        let ports: Vec<u16> = result.hosts()[2].ports.iter().map(|p| p.port.as_u16()).collect();
        assert_eq!(ports, vec![22, 80, 443]);

        let requested: Vec<u16> = result.ports_requested().iter().map(|p| p.as_u16()).collect();
        assert_eq!(requested, vec![22, 80, 443]);
    }

    #[test]
    fn test_summary_counts() {
        let result = ScanResult::aggregate(meta(), sample_hosts());
        let summary = result.summary();

        assert_eq!(summary.hosts_scanned, 3);
        assert_eq!(summary.alive_count, 2);
        assert_eq!(summary.total_open_ports, 3);
        assert_eq!(summary.per_service_counts.get("http"), Some(&2));
        assert_eq!(summary.per_service_counts.get("https"), Some(&1));
        assert_eq!(summary.most_common_service.as_deref(), Some("http"));
        assert_eq!(result.duration_ms(), 1500);
    }

    #[test]
    fn test_most_common_tie_breaks_alphabetically() {
        let mut host = HostRecord::shell("10.0.0.1".parse().unwrap(), true, 1);
        host.ports = vec![open(22, "ssh"), open(21, "ftp")];
        let summary = ScanSummary::from_hosts(&[host]);
        assert_eq!(summary.most_common_service.as_deref(), Some("ftp"));
    }

    #[test]
    fn test_unnamed_open_port_is_not_counted_as_a_service() {
        let mut host = HostRecord::shell("10.0.0.1".parse().unwrap(), true, 1);
        host.ports = vec![open(22, "ssh"), PortRecord::new(port(8081), PortState::Open)];
        let summary = ScanSummary::from_hosts(&[host]);

        assert_eq!(summary.total_open_ports, 2);
        assert_eq!(summary.per_service_counts.len(), 1);
        assert_eq!(summary.per_service_counts.values().sum::<usize>(), 1);
        assert_eq!(summary.most_common_service.as_deref(), Some("ssh"));
    }

    #[test]
    fn test_empty_scan_has_no_most_common() {
        let summary = ScanSummary::from_hosts(&[]);
        assert_eq!(summary, ScanSummary::default());
        assert!(summary.most_common_service.is_none());
    }

    #[test]
    fn test_dead_host_never_carries_ports() {
        let mut dead = HostRecord::shell("10.0.0.2".parse().unwrap(), false, 1000);
        dead.ports = vec![open(80, "http")];
        dead.mac = "00:11:22:33:44:55".parse().ok();

        let result = ScanResult::aggregate(meta(), vec![dead]);
        let host = &result.hosts()[0];
        assert!(host.ports.is_empty());
        assert!(host.mac.is_none());
        assert_eq!(result.summary().total_open_ports, 0);
    }

    #[test]
    fn test_aggregate_is_deterministic() {
        let meta = meta();
        let mut reversed = sample_hosts();
        reversed.reverse();

        let a = ScanResult::aggregate(meta.clone(), sample_hosts());
        let b = ScanResult::aggregate(meta, reversed);
        assert_eq!(a, b);
    }
}
