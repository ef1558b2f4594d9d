//! End-to-end engine scenarios over an in-memory network.

use async_trait::async_trait;
use hostsweep::scanner::{
    BannerReader, Collaborators, Connector, Engine, LivenessProbe, NeighborTable, ProbeReply,
};
use hostsweep::services::ServiceCatalog;
use hostsweep::types::{MacAddr, PortSpec, PortState, TargetError};
use hostsweep::{report, ScanError, ScanResult, ScanSettings};
use std::collections::{HashMap, HashSet};
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// A scripted network. Hosts not listed never answer; ports not listed on
/// a live host time out.
#[derive(Default)]
struct FakeNetwork {
    alive: HashMap<IpAddr, ProbeReply>,
    open: HashMap<SocketAddr, Option<Vec<u8>>>,
    closed: HashSet<SocketAddr>,
    macs: HashMap<IpAddr, MacAddr>,
    neighbor_table_broken: bool,
    /// Cancel this token once the given endpoint has been probed.
    cancel_after_port: Option<(SocketAddr, CancellationToken)>,
    cancel_after_host: Option<(IpAddr, CancellationToken)>,
    /// Cancel this token during the given neighbor lookup, then stall.
    cancel_during_lookup: Option<(IpAddr, CancellationToken)>,
    neighbor_lookups: AtomicUsize,
}

impl FakeNetwork {
    fn host(mut self, addr: &str) -> Self {
        self.alive.insert(ip(addr), ProbeReply::Echo);
        self
    }

    fn refusing_host(mut self, addr: &str) -> Self {
        self.alive.insert(ip(addr), ProbeReply::Refused);
        self
    }

    fn open(mut self, addr: &str, port: u16, banner: Option<&str>) -> Self {
        self.open.insert(
            SocketAddr::new(ip(addr), port),
            banner.map(|b| b.as_bytes().to_vec()),
        );
        self
    }

    fn closed(mut self, addr: &str, port: u16) -> Self {
        self.closed.insert(SocketAddr::new(ip(addr), port));
        self
    }

    fn mac(mut self, addr: &str, mac: &str) -> Self {
        self.macs.insert(ip(addr), mac.parse().unwrap());
        self
    }
}

fn collaborators(network: &Arc<FakeNetwork>) -> Collaborators {
    Collaborators {
        probe: network.clone(),
        connector: network.clone(),
        banners: network.clone(),
        neighbors: network.clone(),
    }
}

#[async_trait]
impl LivenessProbe for FakeNetwork {
    async fn probe(&self, addr: IpAddr, _timeout: Duration) -> Result<ProbeReply, ScanError> {
        if let Some((trigger, token)) = &self.cancel_after_host {
            if *trigger == addr {
                token.cancel();
            }
        }
        self.alive
            .get(&addr)
            .copied()
            .ok_or(ScanError::ProbeTimeout(addr))
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

#[async_trait]
impl Connector for FakeNetwork {
    async fn connect(&self, addr: SocketAddr, _timeout: Duration) -> Result<(), ScanError> {
        if let Some((trigger, token)) = &self.cancel_after_port {
            if *trigger == addr {
                token.cancel();
            }
        }
        if self.open.contains_key(&addr) {
            Ok(())
        } else if self.closed.contains(&addr) {
            Err(ScanError::PortConnectFailure {
                addr,
                reason: "connection refused".to_string(),
            })
        } else {
            Err(ScanError::PortProbeTimeout(addr))
        }
    }
}

#[async_trait]
impl BannerReader for FakeNetwork {
    async fn read_banner(
        &self,
        addr: SocketAddr,
        _window: Duration,
        _nudge: Option<&'static [u8]>,
    ) -> Result<Vec<u8>, ScanError> {
        match self.open.get(&addr) {
            Some(Some(banner)) => Ok(banner.clone()),
            _ => Err(ScanError::BannerRead {
                addr,
                reason: "timed out".to_string(),
            }),
        }
    }
}

#[async_trait]
impl NeighborTable for FakeNetwork {
    async fn lookup(&self, addr: IpAddr) -> Result<Option<MacAddr>, ScanError> {
        self.neighbor_lookups.fetch_add(1, Ordering::SeqCst);
        if let Some((trigger, token)) = &self.cancel_during_lookup {
            if *trigger == addr {
                token.cancel();
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        }
        if self.neighbor_table_broken {
            return Err(ScanError::MacResolution("no neighbor table".to_string()));
        }
        Ok(self.macs.get(&addr).copied())
    }
}

fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}

fn ports(list: &str) -> PortSpec {
    list.parse().unwrap()
}

fn settings() -> ScanSettings {
    ScanSettings {
        probe_timeout_ms: 50,
        probe_retries: 0,
        connect_timeout_ms: 50,
        banner_timeout_ms: 50,
        ..ScanSettings::default()
    }
}

fn engine(network: &Arc<FakeNetwork>, settings: ScanSettings) -> Engine {
    Engine::with_collaborators(
        settings,
        Arc::new(ServiceCatalog::default()),
        collaborators(network),
    )
    .unwrap()
}

async fn scan(network: FakeNetwork, target: &str, list: &str) -> ScanResult {
    let network = Arc::new(network);
    engine(&network, settings())
        .run(target, &ports(list), &CancellationToken::new())
        .await
        .unwrap()
}

/// (port, state, service) for one host.
fn port_view(result: &ScanResult, addr: &str) -> Vec<(u16, PortState, Option<String>)> {
    let host = result
        .hosts()
        .iter()
        .find(|h| h.address == ip(addr))
        .expect("host present");
    host.ports
        .iter()
        .map(|p| (p.port.as_u16(), p.state, p.service.clone()))
        .collect()
}

#[tokio::test]
async fn test_single_host_only_http_open() {
    let network = FakeNetwork::default()
        .host("10.0.0.5")
        .open("10.0.0.5", 80, None)
        .closed("10.0.0.5", 22)
        .mac("10.0.0.5", "00:11:22:33:44:55");

    let result = scan(network, "10.0.0.5", "22,80,443").await;

    assert_eq!(result.hosts().len(), 1);
    let host = &result.hosts()[0];
    assert!(host.alive);
    assert!(!host.partial);
    assert_eq!(host.mac.map(|m| m.to_string()).as_deref(), Some("00:11:22:33:44:55"));
    assert_eq!(
        port_view(&result, "10.0.0.5"),
        vec![
            (22, PortState::Closed, None),
            (80, PortState::Open, Some("http".to_string())),
            (443, PortState::Filtered, None),
        ]
    );
    assert!(!result.interrupted());
    assert_eq!(result.summary().most_common_service.as_deref(), Some("http"));
}

#[tokio::test]
async fn test_silent_host_is_dead() {
    let network = FakeNetwork::default().mac("10.0.0.6", "00:11:22:33:44:55");
    let result = scan(network, "10.0.0.6", "22,80,443").await;

    let host = &result.hosts()[0];
    assert!(!host.alive);
    assert!(host.ports.is_empty());
    assert!(host.mac.is_none());
    assert_eq!(result.summary().alive_count, 0);
}

#[tokio::test]
async fn test_refusal_counts_as_alive() {
    let network = FakeNetwork::default().refusing_host("10.0.0.7");
    let result = scan(network, "10.0.0.7", "22").await;
    assert!(result.hosts()[0].alive);
    assert_eq!(port_view(&result, "10.0.0.7"), vec![(22, PortState::Filtered, None)]);
}

#[tokio::test]
async fn test_banner_names_unmapped_port() {
    let network = FakeNetwork::default()
        .host("10.0.0.5")
        .open("10.0.0.5", 40022, Some("SSH-2.0-OpenSSH_9.6p1\r\n"))
        .open("10.0.0.5", 40023, None);

    let result = scan(network, "10.0.0.5", "40022,40023").await;

    assert_eq!(
        port_view(&result, "10.0.0.5"),
        vec![
            (40022, PortState::Open, Some("ssh".to_string())),
            (40023, PortState::Open, Some("unknown".to_string())),
        ]
    );
    let banner = result.hosts()[0].ports[0].banner.as_deref();
    assert_eq!(banner, Some("SSH-2.0-OpenSSH_9.6p1"));
}

#[tokio::test]
async fn test_catalog_extension_overrides_port() {
    let network = Arc::new(FakeNetwork::default().host("10.0.0.5").open("10.0.0.5", 40022, None));
    let catalog = ServiceCatalog::builder().port(40022, "backup-agent").build();
    let engine = Engine::with_collaborators(settings(), Arc::new(catalog), collaborators(&network))
        .unwrap();

    let result = engine
        .run("10.0.0.5", &ports("40022"), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(
        port_view(&result, "10.0.0.5"),
        vec![(40022, PortState::Open, Some("backup-agent".to_string()))]
    );
}

#[tokio::test]
async fn test_subnet_is_expanded_and_sorted() {
    let network = FakeNetwork::default()
        .host("192.168.1.2")
        .open("192.168.1.2", 22, None);
    let result = scan(network, "192.168.1.0/30", "22").await;

    let addrs: Vec<String> = result.hosts().iter().map(|h| h.address.to_string()).collect();
    assert_eq!(addrs, vec!["192.168.1.1", "192.168.1.2"]);
    assert!(!result.hosts()[0].alive);
    assert!(result.hosts()[1].alive);
    assert_eq!(result.summary().hosts_scanned, 2);
    assert_eq!(result.target(), "192.168.1.0/30");
}

#[tokio::test]
async fn test_one_record_per_requested_port() {
    let mut network = FakeNetwork::default().host("10.1.0.1").host("10.1.0.2");
    for port in (1..=300).filter(|p| p % 7 == 0) {
        network = network.open("10.1.0.1", port, None);
    }
    for port in (1..=300).filter(|p| p % 5 == 0) {
        network = network.closed("10.1.0.2", port);
    }

    let result = scan(network, "10.1.0.0/30", "1-300").await;

    for host in result.alive_hosts() {
        assert!(!host.partial);
        let numbers: Vec<u16> = host.ports.iter().map(|p| p.port.as_u16()).collect();
        assert_eq!(numbers, (1..=300).collect::<Vec<u16>>());
    }
    assert_eq!(result.summary().total_open_ports, 300 / 7);
}

#[tokio::test]
async fn test_repeat_scans_agree() {
    let build = || {
        FakeNetwork::default()
            .host("10.0.0.1")
            .host("10.0.0.3")
            .open("10.0.0.1", 80, None)
            .open("10.0.0.3", 6379, Some("-ERR unknown command 'HEAD'\r\n"))
            .closed("10.0.0.3", 22)
    };
    let view = |result: &ScanResult| {
        result
            .hosts()
            .iter()
            .flat_map(|h| {
                h.ports
                    .iter()
                    .map(move |p| (h.address, h.alive, p.port, p.state, p.service.clone()))
            })
            .collect::<Vec<_>>()
    };

    let first = scan(build(), "10.0.0.0/29", "22,80,6379").await;
    let second = scan(build(), "10.0.0.0/29", "22,80,6379").await;
    assert_eq!(view(&first), view(&second));
    assert_eq!(first.summary(), second.summary());
    assert_ne!(first.id(), second.id());
}

#[tokio::test]
async fn test_reports_round_trip() {
    let network = FakeNetwork::default()
        .host("10.0.0.1")
        .host("10.0.0.2")
        .open("10.0.0.1", 80, None)
        .open("10.0.0.2", 21, Some("220 (vsFTPd 3.0.5)\r\n"))
        .open("10.0.0.2", 40000, Some("\r\n"))
        .closed("10.0.0.1", 21)
        .mac("10.0.0.1", "a4:91:b1:0c:22:7e");
    let result = scan(network, "10.0.0.0/29", "21,80,40000").await;

    // A whitespace-only banner leaves nothing worth keeping.
    let blank = result.hosts()[1]
        .ports
        .iter()
        .find(|p| p.port.as_u16() == 40000)
        .unwrap();
    assert_eq!(blank.service.as_deref(), Some("unknown"));
    assert_eq!(blank.banner, None);

    let json = report::json::to_string(&result).unwrap();
    assert_eq!(report::json::from_str(&json).unwrap(), result);

    let csv = report::csv::to_string(result.hosts()).unwrap();
    let hosts = report::csv::read_hosts(csv.as_bytes()).unwrap();
    assert_eq!(hosts, result.hosts());

    let dir = tempfile::tempdir().unwrap();
    let paths = report::write_reports(&result, dir.path()).unwrap();
    assert!(paths.json.exists());
    assert!(paths.csv.exists());
}

#[tokio::test]
async fn test_broken_neighbor_table_is_not_fatal() {
    let network = FakeNetwork {
        neighbor_table_broken: true,
        ..FakeNetwork::default()
    }
    .host("10.0.0.1")
    .open("10.0.0.1", 80, None);

    let result = scan(network, "10.0.0.1", "80").await;
    assert!(result.hosts()[0].mac.is_none());
    assert_eq!(result.summary().total_open_ports, 1);
}

#[tokio::test]
async fn test_mac_lookup_can_be_disabled() {
    let network = Arc::new(
        FakeNetwork::default()
            .host("10.0.0.1")
            .mac("10.0.0.1", "00:11:22:33:44:55"),
    );
    let settings = ScanSettings {
        resolve_mac: false,
        ..settings()
    };
    let result = engine(&network, settings)
        .run("10.0.0.1", &ports("80"), &CancellationToken::new())
        .await
        .unwrap();

    assert!(result.hosts()[0].mac.is_none());
    assert_eq!(network.neighbor_lookups.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_invalid_target_is_fatal() {
    let network = Arc::new(FakeNetwork::default());
    let engine = engine(&network, settings());

    for bad in ["10.0.0.256", "not-an-ip", "10.0.0.0/33", ""] {
        let outcome = engine.run(bad, &ports("80"), &CancellationToken::new()).await;
        assert!(
            matches!(outcome, Err(ScanError::InvalidTarget(_))),
            "{:?} should be rejected",
            bad
        );
    }
}

#[tokio::test]
async fn test_oversized_target_is_rejected() {
    let network = Arc::new(FakeNetwork::default());
    let outcome = engine(&network, settings())
        .run("10.0.0.0/8", &ports("80"), &CancellationToken::new())
        .await;
    assert!(matches!(
        outcome,
        Err(ScanError::InvalidTarget(TargetError::TooLarge(_, 65_536)))
    ));
}

#[tokio::test]
async fn test_cancel_during_port_scan_marks_partial() {
    let cancel = CancellationToken::new();
    let network = Arc::new(FakeNetwork {
        cancel_after_port: Some((SocketAddr::new(ip("10.0.0.1"), 81), cancel.clone())),
        ..FakeNetwork::default()
            .host("10.0.0.1")
            .host("10.0.0.2")
            .open("10.0.0.1", 80, None)
    });
    let settings = ScanSettings {
        host_concurrency: 1,
        port_concurrency: 1,
        ..settings()
    };

    let result = engine(&network, settings)
        .run("10.0.0.0/30", &ports("80-83"), &cancel)
        .await
        .unwrap();

    assert!(result.interrupted());
    let alive: Vec<_> = result.alive_hosts().collect();
    assert_eq!(alive.len(), 2);

    // Probes already in flight finish; nothing new starts.
    let first = alive.iter().find(|h| h.address == ip("10.0.0.1")).unwrap();
    assert!(first.partial);
    let scanned: Vec<u16> = first.ports.iter().map(|p| p.port.as_u16()).collect();
    assert_eq!(scanned, vec![80, 81]);
    assert_eq!(first.ports[0].service.as_deref(), Some("http"));

    let second = alive.iter().find(|h| h.address == ip("10.0.0.2")).unwrap();
    assert!(second.partial);
    assert!(second.ports.is_empty());
}

#[tokio::test]
async fn test_cancel_during_probing_omits_unprobed_addresses() {
    let cancel = CancellationToken::new();
    let network = Arc::new(FakeNetwork {
        cancel_after_host: Some((ip("10.0.0.2"), cancel.clone())),
        ..FakeNetwork::default().host("10.0.0.1").host("10.0.0.5")
    });
    let settings = ScanSettings {
        probe_concurrency: 1,
        ..settings()
    };

    let result = engine(&network, settings)
        .run("10.0.0.0/29", &ports("80"), &cancel)
        .await
        .unwrap();

    assert!(result.interrupted());
    let addrs: Vec<String> = result.hosts().iter().map(|h| h.address.to_string()).collect();
    assert_eq!(addrs, vec!["10.0.0.1", "10.0.0.2"]);
    // Live hosts found before the interrupt were never port scanned.
    assert!(result.hosts()[0].alive);
    assert!(result.hosts()[0].partial);
}

#[tokio::test]
async fn test_cancel_during_mac_lookup_marks_partial() {
    let cancel = CancellationToken::new();
    let network = Arc::new(FakeNetwork {
        cancel_during_lookup: Some((ip("10.0.0.1"), cancel.clone())),
        ..FakeNetwork::default()
            .host("10.0.0.1")
            .host("10.0.0.2")
            .closed("10.0.0.1", 80)
            .closed("10.0.0.2", 80)
            .mac("10.0.0.1", "00:11:22:33:44:55")
            .mac("10.0.0.2", "00:11:22:33:44:66")
    });
    let settings = ScanSettings {
        mac_concurrency: 1,
        ..settings()
    };

    let result = engine(&network, settings)
        .run("10.0.0.0/30", &ports("80"), &cancel)
        .await
        .unwrap();

    assert!(result.interrupted());
    assert_eq!(network.neighbor_lookups.load(Ordering::SeqCst), 1);

    let first = &result.hosts()[0];
    assert_eq!(first.address, ip("10.0.0.1"));
    assert!(first.mac.is_some());
    assert!(!first.partial);

    // The lookup never started for the second host.
    let second = &result.hosts()[1];
    assert_eq!(second.address, ip("10.0.0.2"));
    assert!(second.mac.is_none());
    assert!(second.partial);
    assert_eq!(second.ports.len(), 1);
}
