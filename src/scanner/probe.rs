//! Host liveness probing.
//!
//! [`HostProber`] runs a [`LivenessProbe`] against every candidate address
//! with bounded concurrency, retrying timeouts. Three probes are provided:
//! the system `ping` binary, a TCP connect to a fallback port, and an
//! automatic mode that uses ping and falls back to TCP when ping is missing
//! or its echo is blocked.

use crate::config::{ProbeMethod, ScanSettings};
use crate::error::ScanError;
use crate::scanner::tcp::TcpConnector;
use crate::scanner::traits::{LivenessProbe, ProbeReply};
use crate::types::HostRecord;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::net::{IpAddr, SocketAddr};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Extra time allowed for the ping process to start and exit.
const PING_GRACE: Duration = Duration::from_millis(500);

/// Liveness via the platform `ping` binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct PingProbe;

/// Program and arguments for a single echo request on `os` (as reported by
/// `std::env::consts::OS`).
pub fn ping_invocation(os: &str, addr: IpAddr, limit: Duration) -> (&'static str, Vec<String>) {
    let ms = limit.as_millis().to_string();
    let mut args: Vec<String> = match os {
        "windows" => vec!["-n".into(), "1".into(), "-w".into(), ms],
        // macOS ping6 has no per-reply wait flag; the caller's timeout bounds it.
        "macos" if addr.is_ipv6() => vec!["-c".into(), "1".into()],
        "macos" => vec!["-c".into(), "1".into(), "-W".into(), ms],
        _ => {
            // Linux ping takes whole seconds.
            let secs = limit.as_secs_f64().ceil().max(1.0) as u64;
            let mut args = vec!["-c".into(), "1".into(), "-W".into(), secs.to_string()];
            if addr.is_ipv6() {
                args.push("-6".into());
            }
            args
        }
    };
    args.push(addr.to_string());

    let program = if os == "macos" && addr.is_ipv6() {
        "ping6"
    } else {
        "ping"
    };
    (program, args)
}

impl PingProbe {
    fn command(addr: IpAddr, limit: Duration) -> Command {
        let (program, args) = ping_invocation(std::env::consts::OS, addr, limit);
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl LivenessProbe for PingProbe {
    async fn probe(&self, addr: IpAddr, limit: Duration) -> Result<ProbeReply, ScanError> {
        let mut child = Self::command(addr, limit).spawn()?;
        match timeout(limit.saturating_add(PING_GRACE), child.wait()).await {
            Ok(Ok(status)) if status.success() => Ok(ProbeReply::Echo),
            Ok(Ok(_)) => Err(ScanError::ProbeTimeout(addr)),
            Ok(Err(e)) => Err(ScanError::Io(e)),
            Err(_) => Err(ScanError::ProbeTimeout(addr)),
        }
    }

    fn name(&self) -> &'static str {
        "icmp"
    }
}

/// Liveness via a TCP connect to one port. A refusal counts as alive.
#[derive(Debug, Clone, Copy)]
pub struct TcpProbe {
    port: u16,
}

impl TcpProbe {
    pub fn new(port: u16) -> Self {
        Self { port }
    }
}

#[async_trait]
impl LivenessProbe for TcpProbe {
    async fn probe(&self, addr: IpAddr, limit: Duration) -> Result<ProbeReply, ScanError> {
        match TcpConnector::open(SocketAddr::new(addr, self.port), limit).await {
            Ok(_) => Ok(ProbeReply::Echo),
            Err(ScanError::PortConnectFailure { .. }) => Ok(ProbeReply::Refused),
            // Unreachable and friends: nobody answered.
            Err(_) => Err(ScanError::ProbeTimeout(addr)),
        }
    }

    fn name(&self) -> &'static str {
        "tcp"
    }
}

/// Echo first, TCP when the echo mechanism is unavailable or gets no reply.
///
/// The first mechanism failure (no `ping` binary, permission denied) is
/// logged once and switches every later probe straight to TCP.
pub struct AutoProbe {
    ping: Arc<dyn LivenessProbe>,
    tcp: Arc<dyn LivenessProbe>,
    ping_unavailable: AtomicBool,
}

impl AutoProbe {
    pub fn new(ping: Arc<dyn LivenessProbe>, tcp: Arc<dyn LivenessProbe>) -> Self {
        Self {
            ping,
            tcp,
            ping_unavailable: AtomicBool::new(false),
        }
    }

    /// The platform `ping` backed by a TCP connect to `fallback_port`.
    pub fn platform(fallback_port: u16) -> Self {
        Self::new(Arc::new(PingProbe), Arc::new(TcpProbe::new(fallback_port)))
    }
}

#[async_trait]
impl LivenessProbe for AutoProbe {
    async fn probe(&self, addr: IpAddr, limit: Duration) -> Result<ProbeReply, ScanError> {
        if !self.ping_unavailable.load(Ordering::Relaxed) {
            match self.ping.probe(addr, limit).await {
                Ok(reply) => return Ok(reply),
                Err(ScanError::ProbeTimeout(_)) => {}
                Err(e) => {
                    if !self.ping_unavailable.swap(true, Ordering::Relaxed) {
                        warn!(
                            error = %e,
                            probe = self.ping.name(),
                            "echo probe unavailable, using TCP liveness probe"
                        );
                    }
                }
            }
        }
        self.tcp.probe(addr, limit).await
    }

    fn name(&self) -> &'static str {
        "auto"
    }
}

/// Pick the liveness probe for the configured method.
pub fn probe_for(settings: &ScanSettings) -> Arc<dyn LivenessProbe> {
    match settings.probe_method {
        ProbeMethod::Auto => Arc::new(AutoProbe::platform(settings.fallback_port)),
        ProbeMethod::Icmp => Arc::new(PingProbe),
        ProbeMethod::Tcp => Arc::new(TcpProbe::new(settings.fallback_port)),
    }
}

/// Determines which candidate addresses are alive.
pub struct HostProber {
    probe: Arc<dyn LivenessProbe>,
    concurrency: usize,
    timeout: Duration,
    retries: u32,
}

impl HostProber {
    pub fn new(probe: Arc<dyn LivenessProbe>, settings: &ScanSettings) -> Self {
        Self {
            probe,
            concurrency: settings.probe_concurrency.max(1),
            timeout: settings.probe_timeout(),
            retries: settings.probe_retries,
        }
    }

    /// Probe one address, retrying only on timeouts.
    pub async fn probe_host(&self, addr: IpAddr) -> HostRecord {
        let start = Instant::now();
        // Hard ceiling in case a probe ignores its own timeout.
        let ceiling = self.timeout.saturating_mul(3).saturating_add(PING_GRACE);
        let mut alive = false;

        for attempt in 1..=self.retries.saturating_add(1) {
            let outcome = timeout(ceiling, self.probe.probe(addr, self.timeout))
                .await
                .unwrap_or(Err(ScanError::ProbeTimeout(addr)));

            match outcome {
                Ok(reply) => {
                    debug!(%addr, ?reply, probe = self.probe.name(), "host is alive");
                    alive = true;
                    break;
                }
                Err(ScanError::ProbeTimeout(_)) => {
                    debug!(%addr, attempt, "no liveness reply");
                }
                Err(e) => {
                    debug!(%addr, error = %e, "liveness probe failed");
                    break;
                }
            }
        }

        HostRecord::shell(addr, alive, start.elapsed().as_millis() as u64)
    }

    /// Probe every address. Completion order is unspecified; addresses not
    /// yet started when `cancel` fires are left out.
    pub async fn probe_all<I>(&self, addrs: I, cancel: &CancellationToken) -> Vec<HostRecord>
    where
        I: IntoIterator<Item = IpAddr>,
    {
        stream::iter(addrs)
            .take_until(cancel.cancelled())
            .map(|addr| self.probe_host(addr))
            .buffer_unordered(self.concurrency)
            .collect()
            .await
    }
}
