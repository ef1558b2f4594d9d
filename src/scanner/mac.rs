//! Hardware address resolution from the local neighbor table.
//!
//! Liveness probing already made the kernel resolve on-link neighbors, so
//! the resolver only reads the table. A missing entry (off-subnet host,
//! expired entry) is `None`; an unusable lookup mechanism is logged and also
//! ends up as `None`.

use crate::error::ScanError;
use crate::scanner::traits::NeighborTable;
use crate::types::MacAddr;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::net::IpAddr;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Upper bound on one `arp` invocation.
const ARP_COMMAND_TIMEOUT: Duration = Duration::from_secs(2);

/// Reads the Linux kernel ARP cache.
#[derive(Debug, Clone)]
pub struct ProcNetArp {
    path: PathBuf,
}

impl ProcNetArp {
    pub fn new() -> Self {
        Self::at("/proc/net/arp")
    }

    /// Read an ARP table in `/proc/net/arp` format from another file.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for ProcNetArp {
    fn default() -> Self {
        Self::new()
    }
}

/// Find `addr` in `/proc/net/arp` contents. Incomplete entries are skipped.
pub fn parse_proc_arp(contents: &str, addr: IpAddr) -> Option<MacAddr> {
    let wanted = addr.to_string();
    contents.lines().skip(1).find_map(|line| {
        // IP address, HW type, Flags, HW address, Mask, Device
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 4 || fields[0] != wanted || fields[2] == "0x0" {
            return None;
        }
        fields[3].parse::<MacAddr>().ok().filter(|mac| !mac.is_zero())
    })
}

#[async_trait]
impl NeighborTable for ProcNetArp {
    async fn lookup(&self, addr: IpAddr) -> Result<Option<MacAddr>, ScanError> {
        // The kernel ARP cache only holds IPv4 neighbors.
        if addr.is_ipv6() {
            return Ok(None);
        }
        let contents = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            ScanError::MacResolution(format!("{}: {}", self.path.display(), e))
        })?;
        Ok(parse_proc_arp(&contents, addr))
    }
}

/// Queries the platform `arp` utility.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArpCommand;

/// Pull the first hardware address out of `arp` output, whatever the
/// platform's layout.
pub fn parse_arp_output(output: &str) -> Option<MacAddr> {
    output
        .split_whitespace()
        .filter(|token| token.contains(':') || token.contains('-'))
        .filter_map(|token| token.parse::<MacAddr>().ok())
        .find(|mac| !mac.is_zero())
}

#[async_trait]
impl NeighborTable for ArpCommand {
    async fn lookup(&self, addr: IpAddr) -> Result<Option<MacAddr>, ScanError> {
        let mut cmd = Command::new("arp");
        if cfg!(windows) {
            cmd.arg("-a");
        } else if !cfg!(target_os = "macos") {
            cmd.arg("-n");
        }
        cmd.arg(addr.to_string())
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let output = timeout(ARP_COMMAND_TIMEOUT, cmd.output())
            .await
            .map_err(|_| ScanError::MacResolution("arp timed out".to_string()))?
            .map_err(|e| ScanError::MacResolution(format!("arp: {}", e)))?;

        // arp exits non-zero when there is simply no entry.
        Ok(parse_arp_output(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// The neighbor table implementation for this platform.
pub fn platform_neighbor_table() -> Arc<dyn NeighborTable> {
    if cfg!(target_os = "linux") {
        Arc::new(ProcNetArp::new())
    } else {
        Arc::new(ArpCommand)
    }
}

/// Resolves hardware addresses for live hosts.
pub struct MacResolver {
    table: Arc<dyn NeighborTable>,
    concurrency: usize,
    warned: AtomicBool,
}

impl MacResolver {
    pub fn new(table: Arc<dyn NeighborTable>, concurrency: usize) -> Self {
        Self {
            table,
            concurrency: concurrency.max(1),
            warned: AtomicBool::new(false),
        }
    }

    /// Resolve one address. Never fails.
    pub async fn resolve(&self, addr: IpAddr) -> Option<MacAddr> {
        match self.table.lookup(addr).await {
            Ok(mac) => {
                debug!(%addr, mac = ?mac.map(|m| m.to_string()), "neighbor lookup");
                mac
            }
            Err(e) => {
                if !self.warned.swap(true, Ordering::Relaxed) {
                    warn!(error = %e, "MAC resolution unavailable");
                } else {
                    debug!(%addr, error = %e, "MAC resolution failed");
                }
                None
            }
        }
    }

    /// Resolve every address; addresses not started before `cancel` fires
    /// are left out.
    pub async fn resolve_all(
        &self,
        addrs: Vec<IpAddr>,
        cancel: &CancellationToken,
    ) -> Vec<(IpAddr, Option<MacAddr>)> {
        stream::iter(addrs)
            .take_until(cancel.cancelled())
            .map(|addr| async move { (addr, self.resolve(addr).await) })
            .buffer_unordered(self.concurrency)
            .collect()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const PROC_ARP: &str = "\
IP address       HW type     Flags       HW address            Mask     Device
192.168.1.1      0x1         0x2         a4:91:b1:0c:22:7e     *        eth0
192.168.1.23     0x1         0x0         00:00:00:00:00:00     *        eth0
192.168.1.40     0x1         0x2         3C:22:FB:01:02:03     *        wlan0
";

    #[test]
    fn test_parse_proc_arp() {
        assert_eq!(
            parse_proc_arp(PROC_ARP, "192.168.1.1".parse().unwrap()).map(|m| m.to_string()),
            Some("a4:91:b1:0c:22:7e".to_string())
        );
        assert_eq!(
            parse_proc_arp(PROC_ARP, "192.168.1.40".parse().unwrap()).map(|m| m.to_string()),
            Some("3c:22:fb:01:02:03".to_string())
        );
        // Incomplete entry.
        assert_eq!(parse_proc_arp(PROC_ARP, "192.168.1.23".parse().unwrap()), None);
        // Prefix of another address must not match.
        assert_eq!(parse_proc_arp(PROC_ARP, "192.168.1.4".parse().unwrap()), None);
    }

    #[test]
    fn test_parse_arp_output_formats() {
        let linux = "Address HWtype HWaddress Flags Mask Iface\n\
                     192.168.1.1 ether 00:11:22:33:44:55 C eth0\n";
        let macos = "? (192.168.1.1) at 0:11:22:3:44:55 on en0 ifscope [ethernet]\n";
        let windows = "Interface: 192.168.1.5 --- 0x3\n  \
                       Internet Address      Physical Address      Type\n  \
                       192.168.1.1           00-11-22-33-44-55     dynamic\n";
        let cases = [
            (linux, "00:11:22:33:44:55"),
            (macos, "00:11:22:03:44:55"),
            (windows, "00:11:22:33:44:55"),
        ];
        for (output, expected) in cases {
            assert_eq!(
                parse_arp_output(output).map(|m| m.to_string()).as_deref(),
                Some(expected),
                "{}",
                output
            );
        }
        assert_eq!(parse_arp_output("? (192.168.1.9) at (incomplete) on en0"), None);
        assert_eq!(parse_arp_output("192.168.1.9 (192.168.1.9) -- no entry"), None);
    }

    #[tokio::test]
    async fn test_proc_arp_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(PROC_ARP.as_bytes()).unwrap();

        let table = ProcNetArp::at(file.path());
        let mac = table.lookup("192.168.1.1".parse().unwrap()).await.unwrap();
        assert!(mac.is_some());
        let none = table.lookup("10.9.9.9".parse().unwrap()).await.unwrap();
        assert!(none.is_none());
        let v6 = table.lookup("fe80::1".parse().unwrap()).await.unwrap();
        assert!(v6.is_none());
    }

    #[tokio::test]
    async fn test_missing_table_resolves_to_none() {
        let table = ProcNetArp::at("/nonexistent/arp");
        let resolver = MacResolver::new(Arc::new(table.clone()), 4);
        assert!(matches!(
            table.lookup("192.168.1.1".parse().unwrap()).await,
            Err(ScanError::MacResolution(_))
        ));
        assert_eq!(resolver.resolve("192.168.1.1".parse().unwrap()).await, None);
    }

    #[tokio::test]
    async fn test_resolve_all_covers_each_address() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(PROC_ARP.as_bytes()).unwrap();
        let resolver = MacResolver::new(Arc::new(ProcNetArp::at(file.path())), 2);

        let addrs: Vec<IpAddr> = ["192.168.1.1", "192.168.1.23", "192.168.1.40"]
            .iter()
            .map(|a| a.parse().unwrap())
            .collect();
        let mut resolved = resolver.resolve_all(addrs, &CancellationToken::new()).await;
        resolved.sort_by_key(|(addr, _)| *addr);

        let found: Vec<bool> = resolved.iter().map(|(_, mac)| mac.is_some()).collect();
        assert_eq!(found, vec![true, false, true]);
    }
}
