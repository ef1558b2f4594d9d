//! Service identification for open ports.
//!
//! A [`ServiceCatalog`] is an immutable, ordered list of [`ServiceMatcher`]s.
//! The static port table is consulted first and needs no network traffic;
//! banner signatures are only tried when the table has no entry, and the
//! banner is read at most once per port. Ports nothing matches are named
//! [`UNKNOWN_SERVICE`].

use crate::banner::{sanitize_banner, HTTP_PROBE};
use crate::scanner::traits::BannerReader;
use crate::types::Port;
use regex::bytes::Regex;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Name assigned when neither the table nor a signature identifies a port.
pub const UNKNOWN_SERVICE: &str = "unknown";

/// Built-in well-known ports.
const WELL_KNOWN_PORTS: &[(u16, &str)] = &[
    (20, "ftp-data"),
    (21, "ftp"),
    (22, "ssh"),
    (23, "telnet"),
    (25, "smtp"),
    (53, "dns"),
    (67, "dhcp-server"),
    (68, "dhcp-client"),
    (69, "tftp"),
    (80, "http"),
    (88, "kerberos"),
    (110, "pop3"),
    (111, "rpcbind"),
    (119, "nntp"),
    (123, "ntp"),
    (135, "msrpc"),
    (137, "netbios-ns"),
    (138, "netbios-dgm"),
    (139, "netbios-ssn"),
    (143, "imap"),
    (161, "snmp"),
    (162, "snmptrap"),
    (179, "bgp"),
    (194, "irc"),
    (389, "ldap"),
    (443, "https"),
    (445, "microsoft-ds"),
    (465, "smtps"),
    (514, "syslog"),
    (515, "printer"),
    (548, "afp"),
    (554, "rtsp"),
    (587, "submission"),
    (631, "ipp"),
    (636, "ldaps"),
    (873, "rsync"),
    (993, "imaps"),
    (995, "pop3s"),
    (1025, "msrpc-alt"),
    (1080, "socks"),
    (1194, "openvpn"),
    (1433, "mssql"),
    (1521, "oracle"),
    (1720, "h323"),
    (1723, "pptp"),
    (1883, "mqtt"),
    (2049, "nfs"),
    (2121, "ftp-alt"),
    (2181, "zookeeper"),
    (2222, "ssh-alt"),
    (2375, "docker"),
    (2376, "docker-ssl"),
    (3000, "http-dev"),
    (3128, "squid"),
    (3306, "mysql"),
    (3389, "rdp"),
    (5000, "upnp"),
    (5060, "sip"),
    (5140, "syslog-alt"),
    (5173, "vite-dev"),
    (5432, "postgresql"),
    (5672, "amqp"),
    (5900, "vnc"),
    (5901, "vnc-alt"),
    (5902, "vnc-alt"),
    (5903, "vnc-alt"),
    (6000, "x11"),
    (6001, "x11-alt"),
    (6002, "x11-alt"),
    (6003, "x11-alt"),
    (6379, "redis"),
    (6443, "kubernetes-api"),
    (8000, "http-alt"),
    (8001, "http-alt"),
    (8008, "http-alt"),
    (8080, "http-proxy"),
    (8081, "http-alt"),
    (8443, "https-alt"),
    (8888, "http-alt"),
    (9000, "cslistener"),
    (9042, "cassandra"),
    (9090, "prometheus"),
    (9092, "kafka"),
    (9200, "elasticsearch"),
    (10000, "webmin"),
    (11211, "memcached"),
    (27017, "mongodb"),
    (27018, "mongodb"),
    (27019, "mongodb"),
];

/// Built-in banner signatures, tried in order.
const BUILTIN_SIGNATURES: &[(&str, &str)] = &[
    (r"^SSH-\d", "ssh"),
    (r"^HTTP/\d\.\d", "http"),
    (r"^RTSP/\d\.\d", "rtsp"),
    (r"^220[ -][^\r\n]*(?i:e?smtp)", "smtp"),
    (r"^220[ -][^\r\n]*(?i:ftp)", "ftp"),
    (r"^RFB \d{3}\.\d{3}", "vnc"),
    (r"^\+OK", "pop3"),
    (r"^\* OK", "imap"),
    (r"^(-ERR |-NOAUTH|\+PONG)", "redis"),
    (r"(?s-u)^.{3}\x00\x0a[0-9]", "mysql"),
    (r"(?-u)^\xff[\xfb-\xfe]", "telnet"),
];

/// Static port → service name lookup.
#[derive(Debug, Clone, Default)]
pub struct ServiceTable {
    entries: HashMap<u16, String>,
}

impl ServiceTable {
    /// The built-in table of well-known ports.
    pub fn builtin() -> Self {
        Self::default().with_entries(WELL_KNOWN_PORTS.iter().map(|&(p, s)| (p, s.to_string())))
    }

    /// Add or override entries.
    pub fn with_entries(mut self, entries: impl IntoIterator<Item = (u16, String)>) -> Self {
        self.entries.extend(entries);
        self
    }

    pub fn lookup(&self, port: Port) -> Option<&str> {
        self.entries.get(&port.as_u16()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A byte pattern paired with the service it identifies.
#[derive(Debug, Clone)]
pub struct Signature {
    pattern: Regex,
    service: String,
}

impl Signature {
    pub fn new(pattern: &str, service: impl Into<String>) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            service: service.into(),
        })
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn matches(&self, banner: &[u8]) -> bool {
        self.pattern.is_match(banner)
    }
}

/// One way of naming an open port.
#[derive(Debug, Clone)]
pub enum ServiceMatcher {
    /// Look the port number up in a table.
    Static(ServiceTable),
    /// Match banner bytes against signatures, first match wins.
    Banner(Vec<Signature>),
}

impl ServiceMatcher {
    pub fn needs_banner(&self) -> bool {
        matches!(self, Self::Banner(_))
    }

    /// Attempt to name the port. Banner matchers never match without bytes.
    pub fn identify(&self, port: Port, banner: Option<&[u8]>) -> Option<&str> {
        match self {
            Self::Static(table) => table.lookup(port),
            Self::Banner(signatures) => {
                let banner = banner.filter(|b| !b.is_empty())?;
                signatures
                    .iter()
                    .find(|sig| sig.matches(banner))
                    .map(Signature::service)
            }
        }
    }
}

/// The immutable identification configuration shared by a scan.
#[derive(Debug, Clone)]
pub struct ServiceCatalog {
    matchers: Vec<ServiceMatcher>,
}

impl ServiceCatalog {
    /// Build a catalog from an explicit matcher list, tried in order.
    pub fn new(matchers: Vec<ServiceMatcher>) -> Self {
        Self { matchers }
    }

    /// Start from the built-in table and signatures.
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::default()
    }

    pub fn matchers(&self) -> &[ServiceMatcher] {
        &self.matchers
    }

    /// Name a port without any network traffic, if a static matcher knows it.
    pub fn lookup_static(&self, port: Port) -> Option<&str> {
        self.matchers
            .iter()
            .filter(|m| !m.needs_banner())
            .find_map(|m| m.identify(port, None))
    }

    /// Name a port from banner bytes alone.
    pub fn match_banner(&self, port: Port, banner: &[u8]) -> Option<&str> {
        self.matchers
            .iter()
            .filter(|m| m.needs_banner())
            .find_map(|m| m.identify(port, Some(banner)))
    }

    fn has_banner_matchers(&self) -> bool {
        self.matchers.iter().any(ServiceMatcher::needs_banner)
    }
}

impl Default for ServiceCatalog {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Collects extra table entries and signatures on top of the built-ins.
///
/// Extra ports override built-in names; extra signatures are tried before
/// the built-in ones.
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    ports: Vec<(u16, String)>,
    signatures: Vec<Signature>,
}

impl CatalogBuilder {
    pub fn port(mut self, port: u16, service: impl Into<String>) -> Self {
        self.ports.push((port, service.into()));
        self
    }

    pub fn signature(
        mut self,
        pattern: &str,
        service: impl Into<String>,
    ) -> Result<Self, regex::Error> {
        self.signatures.push(Signature::new(pattern, service)?);
        Ok(self)
    }

    pub fn build(self) -> ServiceCatalog {
        let table = ServiceTable::builtin().with_entries(self.ports);
        let signatures = self
            .signatures
            .into_iter()
            .chain(
                BUILTIN_SIGNATURES
                    .iter()
                    .filter_map(|&(pattern, service)| Signature::new(pattern, service).ok()),
            )
            .collect();

        ServiceCatalog::new(vec![
            ServiceMatcher::Static(table),
            ServiceMatcher::Banner(signatures),
        ])
    }
}

/// What the identifier learned about one open port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identification {
    pub service: String,
    pub banner: Option<String>,
}

/// Assigns a service name to open ports.
pub struct ServiceIdentifier {
    catalog: Arc<ServiceCatalog>,
    banners: Arc<dyn BannerReader>,
    window: Duration,
    grab_banners: bool,
}

impl ServiceIdentifier {
    /// # Arguments
    /// * `window` - How long a banner read may take
    /// * `grab_banners` - Also read banners for statically named ports
    pub fn new(
        catalog: Arc<ServiceCatalog>,
        banners: Arc<dyn BannerReader>,
        window: Duration,
        grab_banners: bool,
    ) -> Self {
        Self {
            catalog,
            banners,
            window,
            grab_banners,
        }
    }

    /// Name the service on an open port. Never fails: any problem reading
    /// the banner falls through to [`UNKNOWN_SERVICE`].
    pub async fn identify(&self, addr: SocketAddr, port: Port) -> Identification {
        if let Some(service) = self.catalog.lookup_static(port) {
            let banner = if self.grab_banners {
                self.read(addr).await.as_deref().and_then(printable)
            } else {
                None
            };
            return Identification {
                service: service.to_string(),
                banner,
            };
        }

        if !self.catalog.has_banner_matchers() {
            return Identification {
                service: UNKNOWN_SERVICE.to_string(),
                banner: None,
            };
        }

        let banner = self.read(addr).await.filter(|b| !b.is_empty());
        let service = banner
            .as_deref()
            .and_then(|b| self.catalog.match_banner(port, b))
            .unwrap_or(UNKNOWN_SERVICE);

        Identification {
            service: service.to_string(),
            banner: banner.as_deref().and_then(printable),
        }
    }

    async fn read(&self, addr: SocketAddr) -> Option<Vec<u8>> {
        match self
            .banners
            .read_banner(addr, self.window, Some(HTTP_PROBE))
            .await
        {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                debug!(%addr, error = %e, "banner read failed");
                None
            }
        }
    }
}

/// Sanitised banner text, or `None` when nothing printable is left.
fn printable(bytes: &[u8]) -> Option<String> {
    Some(sanitize_banner(bytes)).filter(|s| !s.is_empty())
}
