//! TCP connect primitive backed by tokio sockets.
//!
//! Uses the operating system's `connect()`, so no elevated privileges are
//! needed. The same type reads service banners.

use crate::banner::read_from_stream;
use crate::error::ScanError;
use crate::scanner::traits::{BannerReader, Connector};
use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{timeout, Instant};

/// Connector and banner reader over real TCP sockets.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl TcpConnector {
    pub fn new() -> Self {
        Self
    }

    /// Connect with a timeout, mapping failures onto scan error kinds.
    pub async fn open(addr: SocketAddr, limit: Duration) -> Result<TcpStream, ScanError> {
        match timeout(limit, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => Err(classify_io_error(addr, e)),
            Err(_) => Err(ScanError::PortProbeTimeout(addr)),
        }
    }
}

/// Refusals and resets mean the peer's stack answered; anything else
/// (unreachable, permission, ...) is kept as a plain IO error.
fn classify_io_error(addr: SocketAddr, e: io::Error) -> ScanError {
    match e.kind() {
        io::ErrorKind::ConnectionRefused | io::ErrorKind::ConnectionReset => {
            ScanError::PortConnectFailure {
                addr,
                reason: e.to_string(),
            }
        }
        io::ErrorKind::TimedOut => ScanError::PortProbeTimeout(addr),
        _ => ScanError::Io(e),
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self, addr: SocketAddr, limit: Duration) -> Result<(), ScanError> {
        Self::open(addr, limit).await.map(drop)
    }
}

#[async_trait]
impl BannerReader for TcpConnector {
    async fn read_banner(
        &self,
        addr: SocketAddr,
        window: Duration,
        nudge: Option<&'static [u8]>,
    ) -> Result<Vec<u8>, ScanError> {
        let started = Instant::now();
        let stream = Self::open(addr, window).await.map_err(|e| ScanError::BannerRead {
            addr,
            reason: e.to_string(),
        })?;

        let remaining = window.saturating_sub(started.elapsed());
        read_from_stream(stream, remaining, nudge)
            .await
            .map_err(|e| ScanError::BannerRead {
                addr,
                reason: e.to_string(),
            })
    }
}
