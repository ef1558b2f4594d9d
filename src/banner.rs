//! Banner grabbing for TCP services.
//!
//! Reads whatever a service sends right after the handshake. Services that
//! wait for the client to speak first (HTTP, most notably) are nudged with a
//! small request and read once more.

use std::io;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{timeout, Instant};

/// Maximum bytes to read for a banner.
pub const MAX_BANNER_SIZE: usize = 1024;

/// Longest banner kept in a port record.
const MAX_DISPLAY_LEN: usize = 256;

/// Sent to silent services; HTTP servers answer it, most others reply with
/// an error line that still identifies them.
pub const HTTP_PROBE: &[u8] = b"HEAD / HTTP/1.0\r\n\r\n";

/// Read a banner from an open stream within `window`.
///
/// The window covers the whole exchange, including the nudge.
pub async fn read_from_stream(
    mut stream: TcpStream,
    window: Duration,
    nudge: Option<&[u8]>,
) -> io::Result<Vec<u8>> {
    let deadline = Instant::now().checked_add(window);
    let mut buffer = vec![0u8; MAX_BANNER_SIZE];

    // Split the window so a silent service still leaves time for the nudge.
    let first_wait = if nudge.is_some() { window / 2 } else { window };
    match timeout(first_wait, stream.read(&mut buffer)).await {
        Ok(Ok(n)) if n > 0 => {
            buffer.truncate(n);
            return Ok(buffer);
        }
        Ok(Ok(_)) => return Ok(Vec::new()),
        Ok(Err(e)) => return Err(e),
        Err(_) => {}
    }

    let Some(nudge) = nudge else {
        return Ok(Vec::new());
    };

    stream.write_all(nudge).await?;
    let remaining = match deadline {
        Some(deadline) => deadline.saturating_duration_since(Instant::now()),
        None => window,
    };
    match timeout(remaining, stream.read(&mut buffer)).await {
        Ok(Ok(n)) => {
            buffer.truncate(n);
            Ok(buffer)
        }
        Ok(Err(e)) => Err(e),
        Err(_) => Ok(Vec::new()),
    }
}

/// Sanitize banner by removing non-printable characters and limiting length.
pub fn sanitize_banner(data: &[u8]) -> String {
    let mut result = String::with_capacity(data.len().min(MAX_DISPLAY_LEN));
    let mut prev_space = false;

    for &b in data.iter().take(MAX_DISPLAY_LEN) {
        let c = match b {
            b'\r' | b'\n' | b'\t' | b' ' => ' ',
            b if b.is_ascii_graphic() => b as char,
            _ => '.',
        };
        // Collapse runs of whitespace.
        if c == ' ' && prev_space {
            continue;
        }
        prev_space = c == ' ';
        result.push(c);
    }

    result.trim().to_string()
}
