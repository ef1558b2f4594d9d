//! Tracing setup for the binary.
//!
//! Events go to stderr, filtered by `RUST_LOG` or the `-v` count, so stdout
//! stays clean for JSON and CSV output. Info-level events are also captured
//! into a [`ScanLog`], which is saved next to the reports once the scan ends.

use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Filter used for the saved scan log.
const SCAN_LOG_FILTER: &str = "hostsweep=info";

/// In-memory copy of the log events of one run.
#[derive(Debug, Clone, Default)]
pub struct ScanLog {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl ScanLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything logged so far.
    pub fn contents(&self) -> Vec<u8> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<u8>> {
        // A panic mid-write leaves at worst a truncated line.
        self.buf.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Writer handed out per event by [`ScanLog`].
pub struct ScanLogWriter(ScanLog);

impl io::Write for ScanLogWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for ScanLog {
    type Writer = ScanLogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        ScanLogWriter(self.clone())
    }
}

/// Default stderr filter for a `-v` count.
pub fn verbosity_filter(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "hostsweep=info",
        1 => "hostsweep=debug",
        _ => "hostsweep=trace",
    }
}

/// Install the global subscriber: stderr plus `scan_log`.
pub fn init_tracing(verbosity: u8, scan_log: &ScanLog) {
    let stderr_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity_filter(verbosity)));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(io::stderr)
                .with_filter(stderr_filter),
        )
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(scan_log.clone())
                .with_filter(EnvFilter::new(SCAN_LOG_FILTER)),
        )
        .init();
}
