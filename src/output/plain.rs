//! Plain text output formatting.
//!
//! Produces a human-readable summary with colors and formatting. Only live
//! hosts are listed; dead hosts show up in the counts.

use crate::report::ScanResult;
use crate::types::{HostRecord, PortState};
use console::style;
use std::io::{self, Write};

const RULE: &str = "═══════════════════════════════════════════════════════════════";
const THIN_RULE: &str = "───────────────────────────────────────────────────────────────";

/// Render a scan result as a plain text report.
pub fn render_plain<W: Write>(result: &ScanResult, mut out: W) -> io::Result<()> {
    let summary = result.summary();

    writeln!(out)?;
    writeln!(out, "{}", style(RULE).cyan())?;
    writeln!(
        out,
        "                   {} Scan Results",
        style("hostsweep").cyan().bold()
    )?;
    writeln!(out, "{}", style(RULE).cyan())?;
    writeln!(out)?;

    writeln!(out, "  {} {}", style("Target:").bold(), result.target())?;
    writeln!(
        out,
        "  {} {}",
        style("Scan ID:").bold(),
        style(result.id().short()).dim()
    )?;
    writeln!(
        out,
        "  {} {} ports per host",
        style("Ports:").bold(),
        result.ports_requested().len()
    )?;
    writeln!(out)?;

    writeln!(
        out,
        "  {} {} hosts scanned in {:.2}s",
        style("Statistics:").bold(),
        summary.hosts_scanned,
        result.duration_ms() as f64 / 1000.0
    )?;
    writeln!(
        out,
        "              {} alive, {} open ports",
        style(summary.alive_count).green().bold(),
        style(summary.total_open_ports).green()
    )?;
    if result.interrupted() {
        writeln!(
            out,
            "  {}",
            style("Scan was interrupted; results are incomplete.").yellow()
        )?;
    }
    writeln!(out)?;

    let alive: Vec<&HostRecord> = result.alive_hosts().collect();
    if alive.is_empty() {
        writeln!(out, "  {}", style("No live hosts found.").dim())?;
    }
    for host in alive {
        write_host(&mut out, host)?;
    }

    if !summary.per_service_counts.is_empty() {
        writeln!(out, "  {}", style("Services:").bold())?;
        for (service, count) in &summary.per_service_counts {
            writeln!(out, "    {:<15} {}", service, count)?;
        }
        if let Some(top) = &summary.most_common_service {
            writeln!(out, "  {} {}", style("Most common:").bold(), style(top).cyan())?;
        }
        writeln!(out)?;
    }

    writeln!(out, "{}", style(RULE).cyan())?;
    writeln!(out)?;
    Ok(())
}

fn write_host<W: Write>(out: &mut W, host: &HostRecord) -> io::Result<()> {
    let mac = host
        .mac
        .map(|m| m.to_string())
        .unwrap_or_else(|| "-".to_string());
    let partial = if host.partial {
        style(" (partial)").yellow().to_string()
    } else {
        String::new()
    };
    writeln!(
        out,
        "  {}  {}{}",
        style(host.address).white().bold(),
        style(mac).dim(),
        partial
    )?;

    let closed = host.ports.iter().filter(|p| p.state == PortState::Closed).count();
    let filtered = host.ports.iter().filter(|p| p.state == PortState::Filtered).count();

    if host.open_ports().next().is_none() {
        writeln!(out, "    {}", style("no open ports").dim())?;
    } else {
        writeln!(out, "  {}", style(THIN_RULE).dim())?;
        writeln!(
            out,
            "  {:>6}  {:<15}  {}",
            style("PORT").bold(),
            style("SERVICE").bold(),
            style("BANNER").bold()
        )?;
        for port in host.open_ports() {
            let banner = port
                .banner
                .as_deref()
                .map(|b| truncate_string(b, 35))
                .unwrap_or_default();
            writeln!(
                out,
                "  {:>6}  {:<15}  {}",
                style(port.port).green().bold(),
                port.service.as_deref().unwrap_or(crate::services::UNKNOWN_SERVICE),
                style(banner).dim()
            )?;
        }
        writeln!(out, "  {}", style(THIN_RULE).dim())?;
    }
    writeln!(
        out,
        "    {} closed, {} filtered",
        style(closed).red(),
        style(filtered).yellow()
    )?;
    writeln!(out)?;
    Ok(())
}

/// Print the scan header before scanning begins.
pub fn print_scan_header(target: &str, hosts: u128, ports: usize) {
    eprintln!();
    eprintln!(
        "{} {} v{}",
        style("Starting").cyan(),
        style("hostsweep").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    eprintln!(
        "{} Target: {} ({} candidate addresses)",
        style("•").dim(),
        style(target).white().bold(),
        hosts
    );
    eprintln!(
        "{} Scanning {} ports per live host...",
        style("•").dim(),
        style(ports).white().bold()
    );
    eprintln!();
}

/// Print an error message.
pub fn print_error(msg: &str) {
    eprintln!("{} {}", style("Error:").red().bold(), msg);
}

/// Print a warning message.
pub fn print_warning(msg: &str) {
    eprintln!("{} {}", style("Warning:").yellow().bold(), msg);
}

/// Print a success message.
pub fn print_success(msg: &str) {
    eprintln!("{} {}", style("✓").green().bold(), msg);
}

/// Truncate to `max_len` characters, adding an ellipsis if truncated.
fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
