//! hostsweep - host discovery and port scanning for IP ranges.

use anyhow::{Context, Result};
use clap::Parser;
use hostsweep::cli::Args;
use hostsweep::logging::{init_tracing, ScanLog};
use hostsweep::output::{self, print_error, print_scan_header, print_success, print_warning};
use hostsweep::report::{write_log, write_reports};
use hostsweep::scanner::Engine;
use hostsweep::services::ServiceCatalog;
use hostsweep::types::TargetSpec;
use indicatif::{ProgressBar, ProgressStyle};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let scan_log = ScanLog::new();
    init_tracing(args.verbose, &scan_log);

    match run(args, scan_log).await {
        Ok(false) => ExitCode::SUCCESS,
        // Interrupted by Ctrl-C; results were still reported.
        Ok(true) => ExitCode::from(130),
        Err(e) => {
            print_error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

/// Run the scan. Returns whether it was interrupted.
async fn run(args: Args, scan_log: ScanLog) -> Result<bool> {
    let settings = args.settings().context("failed to load settings")?;
    let ports = args.port_spec().context("invalid port list")?;
    let target = TargetSpec::parse(&args.target)?;

    if !args.quiet {
        print_scan_header(&args.target, target.host_count(), ports.count());
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            print_warning("interrupted, finishing in-flight probes...");
            on_interrupt.cancel();
        }
    });

    let engine = Engine::new(settings, Arc::new(ServiceCatalog::default()))?;

    let spinner = if args.quiet {
        ProgressBar::hidden()
    } else {
        spinner(&format!("Scanning {}...", args.target))
    };
    let result = engine.run(&args.target, &ports, &cancel).await;
    spinner.finish_and_clear();
    let result = result?;

    output::print_results(&result, args.output).context("failed to print results")?;

    if !args.no_save {
        let dir = args.reports_dir()?;
        let paths = write_reports(&result, &dir)
            .with_context(|| format!("failed to write reports under {}", dir.display()))?;
        write_log(&paths, &scan_log.contents())
            .with_context(|| format!("failed to write {}", paths.log.display()))?;
        if !args.quiet {
            print_success(&format!("Reports saved to {}", paths.folder.display()));
        }
    }

    Ok(result.interrupted())
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template("{spinner:.cyan} [{elapsed_precise}] {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
