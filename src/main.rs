//! tagrep - Parallel ID3v2 Tag Search
//!
//! Entry point for the CLI application.

use anyhow::{Context, Result};
use clap::Parser;
use std::io;
use std::process::ExitCode;
use std::sync::atomic::Ordering;
use tagrep::config::{CliArgs, ScanConfig};
use tagrep::progress::{print_failures, summary_line, ProgressReporter};
use tagrep::scan::{Reporter, Scanner};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Conventional exit status after SIGINT
const EXIT_INTERRUPTED: u8 = 130;

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    // Parse CLI arguments (missing paths exit with usage on stderr)
    let args = CliArgs::parse();

    // Setup logging
    setup_logging(args.verbose)?;

    // Validate and create config
    let config = ScanConfig::from_args(args).context("Invalid configuration")?;

    let scanner = Scanner::new(config.clone());

    // Setup signal handler for graceful shutdown
    let shutdown_flag = scanner.shutdown_flag();
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupt received, shutting down...");
        shutdown_flag.store(true, Ordering::SeqCst);
    })
    .context("Failed to set signal handler")?;

    let reporter = Reporter::spawn(io::stdout(), config.absolute_base.clone())
        .context("Failed to start reporter")?;

    // Run the scan
    let result = if config.show_progress {
        let progress = ProgressReporter::new();
        let result = scanner.run_with_progress(reporter.sender(), |p| progress.update(&p));
        progress.finish(result.as_ref().map_or(false, |s| s.completed));
        result
    } else {
        scanner.run(reporter.sender())
    };

    // Flush every match before the summary, even if the scan failed
    let (_, written) = reporter.finish().context("Failed to write matches")?;
    let summary = result.context("Scan failed")?;

    println!(
        "{}",
        summary_line(summary.total, summary.found, summary.duration)
    );

    info!(printed = written, skipped = summary.skipped, "Done");

    if !summary.completed {
        info!("Scan was interrupted before completion");
        return Ok(ExitCode::from(EXIT_INTERRUPTED));
    }

    if summary.is_partial() {
        print_failures(summary.failures.iter().map(|f| f.path()));
        return Ok(ExitCode::FAILURE);
    }

    Ok(ExitCode::SUCCESS)
}

fn setup_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("tagrep=debug,warn")
    } else {
        EnvFilter::new("tagrep=warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    Ok(())
}
