//! Progress reporting for the scanner
//!
//! Provides an optional live spinner (indicatif, on stderr) and the
//! summary line printed after every run.

use crate::scan::ScanProgress;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Spinner showing scan counters while the run is in flight
pub struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    /// Create a new progress reporter
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();

        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );

        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Update the progress display
    pub fn update(&self, progress: &ScanProgress) {
        let msg = format!(
            "Files: {} | Found: {} | Pending: {} | Rate: {:.0}/s",
            format_number(progress.total),
            format_number(progress.found),
            format_number(progress.pending as u64),
            progress.entries_per_second(),
        );

        self.bar.set_message(msg);
    }

    /// Finish the progress display with a final message
    pub fn finish(&self, completed: bool) {
        let message = if completed {
            style("Scan completed").green().to_string()
        } else {
            style("Scan interrupted").yellow().to_string()
        };
        self.bar.finish_with_message(message);
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Format a number with thousands separators
fn format_number(n: u64) -> String {
    let s = n.to_string();
    let bytes: Vec<_> = s.bytes().rev().collect();

    let chunks: Vec<String> = bytes
        .chunks(3)
        .map(|chunk| chunk.iter().rev().map(|&b| b as char).collect::<String>())
        .collect();

    chunks.into_iter().rev().collect::<Vec<_>>().join(",")
}

/// The final summary line, e.g. `120 files total, 3 found in 42ms`
pub fn summary_line(total: u64, found: u64, duration: Duration) -> String {
    format!(
        "{} files total, {} found in {}ms",
        total,
        found,
        duration.as_millis()
    )
}

/// Print a warning block listing directories that could not be read
pub fn print_failures<'a, I>(paths: I)
where
    I: IntoIterator<Item = &'a std::path::Path>,
{
    let paths: Vec<_> = paths.into_iter().collect();
    if paths.is_empty() {
        return;
    }

    eprintln!(
        "{} {} {} could not be read:",
        style("warning:").yellow().bold(),
        paths.len(),
        if paths.len() == 1 { "directory" } else { "directories" }
    );
    for path in paths {
        eprintln!("  {}", path.display());
    }
}
