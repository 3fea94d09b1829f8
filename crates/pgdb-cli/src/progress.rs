//! Terminal download progress.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use pgdb_core::ProgressSink;

const SPINNER_TEMPLATE: &str = "{spinner:.green} {bytes} downloaded ({bytes_per_sec})";
const BAR_TEMPLATE: &str =
    "{bar:40.cyan/blue} {bytes}/{total_bytes} ({bytes_per_sec}, {eta} remaining)";

/// Spinner until the download size is known, then a byte-scaled bar.
///
/// indicatif hides itself when stderr is not a terminal, so piping the output
/// of `pgdb install` stays clean.
#[derive(Default)]
pub struct TerminalProgress {
    bar: Option<ProgressBar>,
}

impl TerminalProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressSink for TerminalProgress {
    fn start(&mut self, label: &str) {
        println!("{label}");
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template(SPINNER_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.enable_steady_tick(Duration::from_millis(120));
        self.bar = Some(bar);
    }

    fn set_total(&mut self, total: Option<u64>) {
        if let (Some(bar), Some(total)) = (&self.bar, total) {
            bar.disable_steady_tick();
            bar.set_length(total);
            bar.set_style(
                ProgressStyle::with_template(BAR_TEMPLATE)
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("=> "),
            );
        }
    }

    fn advance(&mut self, bytes: u64) {
        if let Some(bar) = &self.bar {
            bar.inc(bytes);
        }
    }

    fn finish(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}
