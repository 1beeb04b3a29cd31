//! Sweep progress bar
//!
//! Shows an indicatif bar when enabled and stderr is a terminal, nothing
//! otherwise.

use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;

pub(crate) struct SweepProgress {
    bar: Option<ProgressBar>,
}

impl SweepProgress {
    pub(crate) fn new(enabled: bool, len: usize, label: &str) -> Self {
        if !enabled || len == 0 || !std::io::stderr().is_terminal() {
            return Self { bar: None };
        }

        let bar = ProgressBar::new(len as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("  {spinner:.cyan} {prefix}  {bar:20.cyan/dim} {pos}/{len}  {elapsed:.dim}")
        {
            bar.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ").progress_chars("━╸─"));
        }
        bar.set_prefix(label.to_string());
        bar.enable_steady_tick(std::time::Duration::from_millis(120));
        Self { bar: Some(bar) }
    }

    pub(crate) fn inc(&self) {
        if let Some(ref bar) = self.bar {
            bar.inc(1);
        }
    }

    pub(crate) fn finish(&self) {
        if let Some(ref bar) = self.bar {
            bar.disable_steady_tick();
            bar.finish_and_clear();
        }
    }
}

impl Drop for SweepProgress {
    fn drop(&mut self) {
        self.finish();
    }
}
