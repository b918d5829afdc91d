//! Terminal progress indicator for the `update-trigger` binary.
//!
//! [`TerminalProgress`] implements [`ProgressSink`] on top of an `indicatif` bar drawn
//! on stderr. Progress output can be disabled with `--no-progress` or by setting
//! `UPDATE_TRIGGER_NO_PROGRESS`, in which case the bar is created hidden.

use crate::update::ProgressSink;
use anyhow::{Context, Result};
use indicatif::{ProgressBar as IndicatifBar, ProgressStyle as IndicatifStyle};

/// Environment variable that disables progress output when set to anything but `0`.
pub const NO_PROGRESS_ENV: &str = "UPDATE_TRIGGER_NO_PROGRESS";

/// Whether progress output has been disabled through the environment.
pub fn is_progress_disabled() -> bool {
    std::env::var(NO_PROGRESS_ENV).map(|v| v != "0").unwrap_or(false)
}

/// An `indicatif` download bar showing percent complete.
///
/// Example output:
/// ```text
/// Downloading updater [━━━━━━━━━━━━━━━━━━━━╸━━━━━━━━━━━━━━━━━━━] 51%
/// ```
pub struct TerminalProgress {
    bar: Option<IndicatifBar>,
    hidden: bool,
}

impl TerminalProgress {
    /// Creates a terminal sink. The bar itself is built on [`open`](ProgressSink::open).
    pub fn new() -> Self {
        Self {
            bar: None,
            hidden: is_progress_disabled(),
        }
    }

    /// Creates a sink that never draws anything.
    pub fn hidden() -> Self {
        Self {
            bar: None,
            hidden: true,
        }
    }
}

impl Default for TerminalProgress {
    fn default() -> Self {
        Self::new()
    }
}

fn download_style() -> Result<IndicatifStyle> {
    Ok(IndicatifStyle::default_bar()
        .template("{prefix:.bold.cyan} [{bar:40.cyan/blue}] {pos:>3}%")
        .context("Invalid progress bar template")?
        .progress_chars("━╸━"))
}

impl ProgressSink for TerminalProgress {
    fn open(&mut self) -> Result<()> {
        let bar = if self.hidden {
            IndicatifBar::hidden()
        } else {
            let bar = IndicatifBar::new(100);
            bar.set_style(download_style()?);
            bar.set_prefix("Downloading updater");
            bar
        };
        self.bar = Some(bar);
        Ok(())
    }

    fn report(&mut self, percent: u8) {
        if let Some(bar) = &self.bar {
            bar.set_position(u64::from(percent.min(100)));
        }
    }

    fn close(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}
