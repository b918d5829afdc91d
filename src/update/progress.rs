//! The progress sink seam between the pipeline and any visual status indicator.
//!
//! The pipeline never depends on a window system or terminal being available. It
//! talks to a [`ProgressSink`], defaulting to [`NoopProgress`], and holds it through
//! a [`ProgressSession`] for the duration of the download so the sink is closed on
//! every exit path.

use anyhow::Result;
use tracing::{debug, warn};

/// A passive receiver of download progress.
///
/// Every call is best effort. A failing [`open`](ProgressSink::open) makes the
/// pipeline continue without visual feedback; `report` and `close` cannot fail.
pub trait ProgressSink: Send {
    /// Shows the indicator. Called once, right after a positive rollout decision.
    fn open(&mut self) -> Result<()>;

    /// Reports download completion in percent, `0..=100`.
    fn report(&mut self, percent: u8);

    /// Hides the indicator. Called once on every exit path after a successful `open`.
    fn close(&mut self);
}

/// A sink that ignores everything. This is the default.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn open(&mut self) -> Result<()> {
        Ok(())
    }

    fn report(&mut self, _percent: u8) {}

    fn close(&mut self) {}
}

/// Scoped ownership of an opened progress sink.
///
/// Created with [`ProgressSession::open`]. If opening fails the session is inert and
/// all reports are dropped. Dropping the session closes the sink exactly once.
pub struct ProgressSession<'a> {
    sink: Option<&'a mut dyn ProgressSink>,
    last_percent: Option<u8>,
}

impl<'a> ProgressSession<'a> {
    /// Opens `sink`, logging and swallowing any failure.
    pub fn open(sink: &'a mut dyn ProgressSink) -> Self {
        let sink = match sink.open() {
            Ok(()) => Some(sink),
            Err(e) => {
                warn!("Progress indicator unavailable, continuing without it: {e:#}");
                None
            }
        };
        Self {
            sink,
            last_percent: None,
        }
    }

    /// Whether a sink is attached.
    pub fn is_active(&self) -> bool {
        self.sink.is_some()
    }

    /// Forwards a percentage to the sink, skipping repeats of the previous value.
    pub fn report(&mut self, percent: u8) {
        let percent = percent.min(100);
        if self.last_percent == Some(percent) {
            return;
        }
        self.last_percent = Some(percent);
        if let Some(sink) = self.sink.as_deref_mut() {
            sink.report(percent);
        }
    }
}

impl Drop for ProgressSession<'_> {
    fn drop(&mut self) {
        if let Some(sink) = self.sink.take() {
            debug!("Closing progress indicator");
            sink.close();
        }
    }
}
