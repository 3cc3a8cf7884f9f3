//! # Progress Reporting
//!
//! The seam between the fetcher and whatever shows download progress.
//!
//! The core ships [`NoProgress`] and [`LogProgress`]; the CLI plugs in
//! terminal progress bars through a [`ProgressFactory`]. A sink that fails
//! is logged and detached by [`ProgressReporter`]; it never aborts a
//! retrieval.

use std::fmt;

/// Failure raised by a progress sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressError(pub String);

impl fmt::Display for ProgressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "progress sink failed: {}", self.0)
    }
}

impl std::error::Error for ProgressError {}

// =============================================================================
// PROGRESS SINK TRAIT
// =============================================================================

/// Receives progress events for one file transfer.
pub trait ProgressSink: Send {
    /// Transfer started; `total` is the expected size when known.
    fn start(&mut self, label: &str, total: Option<u64>) -> Result<(), ProgressError>;

    /// `bytes` more bytes were written.
    fn advance(&mut self, bytes: u64) -> Result<(), ProgressError>;

    /// Transfer ended (successfully or not).
    fn finish(&mut self) -> Result<(), ProgressError>;
}

/// Creates one sink per file transfer.
pub trait ProgressFactory: Send + Sync {
    fn sink(&self, label: &str) -> Box<dyn ProgressSink>;
}

// =============================================================================
// BUILT-IN SINKS
// =============================================================================

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn start(&mut self, _label: &str, _total: Option<u64>) -> Result<(), ProgressError> {
        Ok(())
    }

    fn advance(&mut self, _bytes: u64) -> Result<(), ProgressError> {
        Ok(())
    }

    fn finish(&mut self) -> Result<(), ProgressError> {
        Ok(())
    }
}

impl ProgressFactory for NoProgress {
    fn sink(&self, _label: &str) -> Box<dyn ProgressSink> {
        Box::new(NoProgress)
    }
}

/// Emits `tracing` events at start and finish.
#[derive(Debug, Clone, Default)]
pub struct LogProgress {
    label: String,
    total: Option<u64>,
    written: u64,
}

impl ProgressSink for LogProgress {
    fn start(&mut self, label: &str, total: Option<u64>) -> Result<(), ProgressError> {
        self.label = label.to_string();
        self.total = total;
        self.written = 0;
        tracing::info!(file = %self.label, total_bytes = ?total, "download started");
        Ok(())
    }

    fn advance(&mut self, bytes: u64) -> Result<(), ProgressError> {
        self.written = self.written.saturating_add(bytes);
        Ok(())
    }

    fn finish(&mut self) -> Result<(), ProgressError> {
        tracing::info!(file = %self.label, bytes = self.written, "download finished");
        Ok(())
    }
}

impl ProgressFactory for LogProgress {
    fn sink(&self, _label: &str) -> Box<dyn ProgressSink> {
        Box::new(LogProgress::default())
    }
}

// =============================================================================
// REPORTER
// =============================================================================

/// Wraps a sink and detaches it after its first failure.
pub struct ProgressReporter {
    sink: Option<Box<dyn ProgressSink>>,
}

impl ProgressReporter {
    #[must_use]
    pub fn new(sink: Box<dyn ProgressSink>) -> Self {
        Self { sink: Some(sink) }
    }

    /// Whether the underlying sink is still attached.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.sink.is_some()
    }

    fn forward(
        &mut self,
        event: &str,
        f: impl FnOnce(&mut dyn ProgressSink) -> Result<(), ProgressError>,
    ) {
        let failed = match self.sink.as_deref_mut() {
            Some(sink) => match f(sink) {
                Ok(()) => false,
                Err(e) => {
                    tracing::warn!(event, error = %e, "progress sink failed, detaching it");
                    true
                }
            },
            None => false,
        };
        if failed {
            self.sink = None;
        }
    }
}

impl ProgressSink for ProgressReporter {
    fn start(&mut self, label: &str, total: Option<u64>) -> Result<(), ProgressError> {
        self.forward("start", |s| s.start(label, total));
        Ok(())
    }

    fn advance(&mut self, bytes: u64) -> Result<(), ProgressError> {
        self.forward("advance", |s| s.advance(bytes));
        Ok(())
    }

    fn finish(&mut self) -> Result<(), ProgressError> {
        self.forward("finish", |s| s.finish());
        Ok(())
    }
}
