//! Terminal progress bars for downloads.

use grafetch_core::{ProgressFactory, ProgressSink, progress::ProgressError};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

const BAR_TEMPLATE: &str =
    "{msg:>28} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})";
const SPINNER_TEMPLATE: &str = "{spinner} {msg:>28} {bytes} ({bytes_per_sec})";

/// One bar per downloaded file, stacked while files download in parallel.
#[derive(Debug, Clone, Default)]
pub struct BarProgress {
    multi: MultiProgress,
}

impl BarProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressFactory for BarProgress {
    fn sink(&self, label: &str) -> Box<dyn ProgressSink> {
        Box::new(BarSink {
            multi: self.multi.clone(),
            label: label.to_string(),
            bar: None,
        })
    }
}

struct BarSink {
    multi: MultiProgress,
    label: String,
    bar: Option<ProgressBar>,
}

impl ProgressSink for BarSink {
    fn start(&mut self, _label: &str, total: Option<u64>) -> Result<(), ProgressError> {
        let (bar, template) = match total {
            Some(len) => (ProgressBar::new(len), BAR_TEMPLATE),
            None => (ProgressBar::new_spinner(), SPINNER_TEMPLATE),
        };
        let style = ProgressStyle::with_template(template)
            .map_err(|e| ProgressError(e.to_string()))?
            .progress_chars("=> ");
        let bar = self.multi.add(bar.with_style(style));
        bar.set_message(self.label.clone());
        // A retried attempt replaces the previous bar.
        if let Some(old) = self.bar.replace(bar) {
            old.finish_and_clear();
        }
        Ok(())
    }

    fn advance(&mut self, bytes: u64) -> Result<(), ProgressError> {
        let bar = self
            .bar
            .as_ref()
            .ok_or_else(|| ProgressError("advance before start".to_string()))?;
        bar.inc(bytes);
        Ok(())
    }

    fn finish(&mut self) -> Result<(), ProgressError> {
        if let Some(bar) = self.bar.take() {
            bar.finish();
        }
        Ok(())
    }
}
