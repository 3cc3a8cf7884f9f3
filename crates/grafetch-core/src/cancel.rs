//! # Cancellation
//!
//! Cooperative cancellation for long retrievals.
//!
//! A [`CancellationToken`] is cheap to clone; all clones share one flag.
//! The fetcher checks it before every file and between retry attempts, the
//! parser every [`crate::primitives::CANCEL_CHECK_INTERVAL`] records.

use crate::GraphError;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Shared cancellation flag with an optional deadline.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancellationToken {
    /// A token that is only cancelled by [`CancellationToken::cancel`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that also expires `timeout` from now.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            deadline: Instant::now().checked_add(timeout),
        }
    }

    /// Request cancellation for every clone of this token.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Whether cancellation was requested or the deadline passed.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        if self.flag.load(Ordering::Acquire) {
            return true;
        }
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// `Err(GraphError::Cancelled)` once cancelled.
    pub fn check(&self) -> Result<(), GraphError> {
        if self.is_cancelled() {
            Err(GraphError::Cancelled)
        } else {
            Ok(())
        }
    }
}
