//! # Fetcher
//!
//! Idempotent download of a dataset's remote files into the cache.
//!
//! ```text
//! locate ── complete ──> return (no I/O)
//!    │
//!    └─ incomplete ──> begin ──> fetch missing files ──> mark_complete
//! ```
//!
//! - Files already present and non-empty are reused; only missing or empty
//!   ones are fetched again
//! - Each file is streamed into a temporary file and renamed into place
//! - Transient failures are retried with capped exponential backoff, then
//!   escalated to [`GraphError::RemoteNotAvailable`]
//! - Missing files are fetched by a small pool of scoped worker threads

use crate::cache::{AtomicFile, CacheEntry, CacheStore};
use crate::cancel::CancellationToken;
use crate::config::RetrievalConfig;
use crate::locator::RemoteSource;
use crate::progress::{ProgressFactory, ProgressReporter};
use crate::transport::Transport;
use crate::{DatasetKey, FileKind, GraphError};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

// =============================================================================
// RETRY POLICY
// =============================================================================

/// Attempt ceiling and capped exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per file, first attempt included.
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    pub base: Duration,
    /// Largest single delay.
    pub max: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub fn from_config(config: &RetrievalConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base: Duration::from_millis(config.backoff_base_ms),
            max: Duration::from_millis(config.backoff_max_ms),
        }
    }

    /// `min(base * 2^(attempt - 1), max)` for a 1-based failed attempt.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.max)
    }
}

// =============================================================================
// FETCH OUTCOME
// =============================================================================

/// Result of [`Fetcher::ensure_cached`].
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    /// The complete cache entry.
    pub entry: CacheEntry,
    /// Files written by this call, in source order. Empty on a cache hit.
    pub downloaded: Vec<PathBuf>,
}

impl FetchOutcome {
    /// Whether no network I/O was needed.
    #[must_use]
    pub fn was_cached(&self) -> bool {
        self.downloaded.is_empty()
    }

    /// Whether the file playing role `kind` was written by this call.
    #[must_use]
    pub fn fetched(&self, kind: FileKind) -> bool {
        self.entry
            .path_for(kind)
            .is_some_and(|p| self.downloaded.iter().any(|d| d == p))
    }
}

// =============================================================================
// FETCHER
// =============================================================================

/// Downloads dataset files through a [`Transport`] into a [`CacheStore`].
pub struct Fetcher<T: Transport> {
    transport: T,
    store: CacheStore,
    policy: RetryPolicy,
    workers: usize,
}

impl<T: Transport> Fetcher<T> {
    #[must_use]
    pub fn new(transport: T, store: CacheStore, policy: RetryPolicy, workers: usize) -> Self {
        Self {
            transport,
            store,
            policy,
            workers: workers.max(1),
        }
    }

    #[must_use]
    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Make sure every source of `key` is cached and certified complete.
    ///
    /// A complete entry returns immediately without touching the transport.
    pub fn ensure_cached(
        &self,
        key: &DatasetKey,
        sources: &[RemoteSource],
        progress: &dyn ProgressFactory,
        cancel: &CancellationToken,
    ) -> Result<FetchOutcome, GraphError> {
        cancel.check()?;

        if let Some(entry) = self.store.locate(key, sources)? {
            return Ok(FetchOutcome {
                entry,
                downloaded: Vec::new(),
            });
        }

        let mut entry = self.store.begin(key, sources)?;
        let pending: Vec<(RemoteSource, PathBuf)> = self
            .store
            .missing_files(&entry)
            .into_iter()
            .map(|source| {
                let path = entry.dir().join(source.file_name());
                (source, path)
            })
            .collect();

        tracing::info!(
            dataset = %key,
            missing = pending.len(),
            reused = sources.len().saturating_sub(pending.len()),
            "fetching dataset files"
        );

        let results = self.fetch_all(key, &pending, progress, cancel);

        let mut downloaded = Vec::with_capacity(pending.len());
        let mut first_error = None;
        for ((_, path), result) in pending.iter().zip(results) {
            match result {
                Ok(_) => downloaded.push(path.clone()),
                Err(e) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }
        if let Some(err) = first_error {
            tracing::warn!(
                dataset = %key,
                kept = downloaded.len(),
                error = %err,
                "fetch failed, entry left incomplete"
            );
            return Err(err);
        }

        self.store.mark_complete(&mut entry)?;
        Ok(FetchOutcome { entry, downloaded })
    }

    /// Fetch every pending file; results come back in `pending` order.
    fn fetch_all(
        &self,
        key: &DatasetKey,
        pending: &[(RemoteSource, PathBuf)],
        progress: &dyn ProgressFactory,
        cancel: &CancellationToken,
    ) -> Vec<Result<u64, GraphError>> {
        let workers = self.workers.min(pending.len());
        if workers <= 1 {
            return pending
                .iter()
                .map(|(source, path)| self.fetch_file(key, source, path, progress, cancel))
                .collect();
        }

        let next = &AtomicUsize::new(0);
        let mut slots: Vec<Option<Result<u64, GraphError>>> =
            std::iter::repeat_with(|| None).take(pending.len()).collect();

        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(move |_| {
                    scope.spawn(move || {
                        let mut done = Vec::new();
                        loop {
                            let idx = next.fetch_add(1, Ordering::Relaxed);
                            let Some((source, path)) = pending.get(idx) else {
                                break;
                            };
                            done.push((idx, self.fetch_file(key, source, path, progress, cancel)));
                        }
                        done
                    })
                })
                .collect();

            for handle in handles {
                match handle.join() {
                    Ok(done) => {
                        for (idx, result) in done {
                            if let Some(slot) = slots.get_mut(idx) {
                                *slot = Some(result);
                            }
                        }
                    }
                    Err(payload) => std::panic::resume_unwind(payload),
                }
            }
        });

        slots
            .into_iter()
            .map(|slot| slot.unwrap_or(Err(GraphError::Cancelled)))
            .collect()
    }

    /// Download one file with retries. The cancellation token is honoured
    /// before every attempt; an attempt in flight runs to completion.
    fn fetch_file(
        &self,
        key: &DatasetKey,
        source: &RemoteSource,
        path: &Path,
        progress: &dyn ProgressFactory,
        cancel: &CancellationToken,
    ) -> Result<u64, GraphError> {
        let label = format!("{} {}", key.name(), source.kind);
        let mut last_error = None;

        for attempt in 1..=self.policy.max_attempts {
            cancel.check()?;

            let mut file = AtomicFile::create(path)?;
            let mut reporter = ProgressReporter::new(progress.sink(&label));
            let error = match self.transport.fetch(&source.url, &mut file, &mut reporter) {
                Ok(0) => GraphError::TransientNetwork {
                    url: source.url.clone(),
                    reason: "empty response body".to_string(),
                },
                Ok(bytes) => {
                    file.commit()?;
                    tracing::info!(dataset = %key, file = %source.kind, bytes, attempt, "downloaded");
                    return Ok(bytes);
                }
                Err(e) if e.is_transient() => e,
                Err(e) => return Err(e),
            };
            drop(file);

            if attempt < self.policy.max_attempts {
                let delay = self.policy.delay(attempt);
                tracing::warn!(
                    url = %source.url,
                    attempt,
                    max_attempts = self.policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "transient failure, retrying"
                );
                std::thread::sleep(delay);
            }
            last_error = Some(error);
        }

        let reason = match last_error {
            Some(e) => format!("gave up after {} attempts: {e}", self.policy.max_attempts),
            None => "no attempts made".to_string(),
        };
        Err(GraphError::RemoteNotAvailable {
            url: source.url.clone(),
            reason,
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================
