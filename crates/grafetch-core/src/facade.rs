//! # Retrieval Façade
//!
//! The single entry point: dataset name in, graph out.
//!
//! Every call walks the same state machine:
//!
//! ```text
//! RESOLVING -> FETCHING -> PARSING -> BUILDING -> [REPORTING] -> DONE
//!      \___________\___________\__________\____________\______> FAILED
//! ```
//!
//! The [`Retriever`] keeps no state between calls; the on-disk cache is the
//! only thing one call leaves for the next.

use crate::builder::{BuildSummary, GraphBuilder};
use crate::cache::{CacheEntry, CacheStore};
use crate::cancel::CancellationToken;
use crate::config::RetrievalConfig;
use crate::fetcher::{FetchOutcome, Fetcher, RetryPolicy};
use crate::formats::{read_snapshot, write_snapshot};
use crate::graph::{CsrEngine, Graph, GraphEngine, GraphSurface};
use crate::locator::RemoteLocator;
use crate::parser::{EdgeStream, NodeMetadata, parse_node_metadata};
use crate::primitives::PREPROCESSED_DIR;
use crate::progress::{LogProgress, NoProgress, ProgressFactory};
use crate::stats::{GraphReport, StatisticsReporter};
use crate::transport::Transport;
use crate::{DatasetKey, FileKind, GraphError, NodeId, ParseMode, Verbosity};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

// =============================================================================
// STAGES
// =============================================================================

/// States of one retrieval call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalStage {
    Resolving,
    Fetching,
    Parsing,
    Building,
    Reporting,
    Done,
    Failed,
}

impl fmt::Display for RetrievalStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RetrievalStage::Resolving => "RESOLVING",
            RetrievalStage::Fetching => "FETCHING",
            RetrievalStage::Parsing => "PARSING",
            RetrievalStage::Building => "BUILDING",
            RetrievalStage::Reporting => "REPORTING",
            RetrievalStage::Done => "DONE",
            RetrievalStage::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Default)]
struct StageTrace(Vec<RetrievalStage>);

impl StageTrace {
    fn enter(&mut self, stage: RetrievalStage) {
        tracing::debug!(%stage, "stage");
        self.0.push(stage);
    }
}

// =============================================================================
// REQUEST
// =============================================================================

/// Everything one retrieval call needs besides the [`Retriever`] itself.
#[derive(Clone)]
pub struct RetrieveRequest {
    pub key: DatasetKey,
    pub directed: bool,
    pub verbosity: Verbosity,
    /// Overrides the configured cache root for this call.
    pub cache_path: Option<PathBuf>,
    pub cancel: CancellationToken,
    /// Overrides the retriever's progress factory for this call.
    pub progress: Option<Arc<dyn ProgressFactory>>,
    /// Reuse and refresh graph snapshots. When off, existing snapshots
    /// are dropped and the graph is rebuilt from the raw files.
    pub snapshots: bool,
    /// Keep the weight column. When off, every edge gets the default weight.
    pub edge_weights: bool,
}

impl RetrieveRequest {
    /// Undirected, verbose request for a STRING dataset.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::for_key(DatasetKey::string(name))
    }

    #[must_use]
    pub fn for_key(key: DatasetKey) -> Self {
        Self {
            key,
            directed: false,
            verbosity: Verbosity::default(),
            cache_path: None,
            cancel: CancellationToken::new(),
            progress: None,
            snapshots: true,
            edge_weights: true,
        }
    }

    #[must_use]
    pub fn directed(mut self, directed: bool) -> Self {
        self.directed = directed;
        self
    }

    #[must_use]
    pub fn verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    #[must_use]
    pub fn cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    #[must_use]
    pub fn progress(mut self, factory: Arc<dyn ProgressFactory>) -> Self {
        self.progress = Some(factory);
        self
    }

    #[must_use]
    pub fn snapshots(mut self, enabled: bool) -> Self {
        self.snapshots = enabled;
        self
    }

    #[must_use]
    pub fn edge_weights(mut self, load: bool) -> Self {
        self.edge_weights = load;
        self
    }
}

impl fmt::Debug for RetrieveRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetrieveRequest")
            .field("key", &self.key)
            .field("directed", &self.directed)
            .field("verbosity", &self.verbosity)
            .field("cache_path", &self.cache_path)
            .field("progress", &self.progress.is_some())
            .field("snapshots", &self.snapshots)
            .field("edge_weights", &self.edge_weights)
            .finish()
    }
}

// =============================================================================
// RESULT
// =============================================================================

/// A retrieved graph with its build summary and (possibly lazy) report.
pub struct Retrieved<G: GraphSurface> {
    name: String,
    graph: G,
    summary: BuildSummary,
    metadata: BTreeMap<NodeId, NodeMetadata>,
    stages: Vec<RetrievalStage>,
    entry: CacheEntry,
    from_cache: bool,
    from_snapshot: bool,
    reporter: StatisticsReporter,
    report: OnceLock<GraphReport>,
}

impl<G: GraphSurface> Retrieved<G> {
    #[must_use]
    pub fn graph(&self) -> &G {
        &self.graph
    }

    #[must_use]
    pub fn into_graph(self) -> G {
        self.graph
    }

    /// Anomalies counted while building.
    #[must_use]
    pub fn summary(&self) -> &BuildSummary {
        &self.summary
    }

    /// Node annotations for nodes present in the graph.
    #[must_use]
    pub fn node_metadata(&self) -> &BTreeMap<NodeId, NodeMetadata> {
        &self.metadata
    }

    /// The stages this call went through, in order.
    #[must_use]
    pub fn stages(&self) -> &[RetrievalStage] {
        &self.stages
    }

    /// The cache entry the graph was built from.
    #[must_use]
    pub fn cache_entry(&self) -> &CacheEntry {
        &self.entry
    }

    /// Whether the raw files were all already cached.
    #[must_use]
    pub fn was_cached(&self) -> bool {
        self.from_cache
    }

    /// Whether parsing was skipped thanks to a graph snapshot.
    #[must_use]
    pub fn from_snapshot(&self) -> bool {
        self.from_snapshot
    }

    /// The statistics report, computed on first access unless it was
    /// computed eagerly.
    pub fn report(&self) -> &GraphReport {
        self.report
            .get_or_init(|| self.reporter.report(&self.name, &self.graph, &self.summary))
    }
}

impl<G: GraphSurface + fmt::Debug> fmt::Debug for Retrieved<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Retrieved")
            .field("name", &self.name)
            .field("graph", &self.graph)
            .field("summary", &self.summary)
            .field("stages", &self.stages)
            .field("from_cache", &self.from_cache)
            .finish()
    }
}

// =============================================================================
// RETRIEVER
// =============================================================================

/// Orchestrates Locator -> Fetcher -> Parser -> Builder -> Reporter.
pub struct Retriever<T: Transport, E: GraphEngine = CsrEngine> {
    config: RetrievalConfig,
    locator: RemoteLocator,
    transport: T,
    engine: E,
    reporter: StatisticsReporter,
    progress: Arc<dyn ProgressFactory>,
}

impl<T: Transport, E: GraphEngine> Retriever<T, E> {
    /// Validate `config` and assemble a retriever.
    pub fn new(config: RetrievalConfig, transport: T, engine: E) -> Result<Self, GraphError> {
        config.validate()?;
        let locator = RemoteLocator::from_config(&config)?;
        let reporter = StatisticsReporter::new(config.top_k);
        Ok(Self {
            config,
            locator,
            transport,
            engine,
            reporter,
            progress: Arc::new(LogProgress::default()),
        })
    }

    /// Progress factory used when verbosity shows progress.
    #[must_use]
    pub fn with_progress(mut self, factory: Arc<dyn ProgressFactory>) -> Self {
        self.progress = factory;
        self
    }

    #[must_use]
    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    #[must_use]
    pub fn locator(&self) -> &RemoteLocator {
        &self.locator
    }

    /// Cache store for `cache_path`, or the configured root.
    #[must_use]
    pub fn cache_store(&self, cache_path: Option<&Path>) -> CacheStore {
        CacheStore::new(cache_path.unwrap_or(&self.config.cache_root))
    }

    /// Retrieve a STRING dataset by name.
    pub fn retrieve(
        &self,
        name: &str,
        directed: bool,
        verbosity: Verbosity,
        cache_path: Option<&Path>,
    ) -> Result<Retrieved<E::Output>, GraphError> {
        let mut request = RetrieveRequest::new(name)
            .directed(directed)
            .verbosity(verbosity);
        request.cache_path = cache_path.map(Path::to_path_buf);
        self.retrieve_with(request)
    }

    /// Retrieve with full control over key, cancellation and progress.
    pub fn retrieve_with(
        &self,
        request: RetrieveRequest,
    ) -> Result<Retrieved<E::Output>, GraphError> {
        let span = tracing::info_span!(
            "retrieve",
            collection = request.key.collection(),
            dataset = request.key.name(),
            directed = request.directed
        );
        let _guard = span.enter();

        let mut stages = StageTrace::default();
        match self.run(&request, &mut stages) {
            Ok(retrieved) => Ok(retrieved),
            Err(err) => {
                stages.enter(RetrievalStage::Failed);
                tracing::error!(
                    error = %err,
                    stages = ?stages.0,
                    "retrieval failed"
                );
                Err(err)
            }
        }
    }

    fn run(
        &self,
        request: &RetrieveRequest,
        stages: &mut StageTrace,
    ) -> Result<Retrieved<E::Output>, GraphError> {
        let key = &request.key;

        stages.enter(RetrievalStage::Resolving);
        let sources = self.locator.resolve(key)?;

        stages.enter(RetrievalStage::Fetching);
        let store = self.cache_store(request.cache_path.as_deref());
        let fetcher = Fetcher::new(
            &self.transport,
            store,
            RetryPolicy::from_config(&self.config),
            self.config.fetch_workers,
        );
        let progress: Arc<dyn ProgressFactory> = match &request.progress {
            Some(factory) => Arc::clone(factory),
            None if request.verbosity.shows_progress() => Arc::clone(&self.progress),
            None => Arc::new(NoProgress),
        };
        let mut outcome =
            fetcher.ensure_cached(key, &sources, progress.as_ref(), &request.cancel)?;

        let (graph, from_snapshot) = self.load_or_build(request, &outcome, stages)?;
        if !outcome.entry.is_accepted() {
            // Only a strict build gets here with an unaccepted entry.
            if let Err(e) = fetcher.store().mark_accepted(&mut outcome.entry) {
                tracing::warn!(dataset = %key, error = %e, "cannot record cache acceptance");
            }
        }

        let metadata = match outcome.entry.path_for(FileKind::NodeMetadata) {
            Some(path) => {
                let (metadata, stats) =
                    parse_node_metadata(path, |id| graph.node_index(id.as_str()).is_some())?;
                tracing::debug!(
                    annotated = metadata.len(),
                    malformed = stats.malformed_lines,
                    "node metadata loaded"
                );
                metadata
            }
            None => BTreeMap::new(),
        };

        let summary = graph.summary().clone();
        let report = OnceLock::new();
        if request.verbosity.eager_stats() {
            stages.enter(RetrievalStage::Reporting);
            let computed = self.reporter.report(key.name(), &graph, &summary);
            tracing::info!("{computed}");
            // A fresh OnceLock is always empty.
            let _ = report.set(computed);
        }

        let output = self.engine.assemble(graph)?;
        stages.enter(RetrievalStage::Done);

        Ok(Retrieved {
            name: key.name().to_string(),
            graph: output,
            summary,
            metadata,
            stages: std::mem::take(&mut stages.0),
            entry: outcome.entry.clone(),
            from_cache: outcome.was_cached(),
            from_snapshot,
            reporter: self.reporter,
            report,
        })
    }

    /// Reuse a snapshot when the raw entry is unchanged, otherwise parse
    /// and build (and refresh the snapshot).
    ///
    /// Entries not yet accepted are parsed strictly; accepted ones
    /// leniently, so later damage is counted instead of raised.
    fn load_or_build(
        &self,
        request: &RetrieveRequest,
        outcome: &FetchOutcome,
        stages: &mut StageTrace,
    ) -> Result<(Graph, bool), GraphError> {
        let entry = &outcome.entry;
        let accepted = entry.is_accepted();
        let use_snapshots = self.config.preprocess && request.snapshots;
        let snapshot = entry.snapshot_path(request.directed, request.edge_weights);

        if outcome.fetched(FileKind::EdgeList) || !request.snapshots {
            discard_snapshots(entry);
        } else if use_snapshots && accepted {
            match read_snapshot(&snapshot) {
                Ok(Some(graph)) if self.config.strict_self_loops && graph.self_loop_count() > 0 => {
                    tracing::debug!("snapshot has self-loops, rebuilding under strict policy");
                }
                Ok(Some(graph)) => {
                    tracing::debug!(path = %snapshot.display(), "graph snapshot reused");
                    return Ok((graph, true));
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(path = %snapshot.display(), error = %e, "discarding unreadable graph snapshot");
                    if let Err(e) = std::fs::remove_file(&snapshot) {
                        tracing::warn!(path = %snapshot.display(), error = %e, "cannot remove graph snapshot");
                    }
                }
            }
        }

        let edge_path = entry.path_for(FileKind::EdgeList).ok_or_else(|| {
            GraphError::Config(format!("dataset {} has no edge list source", entry.key()))
        })?;
        let mode = if accepted {
            ParseMode::Lenient
        } else {
            ParseMode::Strict
        };

        stages.enter(RetrievalStage::Parsing);
        let stream = EdgeStream::open(&[edge_path.to_path_buf()], mode)
            .with_cancellation(request.cancel.clone());

        stages.enter(RetrievalStage::Building);
        let graph = GraphBuilder::new(request.directed)
            .strict_self_loops(self.config.strict_self_loops)
            .load_weights(request.edge_weights)
            .with_cancellation(request.cancel.clone())
            .build_stream(stream)?;

        if use_snapshots {
            if let Err(e) = write_snapshot(&snapshot, &graph) {
                tracing::warn!(path = %snapshot.display(), error = %e, "cannot write graph snapshot");
            }
        }
        Ok((graph, false))
    }
}

/// Remove snapshots built from an older download, or on request.
fn discard_snapshots(entry: &CacheEntry) {
    let dir = entry.dir().join(PREPROCESSED_DIR);
    match std::fs::remove_dir_all(&dir) {
        Ok(()) => tracing::debug!(dir = %dir.display(), "stale graph snapshots removed"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(dir = %dir.display(), error = %e, "cannot remove stale graph snapshots"),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NodeIndex;
    use crate::progress::ProgressSink;
    use crate::transport::DownloadSink;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves the same edge list for every edge-list URL.
    struct OneFile {
        body: &'static str,
        calls: AtomicUsize,
    }

    impl Transport for OneFile {
        fn fetch(
            &self,
            url: &str,
            sink: &mut dyn DownloadSink,
            _progress: &mut dyn ProgressSink,
        ) -> Result<u64, GraphError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !url.contains("protein.links") {
                return Err(GraphError::RemoteNotAvailable {
                    url: url.to_string(),
                    reason: "404".to_string(),
                });
            }
            sink.write_all(self.body.as_bytes()).expect("write");
            Ok(self.body.len() as u64)
        }
    }

    fn retriever(root: &Path, body: &'static str) -> Retriever<OneFile> {
        let mut config = RetrievalConfig::with_cache_root(root);
        config.load_node_metadata = false;
        config.backoff_base_ms = 0;
        config.backoff_max_ms = 0;
        Retriever::new(
            config,
            OneFile {
                body,
                calls: AtomicUsize::new(0),
            },
            CsrEngine,
        )
        .expect("retriever")
    }

    #[test]
    fn full_stage_trace_on_first_call() {
        let dir = tempfile::tempdir().expect("tempdir");
        let r = retriever(dir.path(), "a b 1\nb c 2\n");

        let got = r
            .retrieve("AcholeplasmaModicum", false, Verbosity::ProgressBarsAndStats, None)
            .expect("retrieve");
        assert_eq!(
            got.stages(),
            &[
                RetrievalStage::Resolving,
                RetrievalStage::Fetching,
                RetrievalStage::Parsing,
                RetrievalStage::Building,
                RetrievalStage::Reporting,
                RetrievalStage::Done,
            ]
        );
        assert!(!got.was_cached());
        assert_eq!(got.report().node_count, 3);
    }

    #[test]
    fn silent_call_defers_report_and_reuses_snapshot() {
        let dir = tempfile::tempdir().expect("tempdir");
        let r = retriever(dir.path(), "a b 1\nb c 2\n");

        r.retrieve("AcholeplasmaModicum", false, Verbosity::Silent, None)
            .expect("first");
        let second = r
            .retrieve("AcholeplasmaModicum", false, Verbosity::Silent, None)
            .expect("second");

        assert!(second.was_cached());
        assert!(second.from_snapshot());
        assert!(!second.stages().contains(&RetrievalStage::Reporting));
        assert!(!second.stages().contains(&RetrievalStage::Parsing));
        assert_eq!(second.report().edge_count, 2);
        assert_eq!(r.transport.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cache_path_overrides_root() {
        let dir = tempfile::tempdir().expect("tempdir");
        let r = retriever(&dir.path().join("configured"), "a b\n");
        let other = dir.path().join("override");

        r.retrieve("AcholeplasmaModicum", true, Verbosity::Silent, Some(&other))
            .expect("retrieve");
        assert!(other.join("string/AcholeplasmaModicum/.complete").exists());
        assert!(!dir.path().join("configured").exists());
    }

    #[test]
    fn unknown_dataset_fails_before_io() {
        let dir = tempfile::tempdir().expect("tempdir");
        let r = retriever(dir.path(), "a b\n");
        let result = r.retrieve("NoSuchSpecies", false, Verbosity::Silent, None);
        assert!(matches!(result, Err(GraphError::NotFound { .. })));
        assert_eq!(r.transport.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn corrupt_snapshot_is_rebuilt() {
        let dir = tempfile::tempdir().expect("tempdir");
        let r = retriever(dir.path(), "a b 1\n");
        let first = r
            .retrieve("AcholeplasmaModicum", false, Verbosity::Silent, None)
            .expect("first");
        let snapshot = first.cache_entry().snapshot_path(false, true);
        std::fs::write(&snapshot, b"GRFT\x01garbage").expect("corrupt");

        let second = r
            .retrieve("AcholeplasmaModicum", false, Verbosity::Silent, None)
            .expect("second");
        assert!(!second.from_snapshot());
        assert_eq!(second.graph().edge_count(), 1);
    }

    #[test]
    fn disabled_snapshots_drop_existing_and_rebuild() {
        let dir = tempfile::tempdir().expect("tempdir");
        let r = retriever(dir.path(), "a b 1\nb c 2\n");
        let first = r
            .retrieve("AcholeplasmaModicum", false, Verbosity::Silent, None)
            .expect("first");
        let snapshot = first.cache_entry().snapshot_path(false, true);
        assert!(snapshot.exists());

        let second = r
            .retrieve_with(
                RetrieveRequest::new("AcholeplasmaModicum")
                    .verbosity(Verbosity::Silent)
                    .snapshots(false),
            )
            .expect("second");
        assert!(second.was_cached());
        assert!(!second.from_snapshot());
        assert!(second.stages().contains(&RetrievalStage::Parsing));
        assert!(!snapshot.exists());
        assert_eq!(second.graph().edge_count(), 2);
        assert_eq!(r.transport.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn disabled_weights_fall_back_to_default_weight() {
        let dir = tempfile::tempdir().expect("tempdir");
        let r = retriever(dir.path(), "a b 5\nb c 2\n");
        let unweighted = || {
            r.retrieve_with(
                RetrieveRequest::new("AcholeplasmaModicum")
                    .verbosity(Verbosity::Silent)
                    .edge_weights(false),
            )
            .expect("unweighted")
        };

        let plain = unweighted();
        let (a, b) = (NodeIndex(0), NodeIndex(1));
        assert!(!plain.graph().is_weighted());
        assert!(!plain.summary().weighted);
        assert_eq!(plain.graph().edge_weight(a, b), Some(1.0));

        let weighted = r
            .retrieve("AcholeplasmaModicum", false, Verbosity::Silent, None)
            .expect("weighted");
        assert!(!weighted.from_snapshot(), "weighted and unweighted snapshots are separate");
        assert_eq!(weighted.graph().edge_weight(a, b), Some(5.0));

        let again = unweighted();
        assert!(again.from_snapshot());
        assert_eq!(again.graph().edge_weight(a, b), Some(1.0));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = RetrievalConfig::with_cache_root("graphs");
        config.fetch_workers = 0;
        let result = Retriever::new(
            config,
            OneFile {
                body: "",
                calls: AtomicUsize::new(0),
            },
            CsrEngine,
        );
        assert!(matches!(result, Err(GraphError::Config(_))));
    }
}
