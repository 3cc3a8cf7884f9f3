//! Shared fixtures for the retrieval integration tests.

use flate2::Compression;
use flate2::write::GzEncoder;
use grafetch_core::{
    CacheStore, CsrEngine, DatasetKey, DownloadSink, FileKind, GraphError, ProgressSink,
    RemoteLocator, RetrievalConfig, Retriever, Transport,
};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

/// Serves fixed bodies by URL and counts every request.
pub struct FixtureTransport {
    bodies: BTreeMap<String, Vec<u8>>,
    calls: Mutex<BTreeMap<String, usize>>,
}

impl FixtureTransport {
    pub fn new() -> Self {
        Self {
            bodies: BTreeMap::new(),
            calls: Mutex::new(BTreeMap::new()),
        }
    }

    /// Serve `body` gzip-compressed at `url`.
    pub fn serve_gz(mut self, url: &str, body: &str) -> Self {
        self.bodies.insert(url.to_string(), gzip(body));
        self
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().expect("calls lock").values().sum()
    }

    pub fn calls_for(&self, url: &str) -> usize {
        self.calls
            .lock()
            .expect("calls lock")
            .get(url)
            .copied()
            .unwrap_or(0)
    }
}

impl Transport for FixtureTransport {
    fn fetch(
        &self,
        url: &str,
        sink: &mut dyn DownloadSink,
        progress: &mut dyn ProgressSink,
    ) -> Result<u64, GraphError> {
        *self
            .calls
            .lock()
            .expect("calls lock")
            .entry(url.to_string())
            .or_insert(0) += 1;

        let Some(body) = self.bodies.get(url) else {
            return Err(GraphError::RemoteNotAvailable {
                url: url.to_string(),
                reason: "HTTP 404 Not Found".to_string(),
            });
        };
        let _ = progress.start(url, Some(body.len() as u64));
        sink.write_all(body).expect("write fixture body");
        let _ = progress.advance(body.len() as u64);
        let _ = progress.finish();
        Ok(body.len() as u64)
    }
}

pub fn gzip(body: &str) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(body.as_bytes()).expect("compress");
    encoder.finish().expect("finish gzip")
}

/// Place `edges` in the cache as the certified edge list of `name`,
/// without any download. `config` must not load node metadata.
pub fn seed_entry(config: &RetrievalConfig, name: &str, edges: &str, accepted: bool) {
    let key = DatasetKey::string(name);
    let sources = RemoteLocator::from_config(config)
        .expect("locator")
        .resolve(&key)
        .expect("resolve");
    let store = CacheStore::new(&config.cache_root);
    let mut entry = store.begin(&key, &sources).expect("begin");
    let path = entry.path_for(FileKind::EdgeList).expect("edge list path");
    std::fs::write(path, gzip(edges)).expect("seed edge list");
    store.mark_complete(&mut entry).expect("mark complete");
    if accepted {
        store.mark_accepted(&mut entry).expect("accept");
    }
}

/// Config rooted at `root` with no backoff delay.
pub fn config(root: &Path, load_node_metadata: bool) -> RetrievalConfig {
    let mut config = RetrievalConfig::with_cache_root(root);
    config.load_node_metadata = load_node_metadata;
    config.backoff_base_ms = 0;
    config.backoff_max_ms = 0;
    config
}

/// URL of the file of `kind` for the STRING dataset `name`.
pub fn url_for(config: &RetrievalConfig, name: &str, kind: FileKind) -> String {
    RemoteLocator::from_config(config)
        .expect("locator")
        .resolve(&DatasetKey::string(name))
        .expect("resolve")
        .into_iter()
        .find(|s| s.kind == kind)
        .map(|s| s.url)
        .expect("source of kind")
}

/// Retriever borrowing `transport`, so its call counts stay observable.
pub fn retriever(
    config: RetrievalConfig,
    transport: &FixtureTransport,
) -> Retriever<&FixtureTransport> {
    Retriever::new(config, transport, CsrEngine).expect("retriever")
}
