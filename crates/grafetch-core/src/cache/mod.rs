//! # Cache Store
//!
//! Persistent on-disk cache of raw dataset files.
//!
//! Layout:
//!
//! ```text
//! {root}/{collection}/{dataset_name}/
//!     edges.tsv.gz
//!     nodes.tsv.gz
//!     .complete               JSON manifest of the certified files
//!     preprocessed/
//!         undirected.graph    built graph snapshots
//! ```
//!
//! An entry is complete only if its marker lists exactly the expected
//! sources AND every listed file exists with non-zero length. A truncated
//! file left behind by a crashed process therefore reads as "not cached"
//! even when a marker claims otherwise.
//!
//! A complete entry is not yet *accepted*. Acceptance is recorded in the
//! marker only after the edge list has built once under strict parsing.

pub mod atomic;

use crate::locator::RemoteSource;
use crate::primitives::{COMPLETION_MARKER, PREPROCESSED_DIR};
use crate::{DatasetKey, FileKind, GraphError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub use atomic::{AtomicFile, write_atomic};

// =============================================================================
// COMPLETION MANIFEST
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ManifestFile {
    url: String,
    file: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Manifest {
    files: Vec<ManifestFile>,
    /// Set once the edge list passed a strict build.
    #[serde(default)]
    accepted: bool,
}

impl Manifest {
    fn for_sources(sources: &[RemoteSource], accepted: bool) -> Self {
        Self {
            files: sources
                .iter()
                .map(|s| ManifestFile {
                    url: s.url.clone(),
                    file: s.file_name().to_string(),
                })
                .collect(),
            accepted,
        }
    }

    fn certifies(&self, sources: &[RemoteSource]) -> bool {
        self.files == Self::for_sources(sources, false).files
    }
}

// =============================================================================
// CACHE ENTRY
// =============================================================================

/// On-disk record of one dataset's raw files.
///
/// Only the [`CacheStore`] flips `complete`; readers get shared references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    key: DatasetKey,
    dir: PathBuf,
    sources: Vec<RemoteSource>,
    local_paths: Vec<PathBuf>,
    complete: bool,
    accepted: bool,
}

impl CacheEntry {
    fn new(key: DatasetKey, dir: PathBuf, sources: &[RemoteSource], complete: bool) -> Self {
        let local_paths = sources.iter().map(|s| dir.join(s.file_name())).collect();
        Self {
            key,
            dir,
            sources: sources.to_vec(),
            local_paths,
            complete,
            accepted: false,
        }
    }

    #[must_use]
    pub fn key(&self) -> &DatasetKey {
        &self.key
    }

    /// Entry directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Expected local files, in source order.
    #[must_use]
    pub fn local_paths(&self) -> &[PathBuf] {
        &self.local_paths
    }

    /// Sources paired with their local paths.
    pub fn files(&self) -> impl Iterator<Item = (&RemoteSource, &Path)> {
        self.sources
            .iter()
            .zip(self.local_paths.iter().map(PathBuf::as_path))
    }

    /// Whether the completion marker was valid when this entry was loaded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Whether the edge list has already passed a strict build.
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        self.accepted
    }

    /// Local path of the file playing role `kind`, if expected.
    #[must_use]
    pub fn path_for(&self, kind: FileKind) -> Option<&Path> {
        self.files().find(|(s, _)| s.kind == kind).map(|(_, p)| p)
    }

    /// Snapshot location of the graph built with `directed`, with or
    /// without edge weights.
    #[must_use]
    pub fn snapshot_path(&self, directed: bool, weights: bool) -> PathBuf {
        let file = match (directed, weights) {
            (true, true) => "directed.graph",
            (false, true) => "undirected.graph",
            (true, false) => "directed.unweighted.graph",
            (false, false) => "undirected.unweighted.graph",
        };
        self.dir.join(PREPROCESSED_DIR).join(file)
    }

    fn marker_path(&self) -> PathBuf {
        self.dir.join(COMPLETION_MARKER)
    }
}

// =============================================================================
// CACHE STORE
// =============================================================================

/// Filesystem cache rooted at one directory.
///
/// The root is created lazily on the first [`CacheStore::begin`].
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `{root}/{collection}/{name}`.
    #[must_use]
    pub fn entry_dir(&self, key: &DatasetKey) -> PathBuf {
        self.root.join(key.collection()).join(key.name())
    }

    /// The complete entry for `key`, or `None` if anything is missing,
    /// empty, or certified for different sources.
    pub fn locate(
        &self,
        key: &DatasetKey,
        sources: &[RemoteSource],
    ) -> Result<Option<CacheEntry>, GraphError> {
        let mut entry = CacheEntry::new(key.clone(), self.entry_dir(key), sources, true);
        let marker = entry.marker_path();

        let bytes = match std::fs::read(&marker) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(dataset = %key, "no completion marker");
                return Ok(None);
            }
            Err(e) => return Err(GraphError::storage(&marker, &e)),
        };

        let manifest: Manifest = match serde_json::from_slice(&bytes) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(dataset = %key, error = %e, "unreadable completion marker, treating entry as incomplete");
                return Ok(None);
            }
        };
        if !manifest.certifies(sources) {
            tracing::debug!(dataset = %key, "completion marker certifies different sources");
            return Ok(None);
        }
        if !self.paths_exist_and_nonempty(&entry) {
            tracing::warn!(dataset = %key, "completion marker present but files missing or empty");
            return Ok(None);
        }

        entry.accepted = manifest.accepted;
        tracing::debug!(dataset = %key, dir = %entry.dir.display(), accepted = entry.accepted, "cache hit");
        Ok(Some(entry))
    }

    /// The entry for `key` as it stands, complete or not. Touches nothing.
    pub fn entry(
        &self,
        key: &DatasetKey,
        sources: &[RemoteSource],
    ) -> Result<CacheEntry, GraphError> {
        Ok(self
            .locate(key, sources)?
            .unwrap_or_else(|| CacheEntry::new(key.clone(), self.entry_dir(key), sources, false)))
    }

    /// Open an incomplete entry, creating its directory and removing any
    /// stale completion marker.
    pub fn begin(
        &self,
        key: &DatasetKey,
        sources: &[RemoteSource],
    ) -> Result<CacheEntry, GraphError> {
        let entry = CacheEntry::new(key.clone(), self.entry_dir(key), sources, false);
        std::fs::create_dir_all(&entry.dir).map_err(|e| GraphError::storage(&entry.dir, &e))?;

        let marker = entry.marker_path();
        match std::fs::read(&marker) {
            Ok(bytes) => {
                if let Ok(previous) = serde_json::from_slice::<Manifest>(&bytes) {
                    evict_changed(&entry, &previous)?;
                }
                match std::fs::remove_file(&marker) {
                    Ok(()) => tracing::debug!(dataset = %key, "removed stale completion marker"),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(GraphError::storage(&marker, &e)),
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(GraphError::storage(&marker, &e)),
        }
        Ok(entry)
    }

    /// Certify `entry` as complete. Fails if any expected file is missing or
    /// empty.
    pub fn mark_complete(&self, entry: &mut CacheEntry) -> Result<(), GraphError> {
        if let Some(path) = self.first_invalid(entry) {
            return Err(GraphError::Storage {
                path: path.to_path_buf(),
                reason: "cannot mark entry complete: file missing or empty".to_string(),
            });
        }
        write_manifest(entry, false)?;
        entry.complete = true;
        entry.accepted = false;
        tracing::debug!(dataset = %entry.key, "cache entry marked complete");
        Ok(())
    }

    /// Record that the edge list of a complete entry built cleanly under
    /// strict parsing. Later builds may parse it leniently.
    pub fn mark_accepted(&self, entry: &mut CacheEntry) -> Result<(), GraphError> {
        if !entry.complete {
            return Err(GraphError::Storage {
                path: entry.marker_path(),
                reason: "cannot accept an incomplete entry".to_string(),
            });
        }
        write_manifest(entry, true)?;
        entry.accepted = true;
        tracing::debug!(dataset = %entry.key, "cache entry accepted");
        Ok(())
    }

    /// Whether every expected file exists with non-zero length.
    #[must_use]
    pub fn paths_exist_and_nonempty(&self, entry: &CacheEntry) -> bool {
        self.first_invalid(entry).is_none()
    }

    /// Sources whose local file is missing or empty.
    #[must_use]
    pub fn missing_files(&self, entry: &CacheEntry) -> Vec<RemoteSource> {
        entry
            .files()
            .filter(|(_, path)| !is_nonempty_file(path))
            .map(|(source, _)| source.clone())
            .collect()
    }

    /// Remove the entry for `key`. Returns whether anything was removed.
    pub fn clear(&self, key: &DatasetKey) -> Result<bool, GraphError> {
        let dir = self.entry_dir(key);
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => {
                tracing::info!(dataset = %key, dir = %dir.display(), "cache entry cleared");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(GraphError::storage(&dir, &e)),
        }
    }

    fn first_invalid<'a>(&self, entry: &'a CacheEntry) -> Option<&'a Path> {
        entry
            .local_paths
            .iter()
            .map(PathBuf::as_path)
            .find(|path| !is_nonempty_file(path))
    }
}

fn write_manifest(entry: &CacheEntry, accepted: bool) -> Result<(), GraphError> {
    let manifest = Manifest::for_sources(&entry.sources, accepted);
    let bytes =
        serde_json::to_vec_pretty(&manifest).map_err(|e| GraphError::Serialization(e.to_string()))?;
    write_atomic(&entry.marker_path(), &bytes)
}

/// Remove local files that `previous` certified for a different URL.
fn evict_changed(entry: &CacheEntry, previous: &Manifest) -> Result<(), GraphError> {
    for (source, path) in entry.files() {
        let changed = previous
            .files
            .iter()
            .any(|f| f.file == source.file_name() && f.url != source.url);
        if !changed {
            continue;
        }
        match std::fs::remove_file(path) {
            Ok(()) => tracing::info!(
                dataset = %entry.key,
                file = source.file_name(),
                url = %source.url,
                "source changed, evicting cached file"
            ),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(GraphError::storage(path, &e)),
        }
    }
    Ok(())
}

fn is_nonempty_file(path: &Path) -> bool {
    std::fs::metadata(path).is_ok_and(|m| m.is_file() && m.len() > 0)
}

// =============================================================================
// TESTS
// =============================================================================
