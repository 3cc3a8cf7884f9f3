//! # Core Type Definitions
//!
//! This module contains the shared vocabulary of the retrieval pipeline:
//! - Dataset identity (`DatasetKey`, `FileKind`)
//! - Node identity (`NodeId` for the external name, `NodeIndex` for the dense index)
//! - Parsed input (`EdgeRecord`, `ParseMode`)
//! - Caller options (`Verbosity`)
//! - Error types (`GraphError`)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

// =============================================================================
// DATASET IDENTITY
// =============================================================================

/// Uniquely identifies a retrievable dataset.
///
/// Immutable once built: a collection identifier (e.g. `"string"`) and the
/// dataset name inside that collection.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DatasetKey {
    collection: String,
    name: String,
}

impl DatasetKey {
    /// Create a key from a collection identifier and a dataset name.
    #[must_use]
    pub fn new(collection: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            name: name.into(),
        }
    }

    /// Create a key inside the STRING collection.
    #[must_use]
    pub fn string(name: impl Into<String>) -> Self {
        Self::new(crate::primitives::STRING_COLLECTION, name)
    }

    /// Get the collection identifier.
    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Get the dataset name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for DatasetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.name)
    }
}

/// The role a remote file plays in building a graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    /// Weighted edge list: `source destination [weight]`.
    EdgeList,
    /// Per-node annotations.
    NodeMetadata,
}

impl FileKind {
    /// Local file name used inside a cache entry.
    #[must_use]
    pub fn file_name(&self) -> &'static str {
        match self {
            FileKind::EdgeList => crate::primitives::EDGE_LIST_FILE,
            FileKind::NodeMetadata => crate::primitives::NODE_METADATA_FILE,
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileKind::EdgeList => f.write_str("edge_list"),
            FileKind::NodeMetadata => f.write_str("node_metadata"),
        }
    }
}

// =============================================================================
// NODE IDENTIFIERS
// =============================================================================

/// External node identifier, unique within one dataset
/// (e.g. `1408417.JHYB01000002_gene354`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl NodeId {
    /// Create a new node identifier.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Dense node index in `[0, node_count)`, assigned in first-seen order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeIndex(pub u32);

impl NodeIndex {
    /// Get the index as a `usize` for slice access.
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

// =============================================================================
// EDGE RECORD
// =============================================================================

/// One parsed `source destination [weight]` line.
///
/// Produced by the parser and consumed immediately by the builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub source: NodeId,
    pub destination: NodeId,
    /// `None` when the line had no weight column.
    pub weight: Option<f64>,
}

impl EdgeRecord {
    /// Create a new edge record.
    #[must_use]
    pub fn new(
        source: impl Into<String>,
        destination: impl Into<String>,
        weight: Option<f64>,
    ) -> Self {
        Self {
            source: NodeId::new(source),
            destination: NodeId::new(destination),
            weight,
        }
    }

    /// The weight, or [`crate::primitives::DEFAULT_EDGE_WEIGHT`] when absent.
    #[must_use]
    pub fn weight_or_default(&self) -> f64 {
        self.weight.unwrap_or(crate::primitives::DEFAULT_EDGE_WEIGHT)
    }

    /// Whether both endpoints are the same node.
    #[must_use]
    pub fn is_self_loop(&self) -> bool {
        self.source == self.destination
    }
}

/// How the parser treats lines that do not match the grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseMode {
    /// Abort with [`GraphError::MalformedInput`] on the first bad line.
    Strict,
    /// Count the line, log a warning, keep going.
    Lenient,
}

// =============================================================================
// VERBOSITY
// =============================================================================

/// How much a retrieval call shows while it runs.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Verbosity {
    /// No progress output, statistics computed lazily.
    Silent,
    /// Download progress, statistics computed lazily.
    ProgressBars,
    /// Download progress and an eager statistics report.
    #[default]
    ProgressBarsAndStats,
}

impl Verbosity {
    /// Whether download progress should be reported.
    #[must_use]
    pub fn shows_progress(self) -> bool {
        self >= Verbosity::ProgressBars
    }

    /// Whether the statistics report runs eagerly.
    #[must_use]
    pub fn eager_stats(self) -> bool {
        self >= Verbosity::ProgressBarsAndStats
    }
}

impl FromStr for Verbosity {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "0" | "silent" => Ok(Verbosity::Silent),
            "1" | "progress" | "progress_bars" => Ok(Verbosity::ProgressBars),
            "2" | "stats" | "progress_bars_and_stats" => Ok(Verbosity::ProgressBarsAndStats),
            other => Err(GraphError::Config(format!("unknown verbosity '{other}'"))),
        }
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur while retrieving and building a graph.
///
/// - No silent failures: every kind reaches the caller of the façade
/// - Lenient-mode anomalies are NOT errors; they are counted in
///   [`crate::BuildSummary`]
#[derive(Debug, Error)]
pub enum GraphError {
    /// The collection identifier is not known.
    #[error("Unsupported dataset collection '{0}'")]
    UnsupportedCollection(String),

    /// The collection is known but has no dataset with this name.
    #[error("Dataset '{name}' not found in collection '{collection}'{}", suggestion_suffix(.suggestion))]
    NotFound {
        collection: String,
        name: String,
        suggestion: Option<String>,
    },

    /// The remote source refused the request (4xx) or retries ran out.
    #[error("Remote resource not available: {url} ({reason})")]
    RemoteNotAvailable { url: String, reason: String },

    /// A retryable network failure (timeout, connection reset, 5xx).
    #[error("Transient network error: {url} ({reason})")]
    TransientNetwork { url: String, reason: String },

    /// The cache directory could not be created, written or read.
    #[error("Storage error at {}: {reason}", .path.display())]
    Storage { path: PathBuf, reason: String },

    /// A line of the input violates the edge-list grammar (strict mode).
    #[error("Malformed input in {} line {line}: {reason}", .path.display())]
    MalformedInput {
        path: PathBuf,
        line: u64,
        reason: String,
    },

    /// A self-loop was found while self-loops are rejected.
    #[error("Unexpected self-loop on node {0}")]
    UnexpectedSelfLoop(NodeId),

    /// The caller cancelled the retrieval.
    #[error("Retrieval cancelled")]
    Cancelled,

    /// Invalid configuration or caller parameter.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A graph snapshot could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

fn suggestion_suffix(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(s) => format!(" (did you mean '{s}'?)"),
        None => String::new(),
    }
}

impl GraphError {
    /// Build a storage error from an I/O error at `path`.
    pub fn storage(path: impl Into<PathBuf>, err: &std::io::Error) -> Self {
        GraphError::Storage {
            path: path.into(),
            reason: err.to_string(),
        }
    }

    /// Whether the fetcher may retry after this error.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, GraphError::TransientNetwork { .. })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dataset_key_display() {
        let key = DatasetKey::string("AcholeplasmaModicum");
        assert_eq!(key.collection(), "string");
        assert_eq!(key.to_string(), "string/AcholeplasmaModicum");
    }

    #[test]
    fn verbosity_parses_levels_and_names() {
        assert_eq!("0".parse::<Verbosity>().expect("parse"), Verbosity::Silent);
        assert_eq!(
            "progress_bars".parse::<Verbosity>().expect("parse"),
            Verbosity::ProgressBars
        );
        assert_eq!(
            "2".parse::<Verbosity>().expect("parse"),
            Verbosity::ProgressBarsAndStats
        );
        assert!("loud".parse::<Verbosity>().is_err());
    }

    #[test]
    fn verbosity_ordering_drives_flags() {
        assert!(!Verbosity::Silent.shows_progress());
        assert!(Verbosity::ProgressBars.shows_progress());
        assert!(!Verbosity::ProgressBars.eager_stats());
        assert!(Verbosity::ProgressBarsAndStats.eager_stats());
    }

    #[test]
    fn edge_record_default_weight() {
        let record = EdgeRecord::new("a", "b", None);
        assert_eq!(record.weight_or_default(), 1.0);
        assert!(!record.is_self_loop());
        assert!(EdgeRecord::new("a", "a", Some(3.0)).is_self_loop());
    }

    #[test]
    fn not_found_message_includes_suggestion() {
        let err = GraphError::NotFound {
            collection: "string".to_string(),
            name: "acholeplasmamodicum".to_string(),
            suggestion: Some("AcholeplasmaModicum".to_string()),
        };
        assert!(err.to_string().contains("did you mean 'AcholeplasmaModicum'"));
    }
}
