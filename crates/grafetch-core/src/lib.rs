//! # grafetch-core
//!
//! Automatic retrieval of STRING interaction networks - THE LOGIC.
//!
//! A dataset name goes in, an immutable graph comes out:
//!
//! ```text
//! RemoteLocator -> Fetcher -> CacheStore -> EdgeStream -> GraphBuilder -> GraphEngine
//!                                                              |
//!                                                   StatisticsReporter
//! ```
//!
//! ## Architectural Constraints
//!
//! - Synchronous API; the only blocking points are network I/O inside the
//!   [`Transport`] and disk I/O inside the cache and the parser
//! - Deterministic: node indices follow file order, adjacency is sorted
//! - The on-disk cache is the only state shared between calls
//! - No global state: every knob lives in [`RetrievalConfig`]

// =============================================================================
// MODULES
// =============================================================================

pub mod builder;
pub mod cache;
pub mod cancel;
pub mod config;
pub mod facade;
pub mod fetcher;
pub mod formats;
pub mod graph;
pub mod locator;
pub mod parser;
pub mod primitives;
pub mod progress;
pub mod stats;
pub mod transport;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    DatasetKey, EdgeRecord, FileKind, GraphError, NodeId, NodeIndex, ParseMode, Verbosity,
};

// =============================================================================
// RE-EXPORTS: Pipeline
// =============================================================================

pub use builder::{BuildSummary, GraphBuilder};
pub use cache::{CacheEntry, CacheStore};
pub use cancel::CancellationToken;
pub use config::{EdgeListKind, RetrievalConfig, StringVersion};
pub use facade::{RetrievalStage, RetrieveRequest, Retrieved, Retriever};
pub use fetcher::{FetchOutcome, Fetcher, RetryPolicy};
pub use graph::{CsrEngine, Graph, GraphEngine, GraphSurface, SerializableGraph};
pub use locator::{Collection, DatasetInfo, DatasetRegistry, RemoteLocator, RemoteSource};
pub use parser::{EdgeStream, NodeMetadata, ParseStats, parse_node_metadata};
pub use progress::{LogProgress, NoProgress, ProgressFactory, ProgressReporter, ProgressSink};
pub use stats::{GraphReport, StatisticsReporter};
pub use transport::{DownloadSink, Transport};

#[cfg(feature = "http")]
pub use transport::HttpTransport;

// =============================================================================
// RE-EXPORTS: Formats (from formats module)
// =============================================================================

pub use formats::{SnapshotHeader, graph_from_bytes, graph_to_bytes};
