//! # Formats
//!
//! On-disk encodings owned by grafetch-core.
//!
//! - `snapshot` - binary graph snapshots stored under a cache entry's
//!   `preprocessed/` directory

pub mod snapshot;

pub use snapshot::{SnapshotHeader, graph_from_bytes, graph_to_bytes, read_snapshot, write_snapshot};
