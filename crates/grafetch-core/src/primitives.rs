//! # Retrieval Primitives
//!
//! Hardcoded runtime constants for grafetch-core.
//!
//! These values are compiled into the binary. Anything a caller may want to
//! tune lives in [`crate::RetrievalConfig`] instead; the defaults there are
//! taken from here.

// =============================================================================
// CACHE LAYOUT
// =============================================================================

/// Cache root used when neither the config nor the environment names one.
pub const DEFAULT_CACHE_DIR: &str = "graphs";

/// Environment variable consulted for the default cache root.
pub const CACHE_DIR_ENV: &str = "GRAPH_CACHE_DIR";

/// Name of the completion marker inside a cache entry directory.
///
/// The marker is a JSON manifest of the files it certifies. It is written
/// last, and only after every expected file was renamed into place.
pub const COMPLETION_MARKER: &str = ".complete";

/// Sub-directory of a cache entry holding built graph snapshots.
pub const PREPROCESSED_DIR: &str = "preprocessed";

/// Local file name of the downloaded edge list.
pub const EDGE_LIST_FILE: &str = "edges.tsv.gz";

/// Local file name of the downloaded node metadata.
pub const NODE_METADATA_FILE: &str = "nodes.tsv.gz";

// =============================================================================
// STRING COLLECTION
// =============================================================================

/// Collection identifier of the STRING protein-interaction database.
pub const STRING_COLLECTION: &str = "string";

/// Base URL of the STRING download server.
pub const STRING_DOWNLOAD_BASE: &str = "https://stringdb-downloads.org/download";

/// Embedded dataset table: `name  taxon_id  nodes  edges  species`.
pub const STRING_SPECIES_TABLE: &str = include_str!("../data/string_species.tsv");

// =============================================================================
// FETCHER DEFAULTS
// =============================================================================

/// Attempt ceiling for a single file, first attempt included.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// First backoff delay in milliseconds; doubles on every retry.
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 500;

/// Upper bound for a single backoff delay in milliseconds.
pub const DEFAULT_BACKOFF_MAX_MS: u64 = 30_000;

/// Per-request timeout of the HTTP transport in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

/// Files of one dataset downloaded concurrently.
pub const DEFAULT_FETCH_WORKERS: usize = 2;

/// Read buffer size used while streaming a download to disk.
pub const DOWNLOAD_CHUNK_SIZE: usize = 64 * 1024;

// =============================================================================
// PARSER / BUILDER
// =============================================================================

/// Weight assigned to edge records that carry no weight column.
pub const DEFAULT_EDGE_WEIGHT: f64 = 1.0;

/// Number of records between two cancellation checks.
///
/// Checking per line would dominate the cost of parsing short lines.
pub const CANCEL_CHECK_INTERVAL: u64 = 65_536;

/// Gzip member magic bytes.
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

// =============================================================================
// REPORTING
// =============================================================================

/// Number of most central nodes listed in a report.
pub const DEFAULT_TOP_K: usize = 5;

// =============================================================================
// SNAPSHOT FORMAT
// =============================================================================

/// Magic bytes for the graph snapshot header.
///
/// - File Header = Magic Bytes ("GRFT") + Version (u8) before payload.
pub const MAGIC_BYTES: &[u8; 4] = b"GRFT";

/// Current snapshot format version.
///
/// Increment this when making breaking changes to the snapshot layout.
pub const FORMAT_VERSION: u8 = 1;

/// Largest snapshot accepted by the decoder (2 GiB).
pub const MAX_SNAPSHOT_SIZE: u64 = 2 * 1024 * 1024 * 1024;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_bytes_correct() {
        assert_eq!(MAGIC_BYTES, b"GRFT");
    }

    #[test]
    fn species_table_is_embedded() {
        assert!(STRING_SPECIES_TABLE.lines().count() > 1);
    }
}
