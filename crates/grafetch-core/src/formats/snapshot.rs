//! # Snapshot Format
//!
//! Binary serialization of built graphs.
//!
//! Format: Header (5 bytes) + postcard-serialized graph data.
//! - 4 bytes: Magic ("GRFT")
//! - 1 byte: Version
//!
//! Size and header are validated before the payload is decoded, so a
//! truncated or foreign file fails fast with [`GraphError::Serialization`].

use crate::cache::write_atomic;
use crate::graph::{Graph, SerializableGraph};
use crate::{GraphError, primitives};
use std::path::Path;

/// Minimum valid snapshot size (header only).
const HEADER_SIZE: usize = 5;

// =============================================================================
// FILE HEADER
// =============================================================================

/// The snapshot header precedes all graph data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl SnapshotHeader {
    /// Header for the current format version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *primitives::MAGIC_BYTES,
            version: primitives::FORMAT_VERSION,
        }
    }

    pub fn validate(&self) -> Result<(), GraphError> {
        if &self.magic != primitives::MAGIC_BYTES {
            return Err(GraphError::Serialization(
                "Invalid magic bytes".to_string(),
            ));
        }
        if self.version != primitives::FORMAT_VERSION {
            return Err(GraphError::Serialization(format!(
                "Unsupported snapshot version: {} (expected {})",
                self.version,
                primitives::FORMAT_VERSION
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, GraphError> {
        let Some(head) = bytes.get(..HEADER_SIZE) else {
            return Err(GraphError::Serialization("Header too short".to_string()));
        };
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&head[0..4]);
        Ok(Self {
            magic,
            version: head[4],
        })
    }
}

impl Default for SnapshotHeader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// BYTE CONVERSION
// =============================================================================

/// Encode a graph as header + payload. No file I/O.
pub fn graph_to_bytes(graph: &Graph) -> Result<Vec<u8>, GraphError> {
    let payload = postcard::to_stdvec(&SerializableGraph::from(graph))
        .map_err(|e| GraphError::Serialization(e.to_string()))?;

    let mut result = Vec::with_capacity(HEADER_SIZE + payload.len());
    result.extend_from_slice(&SnapshotHeader::new().to_bytes());
    result.extend_from_slice(&payload);
    Ok(result)
}

/// Decode a graph, validating size and header before the payload.
pub fn graph_from_bytes(bytes: &[u8]) -> Result<Graph, GraphError> {
    check_size(bytes.len() as u64, primitives::MAX_SNAPSHOT_SIZE)?;

    let header = SnapshotHeader::from_bytes(bytes)?;
    header.validate()?;

    let serializable: SerializableGraph =
        postcard::from_bytes(&bytes[HEADER_SIZE..]).map_err(|e| {
            GraphError::Serialization(format!("Failed to deserialize graph data: {e}"))
        })?;
    Graph::try_from(serializable)
}

// =============================================================================
// FILE I/O
// =============================================================================

/// Atomically write `graph` to `path`, creating the parent directory.
pub fn write_snapshot(path: &Path, graph: &Graph) -> Result<(), GraphError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| GraphError::storage(dir, &e))?;
    }
    write_atomic(path, &graph_to_bytes(graph)?)
}

/// Read a snapshot. `Ok(None)` if the file does not exist.
pub fn read_snapshot(path: &Path) -> Result<Option<Graph>, GraphError> {
    read_snapshot_within(path, primitives::MAX_SNAPSHOT_SIZE)
}

/// The file length is checked against `limit` before anything is read.
fn read_snapshot_within(path: &Path, limit: u64) -> Result<Option<Graph>, GraphError> {
    let len = match std::fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(GraphError::storage(path, &e)),
    };
    check_size(len, limit)?;
    let bytes = std::fs::read(path).map_err(|e| GraphError::storage(path, &e))?;
    graph_from_bytes(&bytes).map(Some)
}

fn check_size(len: u64, limit: u64) -> Result<(), GraphError> {
    if len > limit {
        return Err(GraphError::Serialization(format!(
            "Snapshot size {len} bytes exceeds maximum allowed {limit} bytes"
        )));
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
