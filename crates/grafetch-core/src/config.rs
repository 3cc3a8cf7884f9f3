//! # Retrieval Configuration
//!
//! Every tunable of the pipeline in one explicit struct.
//!
//! The configuration is passed into [`crate::Retriever`] at construction;
//! there is no process-wide default cache path or singleton. The CLI loads
//! it from a TOML file and overrides individual fields from flags:
//!
//! ```toml
//! cache_root = "/data/graphs"
//! string_version = "11.5"
//! edge_list_kind = "physical.links"
//! max_attempts = 3
//! ```

use crate::GraphError;
use crate::primitives::{
    CACHE_DIR_ENV, DEFAULT_BACKOFF_BASE_MS, DEFAULT_BACKOFF_MAX_MS, DEFAULT_CACHE_DIR,
    DEFAULT_FETCH_WORKERS, DEFAULT_MAX_ATTEMPTS, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_TOP_K,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

// =============================================================================
// STRING RELEASE SELECTION
// =============================================================================

/// Released versions of the STRING database with per-species downloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum StringVersion {
    #[default]
    #[serde(rename = "11.0")]
    V11_0,
    #[serde(rename = "11.5")]
    V11_5,
    #[serde(rename = "12.0")]
    V12_0,
}

impl StringVersion {
    /// Version tag as it appears in download URLs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            StringVersion::V11_0 => "11.0",
            StringVersion::V11_5 => "11.5",
            StringVersion::V12_0 => "12.0",
        }
    }
}

impl fmt::Display for StringVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StringVersion {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_start_matches('v') {
            "11.0" | "11" => Ok(StringVersion::V11_0),
            "11.5" => Ok(StringVersion::V11_5),
            "12.0" | "12" => Ok(StringVersion::V12_0),
            other => Err(GraphError::Config(format!(
                "unsupported STRING version '{other}'"
            ))),
        }
    }
}

/// Which STRING network file becomes the edge list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum EdgeListKind {
    /// Functional association network (`protein.links`).
    #[default]
    #[serde(rename = "links")]
    Links,
    /// Physical binding subnetwork (`protein.physical.links`).
    #[serde(rename = "physical.links")]
    PhysicalLinks,
    /// Paralogy bitscores (`protein.homology`).
    #[serde(rename = "homology")]
    Homology,
}

impl EdgeListKind {
    /// File stem as it appears in download URLs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeListKind::Links => "links",
            EdgeListKind::PhysicalLinks => "physical.links",
            EdgeListKind::Homology => "homology",
        }
    }
}

impl fmt::Display for EdgeListKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EdgeListKind {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "links" => Ok(EdgeListKind::Links),
            "physical.links" | "physical_links" => Ok(EdgeListKind::PhysicalLinks),
            "homology" => Ok(EdgeListKind::Homology),
            other => Err(GraphError::Config(format!("unknown edge list kind '{other}'"))),
        }
    }
}

// =============================================================================
// RETRIEVAL CONFIG
// =============================================================================

/// Configuration of one [`crate::Retriever`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrievalConfig {
    /// Root of the on-disk cache.
    pub cache_root: PathBuf,
    /// STRING release to download.
    pub string_version: StringVersion,
    /// STRING network file used as edge list.
    pub edge_list_kind: EdgeListKind,
    /// Also download `protein.info` node metadata.
    pub load_node_metadata: bool,
    /// Attempt ceiling per file, first attempt included.
    pub max_attempts: u32,
    /// First backoff delay in milliseconds.
    pub backoff_base_ms: u64,
    /// Largest backoff delay in milliseconds.
    pub backoff_max_ms: u64,
    /// Per-request timeout of the HTTP transport.
    pub request_timeout_secs: u64,
    /// Files of one dataset fetched concurrently.
    pub fetch_workers: usize,
    /// Fail on self-loops instead of counting them.
    pub strict_self_loops: bool,
    /// Number of central nodes listed in reports.
    pub top_k: usize,
    /// Persist and reuse a binary snapshot of each built graph.
    pub preprocess: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            cache_root: default_cache_root(),
            string_version: StringVersion::default(),
            edge_list_kind: EdgeListKind::default(),
            load_node_metadata: true,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_base_ms: DEFAULT_BACKOFF_BASE_MS,
            backoff_max_ms: DEFAULT_BACKOFF_MAX_MS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            fetch_workers: DEFAULT_FETCH_WORKERS,
            strict_self_loops: false,
            top_k: DEFAULT_TOP_K,
            preprocess: true,
        }
    }
}

/// `$GRAPH_CACHE_DIR` if set and non-empty, otherwise `graphs`.
fn default_cache_root() -> PathBuf {
    std::env::var_os(CACHE_DIR_ENV)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_DIR))
}

impl RetrievalConfig {
    /// Default configuration rooted at `cache_root`.
    #[must_use]
    pub fn with_cache_root(cache_root: impl Into<PathBuf>) -> Self {
        Self {
            cache_root: cache_root.into(),
            ..Self::default()
        }
    }

    /// Parse a configuration from TOML text. Missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, GraphError> {
        let config: Self =
            toml::from_str(text).map_err(|e| GraphError::Config(format!("invalid TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML configuration file.
    pub fn load(path: &Path) -> Result<Self, GraphError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            GraphError::Config(format!("cannot read config '{}': {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), GraphError> {
        if self.cache_root.as_os_str().is_empty() {
            return Err(GraphError::Config("cache_root must not be empty".to_string()));
        }
        if self.max_attempts == 0 {
            return Err(GraphError::Config("max_attempts must be at least 1".to_string()));
        }
        if self.fetch_workers == 0 {
            return Err(GraphError::Config("fetch_workers must be at least 1".to_string()));
        }
        if self.top_k == 0 {
            return Err(GraphError::Config("top_k must be at least 1".to_string()));
        }
        if self.backoff_base_ms > self.backoff_max_ms {
            return Err(GraphError::Config(format!(
                "backoff_base_ms ({}) exceeds backoff_max_ms ({})",
                self.backoff_base_ms, self.backoff_max_ms
            )));
        }
        Ok(())
    }

    /// Per-request timeout as a [`Duration`].
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// =============================================================================
// TESTS
// =============================================================================
