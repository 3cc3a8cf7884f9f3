//! # Remote Locator
//!
//! Maps a [`DatasetKey`] to the remote files needed to build its graph.
//!
//! Resolution is a pure function of the key and the configured STRING
//! release: no network access. The known datasets come from an embedded
//! table ([`crate::primitives::STRING_SPECIES_TABLE`]) with one row per
//! species, replacing one generated entry point per dataset.

use crate::config::{EdgeListKind, RetrievalConfig, StringVersion};
use crate::primitives::{STRING_COLLECTION, STRING_DOWNLOAD_BASE, STRING_SPECIES_TABLE};
use crate::{DatasetKey, FileKind, GraphError};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// =============================================================================
// COLLECTION
// =============================================================================

/// Remote sources grouping many datasets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    /// The STRING protein-interaction database.
    String,
}

impl Collection {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::String => STRING_COLLECTION,
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            STRING_COLLECTION => Ok(Collection::String),
            other => Err(GraphError::UnsupportedCollection(other.to_string())),
        }
    }
}

// =============================================================================
// DATASET REGISTRY
// =============================================================================

/// One row of the dataset table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetInfo {
    /// CamelCase dataset name, e.g. `AcholeplasmaModicum`.
    pub name: String,
    /// NCBI taxonomy id used in STRING file names.
    pub taxon_id: u32,
    /// Node count of the documented reference build.
    pub documented_nodes: u64,
    /// Edge count of the documented reference build.
    pub documented_edges: u64,
    /// Species display name.
    pub species: String,
}

/// All datasets known for the STRING collection, keyed by name.
#[derive(Debug, Clone)]
pub struct DatasetRegistry {
    entries: BTreeMap<String, DatasetInfo>,
}

impl DatasetRegistry {
    /// Registry of the embedded STRING species table.
    pub fn string() -> Result<Self, GraphError> {
        Self::from_tsv(STRING_SPECIES_TABLE)
    }

    /// Parse `name  taxon_id  nodes  edges  species` rows; `#` lines are comments.
    pub fn from_tsv(text: &str) -> Result<Self, GraphError> {
        let mut entries = BTreeMap::new();
        for (idx, line) in text.lines().enumerate() {
            let line = line.trim_end();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            let [name, taxon, nodes, edges, species] = fields.as_slice() else {
                return Err(GraphError::Config(format!(
                    "dataset table line {}: expected 5 tab-separated fields, found {}",
                    idx + 1,
                    fields.len()
                )));
            };
            let parse_num = |field: &str, what: &str| {
                field.parse::<u64>().map_err(|e| {
                    GraphError::Config(format!(
                        "dataset table line {}: invalid {what} '{field}': {e}",
                        idx + 1
                    ))
                })
            };
            let taxon_id = u32::try_from(parse_num(taxon, "taxon id")?).map_err(|e| {
                GraphError::Config(format!("dataset table line {}: {e}", idx + 1))
            })?;
            let info = DatasetInfo {
                name: (*name).to_string(),
                taxon_id,
                documented_nodes: parse_num(nodes, "node count")?,
                documented_edges: parse_num(edges, "edge count")?,
                species: (*species).to_string(),
            };
            if entries.insert(info.name.clone(), info).is_some() {
                return Err(GraphError::Config(format!(
                    "dataset table line {}: duplicate dataset '{name}'",
                    idx + 1
                )));
            }
        }
        Ok(Self { entries })
    }

    /// Look up a dataset by exact name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&DatasetInfo> {
        self.entries.get(name)
    }

    /// All datasets in name order.
    pub fn list(&self) -> impl Iterator<Item = &DatasetInfo> {
        self.entries.values()
    }

    /// Datasets whose name or species contains `pattern`, case-insensitively.
    pub fn search<'a>(&'a self, pattern: &str) -> impl Iterator<Item = &'a DatasetInfo> + 'a {
        let needle = pattern.to_lowercase();
        self.entries.values().filter(move |info| {
            info.name.to_lowercase().contains(&needle)
                || info.species.to_lowercase().contains(&needle)
        })
    }

    /// A known name differing from `name` only by case.
    #[must_use]
    pub fn suggest(&self, name: &str) -> Option<&str> {
        self.entries
            .keys()
            .find(|known| known.eq_ignore_ascii_case(name))
            .map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =============================================================================
// REMOTE LOCATOR
// =============================================================================

/// A remote file and the role it plays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteSource {
    pub url: String,
    pub kind: FileKind,
}

impl RemoteSource {
    /// Local file name inside the cache entry.
    #[must_use]
    pub fn file_name(&self) -> &'static str {
        self.kind.file_name()
    }
}

/// Resolves dataset keys to remote sources.
#[derive(Debug, Clone)]
pub struct RemoteLocator {
    registry: DatasetRegistry,
    version: StringVersion,
    edge_list_kind: EdgeListKind,
    load_node_metadata: bool,
}

impl RemoteLocator {
    /// Locator over the embedded registry with the release settings of `config`.
    pub fn from_config(config: &RetrievalConfig) -> Result<Self, GraphError> {
        Ok(Self::new(
            DatasetRegistry::string()?,
            config.string_version,
            config.edge_list_kind,
            config.load_node_metadata,
        ))
    }

    #[must_use]
    pub fn new(
        registry: DatasetRegistry,
        version: StringVersion,
        edge_list_kind: EdgeListKind,
        load_node_metadata: bool,
    ) -> Self {
        Self {
            registry,
            version,
            edge_list_kind,
            load_node_metadata,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &DatasetRegistry {
        &self.registry
    }

    /// Resolve `key` to its sources: the edge list first, then node metadata
    /// when enabled.
    pub fn resolve(&self, key: &DatasetKey) -> Result<Vec<RemoteSource>, GraphError> {
        let collection: Collection = key.collection().parse()?;
        match collection {
            Collection::String => {
                let info = self.registry.get(key.name()).ok_or_else(|| GraphError::NotFound {
                    collection: collection.to_string(),
                    name: key.name().to_string(),
                    suggestion: self.registry.suggest(key.name()).map(str::to_string),
                })?;
                Ok(self.string_sources(info.taxon_id))
            }
        }
    }

    fn string_sources(&self, taxon_id: u32) -> Vec<RemoteSource> {
        let version = self.version.as_str();
        let kind = self.edge_list_kind.as_str();
        let mut sources = vec![RemoteSource {
            url: format!(
                "{STRING_DOWNLOAD_BASE}/protein.{kind}.v{version}/{taxon_id}.protein.{kind}.v{version}.txt.gz"
            ),
            kind: FileKind::EdgeList,
        }];
        if self.load_node_metadata {
            sources.push(RemoteSource {
                url: format!(
                    "{STRING_DOWNLOAD_BASE}/protein.info.v{version}/{taxon_id}.protein.info.v{version}.txt.gz"
                ),
                kind: FileKind::NodeMetadata,
            });
        }
        sources
    }
}

// =============================================================================
// TESTS
// =============================================================================
