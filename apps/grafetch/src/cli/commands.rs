//! # CLI Command Implementations

use crate::progress::BarProgress;
use grafetch_core::{
    CacheStore, CancellationToken, CsrEngine, DatasetKey, DatasetRegistry, GraphError,
    GraphSurface, HttpTransport, RemoteLocator, RetrievalConfig, RetrieveRequest, Retriever,
    Verbosity,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Configuration from `path`, or the defaults.
pub fn load_config(path: Option<&Path>) -> Result<RetrievalConfig, GraphError> {
    match path {
        Some(path) => RetrievalConfig::load(path),
        None => Ok(RetrievalConfig::default()),
    }
}

/// Replace the configured cache root when one was given on the command line.
pub fn apply_cache_path(config: &mut RetrievalConfig, cache_path: Option<PathBuf>) {
    if let Some(root) = cache_path {
        config.cache_root = root;
    }
}

fn print_json(value: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

// =============================================================================
// RETRIEVE COMMAND
// =============================================================================

/// Per-call knobs of `retrieve` that are not configuration.
#[derive(Debug, Clone)]
pub struct RetrieveOptions {
    pub directed: bool,
    pub verbosity: Verbosity,
    pub timeout: Option<u64>,
    pub snapshots: bool,
    pub edge_weights: bool,
}

/// Retrieve a dataset and print its report.
pub fn cmd_retrieve(
    config: RetrievalConfig,
    cache_path: Option<&Path>,
    name: &str,
    options: &RetrieveOptions,
    json_mode: bool,
) -> Result<(), GraphError> {
    let transport = HttpTransport::new(config.request_timeout())?;
    let retriever =
        Retriever::new(config, transport, CsrEngine)?.with_progress(Arc::new(BarProgress::new()));

    let cancel = match options.timeout {
        Some(secs) => CancellationToken::with_timeout(Duration::from_secs(secs)),
        None => CancellationToken::new(),
    };
    let mut request = RetrieveRequest::new(name)
        .directed(options.directed)
        .verbosity(options.verbosity)
        .snapshots(options.snapshots)
        .edge_weights(options.edge_weights)
        .cancel(cancel);
    if let Some(path) = cache_path {
        request = request.cache_path(path);
    }

    let retrieved = retriever.retrieve_with(request)?;
    let report = retrieved.report();

    if json_mode {
        print_json(&serde_json::json!({
            "dataset": name,
            "cache_dir": retrieved.cache_entry().dir().to_string_lossy(),
            "from_cache": retrieved.was_cached(),
            "from_snapshot": retrieved.from_snapshot(),
            "stages": retrieved.stages(),
            "summary": retrieved.summary(),
            "annotated_nodes": retrieved.node_metadata().len(),
            "report": report,
        }));
        return Ok(());
    }

    println!("{report}");
    println!();
    println!(
        "Cache:    {} ({})",
        retrieved.cache_entry().dir().display(),
        if retrieved.was_cached() { "hit" } else { "downloaded" }
    );
    println!("Nodes:    {}", retrieved.graph().node_count());
    println!("Edges:    {}", retrieved.graph().edge_count());
    println!("Metadata: {} annotated nodes", retrieved.node_metadata().len());
    Ok(())
}

// =============================================================================
// LIST COMMAND
// =============================================================================

/// List registry datasets, optionally filtered.
pub fn cmd_list(
    config: &RetrievalConfig,
    filter: Option<&str>,
    json_mode: bool,
) -> Result<(), GraphError> {
    let locator = RemoteLocator::from_config(config)?;
    let registry: &DatasetRegistry = locator.registry();
    let datasets: Vec<_> = match filter {
        Some(pattern) => registry.search(pattern).collect(),
        None => registry.list().collect(),
    };

    if json_mode {
        print_json(&serde_json::json!({
            "string_version": config.string_version.as_str(),
            "count": datasets.len(),
            "datasets": datasets,
        }));
        return Ok(());
    }

    println!(
        "{:<40} {:>9} {:>8} {:>10}  species",
        "name", "taxon", "nodes", "edges"
    );
    for info in &datasets {
        println!(
            "{:<40} {:>9} {:>8} {:>10}  {}",
            info.name, info.taxon_id, info.documented_nodes, info.documented_edges, info.species
        );
    }
    println!();
    println!("{} of {} datasets", datasets.len(), registry.len());
    Ok(())
}

// =============================================================================
// LOCATE COMMAND
// =============================================================================

/// Show resolved URLs and local cache paths.
pub fn cmd_locate(config: &RetrievalConfig, name: &str, json_mode: bool) -> Result<(), GraphError> {
    let key = DatasetKey::string(name);
    let sources = RemoteLocator::from_config(config)?.resolve(&key)?;
    let store = CacheStore::new(&config.cache_root);
    let dir = store.entry_dir(&key);

    if json_mode {
        let files: Vec<_> = sources
            .iter()
            .map(|s| {
                serde_json::json!({
                    "kind": s.kind,
                    "url": s.url,
                    "path": dir.join(s.file_name()).to_string_lossy(),
                })
            })
            .collect();
        print_json(&serde_json::json!({
            "dataset": key.to_string(),
            "cache_dir": dir.to_string_lossy(),
            "files": files,
        }));
        return Ok(());
    }

    println!("Dataset:   {key}");
    println!("Cache dir: {}", dir.display());
    for source in &sources {
        println!();
        println!("  {:?}", source.kind);
        println!("    url:  {}", source.url);
        println!("    path: {}", dir.join(source.file_name()).display());
    }
    Ok(())
}

// =============================================================================
// CACHE COMMANDS
// =============================================================================

/// Report whether a dataset is fully cached, and which files are missing.
pub fn cmd_cache_status(
    config: &RetrievalConfig,
    name: &str,
    json_mode: bool,
) -> Result<(), GraphError> {
    let key = DatasetKey::string(name);
    let sources = RemoteLocator::from_config(config)?.resolve(&key)?;
    let store = CacheStore::new(&config.cache_root);
    let entry = store.entry(&key, &sources)?;
    let dir = entry.dir();
    let complete = entry.is_complete();
    let missing: Vec<&str> = store
        .missing_files(&entry)
        .iter()
        .map(|s| s.file_name())
        .collect();

    if json_mode {
        print_json(&serde_json::json!({
            "dataset": key.to_string(),
            "cache_dir": dir.to_string_lossy(),
            "complete": complete,
            "accepted": entry.is_accepted(),
            "missing_files": missing,
        }));
        return Ok(());
    }

    println!("Dataset:  {key}");
    println!("Location: {}", dir.display());
    let status = match (complete, entry.is_accepted()) {
        (true, true) => "complete, validated",
        (true, false) => "complete, not yet validated",
        _ => "incomplete",
    };
    println!("Status:   {status}");
    for file in &missing {
        println!("  missing: {file}");
    }
    Ok(())
}

/// Delete a dataset's cache entry.
pub fn cmd_cache_clear(
    config: &RetrievalConfig,
    name: &str,
    json_mode: bool,
) -> Result<(), GraphError> {
    let key = DatasetKey::string(name);
    // Resolve first so a typo is reported instead of silently clearing nothing.
    RemoteLocator::from_config(config)?.resolve(&key)?;
    let store = CacheStore::new(&config.cache_root);
    let removed = store.clear(&key)?;

    if json_mode {
        print_json(&serde_json::json!({
            "dataset": key.to_string(),
            "removed": removed,
        }));
        return Ok(());
    }

    if removed {
        println!("Removed {}", store.entry_dir(&key).display());
    } else {
        println!("Nothing cached for {key}");
    }
    Ok(())
}
