use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::aliases::load_alias_table;
use super::graph::{DependencyGraph, FileNode};
use super::resolver::{normalize_path, AliasTable};
use super::scanner::{is_excluded_path, is_source_file, FileScanner};
use crate::parsers::cache::{resolution_fingerprint, AnalysisCache};
use crate::parsers::FileAnalyzer;
use crate::watch::FileChange;

/// Tuning knobs for bulk and incremental analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnalyzerConfig {
    /// Worker threads in the analysis pool.
    pub workers: usize,
    /// Files handed to a worker at a time.
    pub batch_size: usize,
    /// Quiet period before a burst of change events is applied.
    pub debounce_ms: u64,
    pub use_cache: bool,
    /// Disk tier of the analysis cache; the system temp dir when unset.
    pub cache_dir: Option<PathBuf>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            batch_size: 200,
            debounce_ms: 200,
            use_cache: true,
            cache_dir: None,
        }
    }
}

impl AnalyzerConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Owns the graph for one project and keeps it current.
///
/// [`analyze`](Self::analyze) rebuilds everything from disk; after that,
/// [`apply_changes`](Self::apply_changes) patches single files in place.
pub struct CodebaseAnalyzer {
    root: PathBuf,
    config: AnalyzerConfig,
    file_scanner: FileScanner,
    cache: Option<AnalysisCache>,
    aliases: AliasTable,
    known_files: HashSet<PathBuf>,
    resolution: u64,
    graph: DependencyGraph,
}

impl CodebaseAnalyzer {
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        Self::with_config(root, AnalyzerConfig::default())
    }

    pub fn with_config(root: impl AsRef<Path>, config: AnalyzerConfig) -> Result<Self> {
        let root = root.as_ref();
        let root = root
            .canonicalize()
            .with_context(|| format!("Cannot open project root {}", root.display()))?;

        let cache = if config.use_cache {
            Some(AnalysisCache::new(config.cache_dir.clone()).unwrap_or_else(|err| {
                warn!("Failed to initialize disk analysis cache: {err}");
                AnalysisCache::in_memory_only()
            }))
        } else {
            None
        };

        Ok(Self {
            aliases: AliasTable::new(&root),
            graph: DependencyGraph::new(&root),
            root,
            config,
            file_scanner: FileScanner::new(),
            cache,
            known_files: HashSet::new(),
            resolution: 0,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn into_graph(self) -> DependencyGraph {
        self.graph
    }

    /// Graph identity for `path`: absolute and lexically normalized, with
    /// relative paths taken from the project root.
    pub fn identity(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            normalize_path(path)
        } else {
            normalize_path(&self.root.join(path))
        }
    }

    /// Scan the project and rebuild the graph from scratch.
    pub fn analyze(&mut self) -> Result<&DependencyGraph> {
        let started = Instant::now();

        self.aliases = load_alias_table(&self.root);
        info!(
            "Loaded {} alias entries (base url {})",
            self.aliases.len(),
            self.aliases.base_url.display()
        );

        let files = self.file_scanner.scan_directory(&self.root)?;
        info!("Found {} files to analyze", files.len());

        self.known_files = files.iter().cloned().collect();
        self.resolution = resolution_fingerprint(&self.known_files, &self.aliases);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.workers.max(1))
            .build()
            .context("Failed to build analysis thread pool")?;

        let analyzer = FileAnalyzer::new(&self.root, &self.aliases, &self.known_files);
        let cache = self.cache.as_ref();
        let resolution = self.resolution;
        let batch_size = self.config.batch_size.max(1);

        let results: Vec<Option<(FileNode, bool)>> = pool.install(|| {
            files
                .par_chunks(batch_size)
                .map(|batch| {
                    batch
                        .iter()
                        .map(|path| analyze_cached(path, &analyzer, cache, resolution))
                        .collect::<Vec<_>>()
                })
                .collect::<Vec<_>>()
                .into_iter()
                .flatten()
                .collect()
        });

        let mut graph = DependencyGraph::new(&self.root);
        let mut cache_hits = 0usize;
        let mut skipped = 0usize;
        for result in results {
            match result {
                Some((node, from_cache)) => {
                    if from_cache {
                        cache_hits += 1;
                    }
                    graph.add_node(node);
                }
                None => skipped += 1,
            }
        }
        self.graph = graph;

        info!(
            "Analyzed {} files in {:.2}s (cache hits: {}, skipped: {})",
            self.graph.len(),
            started.elapsed().as_secs_f64(),
            cache_hits,
            skipped
        );

        Ok(&self.graph)
    }

    /// Apply one settled change event to the graph.
    ///
    /// Returns whether the graph was touched.
    pub fn apply_change(&mut self, change: &FileChange) -> bool {
        let path = self.identity(change.path());
        if path.strip_prefix(&self.root).is_err() {
            debug!("Ignoring change outside the project: {}", path.display());
            return false;
        }
        if !is_source_file(&path) || is_excluded_path(&self.root, &path) {
            return false;
        }

        match change {
            FileChange::Deleted(_) => {
                if self.known_files.remove(&path) {
                    self.refresh_resolution();
                }
                if let Some(cache) = &self.cache {
                    cache.invalidate(&path);
                }
                if !self.graph.contains(&path) {
                    return false;
                }
                self.graph.remove_node(&path);
                debug!("Removed {}", path.display());
                true
            }
            FileChange::Created(_) | FileChange::Modified(_) => {
                let newly_known = self.known_files.insert(path.clone());
                let analyzer = FileAnalyzer::new(&self.root, &self.aliases, &self.known_files);
                let Some(node) = analyzer.analyze_file(&path) else {
                    if newly_known {
                        self.known_files.remove(&path);
                    }
                    return false;
                };
                if newly_known {
                    self.refresh_resolution();
                }
                if let Some(cache) = &self.cache {
                    if let Err(err) = cache.store(&path, &node, self.resolution) {
                        debug!("Failed to cache {}: {}", path.display(), err);
                    }
                }
                self.graph.add_node(node);
                debug!("Re-analyzed {}", path.display());
                true
            }
        }
    }

    /// Apply a debounced batch, one node operation per change.
    ///
    /// Returns how many changes touched the graph.
    pub fn apply_changes<I>(&mut self, changes: I) -> usize
    where
        I: IntoIterator<Item = FileChange>,
    {
        let started = Instant::now();
        let applied = changes
            .into_iter()
            .filter(|change| self.apply_change(change))
            .count();
        if applied > 0 {
            info!(
                "Applied {} changes in {:.1}ms",
                applied,
                started.elapsed().as_secs_f64() * 1000.0
            );
        }
        applied
    }

    fn refresh_resolution(&mut self) {
        self.resolution = resolution_fingerprint(&self.known_files, &self.aliases);
    }
}

/// Analyze one file, reusing the cached node when it is still valid.
fn analyze_cached(
    path: &Path,
    analyzer: &FileAnalyzer<'_>,
    cache: Option<&AnalysisCache>,
    resolution: u64,
) -> Option<(FileNode, bool)> {
    if let Some(cache) = cache {
        match cache.needs_update(path, resolution) {
            Ok(false) => {
                if let Some(node) = cache.get(path) {
                    return Some((node, true));
                }
            }
            Ok(true) => {}
            Err(err) => debug!(
                "Failed to validate cache entry for {}: {}",
                path.display(),
                err
            ),
        }
    }

    let node = analyzer.analyze_file(path)?;

    if let Some(cache) = cache {
        if let Err(err) = cache.store(path, &node, resolution) {
            debug!("Failed to cache {}: {}", path.display(), err);
        }
    }

    Some((node, false))
}
