use anyhow::Result;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::warn;

use crate::core::graph::FileNode;

const DEFAULT_MAX_MEMORY_ENTRIES: usize = 10_000;

/// Cached analysis of one file, stamped with what it was computed from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedNode {
    pub node: FileNode,
    pub timestamp: u64,
    pub file_size: u64,
    /// Fingerprint of the known-files set and alias table in force when the
    /// node was analyzed. Resolved targets are only valid under the same one.
    pub resolution: u64,
}

/// Thread-safe cache of analyzed files with memory and (best-effort) disk
/// storage.
pub struct AnalysisCache {
    memory_cache: DashMap<PathBuf, CachedNode>,
    cache_dir: Option<PathBuf>,
    max_memory_entries: usize,
}

impl AnalysisCache {
    pub fn new(cache_dir: Option<PathBuf>) -> Result<Self> {
        let resolved_dir = cache_dir.unwrap_or_else(|| std::env::temp_dir().join("ripple_cache"));
        let cache_dir = match fs::create_dir_all(&resolved_dir) {
            Ok(()) => Some(resolved_dir),
            Err(err) => {
                warn!(
                    "Failed to initialize disk cache at {}: {err}",
                    resolved_dir.display()
                );
                None
            }
        };

        Ok(Self {
            memory_cache: DashMap::with_capacity(DEFAULT_MAX_MEMORY_ENTRIES),
            cache_dir,
            max_memory_entries: DEFAULT_MAX_MEMORY_ENTRIES,
        })
    }

    /// Build an in-memory-only cache without touching the filesystem
    pub fn in_memory_only() -> Self {
        Self {
            memory_cache: DashMap::with_capacity(DEFAULT_MAX_MEMORY_ENTRIES),
            cache_dir: None,
            max_memory_entries: DEFAULT_MAX_MEMORY_ENTRIES,
        }
    }

    /// Check if a file needs re-analysis based on modification time, size and
    /// the resolution context.
    pub fn needs_update(&self, file_path: &Path, resolution: u64) -> Result<bool> {
        let (current_timestamp, current_size) = stamp(file_path)?;
        let is_stale = |entry: &CachedNode| {
            entry.timestamp != current_timestamp
                || entry.file_size != current_size
                || entry.resolution != resolution
        };

        if let Some(entry) = self.memory_cache.get(file_path) {
            return Ok(is_stale(entry.value()));
        }

        if let Some(cache_path) = self.cache_path(file_path) {
            if cache_path.exists() {
                if let Ok(entry) = self.load_from_disk(&cache_path) {
                    return Ok(is_stale(&entry));
                }
            }
        }

        Ok(true)
    }

    /// Get the cached node, promoting disk hits into memory.
    pub fn get(&self, file_path: &Path) -> Option<FileNode> {
        if let Some(entry) = self.memory_cache.get(file_path) {
            return Some(entry.node.clone());
        }

        let cache_path = self.cache_path(file_path)?;
        let entry = self.load_from_disk(&cache_path).ok()?;
        let node = entry.node.clone();

        if self.memory_cache.len() < self.max_memory_entries {
            self.memory_cache.insert(file_path.to_path_buf(), entry);
        }

        Some(node)
    }

    /// Store an analyzed node.
    pub fn store(&self, file_path: &Path, node: &FileNode, resolution: u64) -> Result<()> {
        let (timestamp, file_size) = stamp(file_path)?;

        let entry = CachedNode {
            node: node.clone(),
            timestamp,
            file_size,
            resolution,
        };

        if self.memory_cache.len() >= self.max_memory_entries {
            if let Some(entry) = self.memory_cache.iter().next() {
                let key = entry.key().clone();
                drop(entry);
                self.memory_cache.remove(&key);
            }
        }
        self.memory_cache
            .insert(file_path.to_path_buf(), entry.clone());

        if let Some(cache_path) = self.cache_path(file_path) {
            self.store_to_disk(&cache_path, &entry)?;
        }

        Ok(())
    }

    /// Forget a file, e.g. after it was deleted.
    pub fn invalidate(&self, file_path: &Path) {
        self.memory_cache.remove(file_path);
        if let Some(cache_path) = self.cache_path(file_path) {
            let _ = fs::remove_file(cache_path);
        }
    }

    pub fn len(&self) -> usize {
        self.memory_cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memory_cache.is_empty()
    }

    fn cache_path(&self, file_path: &Path) -> Option<PathBuf> {
        let cache_dir = self.cache_dir.as_ref()?;

        let mut hasher = DefaultHasher::new();
        file_path.hash(&mut hasher);
        let hash = hasher.finish();

        Some(cache_dir.join(format!("node_{:x}.bincode", hash)))
    }

    fn load_from_disk(&self, cache_path: &Path) -> Result<CachedNode> {
        let data = fs::read(cache_path)?;
        let entry: CachedNode = bincode::deserialize(&data)?;
        Ok(entry)
    }

    fn store_to_disk(&self, cache_path: &Path, entry: &CachedNode) -> Result<()> {
        let data = bincode::serialize(entry)?;
        fs::write(cache_path, data)?;
        Ok(())
    }
}

/// Modification time in milliseconds and size in bytes.
fn stamp(file_path: &Path) -> Result<(u64, u64)> {
    let metadata = fs::metadata(file_path)?;
    let timestamp = metadata
        .modified()?
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64;
    Ok((timestamp, metadata.len()))
}

/// Fingerprint of everything outside a file's own text that affects its
/// analysis: the known-files set and the alias table.
pub fn resolution_fingerprint<'a>(
    known_files: impl IntoIterator<Item = &'a PathBuf>,
    aliases: &crate::core::resolver::AliasTable,
) -> u64 {
    let mut files: Vec<&PathBuf> = known_files.into_iter().collect();
    files.sort();

    let mut hasher = DefaultHasher::new();
    files.hash(&mut hasher);
    aliases.hash(&mut hasher);
    hasher.finish()
}
