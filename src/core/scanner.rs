use anyhow::Result;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

use super::resolver::SCRIPT_EXTENSIONS;

/// Build, dependency and tool-output directories never descended into.
pub const EXCLUDED_DIRS: &[&str] = &[
    "node_modules",
    "dist",
    "build",
    "out",
    "coverage",
    ".git",
    ".next",
    ".turbo",
    ".cache",
    "target",
];

pub struct FileScanner;

impl Default for FileScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl FileScanner {
    pub fn new() -> Self {
        Self
    }

    /// Every script file under `root_path`, sorted by path.
    pub fn scan_directory(&self, root_path: &Path) -> Result<Vec<PathBuf>> {
        // Collect all entries first for parallel processing
        let entries: Vec<DirEntry> = WalkDir::new(root_path)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_excluded_dir(entry))
            .filter_map(|e| e.ok())
            .filter(|entry| entry.file_type().is_file())
            .collect();

        let mut files: Vec<PathBuf> = entries
            .par_iter()
            .filter(|entry| is_source_file(entry.path()))
            .map(|entry| entry.path().to_path_buf())
            .collect();

        files.sort();
        Ok(files)
    }
}

/// Whether `path` carries one of the script extensions.
pub fn is_source_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| SCRIPT_EXTENSIONS.contains(&ext))
        .unwrap_or(false)
}

/// Whether any component of `path` below `root` is an excluded or hidden directory.
pub fn is_excluded_path(root: &Path, path: &Path) -> bool {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let mut components: Vec<_> = relative.components().collect();
    components.pop();
    components.iter().any(|component| {
        component
            .as_os_str()
            .to_str()
            .map(is_excluded_name)
            .unwrap_or(false)
    })
}

fn is_excluded_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .map(is_excluded_name)
            .unwrap_or(false)
}

fn is_excluded_name(name: &str) -> bool {
    EXCLUDED_DIRS.contains(&name) || (name.starts_with('.') && name != "." && name != "..")
}
