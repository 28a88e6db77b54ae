pub mod cache;
pub mod exports;
pub mod imports;
pub mod lexer;

use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::debug;

use crate::core::graph::FileNode;
use crate::core::resolver::{AliasTable, ModuleResolver};
use lexer::LineIndex;

/// Length of the hex content fingerprint stored on each node.
pub const HASH_LEN: usize = 16;

/// Filesystem facts about a file, gathered alongside its content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileMeta {
    /// Milliseconds since the Unix epoch.
    pub last_modified: u64,
    /// Size reported by the filesystem; content length is used when absent.
    pub size: Option<u64>,
}

/// Turns one file's text into a [`FileNode`].
///
/// Holds only shared, read-only state, so a single analyzer can serve every
/// worker in a pool.
pub struct FileAnalyzer<'a> {
    project_root: &'a Path,
    resolver: ModuleResolver<'a>,
}

impl<'a> FileAnalyzer<'a> {
    pub fn new(
        project_root: &'a Path,
        aliases: &'a AliasTable,
        known_files: &'a HashSet<PathBuf>,
    ) -> Self {
        Self {
            project_root,
            resolver: ModuleResolver::new(aliases, known_files),
        }
    }

    /// Read and analyze `path`. `None` means the file could not be read and
    /// must not be inserted into the graph.
    pub fn analyze_file(&self, path: &Path) -> Option<FileNode> {
        match read_source(path) {
            Ok((content, meta)) => Some(self.analyze_source(path, &content, meta)),
            Err(err) => {
                debug!("Skipping unreadable {}: {}", path.display(), err);
                None
            }
        }
    }

    pub fn analyze_source(&self, path: &Path, content: &str, meta: FileMeta) -> FileNode {
        let stripped = lexer::strip_source(content);
        let lines = LineIndex::new(content);

        let raw_imports = imports::extract_imports(&stripped, content);
        let imports = imports::resolve_imports(raw_imports, path, &lines, &self.resolver);
        let exports = exports::extract_exports(&stripped, content, &lines);

        FileNode {
            path: path.to_path_buf(),
            relative_path: path
                .strip_prefix(self.project_root)
                .unwrap_or(path)
                .to_path_buf(),
            imports,
            exports,
            last_modified: meta.last_modified,
            hash: content_hash(content),
            size: meta.size.unwrap_or(content.len() as u64),
            line_count: content.bytes().filter(|b| *b == b'\n').count() + 1,
        }
    }
}

/// Truncated SHA-256 of `content`, used only to detect changes.
pub fn content_hash(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    digest
        .iter()
        .take(HASH_LEN / 2)
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

/// Buffered read with size and mtime taken from the same open handle.
fn read_source(path: &Path) -> std::io::Result<(String, FileMeta)> {
    let file = File::open(path)?;
    let metadata = file.metadata()?;
    let size = metadata.len();
    let last_modified = metadata
        .modified()
        .ok()
        .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default();

    let mut reader = BufReader::with_capacity((size as usize).clamp(1, 8192), file);
    let mut bytes = Vec::with_capacity(size as usize);
    reader.read_to_end(&mut bytes)?;

    let content = match String::from_utf8(bytes) {
        Ok(content) => content,
        Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
    };

    Ok((
        content,
        FileMeta {
            last_modified,
            size: Some(size),
        },
    ))
}
