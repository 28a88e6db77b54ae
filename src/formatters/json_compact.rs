use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;

use crate::core::graph::{DependencyGraph, GraphSnapshot, SNAPSHOT_VERSION};

/// Persists [`DependencyGraph::serialize`] snapshots as JSON.
pub struct JsonCompactFormatter {
    /// Single-line output; indented when false
    minimal: bool,
}

impl JsonCompactFormatter {
    pub fn new() -> Self {
        Self { minimal: true }
    }

    pub fn pretty() -> Self {
        Self { minimal: false }
    }

    pub fn format_to_file(&self, graph: &DependencyGraph, output_path: &Path) -> Result<()> {
        let json_content = self.format_graph(graph)?;
        if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(output_path, json_content)
            .with_context(|| format!("Failed to write snapshot {}", output_path.display()))?;
        Ok(())
    }

    pub fn format_graph(&self, graph: &DependencyGraph) -> Result<String> {
        let snapshot = graph.serialize();
        let json = if self.minimal {
            serde_json::to_string(&snapshot)?
        } else {
            serde_json::to_string_pretty(&snapshot)?
        };
        Ok(json)
    }

    /// Read a snapshot written by [`format_to_file`](Self::format_to_file).
    pub fn load_from_file(path: &Path) -> Result<GraphSnapshot> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
        let snapshot: GraphSnapshot = serde_json::from_str(&raw)
            .with_context(|| format!("Malformed snapshot {}", path.display()))?;
        if snapshot.version != SNAPSHOT_VERSION {
            bail!(
                "Unsupported snapshot version {} (expected {})",
                snapshot.version,
                SNAPSHOT_VERSION
            );
        }
        Ok(snapshot)
    }
}

impl Default for JsonCompactFormatter {
    fn default() -> Self {
        Self::new()
    }
}
