use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

pub const SNAPSHOT_VERSION: &str = "1.0";

/// Kind of an exported symbol.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Copy)]
#[serde(rename_all = "lowercase")]
pub enum ExportKind {
    Function,
    Class,
    Interface,
    Type,
    Variable,
    Enum,
    Namespace,
    Unknown,
}

/// One use of a module specifier inside a file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImportEdge {
    pub source: PathBuf,
    /// Resolved identity of the imported file, `None` when unresolved.
    pub target: Option<PathBuf>,
    pub specifier: String,
    /// Imported symbol names. Renamed named imports keep their source name.
    pub symbols: Vec<String>,
    pub is_type_only: bool,
    pub is_dynamic: bool,
    pub line: usize,
}

/// One exported symbol. Default exports are named `"default"` and
/// re-export-all entries `"*"`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExportInfo {
    pub name: String,
    pub kind: ExportKind,
    pub line: usize,
    pub is_reexport: bool,
    /// Raw specifier a re-export comes from. Never resolved here.
    pub source: Option<String>,
}

/// One analyzed file. Immutable; a change produces a replacement node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileNode {
    pub path: PathBuf,
    pub relative_path: PathBuf,
    pub imports: Vec<ImportEdge>,
    pub exports: Vec<ExportInfo>,
    /// Milliseconds since the Unix epoch.
    pub last_modified: u64,
    pub hash: String,
    pub size: u64,
    pub line_count: usize,
}

impl FileNode {
    pub fn export_names(&self) -> Vec<String> {
        self.exports.iter().map(|export| export.name.clone()).collect()
    }
}

/// Result of a substring lookup over known files.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileMatch {
    pub path: PathBuf,
    pub relative_path: PathBuf,
    pub dependent_count: usize,
    pub exports: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotNode {
    #[serde(flatten)]
    pub node: FileNode,
    pub dependent_count: usize,
    pub dependency_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SnapshotEdge {
    pub source: PathBuf,
    pub target: PathBuf,
}

/// Plain projection of the graph for transports and persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphSnapshot {
    pub version: String,
    pub root: PathBuf,
    pub last_updated: u64,
    pub nodes: Vec<SnapshotNode>,
    pub edges: Vec<SnapshotEdge>,
}

impl GraphSnapshot {
    /// Rebuild a live graph by replaying every node through `add_node`.
    pub fn into_graph(self) -> DependencyGraph {
        let mut graph = DependencyGraph::new(self.root);
        for entry in self.nodes {
            graph.add_node(entry.node);
        }
        graph
    }
}

/// In-memory file dependency graph with forward and reverse adjacency.
///
/// For every `a` in `dependencies[b]`, `b` is in `dependents[a]`. Adjacency
/// maps may hold keys for files that were referenced but never analyzed.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    root: PathBuf,
    nodes: BTreeMap<PathBuf, FileNode>,
    dependents: BTreeMap<PathBuf, BTreeSet<PathBuf>>,
    dependencies: BTreeMap<PathBuf, BTreeSet<PathBuf>>,
    last_updated: u64,
}

impl DependencyGraph {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            last_updated: now_millis(),
            ..Self::default()
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn last_updated(&self) -> u64 {
        self.last_updated
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.nodes.contains_key(path)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &FileNode> {
        self.nodes.values()
    }

    pub fn get_node(&self, path: &Path) -> Option<&FileNode> {
        self.nodes.get(path)
    }

    /// Files that import `path`. `None` if the identity was never seen.
    pub fn dependents_of(&self, path: &Path) -> Option<&BTreeSet<PathBuf>> {
        self.dependents.get(path)
    }

    /// Files `path` imports. `None` if the identity was never seen.
    pub fn dependencies_of(&self, path: &Path) -> Option<&BTreeSet<PathBuf>> {
        self.dependencies.get(path)
    }

    pub(crate) fn dependent_count(&self, path: &Path) -> usize {
        self.dependents.get(path).map_or(0, BTreeSet::len)
    }

    pub(crate) fn dependency_sets(&self) -> impl Iterator<Item = &BTreeSet<PathBuf>> {
        self.dependencies.values()
    }

    /// Insert or replace a node, keeping both adjacency maps symmetric.
    pub fn add_node(&mut self, node: FileNode) {
        let id = node.path.clone();

        if self.nodes.contains_key(&id) {
            self.retract_outgoing(&id);
        }

        let targets: BTreeSet<PathBuf> = node
            .imports
            .iter()
            .filter_map(|edge| edge.target.clone())
            .collect();

        for target in &targets {
            self.dependents
                .entry(target.clone())
                .or_default()
                .insert(id.clone());
            self.dependencies.entry(target.clone()).or_default();
        }

        self.dependents.entry(id.clone()).or_default();
        self.dependencies.insert(id.clone(), targets);
        self.nodes.insert(id, node);
        self.touch();
    }

    /// Drop a node and every adjacency entry it participates in.
    ///
    /// Former dependents keep their own `ImportEdge` lists untouched until
    /// they are re-analyzed; only the adjacency sets are updated here.
    pub fn remove_node(&mut self, path: &Path) {
        if self.nodes.remove(path).is_none() {
            return;
        }

        self.retract_outgoing(path);

        let incoming = self.dependents.remove(path).unwrap_or_default();
        for dependent in &incoming {
            if let Some(deps) = self.dependencies.get_mut(dependent) {
                deps.remove(path);
            }
        }

        self.touch();
    }

    /// Remove `path` from the dependents set of everything it imports and
    /// clear its own dependency entry.
    fn retract_outgoing(&mut self, path: &Path) {
        let outgoing = self.dependencies.remove(path).unwrap_or_default();
        for target in &outgoing {
            if let Some(set) = self.dependents.get_mut(target) {
                set.remove(path);
            }
        }
    }

    fn touch(&mut self) {
        self.last_updated = now_millis();
    }

    /// Deterministic, read-only projection of the whole graph.
    pub fn serialize(&self) -> GraphSnapshot {
        let nodes = self
            .nodes
            .values()
            .map(|node| SnapshotNode {
                node: node.clone(),
                dependent_count: self.dependent_count(&node.path),
                dependency_count: self.dependencies.get(&node.path).map_or(0, BTreeSet::len),
            })
            .collect();

        let mut edges = Vec::new();
        for (source, targets) in &self.dependencies {
            if !self.nodes.contains_key(source) {
                continue;
            }
            for target in targets.iter().filter(|t| self.nodes.contains_key(*t)) {
                edges.push(SnapshotEdge {
                    source: source.clone(),
                    target: target.clone(),
                });
            }
        }

        GraphSnapshot {
            version: SNAPSHOT_VERSION.to_string(),
            root: self.root.clone(),
            last_updated: self.last_updated,
            nodes,
            edges,
        }
    }

    /// Files whose identity or relative path contains `query`.
    pub fn find(&self, query: &str) -> Vec<FileMatch> {
        self.nodes
            .values()
            .filter(|node| {
                node.path.to_string_lossy().contains(query)
                    || node.relative_path.to_string_lossy().contains(query)
            })
            .map(|node| FileMatch {
                path: node.path.clone(),
                relative_path: node.relative_path.clone(),
                dependent_count: self.dependent_count(&node.path),
                exports: node.export_names(),
            })
            .collect()
    }
}

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}
