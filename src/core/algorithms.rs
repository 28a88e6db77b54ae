//! Read-only analyses over a [`DependencyGraph`].
//!
//! Traversals use explicit stacks rather than recursion so deep import chains
//! cannot overflow the thread stack.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet, VecDeque};
use std::path::{Path, PathBuf};

use super::graph::DependencyGraph;

/// An export is critical when more than this many direct dependents use it.
pub const CRITICAL_EXPORT_THRESHOLD: usize = 3;
/// Minimum dependent count for a god module.
pub const GOD_MODULE_THRESHOLD: usize = 20;
/// Minimum total affected count for a high-impact file.
pub const HIGH_IMPACT_THRESHOLD: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImpactAnalysis {
    pub file: PathBuf,
    pub direct_dependents: Vec<PathBuf>,
    /// Everything reachable through dependents, minus the direct set.
    pub transitive_dependents: Vec<PathBuf>,
    pub total_affected: usize,
    pub critical_exports: Vec<String>,
}

/// A cycle as walked, closing node repeated at the end.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CircularDependency {
    pub files: Vec<PathBuf>,
}

impl CircularDependency {
    /// Number of distinct files in the cycle.
    pub fn len(&self) -> usize {
        self.files.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    fn key(&self) -> String {
        let unique: BTreeSet<String> = self
            .files
            .iter()
            .map(|file| file.to_string_lossy().into_owned())
            .collect();
        unique.into_iter().collect::<Vec<_>>().join("|")
    }
}

/// Longest dependency chain. `depth` counts edges, `path` lists the files.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DepthInfo {
    pub depth: usize,
    pub path: Vec<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RankedFile {
    pub path: PathBuf,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GraphSummary {
    pub total_files: usize,
    pub total_edges: usize,
    pub avg_dependents: f64,
    pub max_dependents: usize,
    pub max_dependents_file: Option<PathBuf>,
    /// Half of `max_depth`; a cheap proxy, not a mean over all chains.
    pub avg_depth: f64,
    pub max_depth: usize,
    pub max_depth_path: Vec<PathBuf>,
    pub orphan_files: Vec<PathBuf>,
    pub god_modules: Vec<RankedFile>,
    pub high_impact_files: Vec<RankedFile>,
    pub circular_dependencies: Vec<CircularDependency>,
}

struct Frame<'a> {
    node: &'a Path,
    deps: Vec<&'a Path>,
    next: usize,
}

impl<'a> Frame<'a> {
    fn advance(&mut self) -> Option<&'a Path> {
        let dep = self.deps.get(self.next).copied();
        self.next += 1;
        dep
    }
}

impl DependencyGraph {
    /// Dependencies of `path` that are themselves analyzed nodes.
    fn known_dependencies(&self, path: &Path) -> Vec<&Path> {
        self.dependencies_of(path)
            .into_iter()
            .flatten()
            .map(PathBuf::as_path)
            .filter(|dep| self.contains(dep))
            .collect()
    }

    /// Direct and transitive dependents of an analyzed file.
    pub fn get_impact(&self, path: &Path) -> Option<ImpactAnalysis> {
        let node = self.get_node(path)?;

        let direct: Vec<PathBuf> = self
            .dependents_of(path)
            .into_iter()
            .flatten()
            .filter(|dependent| dependent.as_path() != path)
            .cloned()
            .collect();

        let mut seen: HashSet<&Path> = HashSet::with_capacity(direct.len() + 1);
        seen.insert(path);
        seen.extend(direct.iter().map(PathBuf::as_path));

        let mut queue: VecDeque<&Path> = direct.iter().map(PathBuf::as_path).collect();
        let mut transitive = Vec::new();

        while let Some(current) = queue.pop_front() {
            for next in self.dependents_of(current).into_iter().flatten() {
                if seen.insert(next.as_path()) {
                    transitive.push(next.clone());
                    queue.push_back(next.as_path());
                }
            }
        }

        let critical_exports = node
            .exports
            .iter()
            .filter(|export| {
                let users = direct
                    .iter()
                    .filter_map(|dependent| self.get_node(dependent))
                    .filter(|dependent| {
                        dependent.imports.iter().any(|edge| {
                            edge.target.as_deref() == Some(path)
                                && edge.symbols.iter().any(|symbol| *symbol == export.name)
                        })
                    })
                    .count();
                users > CRITICAL_EXPORT_THRESHOLD
            })
            .map(|export| export.name.clone())
            .collect();

        Some(ImpactAnalysis {
            file: path.to_path_buf(),
            total_affected: direct.len() + transitive.len(),
            direct_dependents: direct,
            transitive_dependents: transitive,
            critical_exports,
        })
    }

    /// Every distinct import cycle among analyzed files.
    pub fn detect_circular_dependencies(&self) -> Vec<CircularDependency> {
        let mut visited: HashSet<&Path> = HashSet::new();
        let mut on_stack: HashSet<&Path> = HashSet::new();
        let mut keys: HashSet<String> = HashSet::new();
        let mut cycles = Vec::new();

        for root in self.nodes().map(|node| node.path.as_path()) {
            if visited.contains(root) {
                continue;
            }

            let mut path: Vec<&Path> = vec![root];
            let mut stack = vec![Frame {
                node: root,
                deps: self.known_dependencies(root),
                next: 0,
            }];
            visited.insert(root);
            on_stack.insert(root);

            loop {
                let step = match stack.last_mut() {
                    Some(frame) => frame.advance(),
                    None => break,
                };

                match step {
                    Some(dep) if !visited.contains(dep) => {
                        visited.insert(dep);
                        on_stack.insert(dep);
                        path.push(dep);
                        stack.push(Frame {
                            node: dep,
                            deps: self.known_dependencies(dep),
                            next: 0,
                        });
                    }
                    Some(dep) if on_stack.contains(dep) => {
                        let start = path.iter().position(|p| *p == dep).unwrap_or(0);
                        let mut files: Vec<PathBuf> =
                            path[start..].iter().map(|p| p.to_path_buf()).collect();
                        files.push(dep.to_path_buf());
                        let cycle = CircularDependency { files };
                        if keys.insert(cycle.key()) {
                            cycles.push(cycle);
                        }
                    }
                    Some(_) => {}
                    None => {
                        if let Some(frame) = stack.pop() {
                            on_stack.remove(frame.node);
                            path.pop();
                        }
                    }
                }
            }
        }

        cycles
    }

    /// Longest simple dependency chain starting from any analyzed file.
    ///
    /// Only nodes on the current path are excluded, so a file can appear at
    /// different depths under different roots. Worst case is exponential on
    /// dense graphs.
    pub fn max_depth(&self) -> DepthInfo {
        let mut best = DepthInfo::default();

        for root in self.nodes().map(|node| node.path.as_path()) {
            let mut path: Vec<&Path> = vec![root];
            let mut on_path: HashSet<&Path> = HashSet::from([root]);
            let mut stack = vec![Frame {
                node: root,
                deps: self.known_dependencies(root),
                next: 0,
            }];

            if best.path.is_empty() {
                best.path = vec![root.to_path_buf()];
            }

            loop {
                let step = match stack.last_mut() {
                    Some(frame) => frame.advance(),
                    None => break,
                };

                match step {
                    Some(dep) if !on_path.contains(dep) => {
                        on_path.insert(dep);
                        path.push(dep);
                        stack.push(Frame {
                            node: dep,
                            deps: self.known_dependencies(dep),
                            next: 0,
                        });
                        if path.len() - 1 > best.depth {
                            best = DepthInfo {
                                depth: path.len() - 1,
                                path: path.iter().map(|p| p.to_path_buf()).collect(),
                            };
                        }
                    }
                    Some(_) => {}
                    None => {
                        if let Some(frame) = stack.pop() {
                            on_path.remove(frame.node);
                            path.pop();
                        }
                    }
                }
            }
        }

        best
    }

    /// Aggregate health statistics for the whole graph.
    pub fn get_summary(&self) -> GraphSummary {
        let total_files = self.len();
        let total_edges = self.dependency_sets().map(BTreeSet::len).sum();

        let mut total_dependents = 0usize;
        let mut max_dependents = 0usize;
        let mut max_dependents_file = None;
        let mut orphan_files = Vec::new();
        let mut god_modules = Vec::new();
        let mut high_impact_files = Vec::new();

        for node in self.nodes() {
            let count = self.dependent_count(&node.path);
            total_dependents += count;

            if count > max_dependents || max_dependents_file.is_none() {
                max_dependents = count;
                max_dependents_file = Some(node.path.clone());
            }
            if count == 0 {
                orphan_files.push(node.path.clone());
            }
            if count >= GOD_MODULE_THRESHOLD {
                god_modules.push(RankedFile {
                    path: node.path.clone(),
                    count,
                });
            }
            if let Some(impact) = self.get_impact(&node.path) {
                if impact.total_affected >= HIGH_IMPACT_THRESHOLD {
                    high_impact_files.push(RankedFile {
                        path: node.path.clone(),
                        count: impact.total_affected,
                    });
                }
            }
        }

        sort_ranked(&mut god_modules);
        sort_ranked(&mut high_impact_files);

        let depth = self.max_depth();
        let avg_dependents = if total_files == 0 {
            0.0
        } else {
            total_dependents as f64 / total_files as f64
        };

        GraphSummary {
            total_files,
            total_edges,
            avg_dependents,
            max_dependents,
            max_dependents_file,
            avg_depth: depth.depth as f64 / 2.0,
            max_depth: depth.depth,
            max_depth_path: depth.path,
            orphan_files,
            god_modules,
            high_impact_files,
            circular_dependencies: self.detect_circular_dependencies(),
        }
    }
}

fn sort_ranked(files: &mut [RankedFile]) {
    files.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.path.cmp(&b.path)));
}
