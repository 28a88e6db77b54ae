pub mod aliases;
pub mod algorithms;
pub mod analyzer;
pub mod graph;
pub mod resolver;
pub mod scanner;

pub use algorithms::{CircularDependency, DepthInfo, GraphSummary, ImpactAnalysis, RankedFile};
pub use analyzer::{AnalyzerConfig, CodebaseAnalyzer};
pub use graph::{
    DependencyGraph, ExportInfo, ExportKind, FileMatch, FileNode, GraphSnapshot, ImportEdge,
};
pub use resolver::{AliasTable, ModuleResolver};
pub use scanner::FileScanner;
