//! # RIPPLE
//!
//! Fast import-graph extraction and blast-radius analysis for JavaScript and
//! TypeScript codebases.
//!
//! RIPPLE reads source files as plain text, pulls out their `import` and
//! `export` statements without a compiler front-end, resolves specifiers
//! through `tsconfig` path aliases and workspace package names, and keeps a
//! file-level dependency graph that can be patched one file at a time.
//!
//! ## Queries
//!
//! - **Impact**: direct and transitive dependents of a file, plus its
//!   heavily shared exports
//! - **Cycles**: circular import chains, each reported once
//! - **Summary**: orphans, god modules, high-impact files and depth
//! - **Find**: substring search over known files
//!
//! ## Supported Extensions
//!
//! `.ts`, `.tsx`, `.js`, `.jsx`, `.mjs`, `.cjs`, `.mts`, `.cts`

pub mod core;
pub mod formatters;
pub mod parsers;
pub mod watch;
