//! Builds an [`AliasTable`] from a project's `tsconfig.json` (or
//! `jsconfig.json`) and its workspace `package.json` files.
//!
//! Broken or missing configuration never fails the load; the affected input
//! is skipped with a warning and defaults stand in for it.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::resolver::{normalize_path, AliasTable};
use crate::parsers::lexer::strip_comments;

const CONFIG_FILES: &[&str] = &["tsconfig.json", "jsconfig.json"];

/// Entry files tried for a workspace package before its declared
/// `types`/`module`/`main`, which in turn precede `FALLBACK_ENTRIES`.
const ENTRY_CANDIDATES: &[&str] = &["src/index.ts", "src/index.tsx", "index.ts", "index.tsx"];
const FALLBACK_ENTRIES: &[&str] = &["src/index.js", "index.js"];

static TRAILING_COMMA_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r",(\s*[}\]])").unwrap());

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TsConfig {
    #[serde(default)]
    compiler_options: CompilerOptions,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompilerOptions {
    base_url: Option<String>,
    #[serde(default)]
    paths: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Workspaces {
    List(Vec<String>),
    Object {
        #[serde(default)]
        packages: Vec<String>,
    },
}

#[derive(Debug, Default, Deserialize)]
struct PackageJson {
    name: Option<String>,
    types: Option<String>,
    module: Option<String>,
    main: Option<String>,
    workspaces: Option<Workspaces>,
}

/// Load the alias table for `project_root`, falling back to defaults.
pub fn load_alias_table(project_root: &Path) -> AliasTable {
    let mut table = AliasTable::new(project_root);
    apply_compiler_options(project_root, &mut table);
    apply_workspaces(project_root, &mut table);
    debug!(
        base_url = %table.base_url.display(),
        aliases = table.len(),
        "loaded alias table"
    );
    table
}

/// Parse JSON that may carry comments and trailing commas.
pub fn parse_jsonc<T: for<'de> Deserialize<'de>>(raw: &str) -> serde_json::Result<T> {
    let without_comments = strip_comments(raw);
    let sanitized = TRAILING_COMMA_RE.replace_all(&without_comments, "$1");
    serde_json::from_str(&sanitized)
}

fn read_jsonc<T: for<'de> Deserialize<'de>>(path: &Path) -> Option<T> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) => {
            if path.exists() {
                warn!("Failed to read {}: {}", path.display(), err);
            }
            return None;
        }
    };

    match parse_jsonc(&raw) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!("Ignoring malformed {}: {}", path.display(), err);
            None
        }
    }
}

fn apply_compiler_options(project_root: &Path, table: &mut AliasTable) {
    let Some((config_path, config)) = CONFIG_FILES.iter().find_map(|name| {
        let path = project_root.join(name);
        read_jsonc::<TsConfig>(&path).map(|config| (path, config))
    }) else {
        return;
    };

    let config_dir = config_path.parent().unwrap_or(project_root);
    let options = config.compiler_options;

    let paths_root = match &options.base_url {
        Some(base_url) => {
            let base = normalize_path(&config_dir.join(base_url));
            table.base_url = base.clone();
            base
        }
        None => config_dir.to_path_buf(),
    };

    for (pattern, targets) in &options.paths {
        let Some(targets) = targets.as_array() else {
            warn!("Ignoring non-array paths entry '{}'", pattern);
            continue;
        };

        let roots: Vec<PathBuf> = targets
            .iter()
            .filter_map(|target| target.as_str())
            .map(|target| strip_star_target(&paths_root, target))
            .collect();

        if !roots.is_empty() {
            table.push(pattern.clone(), roots);
        }
    }
}

/// `./src/*` under `/p` becomes `/p/src`.
fn strip_star_target(root: &Path, target: &str) -> PathBuf {
    let target = target.strip_suffix('*').unwrap_or(target);
    normalize_path(&root.join(target))
}

fn apply_workspaces(project_root: &Path, table: &mut AliasTable) {
    let Some(manifest) = read_jsonc::<PackageJson>(&project_root.join("package.json")) else {
        return;
    };

    let patterns = match manifest.workspaces {
        Some(Workspaces::List(patterns)) => patterns,
        Some(Workspaces::Object { packages }) => packages,
        None => return,
    };

    for package_dir in expand_workspace_patterns(project_root, &patterns) {
        let Some(package) = read_jsonc::<PackageJson>(&package_dir.join("package.json")) else {
            continue;
        };
        let Some(name) = package.name.clone() else {
            continue;
        };

        let entry = package_entry(&package_dir, &package);
        debug!(package = %name, entry = %entry.display(), "registered workspace package");
        table.push(name.clone(), vec![entry]);
        table.push(format!("{name}/*"), vec![package_dir]);
    }
}

fn expand_workspace_patterns(project_root: &Path, patterns: &[String]) -> Vec<PathBuf> {
    let mut dirs = Vec::new();

    for pattern in patterns {
        let trimmed = pattern.trim_start_matches("./");
        let parent = trimmed
            .strip_suffix("/**")
            .or_else(|| trimmed.strip_suffix("/*"));

        match parent {
            Some(parent) => {
                let parent_dir = project_root.join(parent);
                let Ok(entries) = fs::read_dir(&parent_dir) else {
                    continue;
                };
                let mut children: Vec<PathBuf> = entries
                    .filter_map(|entry| entry.ok())
                    .map(|entry| entry.path())
                    .filter(|path| path.is_dir())
                    .collect();
                children.sort();
                dirs.extend(children);
            }
            None => {
                let dir = project_root.join(trimmed);
                if dir.is_dir() {
                    dirs.push(dir);
                }
            }
        }
    }

    dirs
}

fn package_entry(package_dir: &Path, package: &PackageJson) -> PathBuf {
    let declared = [&package.types, &package.module, &package.main];

    ENTRY_CANDIDATES
        .iter()
        .map(|candidate| package_dir.join(candidate))
        .chain(
            declared
                .into_iter()
                .flatten()
                .map(|declared| normalize_path(&package_dir.join(declared))),
        )
        .chain(FALLBACK_ENTRIES.iter().map(|candidate| package_dir.join(candidate)))
        .find(|candidate| candidate.is_file())
        .unwrap_or_else(|| package_dir.to_path_buf())
}
