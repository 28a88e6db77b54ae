use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

/// Probe order when a specifier carries no usable extension.
pub const SCRIPT_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "mjs", "cjs", "mts", "cts"];

/// Source extensions to try in place of a compiled-JS extension, so that
/// `./util.js` written in TypeScript source resolves to `util.ts`.
fn source_extensions_for(ext: &str) -> &'static [&'static str] {
    match ext {
        "js" => &["ts", "tsx"],
        "jsx" => &["tsx"],
        "mjs" => &["mts"],
        "cjs" => &["cts"],
        _ => &[],
    }
}

/// One path mapping: a pattern (optionally ending in `*`) and the ordered
/// candidate roots it rewrites to, with any `*` already stripped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct AliasEntry {
    pub pattern: String,
    pub targets: Vec<PathBuf>,
}

/// Base URL plus ordered path mappings used for bare specifiers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct AliasTable {
    pub base_url: PathBuf,
    pub entries: Vec<AliasEntry>,
}

impl AliasTable {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            base_url: project_root.into(),
            entries: Vec::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<PathBuf>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn push(&mut self, pattern: impl Into<String>, targets: Vec<PathBuf>) {
        self.entries.push(AliasEntry {
            pattern: pattern.into(),
            targets,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Maps raw import specifiers to file identities.
///
/// Probing only consults the known-files set, never the filesystem, so
/// resolution is pure and can run on any worker thread.
pub struct ModuleResolver<'a> {
    aliases: &'a AliasTable,
    known_files: &'a HashSet<PathBuf>,
}

impl<'a> ModuleResolver<'a> {
    pub fn new(aliases: &'a AliasTable, known_files: &'a HashSet<PathBuf>) -> Self {
        Self {
            aliases,
            known_files,
        }
    }

    /// Resolve `specifier` as written in a file living in `from_dir`.
    ///
    /// Relative and absolute specifiers always produce a path, even when no
    /// known file matches. Bare specifiers produce `None` when neither the
    /// base URL nor any alias leads to a known file.
    pub fn resolve(&self, specifier: &str, from_dir: &Path) -> Option<PathBuf> {
        if specifier.is_empty() {
            return None;
        }

        if specifier.starts_with('.') || specifier.starts_with('/') {
            let base = normalize_path(&from_dir.join(specifier));
            return Some(self.probe(&base).unwrap_or(base));
        }

        let from_base_url = normalize_path(&self.aliases.base_url.join(specifier));
        if let Some(hit) = self.probe(&from_base_url) {
            return Some(hit);
        }

        for entry in &self.aliases.entries {
            let (prefix, wildcard) = match entry.pattern.strip_suffix('*') {
                Some(prefix) => (prefix, true),
                None => (entry.pattern.as_str(), false),
            };
            let Some(rest) = specifier.strip_prefix(prefix) else {
                continue;
            };

            for target in &entry.targets {
                let candidate = if rest.is_empty() {
                    target.clone()
                } else if wildcard {
                    // Targets are stored without the separator that preceded `*`.
                    normalize_path(&target.join(rest.trim_start_matches('/')))
                } else {
                    normalize_path(&concat_path(target, rest))
                };
                if let Some(hit) = self.probe(&candidate) {
                    return Some(hit);
                }
            }
        }

        None
    }

    /// Extension and index-file probing against the known-files set.
    pub fn probe(&self, base: &Path) -> Option<PathBuf> {
        if self.known_files.contains(base) {
            return Some(base.to_path_buf());
        }

        if let Some(ext) = base.extension().and_then(|ext| ext.to_str()) {
            for source_ext in source_extensions_for(ext) {
                let candidate = base.with_extension(source_ext);
                if self.known_files.contains(&candidate) {
                    return Some(candidate);
                }
            }
        }

        for ext in SCRIPT_EXTENSIONS {
            let candidate = append_extension(base, ext);
            if self.known_files.contains(&candidate) {
                return Some(candidate);
            }
        }

        for ext in SCRIPT_EXTENSIONS {
            let candidate = base.join(format!("index.{ext}"));
            if self.known_files.contains(&candidate) {
                return Some(candidate);
            }
        }

        None
    }
}

/// `base` followed by `rest` verbatim, so `/p/lib` + `/foo` is `/p/lib/foo`.
fn concat_path(base: &Path, rest: &str) -> PathBuf {
    let mut raw: OsString = base.as_os_str().to_os_string();
    raw.push(rest);
    PathBuf::from(raw)
}

fn append_extension(base: &Path, ext: &str) -> PathBuf {
    let mut raw: OsString = base.as_os_str().to_os_string();
    raw.push(".");
    raw.push(ext);
    PathBuf::from(raw)
}

/// Lexically collapse `.` and `..` without touching the filesystem.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known(paths: &[&str]) -> HashSet<PathBuf> {
        paths.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn normalizes_parent_and_current_components() {
        assert_eq!(
            normalize_path(Path::new("/p/src/a/../b/./c")),
            PathBuf::from("/p/src/b/c")
        );
        assert_eq!(normalize_path(Path::new("/../x")), PathBuf::from("/x"));
    }

    #[test]
    fn relative_specifier_probes_extensions() {
        let files = known(&["/p/src/b.ts"]);
        let aliases = AliasTable::new("/p");
        let resolver = ModuleResolver::new(&aliases, &files);
        assert_eq!(
            resolver.resolve("./b", Path::new("/p/src")),
            Some(PathBuf::from("/p/src/b.ts"))
        );
    }

    #[test]
    fn js_extension_maps_to_typescript_source() {
        let files = known(&["/p/src/util.ts", "/p/src/util.js.ts"]);
        let aliases = AliasTable::new("/p");
        let resolver = ModuleResolver::new(&aliases, &files);
        assert_eq!(
            resolver.resolve("./util.js", Path::new("/p/src")),
            Some(PathBuf::from("/p/src/util.ts"))
        );
    }

    #[test]
    fn directory_specifier_probes_index_files() {
        let files = known(&["/p/src/lib/index.tsx"]);
        let aliases = AliasTable::new("/p");
        let resolver = ModuleResolver::new(&aliases, &files);
        assert_eq!(
            resolver.resolve("../lib", Path::new("/p/src/app")),
            Some(PathBuf::from("/p/src/lib/index.tsx"))
        );
    }

    #[test]
    fn unmatched_relative_specifier_keeps_raw_path() {
        let files = known(&[]);
        let aliases = AliasTable::new("/p");
        let resolver = ModuleResolver::new(&aliases, &files);
        assert_eq!(
            resolver.resolve("./missing", Path::new("/p/src")),
            Some(PathBuf::from("/p/src/missing"))
        );
    }

    #[test]
    fn bare_specifier_uses_base_url_then_aliases() {
        let files = known(&["/p/src/utils/date.ts", "/p/src/components/button.tsx"]);
        let mut aliases = AliasTable::new("/p").with_base_url("/p/src");
        aliases.push("@/*", vec![PathBuf::from("/p/src/")]);
        let resolver = ModuleResolver::new(&aliases, &files);

        assert_eq!(
            resolver.resolve("utils/date", Path::new("/p/src/app")),
            Some(PathBuf::from("/p/src/utils/date.ts"))
        );
        assert_eq!(
            resolver.resolve("@/components/button", Path::new("/p/src/app")),
            Some(PathBuf::from("/p/src/components/button.tsx"))
        );
        assert_eq!(resolver.resolve("react", Path::new("/p/src/app")), None);
    }

    #[test]
    fn alias_targets_are_tried_in_order() {
        let files = known(&["/p/b/shared.ts"]);
        let mut aliases = AliasTable::new("/p");
        aliases.push(
            "~/*",
            vec![PathBuf::from("/p/a/"), PathBuf::from("/p/b/")],
        );
        let resolver = ModuleResolver::new(&aliases, &files);
        assert_eq!(
            resolver.resolve("~/shared", Path::new("/p")),
            Some(PathBuf::from("/p/b/shared.ts"))
        );
    }

    #[test]
    fn workspace_name_alias_points_at_entry_file() {
        let files = known(&["/p/packages/ui/src/index.ts"]);
        let mut aliases = AliasTable::new("/p");
        aliases.push(
            "@acme/ui",
            vec![PathBuf::from("/p/packages/ui/src/index.ts")],
        );
        let resolver = ModuleResolver::new(&aliases, &files);
        assert_eq!(
            resolver.resolve("@acme/ui", Path::new("/p/apps/web")),
            Some(PathBuf::from("/p/packages/ui/src/index.ts"))
        );
        assert_eq!(resolver.resolve("@acme/ui-kit", Path::new("/p")), None);
    }

    #[test]
    fn plain_alias_matches_as_prefix() {
        let files = known(&["/p/src/lib/foo.ts", "/p/src/lib/index.ts"]);
        let mut aliases = AliasTable::new("/p");
        aliases.push("@lib", vec![PathBuf::from("/p/src/lib")]);
        let resolver = ModuleResolver::new(&aliases, &files);

        assert_eq!(
            resolver.resolve("@lib/foo", Path::new("/p/src")),
            Some(PathBuf::from("/p/src/lib/foo.ts"))
        );
        assert_eq!(
            resolver.resolve("@lib", Path::new("/p/src")),
            Some(PathBuf::from("/p/src/lib/index.ts"))
        );
        assert_eq!(resolver.resolve("@lib/bar", Path::new("/p/src")), None);
    }

    #[test]
    fn unmatched_alias_target_falls_through_to_later_entries() {
        let files = known(&["/p/packages/ui/src/index.ts", "/p/packages/ui/src/button.tsx"]);
        let mut aliases = AliasTable::new("/p");
        aliases.push("@acme/ui", vec![PathBuf::from("/p/packages/ui/src/index.ts")]);
        aliases.push("@acme/ui/*", vec![PathBuf::from("/p/packages/ui/src")]);
        let resolver = ModuleResolver::new(&aliases, &files);

        assert_eq!(
            resolver.resolve("@acme/ui/button", Path::new("/p/apps/web")),
            Some(PathBuf::from("/p/packages/ui/src/button.tsx"))
        );
    }
}
