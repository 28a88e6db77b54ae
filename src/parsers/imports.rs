use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

use super::lexer::{literal_body, LineIndex};
use crate::core::graph::ImportEdge;
use crate::core::resolver::ModuleResolver;

/// `import [type] [Default][, ][* as ns][{ named }] from "<spec>"`.
static STATIC_IMPORT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"\bimport\s+(type\s+)?([A-Za-z_$][\w$]*\s*,?\s*)?(\*\s*as\s+[A-Za-z_$][\w$]*\s*)?(\{[^}]*\}\s*)?from\s*(["'])"#,
    )
    .unwrap()
});

/// `import "<spec>"` with no bindings.
static SIDE_EFFECT_IMPORT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\bimport\s*(["'])"#).unwrap());

/// `import("<spec>")`.
static DYNAMIC_IMPORT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\bimport\s*\(\s*(["'`])"#).unwrap());

/// One matched import statement before resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImport {
    pub offset: usize,
    pub specifier: String,
    pub symbols: Vec<String>,
    pub is_type_only: bool,
    pub is_dynamic: bool,
}

/// Find every import statement in `stripped`, reading specifiers back out
/// of `original`. Results are in source order.
pub fn extract_imports(stripped: &str, original: &str) -> Vec<RawImport> {
    let mut imports = Vec::new();

    for caps in STATIC_IMPORT_RE.captures_iter(stripped) {
        let (Some(whole), Some(quote)) = (caps.get(0), caps.get(5)) else {
            continue;
        };
        let Some(specifier) = literal_body(stripped, original, quote.start()) else {
            continue;
        };

        let mut symbols = Vec::new();
        if let Some(default) = caps.get(2) {
            let name = default.as_str().trim().trim_end_matches(',').trim();
            if !name.is_empty() {
                symbols.push(name.to_string());
            }
        }
        if let Some(namespace) = caps.get(3) {
            if let Some(name) = namespace.as_str().split_whitespace().last() {
                symbols.push(name.to_string());
            }
        }
        if let Some(named) = caps.get(4) {
            symbols.extend(named_imports(named.as_str()));
        }

        imports.push(RawImport {
            offset: whole.start(),
            specifier,
            symbols,
            is_type_only: caps.get(1).is_some(),
            is_dynamic: false,
        });
    }

    for caps in SIDE_EFFECT_IMPORT_RE.captures_iter(stripped) {
        let (Some(whole), Some(quote)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if let Some(specifier) = literal_body(stripped, original, quote.start()) {
            imports.push(RawImport {
                offset: whole.start(),
                specifier,
                symbols: Vec::new(),
                is_type_only: false,
                is_dynamic: false,
            });
        }
    }

    for caps in DYNAMIC_IMPORT_RE.captures_iter(stripped) {
        let (Some(whole), Some(quote)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let Some(specifier) = literal_body(stripped, original, quote.start()) else {
            continue;
        };
        if specifier.contains("${") {
            continue;
        }
        imports.push(RawImport {
            offset: whole.start(),
            specifier,
            symbols: Vec::new(),
            is_type_only: false,
            is_dynamic: true,
        });
    }

    imports.sort_by_key(|import| import.offset);
    imports
}

/// Source names from a `{ a, b as c, type D }` clause.
fn named_imports(clause: &str) -> Vec<String> {
    clause
        .trim()
        .trim_start_matches('{')
        .trim_end_matches('}')
        .split(',')
        .filter_map(|item| {
            let item = item.trim();
            let item = item.strip_prefix("type ").map(str::trim).unwrap_or(item);
            let source = item.split_whitespace().next()?;
            Some(source.to_string())
        })
        .collect()
}

/// Resolve raw imports into edges owned by `source`.
pub fn resolve_imports(
    raw: Vec<RawImport>,
    source: &Path,
    lines: &LineIndex,
    resolver: &ModuleResolver<'_>,
) -> Vec<ImportEdge> {
    let from_dir = source.parent().unwrap_or(source);

    raw.into_iter()
        .map(|import| ImportEdge {
            source: source.to_path_buf(),
            target: resolver.resolve(&import.specifier, from_dir),
            line: lines.line_of(import.offset),
            specifier: import.specifier,
            symbols: import.symbols,
            is_type_only: import.is_type_only,
            is_dynamic: import.is_dynamic,
        })
        .collect()
}
