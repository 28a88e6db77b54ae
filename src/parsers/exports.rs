use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

use super::lexer::{literal_body, LineIndex};
use crate::core::graph::{ExportInfo, ExportKind};

/// `export [type] { a, b as c } [from "<spec>"]`.
static EXPORT_LIST_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\bexport\s+(?:type\s+)?\{([^}]*)\}(?:\s*from\s*(["']))?"#).unwrap()
});

/// `export * [as name] from "<spec>"`.
static EXPORT_ALL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\bexport\s+(?:type\s+)?\*\s*(?:as\s+[A-Za-z_$][\w$]*\s*)?from\s*(["'])"#)
        .unwrap()
});

/// `export [type] [default] [declare] <keyword> <name>`.
static EXPORT_DECL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\bexport\s+(?:type\s+)?(default\s+)?(declare\s+)?(async\s+function\b\s*\*?|function\b\s*\*?|abstract\s+class\b|class\b|interface\b|type\b|const\s+enum\b|enum\b|const\b|let\b|var\b|namespace\b|module\b)\s*([A-Za-z_$][\w$]*)?",
    )
    .unwrap()
});

/// `export default <expression>` with no recognised keyword.
static EXPORT_DEFAULT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bexport\s+default\b").unwrap());

fn kind_for_keyword(keyword: &str) -> ExportKind {
    let words: Vec<&str> = keyword
        .split(|c: char| c.is_whitespace() || c == '*')
        .filter(|w| !w.is_empty())
        .collect();
    match words.as_slice() {
        ["function"] | ["async", "function"] => ExportKind::Function,
        ["class"] | ["abstract", "class"] => ExportKind::Class,
        ["interface"] => ExportKind::Interface,
        ["type"] => ExportKind::Type,
        ["enum"] | ["const", "enum"] => ExportKind::Enum,
        ["const"] | ["let"] | ["var"] => ExportKind::Variable,
        ["namespace"] | ["module"] => ExportKind::Namespace,
        _ => ExportKind::Unknown,
    }
}

/// Find every export in `stripped`. Names are unique per file; when the same
/// name is exported twice, the earliest occurrence in the source wins.
pub fn extract_exports(stripped: &str, original: &str, lines: &LineIndex) -> Vec<ExportInfo> {
    // (offset, rank, export): rank orders matches that start at the same
    // offset so a declaration beats the bare `export default` fallback.
    let mut found: Vec<(usize, u8, ExportInfo)> = Vec::new();

    for caps in EXPORT_LIST_RE.captures_iter(stripped) {
        let (Some(whole), Some(list)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let source = caps
            .get(2)
            .and_then(|quote| literal_body(stripped, original, quote.start()));
        let line = lines.line_of(whole.start());

        for name in exported_names(list.as_str()) {
            found.push((
                whole.start(),
                0,
                ExportInfo {
                    name,
                    kind: ExportKind::Unknown,
                    line,
                    is_reexport: source.is_some(),
                    source: source.clone(),
                },
            ));
        }
    }

    for caps in EXPORT_ALL_RE.captures_iter(stripped) {
        let (Some(whole), Some(quote)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let Some(source) = literal_body(stripped, original, quote.start()) else {
            continue;
        };
        found.push((
            whole.start(),
            0,
            ExportInfo {
                name: "*".to_string(),
                kind: ExportKind::Unknown,
                line: lines.line_of(whole.start()),
                is_reexport: true,
                source: Some(source),
            },
        ));
    }

    let mut declared_defaults = HashSet::new();
    for caps in EXPORT_DECL_RE.captures_iter(stripped) {
        let (Some(whole), Some(keyword)) = (caps.get(0), caps.get(3)) else {
            continue;
        };
        let is_default = caps.get(1).is_some();
        let name = if is_default {
            declared_defaults.insert(whole.start());
            "default".to_string()
        } else {
            match caps.get(4) {
                Some(name) => name.as_str().to_string(),
                None => continue,
            }
        };
        let kind = if caps.get(2).is_some() {
            ExportKind::Unknown
        } else {
            kind_for_keyword(keyword.as_str())
        };

        found.push((
            whole.start(),
            0,
            ExportInfo {
                name,
                kind,
                line: lines.line_of(whole.start()),
                is_reexport: false,
                source: None,
            },
        ));
    }

    for m in EXPORT_DEFAULT_RE.find_iter(stripped) {
        if declared_defaults.contains(&m.start()) {
            continue;
        }
        found.push((
            m.start(),
            1,
            ExportInfo {
                name: "default".to_string(),
                kind: ExportKind::Unknown,
                line: lines.line_of(m.start()),
                is_reexport: false,
                source: None,
            },
        ));
    }

    found.sort_by_key(|(offset, rank, _)| (*offset, *rank));

    let mut seen = HashSet::new();
    found
        .into_iter()
        .map(|(_, _, export)| export)
        .filter(|export| seen.insert(export.name.clone()))
        .collect()
}

/// Exported names from a `{ a, b as c, type D }` clause.
fn exported_names(list: &str) -> Vec<String> {
    list.split(',')
        .filter_map(|item| {
            let item = item.trim();
            let item = item.strip_prefix("type ").map(str::trim).unwrap_or(item);
            item.split_whitespace().last().map(str::to_string)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::lexer::strip_source;

    fn exports_of(src: &str) -> Vec<ExportInfo> {
        extract_exports(&strip_source(src), src, &LineIndex::new(src))
    }

    fn names(exports: &[ExportInfo]) -> Vec<&str> {
        exports.iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn declaration_kinds() {
        let exports = exports_of(
            "export function f() {}\n\
             export async function g() {}\n\
             export abstract class A {}\n\
             export interface I {}\n\
             export type T = string;\n\
             export const enum E { X }\n\
             export let v = 1;\n\
             export namespace NS {}\n\
             export declare const d: number;\n",
        );
        let kinds: Vec<(&str, ExportKind)> =
            exports.iter().map(|e| (e.name.as_str(), e.kind)).collect();
        assert_eq!(
            kinds,
            vec![
                ("f", ExportKind::Function),
                ("g", ExportKind::Function),
                ("A", ExportKind::Class),
                ("I", ExportKind::Interface),
                ("T", ExportKind::Type),
                ("E", ExportKind::Enum),
                ("v", ExportKind::Variable),
                ("NS", ExportKind::Namespace),
                ("d", ExportKind::Unknown),
            ]
        );
        assert_eq!(exports[4].line, 5);
    }

    #[test]
    fn default_exports_use_literal_default_name() {
        let exports = exports_of("export default class Widget {}\n");
        assert_eq!(names(&exports), vec!["default"]);
        assert_eq!(exports[0].kind, ExportKind::Class);

        let expr = exports_of("const x = 1;\nexport default x;\n");
        assert_eq!(names(&expr), vec!["default"]);
        assert_eq!(expr[0].kind, ExportKind::Unknown);
        assert_eq!(expr[0].line, 2);
    }

    #[test]
    fn reexports_keep_unresolved_source() {
        let exports = exports_of(
            "export { a, b as c } from './inner';\nexport * from './all';\nexport * as ns from './ns';",
        );
        assert_eq!(names(&exports), vec!["a", "c", "*"]);
        assert!(exports.iter().all(|e| e.is_reexport));
        assert_eq!(exports[0].source.as_deref(), Some("./inner"));
        assert_eq!(exports[2].source.as_deref(), Some("./all"));
    }

    #[test]
    fn local_export_list_is_not_a_reexport() {
        let exports = exports_of("const a = 1, b = 2;\nexport { a, b as renamed };");
        assert_eq!(names(&exports), vec!["a", "renamed"]);
        assert!(exports.iter().all(|e| !e.is_reexport && e.source.is_none()));
    }

    #[test]
    fn first_occurrence_wins() {
        let exports = exports_of("export const dup = 1;\nexport { dup } from './other';");
        assert_eq!(exports.len(), 1);
        assert_eq!(exports[0].kind, ExportKind::Variable);
        assert!(!exports[0].is_reexport);
    }

    #[test]
    fn type_reexport_does_not_create_empty_type_export() {
        let exports = exports_of("export type { Props } from './props';");
        assert_eq!(names(&exports), vec!["Props"]);
    }
}
