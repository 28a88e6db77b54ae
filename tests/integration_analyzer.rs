use ripple::core::{AnalyzerConfig, CodebaseAnalyzer, ExportKind};
use ripple::watch::FileChange;
use std::fs;
use std::path::{Path, PathBuf};

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn no_cache() -> AnalyzerConfig {
    AnalyzerConfig {
        workers: 2,
        batch_size: 2,
        use_cache: false,
        ..AnalyzerConfig::default()
    }
}

/// Small monorepo: tsconfig aliases, a workspace package, and noise that
/// must be skipped.
fn fixture() -> tempfile::TempDir {
    let dir = tempfile::TempDir::new().unwrap();
    let root = dir.path();

    write(
        root,
        "tsconfig.json",
        r#"{
  // editor-style config
  "compilerOptions": {
    "baseUrl": "./src",
    "paths": {
      "@/*": ["*"], /* everything under src */
    },
  },
}"#,
    );
    write(root, "package.json", r#"{ "name": "root", "workspaces": ["packages/*"] }"#);
    write(root, "packages/ui/package.json", r#"{ "name": "@acme/ui" }"#);
    write(root, "packages/ui/src/index.ts", "export const Ui = 1;\n");

    write(
        root,
        "src/utils/date.ts",
        "export function formatDate() {}\nexport const DAY = 86400;\n",
    );
    write(
        root,
        "src/components/Button.tsx",
        "import { formatDate } from '@/utils/date';\n\nexport default function Button() {}\n",
    );
    write(
        root,
        "src/app.ts",
        "import Button from './components/Button';\n\
         import { DAY as day } from \"utils/date\";\n\
         import { Ui } from '@acme/ui';\n\
         import React from 'react';\n\
         // import Ghost from './ghost';\n\
         const lazy = () => import('./lazy');\n",
    );
    write(root, "src/lazy.js", "export const later = true;\n");
    write(root, "node_modules/react/index.js", "module.exports = {};\n");
    write(root, "dist/app.js", "import './nothing';\n");
    write(root, ".hidden/skip.ts", "export const no = 1;\n");
    write(root, "README.md", "import x from './x';\n");

    dir
}

#[test]
fn analyzes_project_and_resolves_aliases() {
    let dir = fixture();
    let mut analyzer = CodebaseAnalyzer::with_config(dir.path(), no_cache()).unwrap();
    analyzer.analyze().unwrap();
    let root = analyzer.root().to_path_buf();
    let graph = analyzer.graph();

    assert_eq!(graph.len(), 5);
    assert!(graph.get_node(&root.join("dist/app.js")).is_none());
    assert!(graph.get_node(&root.join(".hidden/skip.ts")).is_none());

    let app = graph.get_node(&root.join("src/app.ts")).unwrap();
    assert_eq!(app.relative_path, PathBuf::from("src/app.ts"));
    assert_eq!(app.line_count, 7);
    let targets: Vec<(&str, Option<PathBuf>)> = app
        .imports
        .iter()
        .map(|edge| (edge.specifier.as_str(), edge.target.clone()))
        .collect();
    assert_eq!(
        targets,
        vec![
            ("./components/Button", Some(root.join("src/components/Button.tsx"))),
            ("utils/date", Some(root.join("src/utils/date.ts"))),
            ("@acme/ui", Some(root.join("packages/ui/src/index.ts"))),
            ("react", None),
            ("./lazy", Some(root.join("src/lazy.js"))),
        ]
    );
    assert_eq!(app.imports[1].symbols, vec!["DAY".to_string()]);
    assert_eq!(app.imports[1].line, 2);
    assert!(app.imports[4].is_dynamic);

    let button = graph.get_node(&root.join("src/components/Button.tsx")).unwrap();
    assert_eq!(button.imports[0].target, Some(root.join("src/utils/date.ts")));
    assert_eq!(button.exports[0].name, "default");
    assert_eq!(button.exports[0].kind, ExportKind::Function);
    assert_eq!(button.exports[0].line, 3);

    let impact = graph.get_impact(&root.join("src/utils/date.ts")).unwrap();
    assert_eq!(
        impact.direct_dependents,
        vec![root.join("src/app.ts"), root.join("src/components/Button.tsx")]
    );
    assert!(impact.transitive_dependents.is_empty());

    let impact = graph.get_impact(&root.join("src/components/Button.tsx")).unwrap();
    assert_eq!(impact.direct_dependents, vec![root.join("src/app.ts")]);
    assert_eq!(impact.total_affected, 1);
}

#[test]
fn incremental_changes_patch_the_graph() {
    let dir = fixture();
    let mut analyzer = CodebaseAnalyzer::with_config(dir.path(), no_cache()).unwrap();
    analyzer.analyze().unwrap();
    let root = analyzer.root().to_path_buf();
    let date = root.join("src/utils/date.ts");

    // New file importing date.ts
    write(&root, "src/report.ts", "import { formatDate } from './utils/date';\n");
    // Button stops importing date.ts
    write(&root, "src/components/Button.tsx", "export default function Button() {}\n");

    let applied = analyzer.apply_changes(vec![
        FileChange::Created(root.join("src/report.ts")),
        FileChange::Modified(PathBuf::from("src/components/Button.tsx")),
        FileChange::Modified(root.join("README.md")),
    ]);
    assert_eq!(applied, 2);

    let dependents: Vec<PathBuf> = analyzer
        .graph()
        .dependents_of(&date)
        .unwrap()
        .iter()
        .cloned()
        .collect();
    assert_eq!(dependents, vec![root.join("src/app.ts"), root.join("src/report.ts")]);

    fs::remove_file(&date).unwrap();
    assert_eq!(analyzer.apply_changes(vec![FileChange::Deleted(date.clone())]), 1);

    let graph = analyzer.graph();
    assert!(graph.get_node(&date).is_none());
    assert!(!graph
        .dependencies_of(&root.join("src/app.ts"))
        .unwrap()
        .contains(&date));
    // app.ts was not re-analyzed; its import text still points at the old file.
    let app = graph.get_node(&root.join("src/app.ts")).unwrap();
    assert_eq!(app.imports[1].target, Some(date.clone()));

    // Deleting something never analyzed does nothing.
    assert_eq!(
        analyzer.apply_changes(vec![FileChange::Deleted(root.join("src/nope.ts"))]),
        0
    );
}

#[test]
fn unreadable_files_are_skipped_not_fatal() {
    let dir = tempfile::TempDir::new().unwrap();
    write(dir.path(), "a.ts", "export const a = 1;\n");
    let mut analyzer = CodebaseAnalyzer::with_config(dir.path(), no_cache()).unwrap();
    analyzer.analyze().unwrap();

    let applied =
        analyzer.apply_changes(vec![FileChange::Created(dir.path().join("vanished.ts"))]);
    assert_eq!(applied, 0);
    assert_eq!(analyzer.graph().len(), 1);
}

#[test]
fn changes_outside_the_root_are_ignored() {
    let dir = tempfile::TempDir::new().unwrap();
    let outside = tempfile::TempDir::new().unwrap();
    write(dir.path(), "a.ts", "export const a = 1;\n");
    write(outside.path(), "stray.ts", "import { a } from './a';\n");

    let mut analyzer = CodebaseAnalyzer::with_config(dir.path(), no_cache()).unwrap();
    analyzer.analyze().unwrap();

    let stray = outside.path().canonicalize().unwrap().join("stray.ts");
    assert_eq!(
        analyzer.apply_changes(vec![
            FileChange::Created(stray.clone()),
            FileChange::Modified(PathBuf::from("../escaped.ts")),
        ]),
        0
    );
    assert_eq!(analyzer.graph().len(), 1);
    assert!(analyzer.graph().get_node(&stray).is_none());
}

#[test]
fn cached_second_run_matches_first() {
    let dir = fixture();
    let cache_dir = tempfile::TempDir::new().unwrap();
    let config = AnalyzerConfig {
        cache_dir: Some(cache_dir.path().to_path_buf()),
        ..AnalyzerConfig::default()
    };

    let mut first = CodebaseAnalyzer::with_config(dir.path(), config.clone()).unwrap();
    let first_snapshot = serde_json::to_value(&first.analyze().unwrap().serialize().nodes).unwrap();

    let mut second = CodebaseAnalyzer::with_config(dir.path(), config).unwrap();
    let second_snapshot =
        serde_json::to_value(&second.analyze().unwrap().serialize().nodes).unwrap();

    assert_eq!(first_snapshot, second_snapshot);
}

#[test]
fn missing_root_is_an_error() {
    let dir = tempfile::TempDir::new().unwrap();
    assert!(CodebaseAnalyzer::new(dir.path().join("absent")).is_err());
}
