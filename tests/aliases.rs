use ripple::core::aliases::load_alias_table;
use std::fs;
use std::path::{Path, PathBuf};

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn patterns(root: &Path) -> Vec<(String, Vec<PathBuf>)> {
    load_alias_table(root)
        .entries
        .into_iter()
        .map(|entry| (entry.pattern, entry.targets))
        .collect()
}

#[test]
fn missing_config_gives_defaults() {
    let dir = tempfile::TempDir::new().unwrap();
    let table = load_alias_table(dir.path());
    assert_eq!(table.base_url, dir.path());
    assert!(table.is_empty());
}

#[test]
fn malformed_config_falls_back_to_defaults() {
    let dir = tempfile::TempDir::new().unwrap();
    write(dir.path(), "tsconfig.json", "{ \"compilerOptions\": { \"baseUrl\": ");
    write(dir.path(), "package.json", "not json at all");

    let table = load_alias_table(dir.path());
    assert_eq!(table.base_url, dir.path());
    assert!(table.is_empty());
}

#[test]
fn jsconfig_is_used_when_tsconfig_is_absent() {
    let dir = tempfile::TempDir::new().unwrap();
    let root = dir.path();
    write(
        root,
        "jsconfig.json",
        r#"{ "compilerOptions": { "paths": { "~/*": ["./app/*", "./legacy/*"], "config": ["./config/index.js"] } } }"#,
    );

    let table = load_alias_table(root);
    assert_eq!(table.base_url, root);
    assert_eq!(
        patterns(root),
        vec![
            ("~/*".to_string(), vec![root.join("app"), root.join("legacy")]),
            ("config".to_string(), vec![root.join("config/index.js")]),
        ]
    );
}

#[test]
fn paths_are_relative_to_base_url() {
    let dir = tempfile::TempDir::new().unwrap();
    let root = dir.path();
    write(
        root,
        "tsconfig.json",
        r#"{ "compilerOptions": { "baseUrl": "src", "paths": { "@lib/*": ["../lib/*"] } } }"#,
    );

    let table = load_alias_table(root);
    assert_eq!(table.base_url, root.join("src"));
    assert_eq!(table.entries[0].targets, vec![root.join("lib")]);
}

#[test]
fn workspace_packages_register_name_and_wildcard() {
    let dir = tempfile::TempDir::new().unwrap();
    let root = dir.path();
    write(
        root,
        "package.json",
        r#"{ "workspaces": { "packages": ["packages/*", "tools/cli"] } }"#,
    );
    write(root, "packages/ui/package.json", r#"{ "name": "@acme/ui", "main": "dist/index.js" }"#);
    write(root, "packages/ui/src/index.tsx", "export {};");
    write(root, "packages/ui/dist/index.js", "");
    write(
        root,
        "packages/util/package.json",
        r#"{ "name": "@acme/util", "main": "./lib/main.js" }"#,
    );
    write(root, "packages/util/lib/main.js", "");
    write(root, "packages/no-name/package.json", r#"{ "private": true }"#);
    write(root, "tools/cli/package.json", r#"{ "name": "cli" }"#);

    assert_eq!(
        patterns(root),
        vec![
            ("@acme/ui".to_string(), vec![root.join("packages/ui/src/index.tsx")]),
            ("@acme/ui/*".to_string(), vec![root.join("packages/ui")]),
            ("@acme/util".to_string(), vec![root.join("packages/util/lib/main.js")]),
            ("@acme/util/*".to_string(), vec![root.join("packages/util")]),
            // No entry file at all: the package root stands in.
            ("cli".to_string(), vec![root.join("tools/cli")]),
            ("cli/*".to_string(), vec![root.join("tools/cli")]),
        ]
    );
}
