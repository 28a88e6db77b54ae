use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ripple::core::{AnalyzerConfig, CodebaseAnalyzer, DependencyGraph};
use ripple::formatters::JsonCompactFormatter;
use ripple::watch::{self, FileChange};

#[derive(Debug, Parser)]
#[command(
    name = "ripple",
    version,
    about = "Import-graph extraction and blast-radius analysis for JS/TS codebases"
)]
#[command(propagate_version = true)]
struct Cli {
    /// Project root (defaults to current directory)
    #[arg(short, long, global = true, value_name = "PATH")]
    root: Option<PathBuf>,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Analysis worker threads
    #[arg(long, global = true, default_value_t = 4)]
    workers: usize,

    /// Skip the on-disk analysis cache
    #[arg(long, global = true)]
    no_cache: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Analyze the project and print the graph summary
    Scan {
        /// Also write the full graph snapshot to this file
        #[arg(short, long, value_name = "FILE")]
        snapshot: Option<PathBuf>,

        /// Indent the snapshot
        #[arg(long)]
        pretty: bool,
    },

    /// Show what is affected when a file changes
    Impact {
        /// File to analyze
        file: PathBuf,
    },

    /// List circular import chains
    Cycles,

    /// Find files whose path contains a substring
    Find {
        query: String,
    },

    /// Show a file's dependencies (or dependents with --reverse)
    Deps {
        file: PathBuf,

        #[arg(long)]
        reverse: bool,
    },

    /// Keep the graph current from change events read on stdin
    ///
    /// Each line is `<created|modified|deleted> <path>`. A summary is printed
    /// after every settled batch; changes still pending at end of input are
    /// applied as a final batch.
    Watch {
        /// Debounce window in milliseconds
        #[arg(long, default_value_t = 200)]
        debounce_ms: u64,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let root = match cli.root {
        Some(root) => root,
        None => std::env::current_dir()?,
    };

    let mut config = AnalyzerConfig {
        workers: cli.workers,
        use_cache: !cli.no_cache,
        ..AnalyzerConfig::default()
    };
    if let Commands::Watch { debounce_ms } = &cli.command {
        config.debounce_ms = *debounce_ms;
    }

    let started = Instant::now();
    let mut analyzer = CodebaseAnalyzer::with_config(&root, config)?;
    analyzer.analyze()?;
    info!(
        "Analysis of {} completed in {:.2}s",
        analyzer.root().display(),
        started.elapsed().as_secs_f64()
    );

    match cli.command {
        Commands::Scan { snapshot, pretty } => {
            let graph = analyzer.graph();
            if let Some(path) = snapshot {
                let formatter = if pretty {
                    JsonCompactFormatter::pretty()
                } else {
                    JsonCompactFormatter::new()
                };
                formatter.format_to_file(graph, &path)?;
                info!("Snapshot written to {}", path.display());
            }
            print_json(&graph.get_summary())
        }
        Commands::Impact { file } => {
            let path = lookup_path(&analyzer, &file);
            let impact = analyzer
                .graph()
                .get_impact(&path)
                .ok_or_else(|| anyhow!("File not found in graph: {}", file.display()))?;
            print_json(&impact)
        }
        Commands::Cycles => print_json(&analyzer.graph().detect_circular_dependencies()),
        Commands::Find { query } => print_json(&analyzer.graph().find(&query)),
        Commands::Deps { file, reverse } => {
            let path = lookup_path(&analyzer, &file);
            let graph = analyzer.graph();
            if !graph.contains(&path) {
                return Err(anyhow!("File not found in graph: {}", file.display()));
            }
            let neighbours = if reverse {
                graph.dependents_of(&path)
            } else {
                graph.dependencies_of(&path)
            };
            let listed: Vec<String> = neighbours
                .into_iter()
                .flatten()
                .map(|p| display_path(graph, p))
                .collect();
            let key = if reverse { "dependents" } else { "dependencies" };
            let mut out = serde_json::Map::new();
            out.insert("file".to_string(), json!(display_path(graph, &path)));
            out.insert(key.to_string(), json!(listed));
            print_json(&out)
        }
        Commands::Watch { .. } => watch_stdin(&mut analyzer),
    }
}

fn watch_stdin(analyzer: &mut CodebaseAnalyzer) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    let window = analyzer.config().debounce();

    runtime.block_on(async {
        let (tx, rx) = mpsc::channel::<FileChange>(256);

        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) if line.trim().is_empty() => continue,
                    Ok(Some(line)) => match line.parse::<FileChange>() {
                        Ok(change) => {
                            if tx.send(change).await.is_err() {
                                break;
                            }
                        }
                        Err(err) => warn!("Ignoring change event: {err}"),
                    },
                    Ok(None) => break,
                    Err(err) => {
                        warn!("Failed to read change events: {err}");
                        break;
                    }
                }
            }
        });

        watch::run_to_end(rx, window, |batch| {
            let applied = analyzer.apply_changes(batch);
            if applied > 0 {
                if let Err(err) = print_json(&analyzer.graph().get_summary()) {
                    warn!("Failed to print summary: {err}");
                }
            }
        })
        .await;
    });

    Ok(())
}

/// Graph identity for a path given on the command line.
///
/// Relative paths are taken from the project root, not the working directory.
fn lookup_path(analyzer: &CodebaseAnalyzer, file: &Path) -> PathBuf {
    let identity = analyzer.identity(file);
    identity.canonicalize().unwrap_or(identity)
}

fn display_path(graph: &DependencyGraph, path: &Path) -> String {
    path.strip_prefix(graph.root())
        .unwrap_or(path)
        .display()
        .to_string()
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
