//! docshelf - a read-only document shelf with a live filename index.
//!
//! Usage:
//!   docshelf [PATH]                 Serve PATH over HTTP (same as `serve`)
//!   docshelf serve [PATH]           Browse, download and search over HTTP
//!   docshelf search PATH QUERY      One-shot prefix search by file name
//!   docshelf stats [PATH]           Scan once and print index statistics
//!   docshelf --help                 Show help

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result, eyre};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use docshelf_core::{IndexConfig, SearchResult};
use docshelf_index::{DocumentIndex, Refresher};
use docshelf_scan::{JwalkScanner, ScanProgress};
use docshelf_server::AppState;

#[derive(Parser)]
#[command(
    name = "docshelf",
    version,
    about = "A read-only document shelf with a live filename index",
    long_about = "docshelf serves a directory tree as a browsable, read-only document shelf.\n\n\
                  Files are indexed by name in the background and can be found by prefix \
                  search. Run `docshelf [PATH]` to start the server, or use subcommands \
                  for one-shot queries."
)]
struct Cli {
    /// Directory to serve (defaults to current directory)
    #[arg(default_value = ".")]
    path: PathBuf,

    #[command(flatten)]
    serve: ServeArgs,

    #[command(flatten)]
    walk: WalkArgs,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve a directory over HTTP with a background index
    Serve {
        /// Directory to serve
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Scan once and search file names by prefix
    Search {
        /// Directory to scan
        path: PathBuf,

        /// File name prefix (case-sensitive)
        query: String,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Scan once and print index statistics
    Stats {
        /// Directory to scan
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
}

#[derive(Args, Clone)]
struct ServeArgs {
    /// Address to bind
    #[arg(long, global = true, default_value = "127.0.0.1")]
    bind: IpAddr,

    /// Port to listen on
    #[arg(short, long, global = true, default_value = "8080")]
    port: u16,

    /// Time between index refreshes (e.g. "30s", "10m", "1h")
    #[arg(short, long, global = true, default_value = "10m")]
    interval: String,
}

#[derive(Args, Clone)]
struct WalkArgs {
    /// Skip files and directories whose name matches (glob, repeatable)
    #[arg(long = "ignore", global = true)]
    ignore_patterns: Vec<String>,

    /// Do not index hidden files
    #[arg(long, global = true)]
    no_hidden: bool,

    /// Follow symbolic links to directories
    #[arg(short = 'L', long, global = true)]
    follow_symlinks: bool,

    /// Maximum directory depth to index
    #[arg(long, global = true)]
    max_depth: Option<u32>,

    /// Walker threads (0 = auto)
    #[arg(long, global = true, default_value = "0")]
    threads: usize,
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Some(Command::Serve { ref path }) => {
            let config = index_config(path, &cli.walk, &cli.serve.interval)?;
            run_serve(config, &cli.serve).await?;
        }
        Some(Command::Search {
            ref path,
            ref query,
            format,
        }) => {
            let config = index_config(path, &cli.walk, &cli.serve.interval)?;
            run_search(config, query, format).await?;
        }
        Some(Command::Stats { ref path, format }) => {
            let config = index_config(path, &cli.walk, &cli.serve.interval)?;
            run_stats(config, format).await?;
        }
        None => {
            let config = index_config(&cli.path, &cli.walk, &cli.serve.interval)?;
            run_serve(config, &cli.serve).await?;
        }
    }

    Ok(())
}

/// Log to stderr, filtered by `RUST_LOG` (default `info`).
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
}

fn index_config(path: &Path, walk: &WalkArgs, interval: &str) -> Result<IndexConfig> {
    let root = path.canonicalize().context("Invalid path")?;
    if !root.is_dir() {
        return Err(eyre!("Not a directory: {}", root.display()));
    }

    IndexConfig::builder()
        .root(root)
        .refresh_interval_secs(parse_duration(interval)?.as_secs().max(1))
        .ignore_patterns(walk.ignore_patterns.clone())
        .include_hidden(!walk.no_hidden)
        .follow_symlinks(walk.follow_symlinks)
        .max_depth(walk.max_depth)
        .threads(walk.threads)
        .build()
        .map_err(|e| eyre!("Invalid configuration: {e}"))
}

/// Serve until Ctrl-C.
async fn run_serve(config: IndexConfig, serve: &ServeArgs) -> Result<()> {
    let scanner = JwalkScanner::with_config(config.clone()).context("Invalid scan settings")?;
    tokio::spawn(log_progress(scanner.subscribe()));

    let index = Arc::new(DocumentIndex::new(scanner));
    let shutdown = CancellationToken::new();

    info!(root = %config.root.display(), "starting document shelf");
    let refresher = Refresher::spawn_with_token(
        Arc::clone(&index),
        config.root.clone(),
        config.refresh_interval(),
        shutdown.child_token(),
    );

    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested");
        }
        ctrl_c.cancel();
    });

    let state = AppState::new(index, &config.root).context("Invalid path")?;
    let addr = SocketAddr::new(serve.bind, serve.port);
    docshelf_server::serve(addr, state, shutdown.clone())
        .await
        .context("HTTP server failed")?;

    shutdown.cancel();
    refresher.shutdown().await;
    Ok(())
}

async fn log_progress(mut progress_rx: tokio::sync::broadcast::Receiver<ScanProgress>) {
    loop {
        match progress_rx.recv().await {
            Ok(progress) if progress.finished => debug!(
                files = progress.files_indexed,
                entries = progress.total_items(),
                skipped = progress.warnings_count,
                files_per_sec = progress.files_per_second() as u64,
                "scan finished"
            ),
            Ok(progress) => debug!(
                files = progress.files_indexed,
                path = %progress.current_path.display(),
                "scanning"
            ),
            Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => break,
        }
    }
}

/// Build an index with a single scan of the configured root.
async fn scan_once(config: &IndexConfig) -> Result<DocumentIndex> {
    eprintln!("Scanning {}...", config.root.display());
    let index = DocumentIndex::from_config(config).context("Invalid scan settings")?;
    index.refresh(&config.root).await.context("Scan failed")?;
    Ok(index)
}

/// Run a one-shot search.
async fn run_search(config: IndexConfig, query: &str, format: OutputFormat) -> Result<()> {
    let index = scan_once(&config).await?;
    let mut result = index.search(query);

    match format {
        OutputFormat::Text => print_results(&mut result),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
    }

    Ok(())
}

fn print_results(result: &mut SearchResult) {
    // Index order is arbitrary; sort for a stable listing.
    result.results.sort_by(|a, b| a.path().cmp(b.path()));

    println!();
    println!("{}", "─".repeat(70));
    println!(" {} match(es) for \"{}\"", result.count, result.query);
    println!("{}", "─".repeat(70));

    for record in &result.results {
        println!(
            "  {:<50} {:>10}  {}",
            truncate(&record.url_path(), 50),
            format_size(record.size()),
            record.modified().format("%Y-%m-%d")
        );
    }
    println!();
}

/// Scan once and print statistics.
async fn run_stats(config: IndexConfig, format: OutputFormat) -> Result<()> {
    let index = scan_once(&config).await?;
    let snapshot = index.snapshot();
    let stats = index.stats();

    match format {
        OutputFormat::Text => {
            println!();
            println!("{}", "─".repeat(60));
            println!(" {}", config.root.display());
            println!(
                " {} files under {} distinct names",
                stats.total_files, stats.unique_ids
            );
            println!(" Scanned in {:.2}s", stats.scan_duration.as_secs_f64());
            println!("{}", "─".repeat(60));

            let total_bytes: u64 = snapshot
                .groups()
                .flat_map(|(_, records)| records.iter().map(|r| r.size()))
                .sum();
            println!(" Total size: {}", format_size(total_bytes));

            let mut shared: Vec<_> = snapshot
                .groups()
                .filter(|(_, records)| records.len() > 1)
                .collect();
            shared.sort_by(|a, b| b.1.len().cmp(&a.1.len()).then(a.0.cmp(b.0)));
            if !shared.is_empty() {
                println!();
                println!(" Most repeated names:");
                for (id, records) in shared.iter().take(10) {
                    println!("   {:<40} {:>5}x", truncate(id, 40), records.len());
                }
            }

            if stats.warnings > 0 {
                println!();
                println!("{} entr(ies) skipped during scan", stats.warnings);
            }
            println!();
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }

    Ok(())
}

/// Format size in human-readable form.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

/// Truncate a string to max length (in characters).
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len - 1).collect();
        format!("{head}…")
    }
}

/// Parse a duration string (e.g., "45s", "10m", "2h", "1d").
fn parse_duration(s: &str) -> Result<std::time::Duration> {
    let s = s.trim().to_lowercase();

    let (num, multiplier) = if let Some(n) = s.strip_suffix('d') {
        (n.parse::<f64>()?, 24.0 * 60.0 * 60.0)
    } else if let Some(n) = s.strip_suffix('h') {
        (n.parse::<f64>()?, 60.0 * 60.0)
    } else if let Some(n) = s.strip_suffix('m') {
        (n.parse::<f64>()?, 60.0)
    } else if let Some(n) = s.strip_suffix('s') {
        (n.parse::<f64>()?, 1.0)
    } else {
        (s.parse::<f64>()?, 1.0) // Default to seconds
    };

    if num <= 0.0 || !num.is_finite() {
        return Err(eyre!("Interval must be positive: {s}"));
    }

    std::time::Duration::try_from_secs_f64(num * multiplier)
        .map_err(|_| eyre!("Interval out of range: {s}"))
}
