//! dedupscan - filesystem fingerprinting and duplicate detection.
//!
//! Entry point for the dedupscan CLI.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use dedupscan::cache::FingerprintCache;
use dedupscan::cli::{Cli, OutputFormat};
use dedupscan::duplicates::{collect_groups, detect_duplicates};
use dedupscan::fingerprint::{fingerprint_all, FingerprintConfig, Hasher};
use dedupscan::logging::init_logging;
use dedupscan::output::{render_json, render_text};
use dedupscan::scanner::{Scanner, ScannerConfig};

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match run(cli) {
        Ok(interrupted) => {
            if interrupted {
                std::process::exit(130);
            }
        }
        Err(err) => {
            eprintln!("Error: {err:#}");
            std::process::exit(1);
        }
    }
}

/// Run the full pipeline: scan, fingerprint, group, report.
///
/// Returns `Ok(true)` when the run was interrupted by a shutdown signal
/// and completed with partial results.
fn run(cli: Cli) -> anyhow::Result<bool> {
    let root = cli
        .root
        .canonicalize()
        .with_context(|| format!("cannot access scan root '{}'", cli.root.display()))?;

    let shutdown_flag = install_shutdown_handler();

    // Scan phase: deterministic sequential walk.
    let ignore_file = cli
        .ignore_file
        .clone()
        .or_else(|| default_ignore_file(&root));
    let scan_config = ScannerConfig::default()
        .with_include_subdirs(non_empty(cli.include_subdirs.clone()))
        .with_max_entries(cli.max_entries)
        .with_ignore_file(ignore_file);
    let scanner =
        Scanner::new(&root, scan_config).with_shutdown_flag(Arc::clone(&shutdown_flag));

    let report = scanner.scan();

    // Fingerprint phase: parallel hashing, scan order preserved.
    let cache = open_cache(&cli)?;
    let mut fp_config = FingerprintConfig::default()
        .with_io_threads(cli.io_threads)
        .with_metadata_only_threshold(cli.max_hash_size)
        .with_shutdown_flag(Arc::clone(&shutdown_flag));
    if let Some(cache) = cache {
        fp_config = fp_config.with_cache(cache);
    }

    let hasher = Arc::new(Hasher::new());
    let (fingerprinted, fp_stats) = fingerprint_all(report.entries, hasher, fp_config);

    // Detection phase: first-scanned entry per digest is the original.
    let (annotated, dup_stats) = detect_duplicates(fingerprinted);
    let groups = collect_groups(&annotated);

    let skipped = report.errors.len() + fp_stats.failed + fp_stats.skipped;
    let rendered = match cli.output {
        OutputFormat::Text => render_text(&groups, &dup_stats, skipped),
        OutputFormat::Json => render_json(&groups, &dup_stats, skipped)
            .context("failed to serialize JSON report")?,
    };

    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(rendered.as_bytes())
        .context("failed to write report")?;

    Ok(fp_stats.interrupted)
}

/// Install a Ctrl+C handler that flips a shared shutdown flag.
///
/// Falls back to an unhooked flag if a handler is already registered.
fn install_shutdown_handler() -> Arc<AtomicBool> {
    let flag = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&flag);

    let result = ctrlc::set_handler(move || {
        handler_flag.store(true, Ordering::SeqCst);
        let _ = writeln!(std::io::stderr(), "\nInterrupted. Finishing up...");
        log::info!("Shutdown signal received");
    });
    if result.is_err() {
        log::debug!("Ctrl+C handler already registered, continuing without one");
    }

    flag
}

/// Open the fingerprint cache according to the CLI flags.
///
/// Returns `None` when caching is disabled. A cache that fails to open is
/// treated as a warning, not a fatal error: the scan proceeds uncached.
fn open_cache(cli: &Cli) -> anyhow::Result<Option<Arc<FingerprintCache>>> {
    if cli.no_cache {
        log::debug!("Fingerprint cache disabled");
        return Ok(None);
    }

    let path = match &cli.cache {
        Some(path) => path.clone(),
        None => match default_cache_path() {
            Some(path) => path,
            None => {
                log::warn!("Could not determine a cache directory, caching disabled");
                return Ok(None);
            }
        },
    };

    let cache = match FingerprintCache::open(&path) {
        Ok(cache) => cache,
        Err(err) => {
            log::warn!(
                "Failed to open fingerprint cache at '{}': {err}, caching disabled",
                path.display()
            );
            return Ok(None);
        }
    };

    if cli.clear_cache {
        cache
            .clear()
            .with_context(|| format!("failed to clear cache at '{}'", path.display()))?;
        log::info!("Fingerprint cache cleared");
    }

    log::debug!("Using fingerprint cache at '{}'", path.display());
    Ok(Some(Arc::new(cache)))
}

/// Platform-specific default cache database path.
fn default_cache_path() -> Option<std::path::PathBuf> {
    let dirs = directories::ProjectDirs::from("com", "dedupscan", "dedupscan")?;
    Some(dirs.cache_dir().join("fingerprints.db"))
}

/// The conventional ignore file under the scan root, if it exists.
fn default_ignore_file(root: &std::path::Path) -> Option<std::path::PathBuf> {
    let candidate = root.join(".dedupignore");
    candidate.is_file().then_some(candidate)
}

fn non_empty(items: Vec<String>) -> Option<Vec<String>> {
    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}
