//! Command-line interface definitions.
//!
//! All arguments use the clap derive API. The binary is a thin driver:
//! it wires the scanner, fingerprint engine, cache, and duplicate
//! detector together and renders a report.
//!
//! # Example
//!
//! ```bash
//! # Scan a directory tree
//! dedupscan ~/Downloads
//!
//! # Only walk the photo subdirectories, skip anything over 2 GiB
//! dedupscan ~/archive --include photos --max-hash-size 2GiB
//!
//! # JSON output for scripting, no cache
//! dedupscan ~/Downloads --output json --no-cache
//! ```

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Filesystem inventory and duplicate-detection engine.
///
/// Scans a directory tree, fingerprints every file (and package
/// directories as single units) with BLAKE3, and reports exact duplicate
/// groups with a deterministic choice of original.
#[derive(Debug, Parser)]
#[command(name = "dedupscan")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Directory to scan
    #[arg(value_name = "PATH")]
    pub root: PathBuf,

    /// Only walk immediate subdirectories of the root whose names match
    /// (exactly or by substring); can be given multiple times
    #[arg(long = "include", value_name = "NAME")]
    pub include_subdirs: Vec<String>,

    /// Stop after this many entries have been discovered
    #[arg(long, value_name = "N")]
    pub max_entries: Option<usize>,

    /// Ignore file with one pattern per line (default: .dedupignore under
    /// the root, if present)
    #[arg(long, value_name = "PATH")]
    pub ignore_file: Option<PathBuf>,

    /// Number of I/O threads for hashing
    ///
    /// Lower values reduce disk thrashing on HDDs.
    #[arg(long, value_name = "N", default_value = "4")]
    pub io_threads: usize,

    /// Skip hashing files larger than this and record a metadata-only
    /// sentinel instead (e.g. 512MB, 2GiB)
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub max_hash_size: Option<u64>,

    /// Path to the fingerprint cache database
    ///
    /// If not specified, a platform-specific default path is used.
    #[arg(long, value_name = "PATH")]
    pub cache: Option<PathBuf>,

    /// Disable fingerprint caching
    #[arg(long, conflicts_with = "cache")]
    pub no_cache: bool,

    /// Clear the fingerprint cache before scanning
    #[arg(long)]
    pub clear_cache: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

/// Report output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary
    Text,
    /// JSON document for scripting
    Json,
}

/// Parse a human-readable size such as `512MB` or `2GiB`.
fn parse_size(s: &str) -> Result<u64, String> {
    s.parse::<bytesize::ByteSize>()
        .map(|b| b.as_u64())
        .map_err(|e| format!("invalid size '{s}': {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size_suffixes() {
        assert_eq!(parse_size("1024").unwrap(), 1024);
        assert_eq!(parse_size("1KiB").unwrap(), 1024);
        assert_eq!(parse_size("1KB").unwrap(), 1000);
        assert_eq!(parse_size("2GiB").unwrap(), 2 * 1024 * 1024 * 1024);
        assert!(parse_size("lots").is_err());
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["dedupscan", "/scan/root"]);

        assert_eq!(cli.root, PathBuf::from("/scan/root"));
        assert!(cli.include_subdirs.is_empty());
        assert_eq!(cli.io_threads, 4);
        assert_eq!(cli.output, OutputFormat::Text);
        assert!(!cli.no_cache);
    }

    #[test]
    fn test_cli_full_invocation() {
        let cli = Cli::parse_from([
            "dedupscan",
            "/scan/root",
            "--include",
            "photos",
            "--include",
            "music",
            "--max-entries",
            "500",
            "--max-hash-size",
            "1GiB",
            "--output",
            "json",
            "--no-cache",
            "-vv",
        ]);

        assert_eq!(cli.include_subdirs, vec!["photos", "music"]);
        assert_eq!(cli.max_entries, Some(500));
        assert_eq!(cli.max_hash_size, Some(1024 * 1024 * 1024));
        assert_eq!(cli.output, OutputFormat::Json);
        assert!(cli.no_cache);
        assert_eq!(cli.verbose, 2);
    }
}
