//! Scanner module for deterministic directory inventory.
//!
//! This module provides functionality for:
//! - Single-threaded, lexicographically ordered directory walking
//! - Atomic-unit collapsing (package directories emitted as one entry)
//! - Ignore-file and hidden-path filtering
//!
//! # Architecture
//!
//! The scanner is divided into submodules:
//! - [`policy`]: Pure predicates (ignore patterns, hidden paths, atomic units)
//! - [`walker`]: Traversal and entry emission
//!
//! # Example
//!
//! ```no_run
//! use dedupscan::scanner::{Scanner, ScannerConfig};
//! use std::path::Path;
//!
//! let config = ScannerConfig::default().with_max_entries(Some(10_000));
//! let scanner = Scanner::new(Path::new("/home/user/Downloads"), config);
//! let report = scanner.scan();
//! println!("{} entries, {} errors", report.entries.len(), report.errors.len());
//! ```

pub mod policy;
pub mod walker;

use std::path::PathBuf;
use std::time::SystemTime;

pub use policy::{
    is_atomic_unit, is_hidden, load_ignore_patterns, parse_patterns, prunes_subtree,
    should_ignore, IgnorePattern, ATOMIC_EXTENSIONS,
};
pub use walker::Scanner;

/// One unit discovered by the scanner.
///
/// Either a regular file or an atomic-unit root (a package directory
/// collapsed into a single indivisible entry).
#[derive(Debug, Clone)]
pub struct ScanEntry {
    /// Absolute path to the file or unit root
    pub path: PathBuf,
    /// Whether this entry is a directory collapsed into a single unit
    pub is_atomic_unit: bool,
    /// Byte size (sum over contained files for atomic units)
    pub size: u64,
    /// Last modification time (the unit's own mtime for atomic units)
    pub mod_time: SystemTime,
}

impl ScanEntry {
    /// Create a regular-file entry.
    #[must_use]
    pub fn file(path: PathBuf, size: u64, mod_time: SystemTime) -> Self {
        Self {
            path,
            is_atomic_unit: false,
            size,
            mod_time,
        }
    }

    /// Create an atomic-unit entry.
    #[must_use]
    pub fn atomic_unit(path: PathBuf, size: u64, mod_time: SystemTime) -> Self {
        Self {
            path,
            is_atomic_unit: true,
            size,
            mod_time,
        }
    }
}

/// Configuration for a scan pass.
///
/// All state is threaded through explicitly; the scanner holds no
/// process-wide configuration.
#[derive(Debug, Clone, Default)]
pub struct ScannerConfig {
    /// Restrict the walk to immediate child directories of the root whose
    /// names match (exactly or by substring) one of these filters.
    /// `None` walks the whole tree under the root.
    pub include_subdirs: Option<Vec<String>>,

    /// Stop the walk after this many entries have been emitted.
    pub max_entries: Option<usize>,

    /// Path to a newline-delimited ignore file (see [`policy`]).
    pub ignore_file: Option<PathBuf>,
}

impl ScannerConfig {
    /// Restrict the walk to matching immediate subdirectories of the root.
    #[must_use]
    pub fn with_include_subdirs(mut self, filters: Option<Vec<String>>) -> Self {
        self.include_subdirs = filters;
        self
    }

    /// Cap the number of emitted entries.
    #[must_use]
    pub fn with_max_entries(mut self, max: Option<usize>) -> Self {
        self.max_entries = max;
        self
    }

    /// Set the ignore file to load at the start of the walk.
    #[must_use]
    pub fn with_ignore_file(mut self, path: Option<PathBuf>) -> Self {
        self.ignore_file = path;
        self
    }
}

/// Best-effort result of a scan pass.
///
/// A scan never aborts on per-path failures; inaccessible paths are
/// recorded here instead.
#[derive(Debug, Default)]
pub struct ScanReport {
    /// Entries in deterministic scan order
    pub entries: Vec<ScanEntry>,
    /// Paths that could not be read
    pub errors: Vec<ScanError>,
}

/// Errors that can occur during directory scanning.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Permission was denied when accessing a file or directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The specified path was not found.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// An I/O error occurred while accessing a path.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl ScanError {
    pub(crate) fn from_io(path: PathBuf, error: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match error.kind() {
            ErrorKind::PermissionDenied => Self::PermissionDenied(path),
            ErrorKind::NotFound => Self::NotFound(path),
            _ => Self::Io {
                path,
                source: error,
            },
        }
    }
}
