//! Deterministic directory walker.
//!
//! # Overview
//!
//! This module provides the [`Scanner`] struct for traversing a directory
//! tree and emitting [`ScanEntry`] values in a stable order. Unlike the
//! hashing stage, traversal is single-threaded by design: the duplicate
//! detector's canonical-file choice depends on scan order, so the walk
//! must be reproducible for a fixed filesystem state.
//!
//! # Features
//!
//! - Depth-first traversal, lexicographic within each directory
//! - Atomic-unit collapsing: package directories (`.app`, `.pkg`, ...) are
//!   emitted as a single entry and never enumerated internally
//! - Hidden files and directories skipped (subtrees pruned)
//! - Ignore-file filtering (see [`super::policy`])
//! - Optional restriction to matching immediate subdirectories of the root
//! - Entry cap for early exit
//! - Graceful shutdown via atomic flag
//!
//! # Example
//!
//! ```no_run
//! use dedupscan::scanner::{Scanner, ScannerConfig};
//! use std::path::Path;
//!
//! let scanner = Scanner::new(Path::new("."), ScannerConfig::default());
//! for entry in scanner.walk() {
//!     match entry {
//!         Ok(e) => println!("{}: {} bytes", e.path.display(), e.size),
//!         Err(e) => eprintln!("Warning: {}", e),
//!     }
//! }
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use walkdir::WalkDir;

use super::policy;
use super::{ScanEntry, ScanError, ScanReport, ScannerConfig};

/// Directory scanner producing entries in deterministic order.
#[derive(Debug)]
pub struct Scanner {
    /// Root path to walk
    root: PathBuf,
    /// Scanner configuration
    config: ScannerConfig,
    /// Optional shutdown flag for graceful termination
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Scanner {
    /// Create a new scanner for the given root.
    #[must_use]
    pub fn new(root: &Path, config: ScannerConfig) -> Self {
        Self {
            root: root.to_path_buf(),
            config,
            shutdown_flag: None,
        }
    }

    /// Set the shutdown flag for graceful termination.
    ///
    /// When the flag is set to `true`, the walk stops as soon as possible.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Walk the tree, yielding entries and recoverable errors.
    ///
    /// The ignore file is read once at the start of the call. Inaccessible
    /// paths are yielded as [`ScanError`] values rather than stopping
    /// iteration.
    pub fn walk(&self) -> impl Iterator<Item = Result<ScanEntry, ScanError>> + '_ {
        let patterns = self
            .config
            .ignore_file
            .as_deref()
            .map(policy::load_ignore_patterns)
            .unwrap_or_default();

        let (roots, root_errors) = self.walk_roots();
        let mut pending: Vec<Result<ScanEntry, ScanError>> =
            root_errors.into_iter().map(Err).collect();
        pending.reverse();

        let mut roots = roots.into_iter();
        let mut current: Option<walkdir::IntoIter> = None;
        let mut emitted = 0usize;

        std::iter::from_fn(move || loop {
            if self.is_shutdown_requested() {
                log::debug!("Scanner: shutdown requested, stopping walk");
                return None;
            }
            if self.config.max_entries.is_some_and(|max| emitted >= max) {
                log::debug!("Scanner: entry cap of {} reached", emitted);
                return None;
            }
            if let Some(item) = pending.pop() {
                if item.is_ok() {
                    emitted += 1;
                }
                return Some(item);
            }

            if current.is_none() {
                let next_root = roots.next()?;
                log::debug!("Scanner: walking {}", next_root.display());
                current = Some(
                    WalkDir::new(next_root)
                        .follow_links(false)
                        .sort_by_file_name()
                        .into_iter(),
                );
            }
            let iter = current.as_mut().expect("walker set above");

            let entry = match iter.next() {
                Some(Ok(entry)) => entry,
                Some(Err(e)) => return Some(Err(self.convert_walk_error(e))),
                None => {
                    current = None;
                    continue;
                }
            };

            let path = entry.path();

            // The walk root itself is never collapsed or emitted as a
            // directory; a root that is a plain file still gets scanned.
            if entry.depth() == 0 && entry.file_type().is_dir() {
                continue;
            }

            let name = entry.file_name().to_string_lossy();
            if entry.depth() > 0 && name.starts_with('.') {
                if entry.file_type().is_dir() {
                    iter.skip_current_dir();
                }
                log::trace!("Skipping hidden entry: {}", path.display());
                continue;
            }

            if entry.file_type().is_dir() {
                // Only a wildcard prefix pattern covers every descendant;
                // exact patterns and globs are tested per file instead.
                if policy::prunes_subtree(path, &patterns) {
                    log::trace!("Ignoring directory subtree: {}", path.display());
                    iter.skip_current_dir();
                    continue;
                }
                if policy::is_atomic_unit(path) {
                    // The whole subtree is consumed by the unit; nested
                    // units inside it are never emitted separately.
                    iter.skip_current_dir();
                    let item = self.unit_entry(path);
                    if item.is_ok() {
                        emitted += 1;
                    }
                    return Some(item);
                }
                continue;
            }

            if !entry.file_type().is_file() {
                log::trace!("Skipping non-regular entry: {}", path.display());
                continue;
            }

            if policy::should_ignore(path, &patterns) {
                log::trace!("Ignoring file: {}", path.display());
                continue;
            }

            let metadata = match entry.metadata() {
                Ok(m) => m,
                Err(e) => return Some(Err(self.convert_walk_error(e))),
            };
            let mod_time = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);

            emitted += 1;
            return Some(Ok(ScanEntry::file(
                path.to_path_buf(),
                metadata.len(),
                mod_time,
            )));
        })
    }

    /// Run a full scan, collecting entries and recording errors.
    #[must_use]
    pub fn scan(&self) -> ScanReport {
        let mut report = ScanReport::default();
        for item in self.walk() {
            match item {
                Ok(entry) => report.entries.push(entry),
                Err(e) => {
                    log::warn!("Scan error: {}", e);
                    report.errors.push(e);
                }
            }
        }
        log::info!(
            "Scan complete: {} entries, {} errors",
            report.entries.len(),
            report.errors.len()
        );
        report
    }

    /// Determine the set of walk roots, applying the subdirectory filter.
    fn walk_roots(&self) -> (Vec<PathBuf>, Vec<ScanError>) {
        let Some(filters) = self.config.include_subdirs.as_ref() else {
            return (vec![self.root.clone()], Vec::new());
        };

        let read_dir = match std::fs::read_dir(&self.root) {
            Ok(rd) => rd,
            Err(e) => {
                return (Vec::new(), vec![ScanError::from_io(self.root.clone(), e)]);
            }
        };

        let mut roots = Vec::new();
        let mut errors = Vec::new();
        for child in read_dir {
            match child {
                Ok(child) => {
                    let is_dir = child.file_type().map(|t| t.is_dir()).unwrap_or(false);
                    if !is_dir {
                        continue;
                    }
                    let name = child.file_name().to_string_lossy().into_owned();
                    if filters.iter().any(|f| name == *f || name.contains(f)) {
                        roots.push(child.path());
                    }
                }
                Err(e) => errors.push(ScanError::from_io(self.root.clone(), e)),
            }
        }

        // Stable order across subdirectory roots as well
        roots.sort();
        log::debug!(
            "Subdirectory filter matched {} of the root's children",
            roots.len()
        );
        (roots, errors)
    }

    /// Build the entry for an atomic-unit directory.
    ///
    /// The size is the sum of all transitively contained regular files;
    /// the modification time is the unit's own mtime (content changes are
    /// self-detecting through composite hashing).
    fn unit_entry(&self, path: &Path) -> Result<ScanEntry, ScanError> {
        let metadata = std::fs::symlink_metadata(path)
            .map_err(|e| ScanError::from_io(path.to_path_buf(), e))?;
        let mod_time = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);

        let mut size = 0u64;
        for contained in WalkDir::new(path).follow_links(false) {
            match contained {
                Ok(c) if c.file_type().is_file() => match c.metadata() {
                    Ok(m) => size += m.len(),
                    Err(e) => log::warn!(
                        "Could not size {} inside unit {}: {}",
                        c.path().display(),
                        path.display(),
                        e
                    ),
                },
                Ok(_) => {}
                Err(e) => log::warn!("Error sizing unit {}: {}", path.display(), e),
            }
        }

        Ok(ScanEntry::atomic_unit(path.to_path_buf(), size, mod_time))
    }

    fn convert_walk_error(&self, error: walkdir::Error) -> ScanError {
        let path = error
            .path()
            .map_or_else(|| self.root.clone(), Path::to_path_buf);
        match error.into_io_error() {
            Some(io) => ScanError::from_io(path, io),
            None => ScanError::Io {
                path,
                source: std::io::Error::other("filesystem loop detected"),
            },
        }
    }
}
