//! Cache-aware parallel fingerprinting driver.
//!
//! # Overview
//!
//! [`fingerprint_all`] distributes hashing of independent entries across a
//! bounded rayon pool. Hashing is the only parallel stage of the pipeline;
//! workers share no mutable state and return immutable results that are
//! re-indexed by original scan position before being handed to the
//! duplicate detector. Canonical selection therefore always sees scan
//! order, never completion order.
//!
//! Per entry the driver applies, in order:
//!
//! 1. The shutdown flag (stops dispatching new work)
//! 2. The size threshold (emit the metadata-only sentinel without reading)
//! 3. The cache (reuse when live size and mtime match; regular files only)
//! 4. The hasher (streamed file digest or composite unit digest)
//!
//! Every freshly computed fingerprint is stored back unconditionally,
//! sentinel included, so repeated scans do not re-attempt oversized files.
//! A partially computed result is never stored: the `put` happens only
//! after the digest is complete.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;

use crate::cache::{CacheEntry, FingerprintCache};
use crate::scanner::ScanEntry;

use super::{Fingerprint, FingerprintedEntry, HashError, Hasher};

/// Configuration for the fingerprinting stage.
#[derive(Clone, Default)]
pub struct FingerprintConfig {
    /// Number of I/O threads for parallel hashing.
    /// Zero selects the default of 4 (bounded to prevent disk thrashing).
    pub io_threads: usize,
    /// Skip hashing entirely for entries larger than this, emitting the
    /// metadata-only sentinel instead.
    pub metadata_only_threshold: Option<u64>,
    /// Optional fingerprint cache for faster rescans.
    pub cache: Option<Arc<FingerprintCache>>,
    /// Optional shutdown flag for graceful termination.
    pub shutdown_flag: Option<Arc<AtomicBool>>,
}

impl std::fmt::Debug for FingerprintConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FingerprintConfig")
            .field("io_threads", &self.io_threads)
            .field("metadata_only_threshold", &self.metadata_only_threshold)
            .field("cache", &self.cache.as_ref().map(|_| "<cache>"))
            .field("shutdown_flag", &self.shutdown_flag)
            .finish()
    }
}

/// Default bounded I/O parallelism.
const DEFAULT_IO_THREADS: usize = 4;

impl FingerprintConfig {
    /// Set the I/O thread count.
    #[must_use]
    pub fn with_io_threads(mut self, threads: usize) -> Self {
        self.io_threads = threads;
        self
    }

    /// Set the metadata-only size threshold.
    #[must_use]
    pub fn with_metadata_only_threshold(mut self, threshold: Option<u64>) -> Self {
        self.metadata_only_threshold = threshold;
        self
    }

    /// Set the fingerprint cache.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<FingerprintCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Set the shutdown flag for graceful termination.
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

    fn effective_threads(&self) -> usize {
        if self.io_threads == 0 {
            DEFAULT_IO_THREADS
        } else {
            self.io_threads
        }
    }
}

/// Statistics from the fingerprinting stage.
#[derive(Debug, Default)]
pub struct FingerprintStats {
    /// Total entries that entered the stage
    pub input_entries: usize,
    /// Entries whose content was hashed fresh
    pub hashed: usize,
    /// Entries served from the cache
    pub cache_hits: usize,
    /// Entries hashed fresh while a cache was configured
    pub cache_misses: usize,
    /// Entries given the metadata-only sentinel
    pub metadata_only: usize,
    /// Entries that failed to read and were excluded from the results
    pub failed: usize,
    /// Entries skipped because shutdown was requested
    pub skipped: usize,
    /// Errors for the failed entries
    pub errors: Vec<HashError>,
    /// Whether the stage was interrupted by shutdown
    pub interrupted: bool,
}

/// Per-entry outcome collected from the workers.
enum Outcome {
    Fresh(Fingerprint),
    Cached(Fingerprint),
    Sentinel,
    Failed(HashError),
    Skipped,
}

/// Fingerprint every scan entry, preserving scan order in the output.
///
/// Failed entries are excluded from the returned list (a read failure is
/// recorded, never silently retried) and counted in the stats.
///
/// # Example
///
/// ```no_run
/// use dedupscan::fingerprint::{fingerprint_all, FingerprintConfig, Hasher};
/// use dedupscan::scanner::ScanEntry;
/// use std::sync::Arc;
///
/// let entries: Vec<ScanEntry> = vec![];
/// let hasher = Arc::new(Hasher::new());
/// let config = FingerprintConfig::default().with_io_threads(2);
/// let (fingerprinted, stats) = fingerprint_all(entries, hasher, config);
/// assert_eq!(fingerprinted.len() + stats.failed + stats.skipped, stats.input_entries);
/// ```
#[must_use]
pub fn fingerprint_all(
    entries: Vec<ScanEntry>,
    hasher: Arc<Hasher>,
    config: FingerprintConfig,
) -> (Vec<FingerprintedEntry>, FingerprintStats) {
    let mut stats = FingerprintStats {
        input_entries: entries.len(),
        ..Default::default()
    };

    if entries.is_empty() {
        log::debug!("Fingerprinting: no entries to process");
        return (Vec::new(), stats);
    }

    log::info!("Fingerprinting {} entries", entries.len());

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.effective_threads())
        .build()
        .unwrap_or_else(|_| {
            log::warn!(
                "Failed to create custom thread pool, using global pool with {} threads",
                rayon::current_num_threads()
            );
            rayon::ThreadPoolBuilder::new().build().unwrap()
        });

    let mut results: Vec<(usize, ScanEntry, Outcome)> = pool.install(|| {
        entries
            .into_par_iter()
            .enumerate()
            .map(|(idx, entry)| {
                let outcome = fingerprint_one(&entry, &hasher, &config);
                (idx, entry, outcome)
            })
            .collect()
    });

    // Restore original scan positions: grouping downstream must see scan
    // order, not hashing completion order.
    results.sort_by_key(|(idx, _, _)| *idx);

    if config.is_shutdown_requested() {
        stats.interrupted = true;
        log::info!("Fingerprinting interrupted by shutdown signal");
    }

    let cache_enabled = config.cache.is_some();
    let mut fingerprinted = Vec::with_capacity(results.len());
    for (_, entry, outcome) in results {
        match outcome {
            Outcome::Fresh(fingerprint) => {
                stats.hashed += 1;
                if cache_enabled {
                    stats.cache_misses += 1;
                }
                fingerprinted.push(FingerprintedEntry { entry, fingerprint });
            }
            Outcome::Cached(fingerprint) => {
                stats.cache_hits += 1;
                fingerprinted.push(FingerprintedEntry { entry, fingerprint });
            }
            Outcome::Sentinel => {
                stats.metadata_only += 1;
                fingerprinted.push(FingerprintedEntry {
                    entry,
                    fingerprint: Fingerprint::MetadataOnly,
                });
            }
            Outcome::Failed(e) => {
                stats.failed += 1;
                stats.errors.push(e);
            }
            Outcome::Skipped => stats.skipped += 1,
        }
    }

    log::info!(
        "Fingerprinting complete: {} hashed, {} cached, {} sentinel, {} failed",
        stats.hashed,
        stats.cache_hits,
        stats.metadata_only,
        stats.failed
    );

    (fingerprinted, stats)
}

/// Resolve one entry's fingerprint: threshold, cache, then hashing.
fn fingerprint_one(
    entry: &ScanEntry,
    hasher: &Hasher,
    config: &FingerprintConfig,
) -> Outcome {
    if config.is_shutdown_requested() {
        return Outcome::Skipped;
    }

    if config
        .metadata_only_threshold
        .is_some_and(|threshold| entry.size > threshold)
    {
        log::debug!(
            "Size {} exceeds threshold, emitting sentinel: {}",
            entry.size,
            entry.path.display()
        );
        store(config, entry, Fingerprint::MetadataOnly);
        return Outcome::Sentinel;
    }

    // Directory mtime is not trusted to reflect deeply nested content
    // changes, so atomic units always recompute.
    if !entry.is_atomic_unit {
        if let Some(cache) = config.cache.as_ref() {
            match cache.get(&entry.path) {
                Ok(Some(cached)) if cached.matches(entry.size, entry.mod_time) => {
                    log::trace!("Cache hit: {}", entry.path.display());
                    return Outcome::Cached(cached.fingerprint);
                }
                Ok(Some(_)) => log::trace!("Cache stale: {}", entry.path.display()),
                Ok(None) => log::trace!("Cache miss: {}", entry.path.display()),
                Err(e) => log::warn!(
                    "Cache lookup failed for {} (recomputing): {}",
                    entry.path.display(),
                    e
                ),
            }
        }
    }

    let computed = if entry.is_atomic_unit {
        hasher.hash_unit(&entry.path)
    } else {
        hasher.hash_file(&entry.path)
    };

    match computed {
        Ok(hash) => {
            let fingerprint = Fingerprint::Content(hash);
            store(config, entry, fingerprint);
            Outcome::Fresh(fingerprint)
        }
        Err(e) => {
            log::warn!("Failed to fingerprint {}: {}", entry.path.display(), e);
            Outcome::Failed(e)
        }
    }
}

/// Store a fully computed fingerprint; cache failures only degrade.
fn store(config: &FingerprintConfig, entry: &ScanEntry, fingerprint: Fingerprint) {
    if let Some(cache) = config.cache.as_ref() {
        let record = CacheEntry::from_scan(entry, fingerprint);
        if let Err(e) = cache.put(&record) {
            log::warn!(
                "Failed to update cache for {}: {}",
                entry.path.display(),
                e
            );
        }
    }
}
