//! Duplicate grouping with deterministic canonical selection.
//!
//! # Overview
//!
//! [`detect_duplicates`] partitions fingerprinted entries by digest and
//! marks every member after the first as a duplicate of that first
//! (canonical) member. The pass iterates the supplied list in order and
//! never re-derives order from hash-map iteration, so canonical selection
//! is reproducible across runs and platforms whenever the input order is.
//!
//! Entries carrying the metadata-only sentinel are excluded from grouping
//! entirely: content that was never examined is never claimed equal to
//! anything, however coincidental the names or sizes.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Serialize;

use crate::fingerprint::{hash_to_hex, Fingerprint, FingerprintedEntry, Hash};
use crate::scanner::ScanEntry;

/// A scan entry annotated with duplicate status.
#[derive(Debug, Clone)]
pub struct AnnotatedEntry {
    /// The scanned entry
    pub entry: ScanEntry,
    /// Its content fingerprint
    pub fingerprint: Fingerprint,
    /// Whether a prior entry in scan order has the same digest
    pub is_duplicate: bool,
    /// Path of the canonical entry, present only when `is_duplicate`
    pub canonical_path: Option<PathBuf>,
}

/// Aggregate statistics from duplicate detection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DuplicateStats {
    /// Total entries examined
    pub total_entries: usize,
    /// Entries that are not duplicates (canonicals, singletons, sentinels)
    pub unique_entries: usize,
    /// Entries marked as duplicates
    pub duplicate_entries: usize,
    /// Digest groups with two or more members
    pub duplicate_groups: usize,
    /// Bytes recoverable by keeping one copy per group
    pub wasted_bytes: u64,
    /// Entries excluded from grouping by the metadata-only sentinel
    pub metadata_only: usize,
}

/// A confirmed duplicate group, for reporting.
#[derive(Debug, Clone, Serialize)]
pub struct DuplicateGroup {
    /// Hex digest shared by the group
    pub fingerprint: String,
    /// Size of the canonical entry in bytes
    pub size: u64,
    /// Member paths, canonical first, in scan order
    pub paths: Vec<PathBuf>,
}

impl DuplicateGroup {
    /// Number of redundant copies (members minus the canonical).
    #[must_use]
    pub fn duplicate_count(&self) -> usize {
        self.paths.len().saturating_sub(1)
    }

    /// Bytes recoverable by keeping only the canonical copy.
    #[must_use]
    pub fn wasted_bytes(&self) -> u64 {
        self.size * self.duplicate_count() as u64
    }
}

/// Annotate entries with duplicate status in the order supplied.
///
/// The first entry of each digest group becomes canonical; all later
/// members reference it. Sentinel entries pass through unannotated.
///
/// # Example
///
/// ```
/// use dedupscan::duplicates::detect_duplicates;
/// use dedupscan::fingerprint::{Fingerprint, FingerprintedEntry};
/// use dedupscan::scanner::ScanEntry;
/// use std::time::SystemTime;
///
/// let now = SystemTime::now();
/// let digest = Fingerprint::Content([1u8; 32]);
/// let entries = vec![
///     FingerprintedEntry { entry: ScanEntry::file("/a".into(), 10, now), fingerprint: digest },
///     FingerprintedEntry { entry: ScanEntry::file("/b".into(), 10, now), fingerprint: digest },
/// ];
///
/// let (annotated, stats) = detect_duplicates(entries);
/// assert!(!annotated[0].is_duplicate);
/// assert!(annotated[1].is_duplicate);
/// assert_eq!(stats.wasted_bytes, 10);
/// ```
#[must_use]
pub fn detect_duplicates(
    entries: Vec<FingerprintedEntry>,
) -> (Vec<AnnotatedEntry>, DuplicateStats) {
    let mut stats = DuplicateStats {
        total_entries: entries.len(),
        ..Default::default()
    };

    // Canonical path and size per digest, plus how many members each
    // digest has accumulated so far (for group counting).
    let mut canonical: HashMap<Hash, (PathBuf, u64)> = HashMap::new();
    let mut members: HashMap<Hash, usize> = HashMap::new();

    let mut annotated = Vec::with_capacity(entries.len());
    for item in entries {
        let FingerprintedEntry { entry, fingerprint } = item;

        let Fingerprint::Content(hash) = fingerprint else {
            stats.metadata_only += 1;
            stats.unique_entries += 1;
            annotated.push(AnnotatedEntry {
                entry,
                fingerprint,
                is_duplicate: false,
                canonical_path: None,
            });
            continue;
        };

        if let Some((canonical_path, canonical_size)) = canonical.get(&hash) {
            let count = members.entry(hash).or_insert(1);
            *count += 1;
            if *count == 2 {
                stats.duplicate_groups += 1;
            }
            stats.duplicate_entries += 1;
            stats.wasted_bytes += canonical_size;

            log::debug!(
                "Duplicate of {}: {}",
                canonical_path.display(),
                entry.path.display()
            );
            let canonical_path = canonical_path.clone();
            annotated.push(AnnotatedEntry {
                entry,
                fingerprint,
                is_duplicate: true,
                canonical_path: Some(canonical_path),
            });
        } else {
            canonical.insert(hash, (entry.path.clone(), entry.size));
            stats.unique_entries += 1;
            annotated.push(AnnotatedEntry {
                entry,
                fingerprint,
                is_duplicate: false,
                canonical_path: None,
            });
        }
    }

    log::info!(
        "Duplicate detection: {} groups, {} duplicates, {} bytes recoverable",
        stats.duplicate_groups,
        stats.duplicate_entries,
        stats.wasted_bytes
    );

    (annotated, stats)
}

/// Build report groups from annotated entries.
///
/// Groups are ordered by the scan position of their canonical member and
/// contain only digests with two or more members.
#[must_use]
pub fn collect_groups(entries: &[AnnotatedEntry]) -> Vec<DuplicateGroup> {
    let mut groups: Vec<DuplicateGroup> = Vec::new();
    let mut index_of: HashMap<Hash, usize> = HashMap::new();

    for item in entries {
        let Fingerprint::Content(hash) = item.fingerprint else {
            continue;
        };
        if item.is_duplicate {
            if let Some(&idx) = index_of.get(&hash) {
                groups[idx].paths.push(item.entry.path.clone());
            }
        } else {
            index_of.insert(hash, groups.len());
            groups.push(DuplicateGroup {
                fingerprint: hash_to_hex(&hash),
                size: item.entry.size,
                paths: vec![item.entry.path.clone()],
            });
        }
    }

    groups.retain(|g| g.paths.len() > 1);
    groups
}
