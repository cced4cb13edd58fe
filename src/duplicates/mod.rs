//! Duplicate detection over fingerprinted scan results.
//!
//! A single order-sensitive pass groups entries by digest, designates the
//! first-scanned member of each group as canonical, and annotates the
//! rest as duplicates. See [`detector`].

pub mod detector;

pub use detector::{
    collect_groups, detect_duplicates, AnnotatedEntry, DuplicateGroup, DuplicateStats,
};
