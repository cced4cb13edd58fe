//! dedupscan - filesystem fingerprinting and duplicate detection.
//!
//! A CLI engine that walks a directory tree deterministically, fingerprints
//! every file (and macOS-style package directories as single opaque units)
//! with BLAKE3, caches fingerprints across runs, and reports exact duplicate
//! groups. The first entry encountered in scan order for a given digest is
//! the original; every later match is a duplicate of it.

pub mod cache;
pub mod cli;
pub mod duplicates;
pub mod fingerprint;
pub mod logging;
pub mod output;
pub mod scanner;
