//! Content fingerprinting for scan entries.
//!
//! This module provides functionality for:
//! - Streamed BLAKE3 hashing of regular files
//! - Deterministic composite hashing of atomic units
//! - The metadata-only sentinel for oversized entries
//! - Parallel orchestration over a scan result with incremental caching
//!
//! # Architecture
//!
//! - [`hasher`]: The streaming and composite hash primitives
//! - [`engine`]: `fingerprint_all`, the cache-aware parallel driver
//!
//! # Example
//!
//! ```no_run
//! use dedupscan::fingerprint::{fingerprint_all, FingerprintConfig, Hasher};
//! use dedupscan::scanner::{Scanner, ScannerConfig};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let report = Scanner::new(Path::new("."), ScannerConfig::default()).scan();
//! let hasher = Arc::new(Hasher::new());
//! let (entries, stats) = fingerprint_all(report.entries, hasher, FingerprintConfig::default());
//! println!("{} hashed, {} from cache", stats.hashed, stats.cache_hits);
//! ```

pub mod engine;
pub mod hasher;

use std::fmt;
use std::path::PathBuf;

use crate::scanner::ScanEntry;

pub use engine::{fingerprint_all, FingerprintConfig, FingerprintStats};
pub use hasher::Hasher;

/// A 32-byte BLAKE3 digest.
pub type Hash = [u8; 32];

/// Serialized form of the metadata-only sentinel.
pub const METADATA_ONLY: &str = "METADATA_ONLY";

/// Convert a hash to its lowercase hex representation.
#[must_use]
pub fn hash_to_hex(hash: &Hash) -> String {
    let mut out = String::with_capacity(64);
    for byte in hash {
        use fmt::Write;
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Parse a 64-character hex string back into a hash.
#[must_use]
pub fn hex_to_hash(hex: &str) -> Option<Hash> {
    if hex.len() != 64 {
        return None;
    }
    let mut hash = [0u8; 32];
    for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
        let s = std::str::from_utf8(chunk).ok()?;
        hash[i] = u8::from_str_radix(s, 16).ok()?;
    }
    Some(hash)
}

/// Content fingerprint of a scan entry.
///
/// Either a real digest or the sentinel for entries whose content was
/// deliberately left unexamined due to size. The sentinel is data, not an
/// error: it propagates unchanged through duplicate detection and is
/// never matched against anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fingerprint {
    /// BLAKE3 digest over the entry's content
    Content(Hash),
    /// Content intentionally not hashed (size threshold exceeded)
    MetadataOnly,
}

impl Fingerprint {
    /// Whether this is the metadata-only sentinel.
    #[must_use]
    pub fn is_metadata_only(&self) -> bool {
        matches!(self, Self::MetadataOnly)
    }

    /// The digest, if content was hashed.
    #[must_use]
    pub fn digest(&self) -> Option<&Hash> {
        match self {
            Self::Content(hash) => Some(hash),
            Self::MetadataOnly => None,
        }
    }

    /// Parse the persisted string form (hex digest or sentinel).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        if s == METADATA_ONLY {
            Some(Self::MetadataOnly)
        } else {
            hex_to_hash(s).map(Self::Content)
        }
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Content(hash) => f.write_str(&hash_to_hex(hash)),
            Self::MetadataOnly => f.write_str(METADATA_ONLY),
        }
    }
}

/// A scan entry with its computed fingerprint, in original scan position.
#[derive(Debug, Clone)]
pub struct FingerprintedEntry {
    /// The scanned entry
    pub entry: ScanEntry,
    /// Its content fingerprint
    pub fingerprint: Fingerprint,
}

/// Errors that can occur during fingerprinting.
#[derive(thiserror::Error, Debug)]
pub enum HashError {
    /// The entry was not found (deleted between scan and hash).
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Permission was denied when reading the entry.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// An I/O error occurred while reading the entry.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl HashError {
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
