//! Cache entry definitions.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::fingerprint::Fingerprint;
use crate::scanner::ScanEntry;

/// Convert a modification time to nanoseconds since the Unix epoch.
///
/// Stored (and compared) as an integer so that platform differences in
/// `SystemTime` precision cannot make a valid entry look stale.
#[must_use]
pub fn mtime_to_ns(mtime: SystemTime) -> i64 {
    match mtime.duration_since(UNIX_EPOCH) {
        Ok(d) => i64::try_from(d.as_nanos()).unwrap_or(i64::MAX),
        Err(e) => i64::try_from(e.duration().as_nanos())
            .map(|ns| -ns)
            .unwrap_or(i64::MIN),
    }
}

/// One persisted fingerprint record, keyed by path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Absolute path (unique key)
    pub path: PathBuf,
    /// File size in bytes at hashing time
    pub size: u64,
    /// Modification time at hashing time, ns since epoch
    pub mtime_ns: i64,
    /// The computed fingerprint (digest or sentinel)
    pub fingerprint: Fingerprint,
}

impl CacheEntry {
    /// Build a record from a scan entry and its computed fingerprint.
    #[must_use]
    pub fn from_scan(entry: &ScanEntry, fingerprint: Fingerprint) -> Self {
        Self {
            path: entry.path.clone(),
            size: entry.size,
            mtime_ns: mtime_to_ns(entry.mod_time),
            fingerprint,
        }
    }

    /// Whether this record is still valid for the given live metadata.
    #[must_use]
    pub fn matches(&self, size: u64, mod_time: SystemTime) -> bool {
        self.size == size && self.mtime_ns == mtime_to_ns(mod_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn entry_at(size: u64, mtime: SystemTime) -> CacheEntry {
        CacheEntry {
            path: PathBuf::from("/data/file.bin"),
            size,
            mtime_ns: mtime_to_ns(mtime),
            fingerprint: Fingerprint::Content([1u8; 32]),
        }
    }

    #[test]
    fn test_matches_same_metadata() {
        let t = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        assert!(entry_at(100, t).matches(100, t));
    }

    #[test]
    fn test_mismatch_invalidates() {
        let t = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let entry = entry_at(100, t);

        assert!(!entry.matches(101, t));
        assert!(!entry.matches(100, t + Duration::from_secs(1)));
        assert!(!entry.matches(100, t + Duration::from_nanos(1)));
    }

    #[test]
    fn test_mtime_to_ns_pre_epoch() {
        let before = UNIX_EPOCH - Duration::from_secs(10);
        assert!(mtime_to_ns(before) < 0);
    }

    #[test]
    fn test_from_scan() {
        let t = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let scan = ScanEntry::file(PathBuf::from("/a.txt"), 42, t);
        let entry = CacheEntry::from_scan(&scan, Fingerprint::MetadataOnly);

        assert_eq!(entry.path, PathBuf::from("/a.txt"));
        assert_eq!(entry.size, 42);
        assert!(entry.matches(42, t));
        assert!(entry.fingerprint.is_metadata_only());
    }
}
