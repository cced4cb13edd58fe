//! SQLite-backed fingerprint cache.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::{params, Connection, OptionalExtension};

use super::CacheEntry;
use crate::fingerprint::Fingerprint;

/// Errors from the cache backing store.
#[derive(thiserror::Error, Debug)]
pub enum CacheError {
    /// The underlying SQLite operation failed.
    #[error("Cache database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A stored fingerprint string could not be parsed.
    #[error("Corrupt fingerprint in cache for {path}: {value}")]
    CorruptFingerprint {
        /// The record's path key
        path: PathBuf,
        /// The unparseable stored value
        value: String,
    },
}

/// Result alias for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Persistent path → (size, mtime, fingerprint) table.
///
/// The connection sits behind a mutex so an `Arc<FingerprintCache>` can be
/// shared by the hashing workers.
pub struct FingerprintCache {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for FingerprintCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FingerprintCache").finish_non_exhaustive()
    }
}

impl FingerprintCache {
    /// Open (or create) a cache database at the given path.
    pub fn open(path: &Path) -> CacheResult<Self> {
        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                log::warn!("Could not create cache directory {}: {}", parent.display(), e);
            }
        }
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Open an in-memory cache (used by tests).
    pub fn open_in_memory() -> CacheResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> CacheResult<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS fingerprints (
                path        TEXT PRIMARY KEY,
                size        INTEGER NOT NULL,
                mtime_ns    INTEGER NOT NULL,
                fingerprint TEXT NOT NULL
            );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the connection, recovering from a poisoned lock.
    ///
    /// A worker that panicked while holding the guard leaves the SQLite
    /// connection itself intact; treating that as fatal would abort scans
    /// the cache is only meant to accelerate.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up the record for a path.
    pub fn get(&self, path: &Path) -> CacheResult<Option<CacheEntry>> {
        let conn = self.conn();
        let row = conn
            .query_row(
                "SELECT size, mtime_ns, fingerprint FROM fingerprints WHERE path = ?1",
                params![path.to_string_lossy()],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        let Some((size, mtime_ns, stored)) = row else {
            return Ok(None);
        };

        let fingerprint = Fingerprint::parse(&stored).ok_or_else(|| {
            CacheError::CorruptFingerprint {
                path: path.to_path_buf(),
                value: stored,
            }
        })?;

        Ok(Some(CacheEntry {
            path: path.to_path_buf(),
            size: u64::try_from(size).unwrap_or(0),
            mtime_ns,
            fingerprint,
        }))
    }

    /// Insert or replace the record for a path.
    pub fn put(&self, entry: &CacheEntry) -> CacheResult<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT OR REPLACE INTO fingerprints (path, size, mtime_ns, fingerprint)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                entry.path.to_string_lossy(),
                i64::try_from(entry.size).unwrap_or(i64::MAX),
                entry.mtime_ns,
                entry.fingerprint.to_string(),
            ],
        )?;
        Ok(())
    }

    /// Remove all records.
    pub fn clear(&self) -> CacheResult<()> {
        let conn = self.conn();
        conn.execute("DELETE FROM fingerprints", [])?;
        Ok(())
    }

    /// Number of stored records.
    pub fn len(&self) -> CacheResult<usize> {
        let conn = self.conn();
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM fingerprints", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Whether the cache holds no records.
    pub fn is_empty(&self) -> CacheResult<bool> {
        Ok(self.len()? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::mtime_to_ns;
    use std::time::{Duration, UNIX_EPOCH};

    fn sample_entry(path: &str, fingerprint: Fingerprint) -> CacheEntry {
        CacheEntry {
            path: PathBuf::from(path),
            size: 1234,
            mtime_ns: mtime_to_ns(UNIX_EPOCH + Duration::from_secs(1_700_000_000)),
            fingerprint,
        }
    }

    #[test]
    fn test_round_trip() {
        let cache = FingerprintCache::open_in_memory().unwrap();
        let entry = sample_entry("/data/a.bin", Fingerprint::Content([9u8; 32]));

        cache.put(&entry).unwrap();
        let loaded = cache.get(Path::new("/data/a.bin")).unwrap().unwrap();
        assert_eq!(loaded, entry);
    }

    #[test]
    fn test_miss_returns_none() {
        let cache = FingerprintCache::open_in_memory().unwrap();
        assert!(cache.get(Path::new("/never/seen")).unwrap().is_none());
    }

    #[test]
    fn test_put_replaces() {
        let cache = FingerprintCache::open_in_memory().unwrap();
        let first = sample_entry("/data/a.bin", Fingerprint::Content([1u8; 32]));
        let second = sample_entry("/data/a.bin", Fingerprint::Content([2u8; 32]));

        cache.put(&first).unwrap();
        cache.put(&second).unwrap();

        let loaded = cache.get(Path::new("/data/a.bin")).unwrap().unwrap();
        assert_eq!(loaded.fingerprint, Fingerprint::Content([2u8; 32]));
        assert_eq!(cache.len().unwrap(), 1);
    }

    #[test]
    fn test_sentinel_persists() {
        let cache = FingerprintCache::open_in_memory().unwrap();
        let entry = sample_entry("/big/image.bin", Fingerprint::MetadataOnly);

        cache.put(&entry).unwrap();
        let loaded = cache.get(Path::new("/big/image.bin")).unwrap().unwrap();
        assert!(loaded.fingerprint.is_metadata_only());
    }

    #[test]
    fn test_clear() {
        let cache = FingerprintCache::open_in_memory().unwrap();
        cache
            .put(&sample_entry("/a", Fingerprint::Content([1u8; 32])))
            .unwrap();
        cache
            .put(&sample_entry("/b", Fingerprint::Content([2u8; 32])))
            .unwrap();
        assert_eq!(cache.len().unwrap(), 2);

        cache.clear().unwrap();
        assert!(cache.is_empty().unwrap());
    }

    #[test]
    fn test_survives_poisoned_lock() {
        use std::sync::Arc;

        let cache = Arc::new(FingerprintCache::open_in_memory().unwrap());
        cache
            .put(&sample_entry("/a", Fingerprint::Content([1u8; 32])))
            .unwrap();

        // Panic while holding the guard to poison the mutex
        let poisoner = Arc::clone(&cache);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.conn.lock().unwrap();
            panic!("poisoning the cache lock");
        })
        .join();
        assert!(cache.conn.lock().is_err());

        // The cache keeps serving rather than aborting the scan
        let loaded = cache.get(Path::new("/a")).unwrap().unwrap();
        assert_eq!(loaded.fingerprint, Fingerprint::Content([1u8; 32]));
        cache
            .put(&sample_entry("/b", Fingerprint::Content([2u8; 32])))
            .unwrap();
        assert_eq!(cache.len().unwrap(), 2);
    }

    #[test]
    fn test_corrupt_fingerprint_detected() {
        let cache = FingerprintCache::open_in_memory().unwrap();
        {
            let conn = cache.conn.lock().unwrap();
            conn.execute(
                "INSERT INTO fingerprints (path, size, mtime_ns, fingerprint)
                 VALUES ('/bad', 1, 1, 'garbage')",
                [],
            )
            .unwrap();
        }

        let err = cache.get(Path::new("/bad")).unwrap_err();
        assert!(matches!(err, CacheError::CorruptFingerprint { .. }));
    }

    #[test]
    fn test_open_on_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let db = dir.path().join("cache/fingerprints.db");

        let cache = FingerprintCache::open(&db).unwrap();
        cache
            .put(&sample_entry("/x", Fingerprint::Content([3u8; 32])))
            .unwrap();
        drop(cache);

        let reopened = FingerprintCache::open(&db).unwrap();
        assert_eq!(reopened.len().unwrap(), 1);
    }
}
