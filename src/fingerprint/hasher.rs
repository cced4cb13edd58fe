//! BLAKE3 hashing primitives: streamed files and composite units.
//!
//! # Overview
//!
//! [`Hasher`] computes content digests two ways:
//!
//! - [`Hasher::hash_file`] streams a regular file through a fixed-size
//!   chunk buffer, bounding memory for arbitrarily large files.
//! - [`Hasher::hash_unit`] hashes an atomic-unit directory as one
//!   composite digest over the ordered sequence of (relative path,
//!   content) pairs. Feeding the relative path into the digest means an
//!   internal rename changes the fingerprint even when content does not.
//!
//! Both are pure functions of byte content and relative path strings:
//! re-running on an unchanged tree yields a bit-identical digest,
//! independent of filesystem directory-listing order.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use walkdir::WalkDir;

use super::{Hash, HashError};

/// Default chunk size for streamed reads (64 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Separator fed between digest fields.
const FIELD_SEP: &[u8] = b"\0";

/// One item discovered inside an atomic unit, keyed by its relative path.
enum UnitItem {
    File(PathBuf),
    /// Enumeration failed for this relative path; the tag is hashed in
    /// place of content so the composite digest still changes
    /// deterministically.
    WalkError(String),
}

/// Content hasher with a configurable chunk size.
///
/// Shared across hashing workers behind an `Arc`; the only interior state
/// is a counter of files opened for reading, exposed for observability.
#[derive(Debug)]
pub struct Hasher {
    chunk_size: usize,
    files_read: AtomicU64,
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher {
    /// Create a hasher with the default 64 KiB chunk size.
    #[must_use]
    pub fn new() -> Self {
        Self::with_chunk_size(DEFAULT_CHUNK_SIZE)
    }

    /// Create a hasher with a custom chunk size.
    #[must_use]
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            files_read: AtomicU64::new(0),
        }
    }

    /// Number of files opened for content reading so far.
    ///
    /// Cache hits and metadata-only short-circuits never touch this
    /// counter, which makes cache behavior observable in tests.
    #[must_use]
    pub fn files_read(&self) -> u64 {
        self.files_read.load(Ordering::Relaxed)
    }

    /// Hash a regular file by streaming chunks into a running digest.
    pub fn hash_file(&self, path: &Path) -> Result<Hash, HashError> {
        let mut file =
            File::open(path).map_err(|e| HashError::from_io(path.to_path_buf(), e))?;
        self.files_read.fetch_add(1, Ordering::Relaxed);

        let mut digest = blake3::Hasher::new();
        let mut buf = vec![0u8; self.chunk_size];
        loop {
            let n = file
                .read(&mut buf)
                .map_err(|e| HashError::from_io(path.to_path_buf(), e))?;
            if n == 0 {
                break;
            }
            digest.update(&buf[..n]);
        }

        Ok(*digest.finalize().as_bytes())
    }

    /// Hash an atomic-unit directory as a single composite digest.
    ///
    /// Every transitively contained regular file is fed into one running
    /// digest as its relative-path string followed by its content, in
    /// lexicographic byte order of the relative paths. A contained file
    /// that fails to read contributes a deterministic error marker in
    /// place of its content rather than being skipped silently.
    pub fn hash_unit(&self, root: &Path) -> Result<Hash, HashError> {
        if !root.exists() {
            return Err(HashError::NotFound(root.to_path_buf()));
        }

        let mut items: Vec<(String, UnitItem)> = Vec::new();
        for entry in WalkDir::new(root).follow_links(false) {
            match entry {
                Ok(entry) => {
                    if !entry.file_type().is_file() {
                        continue;
                    }
                    let rel = relative_key(entry.path(), root);
                    items.push((rel, UnitItem::File(entry.path().to_path_buf())));
                }
                Err(e) => {
                    let rel = e
                        .path()
                        .map_or_else(|| root.display().to_string(), |p| relative_key(p, root));
                    let tag = e
                        .io_error()
                        .map_or("walk".to_string(), |io| format!("{:?}", io.kind()));
                    log::warn!("Error enumerating unit {}: {}", root.display(), e);
                    items.push((rel, UnitItem::WalkError(tag)));
                }
            }
        }

        // Independent of directory-listing order
        items.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

        let mut digest = blake3::Hasher::new();
        let mut buf = vec![0u8; self.chunk_size];
        for (rel, item) in items {
            digest.update(rel.as_bytes());
            digest.update(FIELD_SEP);
            match item {
                UnitItem::File(path) => {
                    if let Err(tag) = self.feed_file(&mut digest, &path, &mut buf) {
                        log::warn!(
                            "Unreadable file inside unit {}: {} ({})",
                            root.display(),
                            path.display(),
                            tag
                        );
                        feed_error_marker(&mut digest, &rel, &tag);
                    }
                }
                UnitItem::WalkError(tag) => feed_error_marker(&mut digest, &rel, &tag),
            }
            digest.update(FIELD_SEP);
        }

        Ok(*digest.finalize().as_bytes())
    }

    /// Stream one contained file into the composite digest.
    ///
    /// Returns an error tag string on failure so the caller can hash a
    /// marker instead.
    fn feed_file(
        &self,
        digest: &mut blake3::Hasher,
        path: &Path,
        buf: &mut [u8],
    ) -> Result<(), String> {
        let mut file = File::open(path).map_err(|e| format!("{:?}", e.kind()))?;
        self.files_read.fetch_add(1, Ordering::Relaxed);
        loop {
            let n = file.read(buf).map_err(|e| format!("{:?}", e.kind()))?;
            if n == 0 {
                return Ok(());
            }
            digest.update(&buf[..n]);
        }
    }
}

/// Stable relative-path key for a file inside a unit: `/`-joined
/// components, platform-independent.
fn relative_key(path: &Path, root: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn feed_error_marker(digest: &mut blake3::Hasher, rel: &str, tag: &str) {
    digest.update(b"!error:");
    digest.update(rel.as_bytes());
    digest.update(FIELD_SEP);
    digest.update(tag.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_file(path: &Path, content: &[u8]) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    fn create_test_app(base: &Path) -> PathBuf {
        let app = base.join("TestApp.app");
        write_file(&app.join("Contents/MacOS/TestApp"), b"#!/bin/sh\necho hi\n");
        write_file(&app.join("Contents/Info.plist"), b"<plist>...</plist>");
        write_file(&app.join("Contents/Resources/icon.png"), b"fake png data");
        app
    }

    #[test]
    fn test_hash_file_deterministic() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("data.bin");
        write_file(&file, b"some file content");

        let hasher = Hasher::new();
        let first = hasher.hash_file(&file).unwrap();
        let second = hasher.hash_file(&file).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_hash_file_chunk_size_independent() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("data.bin");
        write_file(&file, &vec![0x5Au8; 100_000]);

        let small = Hasher::with_chunk_size(7).hash_file(&file).unwrap();
        let large = Hasher::with_chunk_size(1 << 20).hash_file(&file).unwrap();
        assert_eq!(small, large);
    }

    #[test]
    fn test_hash_file_content_sensitive() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.bin");
        let b = dir.path().join("b.bin");
        write_file(&a, b"content one");
        write_file(&b, b"content two");

        let hasher = Hasher::new();
        assert_ne!(hasher.hash_file(&a).unwrap(), hasher.hash_file(&b).unwrap());
    }

    #[test]
    fn test_hash_file_missing() {
        let hasher = Hasher::new();
        let err = hasher.hash_file(Path::new("/nonexistent/file")).unwrap_err();
        assert!(matches!(err, HashError::NotFound(_)));
    }

    #[test]
    fn test_hash_unit_deterministic() {
        let dir = TempDir::new().unwrap();
        let app = create_test_app(dir.path());

        let hasher = Hasher::new();
        let first = hasher.hash_unit(&app).unwrap();
        let second = hasher.hash_unit(&app).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_hash_unit_content_edit_changes_digest() {
        let dir = TempDir::new().unwrap();
        let app = create_test_app(dir.path());

        let hasher = Hasher::new();
        let before = hasher.hash_unit(&app).unwrap();

        write_file(&app.join("Contents/Info.plist"), b"<plist>modified</plist>");
        let after = hasher.hash_unit(&app).unwrap();

        assert_ne!(before, after);
    }

    #[test]
    fn test_hash_unit_rename_changes_digest() {
        let dir = TempDir::new().unwrap();
        let app = create_test_app(dir.path());

        let hasher = Hasher::new();
        let before = hasher.hash_unit(&app).unwrap();

        fs::rename(
            app.join("Contents/Resources/icon.png"),
            app.join("Contents/Resources/logo.png"),
        )
        .unwrap();
        let after = hasher.hash_unit(&app).unwrap();

        assert_ne!(before, after);
    }

    #[test]
    #[cfg(unix)]
    fn test_hash_unit_unreadable_file_feeds_error_marker() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let app = create_test_app(dir.path());
        let hasher = Hasher::new();
        let clean = hasher.hash_unit(&app).unwrap();

        let locked = app.join("Contents/Info.plist");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        if std::fs::File::open(&locked).is_ok() {
            // Privileged processes can read mode-000 files; the error
            // path cannot be exercised here.
            return;
        }

        // The marker makes the digest differ from a clean read, but
        // stays reproducible across runs.
        let degraded = hasher.hash_unit(&app).unwrap();
        assert_ne!(degraded, clean);
        assert_eq!(degraded, hasher.hash_unit(&app).unwrap());

        fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();
        assert_eq!(hasher.hash_unit(&app).unwrap(), clean);
    }

    #[test]
    fn test_hash_unit_identical_copies_match() {
        let dir = TempDir::new().unwrap();
        let first = create_test_app(&dir.path().join("one"));
        let second = create_test_app(&dir.path().join("two"));

        let hasher = Hasher::new();
        assert_eq!(
            hasher.hash_unit(&first).unwrap(),
            hasher.hash_unit(&second).unwrap()
        );
    }

    #[test]
    fn test_hash_unit_missing_root() {
        let hasher = Hasher::new();
        let err = hasher.hash_unit(Path::new("/nonexistent/Pkg.app")).unwrap_err();
        assert!(matches!(err, HashError::NotFound(_)));
    }

    #[test]
    fn test_files_read_counter() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("counted.bin");
        write_file(&file, b"bytes");

        let hasher = Hasher::new();
        assert_eq!(hasher.files_read(), 0);
        hasher.hash_file(&file).unwrap();
        assert_eq!(hasher.files_read(), 1);

        let app = create_test_app(dir.path());
        hasher.hash_unit(&app).unwrap();
        assert_eq!(hasher.files_read(), 4);
    }

    #[test]
    fn test_relative_key_uses_forward_slashes() {
        let root = Path::new("/base/Pkg.app");
        let key = relative_key(Path::new("/base/Pkg.app/Contents/Info.plist"), root);
        assert_eq!(key, "Contents/Info.plist");
    }
}
