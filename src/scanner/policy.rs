//! Ignore and atomic-unit policy predicates.
//!
//! # Overview
//!
//! Pure decision functions consulted by the walker:
//!
//! - Ignore-file parsing and pattern matching (`.dedupignore` format)
//! - Hidden-path detection
//! - Atomic-unit detection via a static extension registry
//!
//! # Ignore file format
//!
//! One pattern per line. Blank lines and lines starting with `#` are
//! skipped. A pattern starting with `/` is an absolute-path pattern and
//! matches the full path exactly, or as a literal prefix when it carries
//! a single trailing `*`. Any other pattern is a shell glob matched
//! against the base name only.
//!
//! ```text
//! # editor droppings
//! *.tmp
//! *.swp
//! /data/cache*
//! ```

use std::path::Path;

use globset::{Glob, GlobMatcher};

/// Directory extensions treated as indivisible package units.
///
/// A directory carrying one of these extensions is never enumerated; the
/// scanner emits it as a single entry and the fingerprint engine hashes
/// it as one composite unit. Extend this table to register new package
/// formats.
pub const ATOMIC_EXTENSIONS: &[&str] = &[
    // macOS application and plugin bundles
    "app",
    "bundle",
    "framework",
    "plugin",
    "kext",
    "photoslibrary",
    // Installer packages
    "pkg",
    "mpkg",
    // Disk images
    "dmg",
    "sparsebundle",
    "img",
    // VM images
    "vmdk",
    "vdi",
    "qcow2",
    "ova",
    "vmwarevm",
    "pvm",
    // Optical disc images
    "iso",
    "toast",
    "cdr",
];

/// A compiled ignore pattern.
#[derive(Debug, Clone)]
pub enum IgnorePattern {
    /// Absolute-path pattern. Matches the full path string exactly, or as
    /// a literal prefix when `wildcard` is set (trailing `*` in the source).
    Absolute {
        /// The literal path (or prefix) to match
        prefix: String,
        /// Whether the pattern ended with `*`
        wildcard: bool,
    },
    /// Shell glob matched against the base name only.
    Name(GlobMatcher),
}

/// Load ignore patterns from a file.
///
/// An unreadable file is a configuration problem, not a fatal one: it
/// degrades to an empty pattern list with a warning.
pub fn load_ignore_patterns(path: &Path) -> Vec<IgnorePattern> {
    match std::fs::read_to_string(path) {
        Ok(text) => {
            let patterns = parse_patterns(&text);
            log::debug!(
                "Loaded {} ignore pattern(s) from {}",
                patterns.len(),
                path.display()
            );
            patterns
        }
        Err(e) => {
            log::warn!(
                "Could not read ignore file {}: {} (continuing without ignore filtering)",
                path.display(),
                e
            );
            Vec::new()
        }
    }
}

/// Parse ignore patterns from text.
///
/// Invalid glob patterns are skipped with a warning rather than failing
/// the whole file.
#[must_use]
pub fn parse_patterns(text: &str) -> Vec<IgnorePattern> {
    let mut patterns = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(abs) = line.strip_prefix('/') {
            let (body, wildcard) = match abs.strip_suffix('*') {
                Some(body) => (body, true),
                None => (abs, false),
            };
            patterns.push(IgnorePattern::Absolute {
                prefix: format!("/{body}"),
                wildcard,
            });
        } else {
            match Glob::new(line) {
                Ok(glob) => patterns.push(IgnorePattern::Name(glob.compile_matcher())),
                Err(e) => log::warn!("Invalid ignore pattern '{}': {}", line, e),
            }
        }
    }

    patterns
}

/// Check whether a path is hidden relative to the scan root.
///
/// True if the entry's own name starts with `.`, or if any ancestor
/// directory between the root and the entry does.
#[must_use]
pub fn is_hidden(path: &Path, root: &Path) -> bool {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative.components().any(|c| {
        c.as_os_str()
            .to_string_lossy()
            .starts_with('.')
    })
}

/// Check whether a path matches any ignore pattern.
///
/// Absolute-path patterns are compared against the full path string;
/// base-name globs look only at the final component.
#[must_use]
pub fn should_ignore(path: &Path, patterns: &[IgnorePattern]) -> bool {
    if patterns.is_empty() {
        return false;
    }

    let path_str = path.to_string_lossy();
    let base_name = path.file_name().unwrap_or_default();

    patterns.iter().any(|pattern| match pattern {
        IgnorePattern::Absolute { prefix, wildcard } => {
            if *wildcard {
                path_str.starts_with(prefix.as_str())
            } else {
                path_str == prefix.as_str()
            }
        }
        IgnorePattern::Name(matcher) => matcher.is_match(base_name),
    })
}

/// Check whether every path under a directory would be ignored.
///
/// True only when a wildcard absolute pattern matches the directory as a
/// prefix: every descendant path shares that prefix, so skipping the
/// whole subtree filters exactly the same files as testing each one.
/// Exact patterns and base-name globs match individual paths, not their
/// descendants, and never justify pruning.
#[must_use]
pub fn prunes_subtree(path: &Path, patterns: &[IgnorePattern]) -> bool {
    let path_str = path.to_string_lossy();
    patterns.iter().any(|pattern| {
        matches!(
            pattern,
            IgnorePattern::Absolute { prefix, wildcard: true }
                if path_str.starts_with(prefix.as_str())
        )
    })
}

/// Check whether a path is an atomic unit by extension.
///
/// Matching is case-insensitive against [`ATOMIC_EXTENSIONS`]. The
/// predicate looks only at the extension; the walker additionally
/// requires the path to be a directory before collapsing it.
#[must_use]
pub fn is_atomic_unit(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .is_some_and(|ext| ATOMIC_EXTENSIONS.contains(&ext.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_parse_patterns_skips_comments_and_blanks() {
        let text = "# comment\n\n*.tmp\n   \n/data/cache*\n";
        let patterns = parse_patterns(text);
        assert_eq!(patterns.len(), 2);
    }

    #[test]
    fn test_glob_pattern_matches_base_name() {
        let patterns = parse_patterns("*.tmp");
        assert!(should_ignore(Path::new("/home/user/scratch.tmp"), &patterns));
        assert!(!should_ignore(Path::new("/home/user/scratch.txt"), &patterns));
    }

    #[test]
    fn test_glob_pattern_ignores_directory_part() {
        // Base-name globs must not match against ancestor directories
        let patterns = parse_patterns("*.tmp");
        assert!(!should_ignore(Path::new("/work.tmp/real.txt"), &patterns));
    }

    #[test]
    fn test_absolute_prefix_pattern() {
        let patterns = parse_patterns("/data/cache*");
        assert!(should_ignore(Path::new("/data/cache"), &patterns));
        assert!(should_ignore(Path::new("/data/cache/blob.bin"), &patterns));
        assert!(should_ignore(Path::new("/data/cachefile.db"), &patterns));
        assert!(!should_ignore(Path::new("/data/other/blob.bin"), &patterns));
    }

    #[test]
    fn test_absolute_exact_pattern() {
        let patterns = parse_patterns("/etc/hosts");
        assert!(should_ignore(Path::new("/etc/hosts"), &patterns));
        assert!(!should_ignore(Path::new("/etc/hosts.bak"), &patterns));
    }

    #[test]
    fn test_prunes_subtree_only_for_wildcard_prefix() {
        let wildcard = parse_patterns("/data/cache*");
        assert!(prunes_subtree(Path::new("/data/cache_v2"), &wildcard));
        assert!(!prunes_subtree(Path::new("/data/other"), &wildcard));

        // An exact pattern names one path, not its descendants
        let exact = parse_patterns("/data/cache");
        assert!(!prunes_subtree(Path::new("/data/cache"), &exact));

        // Base-name globs never prune either
        let glob = parse_patterns("*.tmp");
        assert!(!prunes_subtree(Path::new("/work.tmp"), &glob));
    }

    #[test]
    fn test_invalid_glob_is_skipped() {
        let patterns = parse_patterns("[unclosed\n*.tmp");
        assert_eq!(patterns.len(), 1);
        assert!(should_ignore(Path::new("/a/b.tmp"), &patterns));
    }

    #[test]
    fn test_is_hidden_own_name() {
        let root = Path::new("/scan");
        assert!(is_hidden(Path::new("/scan/.config"), root));
        assert!(!is_hidden(Path::new("/scan/visible.txt"), root));
    }

    #[test]
    fn test_is_hidden_ancestor() {
        let root = Path::new("/scan");
        assert!(is_hidden(Path::new("/scan/.git/objects/ab"), root));
        assert!(is_hidden(Path::new("/scan/a/.cache/file"), root));
        assert!(!is_hidden(Path::new("/scan/a/b/file"), root));
    }

    #[test]
    fn test_is_hidden_ignores_root_components() {
        // A hidden component in the root itself does not make children hidden
        let root = Path::new("/home/.local/share");
        assert!(!is_hidden(Path::new("/home/.local/share/file.txt"), root));
    }

    #[test]
    fn test_is_atomic_unit_known_extensions() {
        assert!(is_atomic_unit(Path::new("/Applications/TestApp.app")));
        assert!(is_atomic_unit(Path::new("/downloads/installer.pkg")));
        assert!(is_atomic_unit(Path::new("/images/backup.dmg")));
        assert!(is_atomic_unit(Path::new("/vm/disk.vmdk")));
        assert!(is_atomic_unit(Path::new("/media/linux.iso")));
    }

    #[test]
    fn test_is_atomic_unit_case_insensitive() {
        assert!(is_atomic_unit(Path::new("/Applications/TestApp.APP")));
        assert!(is_atomic_unit(Path::new("/images/Backup.DMG")));
    }

    #[test]
    fn test_is_atomic_unit_rejects_others() {
        assert!(!is_atomic_unit(Path::new("/docs/notes.txt")));
        assert!(!is_atomic_unit(Path::new("/plain_directory")));
        assert!(!is_atomic_unit(PathBuf::from("app").as_path()));
    }

    #[test]
    fn test_load_ignore_patterns_missing_file() {
        let patterns = load_ignore_patterns(Path::new("/nonexistent/.dedupignore"));
        assert!(patterns.is_empty());
    }
}
