//! Report rendering for scan results.
//!
//! Two formats: a human-readable text summary and a JSON document for
//! scripting. Both consume the detector's groups and stats; neither
//! mutates anything.

use bytesize::ByteSize;
use serde::Serialize;

use crate::duplicates::{DuplicateGroup, DuplicateStats};

/// Machine-readable scan report.
#[derive(Debug, Serialize)]
pub struct Report<'a> {
    /// Aggregate statistics
    pub stats: &'a DuplicateStats,
    /// Confirmed duplicate groups, canonical path first
    pub groups: &'a [DuplicateGroup],
    /// Entries skipped due to scan or read errors
    pub skipped_entries: usize,
}

/// Render the text summary.
#[must_use]
pub fn render_text(groups: &[DuplicateGroup], stats: &DuplicateStats, skipped: usize) -> String {
    let mut out = String::new();

    for (idx, group) in groups.iter().enumerate() {
        out.push_str(&format!(
            "Group #{} ({} per copy, {} wasted)\n",
            idx + 1,
            ByteSize::b(group.size),
            ByteSize::b(group.wasted_bytes())
        ));
        out.push_str(&format!("  fingerprint: {}\n", group.fingerprint));
        for (i, path) in group.paths.iter().enumerate() {
            let marker = if i == 0 { "original " } else { "duplicate" };
            out.push_str(&format!("  {marker} {}\n", path.display()));
        }
        out.push('\n');
    }

    out.push_str(&format!(
        "{} entries scanned, {} unique, {} duplicates in {} groups\n",
        stats.total_entries, stats.unique_entries, stats.duplicate_entries, stats.duplicate_groups
    ));
    out.push_str(&format!(
        "{} recoverable by removing duplicates\n",
        ByteSize::b(stats.wasted_bytes)
    ));
    if stats.metadata_only > 0 {
        out.push_str(&format!(
            "{} oversized entries left unexamined\n",
            stats.metadata_only
        ));
    }
    if skipped > 0 {
        out.push_str(&format!("{skipped} entries skipped due to errors\n"));
    }

    out
}

/// Render the JSON report.
pub fn render_json(
    groups: &[DuplicateGroup],
    stats: &DuplicateStats,
    skipped: usize,
) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&Report {
        stats,
        groups,
        skipped_entries: skipped,
    })
}
