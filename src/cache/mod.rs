//! Incremental fingerprint cache.
//!
//! This module provides persistent storage for computed fingerprints so a
//! rescan can skip re-hashing files whose size and modification time are
//! unchanged.
//!
//! # Architecture
//!
//! * [`database`]: SQLite-backed persistence and the `get`/`put` contract.
//! * [`entry`]: The record stored per path and its validity check.
//!
//! # Cache Invalidation
//!
//! An entry is reused only when the live file's size and mtime both equal
//! the cached values; any mismatch forces recomputation. There is no
//! expiry. An unavailable or corrupt backing store degrades to "always
//! recompute" and never aborts a scan.

pub mod database;
pub mod entry;

pub use database::{CacheError, CacheResult, FingerprintCache};
pub use entry::{mtime_to_ns, CacheEntry};
