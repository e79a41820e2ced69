//! Staleness policy.
//!
//! Ordinary reads decide staleness from the clock alone: a cache younger
//! than the max age is served even if the remote has published a newer
//! version since. Comparing versions on every read would need a network
//! call per read. Version comparison is only done where a network call is
//! already being made: `get_info`, which always probes, and forced refresh.
//! A new remote version is therefore picked up at the next expiry or the
//! next forced refresh.
//!
//! A cache holds one locale. A copy of another locale is never served, so
//! changing the configured locale refills on the next read.

use chrono::{DateTime, Duration, Utc};

use crate::models::CacheMetadata;

/// Time-based validity. Absent metadata is a miss; a cache whose age has
/// reached `max_age` is expired.
pub fn is_valid(metadata: Option<&CacheMetadata>, max_age: Duration, now: DateTime<Utc>) -> bool {
    match metadata {
        None => false,
        Some(meta) => now - meta.fetched_at < max_age,
    }
}

/// Whether the cached copy is the version the remote currently publishes.
pub fn matches_remote(metadata: Option<&CacheMetadata>, remote_version: &str) -> bool {
    metadata.is_some_and(|meta| meta.version == remote_version)
}

/// Whether the cached copy is for `locale`.
pub fn matches_locale(metadata: Option<&CacheMetadata>, locale: &str) -> bool {
    metadata.is_some_and(|meta| meta.locale == locale)
}
