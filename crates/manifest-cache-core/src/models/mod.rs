//! Data models for the manifest cache.
//!
//! - `ManifestVersionInfo`: the remote version descriptor returned by the probe
//! - `ManifestDocument`: the full manifest body, table name to table contents
//! - `ManifestTable`: one table of a shared document, without copying it
//! - `CacheMetadata`: what is currently cached and when it was fetched
//! - `ManifestInfo`: the remote/cached version comparison reported to callers
//! - `CacheStatus`: local cache state, no network involved

pub mod document;
pub mod manifest;
pub mod metadata;

pub use document::{ManifestDocument, ManifestTable};
pub use manifest::{ManifestVersionInfo, PlatformResponse, REQUIRED_LOCALE};
pub use metadata::{CacheMetadata, CacheStatus, ManifestInfo};
