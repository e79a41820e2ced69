//! Manifest cache - keeps a local copy of the Destiny 2 game-data manifest.
//!
//! The manifest is a large JSON document published by Bungie.net and revised
//! periodically. This crate probes the remote version, downloads the
//! document when the local copy is missing or too old, persists it to disk,
//! and serves table and definition lookups from the cached copy.
//!
//! The entry point is [`CacheCoordinator`], built from a [`Config`]:
//!
//! ```no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use manifest_cache_core::{CacheCoordinator, Config};
//!
//! let config = Config::from_env()?;
//! let coordinator = CacheCoordinator::from_config(&config)?;
//! let items = coordinator.get_table("DestinyInventoryItemDefinition").await?;
//! # let _ = items;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;

pub use api::{ApiClient, ApiError, ManifestFetcher, VersionProbe};
pub use cache::{CacheCoordinator, CacheStore};
pub use config::{Config, ConfigError};
pub use error::{ManifestError, Result};
pub use models::{
    CacheMetadata, CacheStatus, ManifestDocument, ManifestInfo, ManifestTable, ManifestVersionInfo,
};
