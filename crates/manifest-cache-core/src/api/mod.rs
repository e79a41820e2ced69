//! REST API client module for the Bungie.net platform.
//!
//! Two seams sit between the cache and the network:
//!
//! - [`VersionProbe`]: asks the platform which manifest version is current
//!   and where its content lives. Cheap, called on every `get_info`.
//! - [`ManifestFetcher`]: downloads one manifest body. Large and slow.
//!
//! [`ApiClient`] implements both against the live API. Every request
//! carries the application's `X-API-Key`.

pub mod client;
pub mod error;

use async_trait::async_trait;

use crate::models::{ManifestDocument, ManifestVersionInfo};

pub use client::ApiClient;
pub use error::ApiError;

#[async_trait]
pub trait VersionProbe: Send + Sync {
    /// Fetch the current remote version descriptor. Never cached.
    async fn current_version(&self) -> Result<ManifestVersionInfo, ApiError>;
}

#[async_trait]
pub trait ManifestFetcher: Send + Sync {
    /// Download and decode the manifest at `location`, a content path taken
    /// from [`ManifestVersionInfo::content_path`].
    async fn fetch(&self, location: &str) -> Result<ManifestDocument, ApiError>;
}

#[async_trait]
impl<T: VersionProbe + ?Sized> VersionProbe for std::sync::Arc<T> {
    async fn current_version(&self) -> Result<ManifestVersionInfo, ApiError> {
        (**self).current_version().await
    }
}

#[async_trait]
impl<T: ManifestFetcher + ?Sized> ManifestFetcher for std::sync::Arc<T> {
    async fn fetch(&self, location: &str) -> Result<ManifestDocument, ApiError> {
        (**self).fetch(location).await
    }
}
