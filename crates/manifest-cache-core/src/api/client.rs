//! API client for the Bungie.net manifest endpoints.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use serde_json::Value;
use tracing::{debug, info};

use crate::config::{Config, ConfigError};
use crate::models::{ManifestDocument, ManifestVersionInfo, PlatformResponse, REQUIRED_LOCALE};

use super::{ApiError, ManifestFetcher, VersionProbe};

/// Header Bungie.net expects the application key in.
const API_KEY_HEADER: &str = "x-api-key";

/// Path of the manifest version endpoint, relative to the platform base URL.
const MANIFEST_PATH: &str = "/Destiny2/Manifest/";

/// API client for Bungie.net.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    api_base_url: String,
    content_base_url: String,
    manifest_timeout: Duration,
}

impl ApiClient {
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        let mut headers = header::HeaderMap::new();
        let mut key = header::HeaderValue::from_str(&config.api_key).map_err(|e| {
            ConfigError::InvalidValue {
                name: "BUNGIE_API_KEY",
                value: "<redacted>".to_string(),
                reason: e.to_string(),
            }
        })?;
        key.set_sensitive(true);
        headers.insert(API_KEY_HEADER, key);

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            content_base_url: config.content_base_url.trim_end_matches('/').to_string(),
            manifest_timeout: Duration::from_secs(config.manifest_timeout_secs),
        })
    }

    fn manifest_url(&self) -> String {
        format!("{}{}", self.api_base_url, MANIFEST_PATH)
    }

    /// Content paths are normally host-relative; absolute URLs are used as-is.
    fn content_url(&self, location: &str) -> String {
        if location.starts_with("http://") || location.starts_with("https://") {
            location.to_string()
        } else if location.starts_with('/') {
            format!("{}{}", self.content_base_url, location)
        } else {
            format!("{}/{}", self.content_base_url, location)
        }
    }

    /// Parse the platform envelope around a manifest descriptor.
    fn parse_version_response(body: &str) -> Result<ManifestVersionInfo, ApiError> {
        let envelope: PlatformResponse<Value> = serde_json::from_str(body)
            .map_err(|e| ApiError::UpstreamProtocol(format!("invalid manifest response: {}", e)))?;

        if !envelope.is_success() {
            return Err(ApiError::UpstreamUnavailable(format!(
                "platform returned {} (code {}): {}",
                envelope.error_status, envelope.error_code, envelope.message
            )));
        }

        let response = envelope.response.ok_or_else(|| {
            ApiError::UpstreamProtocol("manifest response has no Response field".to_string())
        })?;

        let info: ManifestVersionInfo = serde_json::from_value(response)
            .map_err(|e| ApiError::UpstreamProtocol(format!("invalid manifest descriptor: {}", e)))?;

        if info.version.is_empty() {
            return Err(ApiError::UpstreamProtocol("manifest version is empty".to_string()));
        }
        if info.content_path(REQUIRED_LOCALE).is_none() {
            return Err(ApiError::UpstreamProtocol(format!(
                "manifest has no '{}' content path",
                REQUIRED_LOCALE
            )));
        }

        Ok(info)
    }
}

#[async_trait]
impl VersionProbe for ApiClient {
    async fn current_version(&self) -> Result<ManifestVersionInfo, ApiError> {
        let url = self.manifest_url();
        debug!(url = %url, "Probing manifest version");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ApiError::UpstreamUnavailable(format!("request to {} failed: {}", url, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::UpstreamUnavailable(format!("failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(ApiError::from_probe_status(status, &body));
        }

        let info = Self::parse_version_response(&body)?;
        debug!(version = %info.version, "Remote manifest version");
        Ok(info)
    }
}

#[async_trait]
impl ManifestFetcher for ApiClient {
    async fn fetch(&self, location: &str) -> Result<ManifestDocument, ApiError> {
        let url = self.content_url(location);
        info!(url = %url, "Downloading manifest");

        let response = self
            .client
            .get(&url)
            .timeout(self.manifest_timeout)
            .send()
            .await
            .map_err(|e| ApiError::Download(format!("request to {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_download_status(status, &body));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ApiError::Download(format!("failed to read body from {}: {}", url, e)))?;
        let size = bytes.len();

        // Tens of megabytes of JSON; keep the decode off the async workers.
        let document = tokio::task::spawn_blocking(move || {
            serde_json::from_slice::<ManifestDocument>(&bytes)
        })
        .await
        .map_err(|e| ApiError::Decode(format!("decode task failed: {}", e)))?
        .map_err(|e| ApiError::Decode(e.to_string()))?;

        info!(size_bytes = size, tables = document.len(), "Manifest downloaded");
        Ok(document)
    }
}
