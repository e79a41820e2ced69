//! Bungie.net manifest version descriptor and the platform response envelope.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Every published manifest carries at least the English content path.
pub const REQUIRED_LOCALE: &str = "en";

/// Standard Bungie.net platform envelope. `ErrorCode` 1 means success.
#[derive(Debug, Clone, Deserialize)]
pub struct PlatformResponse<T> {
    #[serde(rename = "Response")]
    pub response: Option<T>,
    #[serde(rename = "ErrorCode")]
    pub error_code: i64,
    #[serde(rename = "ErrorStatus", default)]
    pub error_status: String,
    #[serde(rename = "Message", default)]
    pub message: String,
}

impl<T> PlatformResponse<T> {
    pub const SUCCESS_CODE: i64 = 1;

    pub fn is_success(&self) -> bool {
        self.error_code == Self::SUCCESS_CODE
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestVersionInfo {
    pub version: String,
    /// Locale code to the path of that locale's JSON world content.
    #[serde(rename = "jsonWorldContentPaths")]
    pub json_world_content_paths: BTreeMap<String, String>,
    /// Mobile databases, component paths, image pyramids and the rest.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ManifestVersionInfo {
    pub fn content_path(&self, locale: &str) -> Option<&str> {
        self.json_world_content_paths.get(locale).map(String::as_str)
    }

    pub fn locales(&self) -> impl Iterator<Item = &str> {
        self.json_world_content_paths.keys().map(String::as_str)
    }
}
