//! Application configuration management.
//!
//! Configuration is read from the process environment (the CLI loads a
//! `.env` file first). The API key is the only required setting; everything
//! else has a default. The resulting [`Config`] is passed explicitly into
//! the client, store and coordinator constructors.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application name used for the cache directory path
const APP_NAME: &str = "manifest-cache";

pub const DEFAULT_API_BASE_URL: &str = "https://www.bungie.net/Platform";
pub const DEFAULT_CONTENT_BASE_URL: &str = "https://www.bungie.net";
pub const DEFAULT_LOCALE: &str = "en";

/// Manifest revisions ship a few times a month; a day keeps reads cheap
/// while picking up a new release within a day of publication.
pub const DEFAULT_MAX_AGE_HOURS: u64 = 24;

/// Timeout for ordinary API calls (the version probe).
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Timeout for the manifest download. The English world content is tens of
/// megabytes, so this is ten times the ordinary request timeout.
pub const DEFAULT_MANIFEST_TIMEOUT_SECS: u64 = 300;

const ENV_API_KEY: &str = "BUNGIE_API_KEY";
const ENV_API_BASE_URL: &str = "MANIFEST_API_BASE_URL";
const ENV_CONTENT_BASE_URL: &str = "MANIFEST_CONTENT_BASE_URL";
const ENV_CACHE_DIR: &str = "MANIFEST_CACHE_DIR";
const ENV_LOCALE: &str = "MANIFEST_LOCALE";
const ENV_MAX_AGE_HOURS: &str = "MANIFEST_MAX_AGE_HOURS";
const ENV_REQUEST_TIMEOUT_SECS: &str = "MANIFEST_REQUEST_TIMEOUT_SECS";
const ENV_MANIFEST_TIMEOUT_SECS: &str = "MANIFEST_MANIFEST_TIMEOUT_SECS";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing API key - set {0}")]
    MissingApiKey(&'static str),

    #[error("Invalid value for {name}: {value:?} ({reason})")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Could not find cache directory - set {0}")]
    NoCacheDir(&'static str),

    #[error("Failed to create HTTP client: {0}")]
    HttpClient(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    #[serde(skip_serializing)]
    pub api_key: String,
    pub api_base_url: String,
    pub content_base_url: String,
    pub cache_dir: PathBuf,
    pub locale: String,
    pub max_age_hours: u64,
    pub request_timeout_secs: u64,
    pub manifest_timeout_secs: u64,
}

impl Config {
    /// Build a config with defaults for everything except the key and cache dir.
    pub fn new(api_key: impl Into<String>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            api_key: api_key.into(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            content_base_url: DEFAULT_CONTENT_BASE_URL.to_string(),
            cache_dir: cache_dir.into(),
            locale: DEFAULT_LOCALE.to_string(),
            max_age_hours: DEFAULT_MAX_AGE_HOURS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            manifest_timeout_secs: DEFAULT_MANIFEST_TIMEOUT_SECS,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_key = get(ENV_API_KEY).ok_or(ConfigError::MissingApiKey(ENV_API_KEY))?;

        let cache_dir = match get(ENV_CACHE_DIR) {
            Some(dir) => PathBuf::from(dir),
            None => Self::default_cache_dir()?,
        };

        let mut config = Self::new(api_key, cache_dir);
        if let Some(url) = get(ENV_API_BASE_URL) {
            config.api_base_url = url;
        }
        if let Some(url) = get(ENV_CONTENT_BASE_URL) {
            config.content_base_url = url;
        }
        if let Some(locale) = get(ENV_LOCALE) {
            config.locale = locale;
        }
        if let Some(value) = get(ENV_MAX_AGE_HOURS) {
            config.max_age_hours = parse_positive(ENV_MAX_AGE_HOURS, &value)?;
        }
        if let Some(value) = get(ENV_REQUEST_TIMEOUT_SECS) {
            config.request_timeout_secs = parse_positive(ENV_REQUEST_TIMEOUT_SECS, &value)?;
        }
        if let Some(value) = get(ENV_MANIFEST_TIMEOUT_SECS) {
            config.manifest_timeout_secs = parse_positive(ENV_MANIFEST_TIMEOUT_SECS, &value)?;
        }

        Ok(config)
    }

    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    pub fn with_content_base_url(mut self, url: impl Into<String>) -> Self {
        self.content_base_url = url.into();
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    pub fn with_max_age_hours(mut self, hours: u64) -> Self {
        self.max_age_hours = hours;
        self
    }

    pub fn max_age(&self) -> chrono::Duration {
        i64::try_from(self.max_age_hours)
            .ok()
            .and_then(chrono::Duration::try_hours)
            .unwrap_or(chrono::Duration::MAX)
    }

    fn default_cache_dir() -> Result<PathBuf, ConfigError> {
        let cache_dir = dirs::cache_dir().ok_or(ConfigError::NoCacheDir(ENV_CACHE_DIR))?;
        Ok(cache_dir.join(APP_NAME))
    }
}

fn parse_positive(name: &'static str, value: &str) -> Result<u64, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidValue {
        name,
        value: value.to_string(),
        reason,
    };
    match value.parse::<u64>() {
        Ok(0) => Err(invalid("must be greater than zero".to_string())),
        Ok(n) => Ok(n),
        Err(e) => Err(invalid(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_missing_api_key_is_an_error() {
        let err = Config::from_lookup(lookup(&[(ENV_CACHE_DIR, "/tmp/mc")])).unwrap_err();
        assert_eq!(err, ConfigError::MissingApiKey("BUNGIE_API_KEY"));

        let err = Config::from_lookup(lookup(&[(ENV_API_KEY, "   ")])).unwrap_err();
        assert_eq!(err, ConfigError::MissingApiKey("BUNGIE_API_KEY"));
    }

    #[test]
    fn test_defaults() {
        let config =
            Config::from_lookup(lookup(&[(ENV_API_KEY, "key"), (ENV_CACHE_DIR, "/tmp/mc")]))
                .unwrap();
        assert_eq!(config.api_key, "key");
        assert_eq!(config.cache_dir, PathBuf::from("/tmp/mc"));
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.content_base_url, DEFAULT_CONTENT_BASE_URL);
        assert_eq!(config.locale, "en");
        assert_eq!(config.max_age(), chrono::Duration::hours(24));
        assert!(config.manifest_timeout_secs > config.request_timeout_secs);
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            (ENV_API_KEY, "key"),
            (ENV_CACHE_DIR, "/tmp/mc"),
            (ENV_API_BASE_URL, "http://localhost:1234/Platform"),
            (ENV_LOCALE, "de"),
            (ENV_MAX_AGE_HOURS, "6"),
            (ENV_MANIFEST_TIMEOUT_SECS, "600"),
        ]))
        .unwrap();
        assert_eq!(config.api_base_url, "http://localhost:1234/Platform");
        assert_eq!(config.locale, "de");
        assert_eq!(config.max_age_hours, 6);
        assert_eq!(config.manifest_timeout_secs, 600);
    }

    #[test]
    fn test_invalid_numbers_rejected() {
        let err = Config::from_lookup(lookup(&[
            (ENV_API_KEY, "key"),
            (ENV_CACHE_DIR, "/tmp/mc"),
            (ENV_MAX_AGE_HOURS, "soon"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { name: "MANIFEST_MAX_AGE_HOURS", .. }));

        let err = Config::from_lookup(lookup(&[
            (ENV_API_KEY, "key"),
            (ENV_CACHE_DIR, "/tmp/mc"),
            (ENV_REQUEST_TIMEOUT_SECS, "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_api_key_not_serialized() {
        let config = Config::new("secret", "/tmp/mc");
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
    }
}
