use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Describes the manifest currently held in the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheMetadata {
    pub version: String,
    pub fetched_at: DateTime<Utc>,
    pub source_path: String,
    pub size_bytes: u64,
    #[serde(default)]
    pub locale: String,
}

impl CacheMetadata {
    pub fn age_minutes(&self, now: DateTime<Utc>) -> i64 {
        (now - self.fetched_at).num_minutes()
    }

    pub fn age_display(&self, now: DateTime<Utc>) -> String {
        let minutes = self.age_minutes(now);
        if minutes < 1 {
            // Clock skew lands here too
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            let hours = minutes / 60;
            if minutes % 60 >= 30 {
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        } else {
            let days = minutes / 1440;
            if (minutes % 1440) / 60 >= 12 {
                format!("{}d ago", days + 1)
            } else {
                format!("{}d ago", days)
            }
        }
    }
}

/// Remote version compared against the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestInfo {
    pub remote_version: String,
    pub cached_version: Option<String>,
    /// Within the max age and at the remote version.
    pub cache_valid: bool,
    pub fetched_at: Option<DateTime<Utc>>,
    pub size_bytes: Option<u64>,
}

/// Local cache state, reported without contacting the remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatus {
    pub metadata: CacheMetadata,
    /// Within the max age. The remote version is not consulted.
    pub valid: bool,
    pub age: String,
    pub tables: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn metadata_at(fetched_at: DateTime<Utc>) -> CacheMetadata {
        CacheMetadata {
            version: "v1".to_string(),
            fetched_at,
            source_path: "/p1".to_string(),
            size_bytes: 10,
            locale: "en".to_string(),
        }
    }

    #[test]
    fn test_age_display() {
        let now = Utc::now();
        assert_eq!(metadata_at(now).age_display(now), "just now");
        assert_eq!(metadata_at(now + Duration::minutes(5)).age_display(now), "just now");
        assert_eq!(metadata_at(now - Duration::minutes(42)).age_display(now), "42m ago");
        assert_eq!(metadata_at(now - Duration::minutes(90)).age_display(now), "2h ago");
        assert_eq!(metadata_at(now - Duration::minutes(80)).age_display(now), "1h ago");
        assert_eq!(metadata_at(now - Duration::hours(40)).age_display(now), "2d ago");
        assert_eq!(metadata_at(now - Duration::hours(30)).age_display(now), "1d ago");
    }

    #[test]
    fn test_metadata_json_shape() {
        let json = r#"{"version":"v1","fetchedAt":"2024-11-05T19:00:00Z","sourcePath":"/p1","sizeBytes":17}"#;
        let meta: CacheMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(meta.version, "v1");
        assert_eq!(meta.size_bytes, 17);
        assert_eq!(meta.locale, "");
    }
}
