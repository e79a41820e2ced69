use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Upstream protocol error: {0}")]
    UpstreamProtocol(String),

    #[error("Manifest download failed: {0}")]
    Download(String),

    #[error("Manifest decode failed: {0}")]
    Decode(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    fn describe_status(status: reqwest::StatusCode, body: &str) -> String {
        let truncated = Self::truncate_body(body);
        let reason = match status.as_u16() {
            401 | 403 => "API key rejected",
            404 => "not found",
            429 => "rate limited",
            500..=599 => "server error",
            _ => "unexpected status",
        };
        format!("{} ({}): {}", reason, status, truncated)
    }

    /// Non-success status from the version endpoint.
    pub fn from_probe_status(status: reqwest::StatusCode, body: &str) -> Self {
        ApiError::UpstreamUnavailable(Self::describe_status(status, body))
    }

    /// Non-success status from the content endpoint.
    pub fn from_download_status(status: reqwest::StatusCode, body: &str) -> Self {
        ApiError::Download(Self::describe_status(status, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_truncate_body() {
        assert_eq!(ApiError::truncate_body("short"), "short");

        let long = "x".repeat(MAX_ERROR_BODY_LENGTH + 100);
        let truncated = ApiError::truncate_body(&long);
        assert!(truncated.starts_with(&"x".repeat(MAX_ERROR_BODY_LENGTH)));
        assert!(truncated.ends_with("(truncated, 600 total bytes)"));
    }

    #[test]
    fn test_truncate_body_respects_char_boundaries() {
        let long = "é".repeat(MAX_ERROR_BODY_LENGTH);
        let truncated = ApiError::truncate_body(&long);
        assert!(truncated.contains("truncated"));
    }

    #[test]
    fn test_from_status() {
        let err = ApiError::from_probe_status(StatusCode::SERVICE_UNAVAILABLE, "maintenance");
        assert_eq!(
            err,
            ApiError::UpstreamUnavailable("server error (503 Service Unavailable): maintenance".into())
        );

        let err = ApiError::from_probe_status(StatusCode::UNAUTHORIZED, "");
        assert!(matches!(err, ApiError::UpstreamUnavailable(ref m) if m.starts_with("API key rejected")));

        let err = ApiError::from_download_status(StatusCode::NOT_FOUND, "gone");
        assert!(matches!(err, ApiError::Download(ref m) if m.contains("404")));
    }
}
