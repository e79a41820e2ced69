use std::path::Path;

use thiserror::Error;

use crate::api::ApiError;

pub type Result<T> = std::result::Result<T, ManifestError>;

/// Errors surfaced by cache operations.
///
/// `Clone` so that the outcome of one refill can be handed to every caller
/// that waited on it.
#[derive(Error, Debug, Clone)]
pub enum ManifestError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Cache I/O error ({context}): {message}")]
    Io { context: String, message: String },

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Definition not found: {table}/{hash}")]
    DefinitionNotFound { table: String, hash: String },

    #[error("Background task failed: {0}")]
    Task(String),
}

impl ManifestError {
    pub(crate) fn io(context: impl Into<String>, path: &Path, err: impl std::fmt::Display) -> Self {
        ManifestError::Io {
            context: format!("{} {}", context.into(), path.display()),
            message: err.to_string(),
        }
    }

    /// Lookup misses against an otherwise valid document.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ManifestError::TableNotFound(_) | ManifestError::DefinitionNotFound { .. }
        )
    }
}

impl From<tokio::task::JoinError> for ManifestError {
    fn from(err: tokio::task::JoinError) -> Self {
        ManifestError::Task(err.to_string())
    }
}
