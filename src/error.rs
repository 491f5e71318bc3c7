//! Custom error types for kbase

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for kbase operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Loader IO error at {}: {source}", path.display())]
    LoaderIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported format for {}: {reason}", path.display())]
    UnsupportedFormat { path: PathBuf, reason: String },

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Embedding backend rejected the request ({status}): {message}")]
    EmbeddingRejected { status: u16, message: String },

    #[error("Embedding dimension mismatch for model '{model}': expected {expected}, got {actual}")]
    EmbeddingDimension {
        model: String,
        expected: usize,
        actual: usize,
    },

    #[error(
        "Model mismatch: index was built with '{stored}' but '{configured}' is configured. Run 'kbase reindex' to rebuild"
    )]
    ModelMismatch { stored: String, configured: String },

    #[error(
        "Chunking mismatch: index was built with {stored} but {configured} is configured. Run 'kbase reindex' to rebuild"
    )]
    ChunkingMismatch { stored: String, configured: String },

    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("Ingestion cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn loader_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::LoaderIo {
            path: path.into(),
            source,
        }
    }

    pub fn unsupported(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::UnsupportedFormat {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Environmental failures that may succeed when tried again
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::LoaderIo { .. } | Error::Embedding(_) | Error::Http(_)
        )
    }

    /// Short machine-readable tag used in ingest reports
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Config(_) => "config",
            Error::Database(_) => "database",
            Error::LoaderIo { .. } => "loader_io",
            Error::UnsupportedFormat { .. } => "unsupported_format",
            Error::Embedding(_)
            | Error::EmbeddingRejected { .. }
            | Error::EmbeddingDimension { .. } => "embedding",
            Error::ModelMismatch { .. } => "model_mismatch",
            Error::ChunkingMismatch { .. } => "chunking_mismatch",
            Error::DocumentNotFound(_) => "document_not_found",
            Error::Cancelled => "cancelled",
            Error::Io(_) => "io",
            Error::Http(_) => "http",
            Error::UrlParse(_) => "url",
            Error::Json(_) => "json",
            Error::TomlParse(_) | Error::TomlSerialize(_) => "toml",
            Error::Other(_) => "other",
        }
    }
}

/// Result type alias for kbase
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        let io = Error::loader_io(
            "/kb",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(io.is_retryable());
        assert!(Error::Embedding("timeout".to_string()).is_retryable());

        let dim = Error::EmbeddingDimension {
            model: "m".to_string(),
            expected: 4,
            actual: 3,
        };
        assert!(!dim.is_retryable());
        let rejected = Error::EmbeddingRejected {
            status: 401,
            message: "bad key".to_string(),
        };
        assert!(!rejected.is_retryable());
        assert_eq!(rejected.kind(), "embedding");
        assert!(!Error::unsupported("a.bin", "binary").is_retryable());
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(Error::unsupported("a.bin", "binary").kind(), "unsupported_format");
        assert_eq!(
            Error::ModelMismatch {
                stored: "a".to_string(),
                configured: "b".to_string()
            }
            .kind(),
            "model_mismatch"
        );
    }
}
