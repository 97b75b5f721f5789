//! Error types for the relevance engine
//!
//! Query-time degraded conditions (no generation yet, unknown candidates,
//! vocabulary misses) are not errors; they surface as empty or zeroed
//! results. The variants here cover build, persistence and configuration
//! failures plus the embedding provider being unavailable.

use thiserror::Error;

/// Main error type for index building and querying
#[derive(Error, Debug)]
pub enum SearchError {
    /// A semantic index was requested over zero vectors
    #[error("Cannot build an index over an empty corpus")]
    EmptyCorpus,

    /// A vector does not have the dimension the index was built with
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The lexical analyzer produced no terms for the whole corpus
    #[error("Lexical vocabulary is empty after analysis")]
    EmptyVocabulary,

    /// The embedding provider failed or is unavailable
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// A source record cannot be turned into a document
    #[error("Malformed document {id}: {reason}")]
    MalformedDocument { id: String, reason: String },

    /// Too many source records were skipped for the build to be trusted
    #[error("Build aborted: {skipped} of {total} documents malformed (max ratio {max_ratio})")]
    TooManyMalformed {
        skipped: usize,
        total: usize,
        max_ratio: f64,
    },

    /// Building a staging generation failed
    #[error("Build failed: {0}")]
    BuildFailed(String),

    /// Generation parts disagree on row count or id space
    #[error("Inconsistent generation: {0}")]
    InconsistentGeneration(String),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filesystem error while reading or writing artifacts
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Artifact (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, SearchError>;

impl SearchError {
    /// Whether this error came from the embedding provider
    pub fn is_provider_unavailable(&self) -> bool {
        matches!(self, SearchError::Embedding(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = SearchError::DimensionMismatch {
            expected: 384,
            actual: 3,
        };
        assert_eq!(error.to_string(), "Dimension mismatch: expected 384, got 3");

        let skipped = SearchError::TooManyMalformed {
            skipped: 4,
            total: 10,
            max_ratio: 0.1,
        };
        assert!(skipped.to_string().contains("4 of 10"));
    }

    #[test]
    fn test_provider_unavailable_flag() {
        assert!(SearchError::Embedding("offline".into()).is_provider_unavailable());
        assert!(!SearchError::EmptyCorpus.is_provider_unavailable());
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let error: SearchError = io.into();
        assert!(matches!(error, SearchError::Io(_)));
    }
}
