//! Error types for the RFP pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our custom error.
pub type Result<T> = std::result::Result<T, RfpError>;

/// Errors that can occur in the RFP pipeline.
#[derive(Error, Debug)]
pub enum RfpError {
    /// Error reading or writing files.
    #[error("I/O error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error during serialization/deserialization.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The source record table is missing, unreadable or malformed.
    #[error("Invalid source records: {0}")]
    InvalidRecords(String),

    /// The index file does not exist.
    #[error("Index file not found at '{0}'")]
    IndexNotFound(PathBuf),

    /// LLM API error that is worth retrying later (rate limit, overload, network).
    #[error("LLM API temporarily unavailable: {0}")]
    LlmTransient(String),

    /// LLM API error that will not go away on retry.
    #[error("LLM API error: {0}")]
    LlmApi(String),

    /// LLM response parsing error.
    #[error("Failed to parse LLM response: {0}")]
    LlmParse(String),

    /// HTTP request error.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Retrieval failed.
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// Configuration file or value error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An operation exceeded its time budget.
    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl RfpError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the failure is transient (network, rate limit, timeout).
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RfpError::LlmTransient(_) | RfpError::Http(_) | RfpError::Timeout(_)
        )
    }
}

impl From<reqwest::Error> for RfpError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            RfpError::LlmTransient(err.to_string())
        } else {
            RfpError::Http(err.to_string())
        }
    }
}

impl From<serde_json::Error> for RfpError {
    fn from(err: serde_json::Error) -> Self {
        RfpError::LlmParse(err.to_string())
    }
}

impl From<csv::Error> for RfpError {
    fn from(err: csv::Error) -> Self {
        RfpError::InvalidRecords(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_transient_classification() {
        assert!(RfpError::LlmTransient("429".into()).is_transient());
        assert!(RfpError::Timeout(Duration::from_secs(1)).is_transient());
        assert!(!RfpError::LlmApi("bad request".into()).is_transient());
        assert!(!RfpError::InvalidRecords("no header".into()).is_transient());
    }

    #[test]
    fn test_io_error_mentions_path() {
        let err = RfpError::io(
            "/data/list.csv",
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        );
        assert!(err.to_string().contains("/data/list.csv"));
    }
}
