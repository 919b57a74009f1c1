//! Error types for provkg.
//!
//! All errors are strongly typed using thiserror. Row- and pair-level
//! problems in the mapping table are *not* errors: they surface as
//! [`crate::mapping::RowOutcome`] and [`crate::merge::PairOutcome`] values
//! and are counted in the stage reports. Only whole-stage failures end up here.

use thiserror::Error;

/// Errors raised while reading or decoding a graph.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("N-Triples syntax error on line {line}: {reason}")]
    Syntax {
        line: usize,
        reason: String,
    },

    #[error("Graph I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while reading the mapping table.
///
/// Malformed rows never produce an error; only input that cannot be
/// opened or decoded does.
#[derive(Debug, Error)]
pub enum MappingError {
    #[error("Mapping table is unreadable: {0}")]
    Unreadable(#[from] csv::Error),

    #[error("Mapping table could not be opened: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the external entity source.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request to {endpoint} failed: {message}")]
    Request {
        endpoint: String,
        message: String,
    },

    #[error("Endpoint {endpoint} returned status {status}")]
    Status {
        endpoint: String,
        status: u16,
    },

    #[error("Malformed response from {endpoint}: {message}")]
    MalformedResponse {
        endpoint: String,
        message: String,
    },
}

/// Errors raised by the retrieval index.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("Embedding has {actual} dimensions, expected {expected}")]
    DimensionMismatch {
        actual: usize,
        expected: usize,
    },

    #[error("Embedder returned {actual} vectors for {expected} documents")]
    BatchSizeMismatch {
        actual: usize,
        expected: usize,
    },

    #[error("Embedding dimension must be non-zero")]
    ZeroDimension,

    #[error("Embedding model failed: {message}")]
    Embedding {
        message: String,
    },

    #[error("Retrieval index lock poisoned: {context}")]
    Poisoned {
        context: &'static str,
    },
}

/// Errors raised by a remote answer generator.
///
/// These never reach the caller of a tiered generator; they select the
/// fallback path instead.
#[derive(Debug, Error)]
pub enum AnswerError {
    #[error("No API credential configured")]
    MissingCredential,

    #[error("Answer request failed: {0}")]
    Request(String),

    #[error("Answer endpoint returned status {0}")]
    Status(u16),

    #[error("Unexpected answer response shape: {0}")]
    UnexpectedShape(String),
}

/// Errors raised while assembling configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

/// Top-level error type for provkg.
#[derive(Debug, Error)]
pub enum ProvError {
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Mapping error: {0}")]
    Mapping(#[from] MappingError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl ProvError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if the failure came from an external collaborator.
    #[must_use]
    pub const fn is_upstream(&self) -> bool {
        matches!(self, Self::Fetch(_))
    }

    /// Returns true if retrying the failed stage could succeed.
    ///
    /// The core never retries on its own; this is a hint for the caller.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Fetch(e) => match e {
                FetchError::Request { .. } => true,
                FetchError::Status { status, .. } => *status >= 500,
                FetchError::MalformedResponse { .. } => false,
            },
            Self::Graph(GraphError::Io(_)) | Self::Mapping(MappingError::Io(_)) => true,
            _ => false,
        }
    }
}

/// Result type alias for provkg operations.
pub type ProvResult<T> = Result<T, ProvError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graph_syntax_error_mentions_line() {
        let err = GraphError::Syntax {
            line: 7,
            reason: "expected '.'".to_string(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("line 7"));
        assert!(msg.contains("expected '.'"));
    }

    #[test]
    fn test_fetch_status_retryable_only_for_server_errors() {
        let server: ProvError = FetchError::Status {
            endpoint: "http://x".to_string(),
            status: 503,
        }
        .into();
        assert!(server.is_upstream());
        assert!(server.is_retryable());

        let client: ProvError = FetchError::Status {
            endpoint: "http://x".to_string(),
            status: 404,
        }
        .into();
        assert!(!client.is_retryable());
    }

    #[test]
    fn test_malformed_response_not_retryable() {
        let err: ProvError = FetchError::MalformedResponse {
            endpoint: "http://x".to_string(),
            message: "missing results".to_string(),
        }
        .into();
        assert!(!err.is_retryable());
        assert!(format!("{err}").contains("missing results"));
    }

    #[test]
    fn test_retrieval_dimension_mismatch() {
        let err = RetrievalError::DimensionMismatch {
            actual: 3,
            expected: 64,
        };
        let msg = format!("{err}");
        assert!(msg.contains('3'));
        assert!(msg.contains("64"));
    }

    #[test]
    fn test_internal_error() {
        let err = ProvError::internal("unexpected state");
        assert!(!err.is_upstream());
        assert!(!err.is_retryable());
        assert!(format!("{err}").contains("unexpected state"));
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::InvalidValue {
            key: "PROVKG_TOP_K".to_string(),
            value: "many".to_string(),
            reason: "invalid digit found in string".to_string(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("PROVKG_TOP_K"));
        assert!(msg.contains("\"many\""));
    }
}
