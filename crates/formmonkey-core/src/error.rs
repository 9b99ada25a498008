//! Error types for the FormMonkey pipeline.

use thiserror::Error;

/// Result type alias using FormMonkey's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed underlying cause carried by wrapping variants.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Core error type for FormMonkey operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Job or profile absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// File extension has no registered extractor
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// I/O or parser failure during extraction, with the stage it happened in
    #[error("Extraction failed ({context}): {source}")]
    Extraction {
        context: String,
        #[source]
        source: BoxError,
    },

    /// Model provider timed out or errored
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Configuration error (e.g. unknown provider name)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Durable storage backend unreachable or misbehaving
    #[error("Storage degraded: {0}")]
    StorageDegraded(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Job state machine violation
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wrap an underlying cause as an extraction failure.
    pub fn extraction(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Error::Extraction {
            context: context.into(),
            source: source.into(),
        }
    }

    /// Whether this error came from the durable store and can be recovered
    /// by retrying the operation against the in-memory backend.
    pub fn is_recoverable_storage(&self) -> bool {
        matches!(self, Error::StorageDegraded(_) | Error::Serialization(_))
    }

    /// Whether this error reports a missing job or profile.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Render the error with its full `source()` chain, outermost first.
    pub fn chain(&self) -> String {
        let mut out = self.to_string();
        let mut current = std::error::Error::source(self);
        while let Some(cause) = current {
            out.push_str("\n  caused by: ");
            out.push_str(&cause.to_string());
            current = cause.source();
        }
        out
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}

impl From<redis::RedisError> for Error {
    fn from(e: redis::RedisError) -> Self {
        Error::StorageDegraded(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_not_found() {
        let err = Error::NotFound("job abc".to_string());
        assert_eq!(err.to_string(), "Not found: job abc");
    }

    #[test]
    fn test_error_display_unsupported_format() {
        let err = Error::UnsupportedFormat("txt".to_string());
        assert_eq!(err.to_string(), "Unsupported format: txt");
    }

    #[test]
    fn test_error_display_config() {
        let err = Error::Config("Unknown model provider: remote-c".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: Unknown model provider: remote-c"
        );
    }

    #[test]
    fn test_extraction_wraps_source() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = Error::extraction("reading contract.pdf", io_err);
        assert!(err.to_string().contains("reading contract.pdf"));
        assert!(err.to_string().contains("no such file"));

        let source = std::error::Error::source(&err).expect("source is kept");
        assert_eq!(source.to_string(), "no such file");
    }

    #[test]
    fn test_chain_includes_nested_causes() {
        let inner = Error::InvalidInput("missing %PDF header".to_string());
        let err = Error::extraction("pdf extraction", inner);
        let chain = err.chain();
        assert!(chain.starts_with("Extraction failed (pdf extraction)"));
        assert!(chain.contains("caused by: Invalid input: missing %PDF header"));
    }

    #[test]
    fn test_recoverable_storage() {
        assert!(Error::StorageDegraded("down".into()).is_recoverable_storage());
        assert!(Error::Serialization("bad json".into()).is_recoverable_storage());
        assert!(!Error::NotFound("x".into()).is_recoverable_storage());
        assert!(!Error::Config("x".into()).is_recoverable_storage());
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn test_from_redis_error_is_storage_degraded() {
        let redis_err = redis::RedisError::from((redis::ErrorKind::IoError, "connection refused"));
        let err: Error = redis_err.into();
        assert!(err.is_recoverable_storage());
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
