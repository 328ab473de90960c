// Error types for certstream
//
// This module provides structured error types using thiserror so callers
// can match on failure classes instead of string inspection.

use std::io;
use thiserror::Error;

/// Main error type for certstream operations
#[derive(Debug, Error)]
pub enum CertStreamError {
    /// Invalid configuration or parameters
    #[error("Invalid configuration: {message}")]
    ConfigError { message: String },

    /// Non-success HTTP status from a CT log or the catalog server
    #[error("HTTP error (status {status}) from {url}")]
    HttpStatus { status: u16, url: String },

    /// Reqwest HTTP client errors
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    /// Parsing error for wire or certificate data
    #[error("Parse error: {message}")]
    ParseError { message: String },

    /// Generic I/O error
    #[error("I/O error: {source}")]
    IoError {
        #[from]
        source: io::Error,
    },

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl CertStreamError {
    /// True when the failure is an HTTP 429, which the follower handles
    /// with in-loop backoff instead of surfacing to the poll tick.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, CertStreamError::HttpStatus { status: 429, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_detection() {
        let err = CertStreamError::HttpStatus {
            status: 429,
            url: "https://ct.example.com/ct/v1/get-entries".to_string(),
        };
        assert!(err.is_rate_limited());

        let err = CertStreamError::HttpStatus {
            status: 503,
            url: "https://ct.example.com/ct/v1/get-entries".to_string(),
        };
        assert!(!err.is_rate_limited());

        let err = CertStreamError::Other("rate limited".to_string());
        assert!(!err.is_rate_limited());
    }

    #[test]
    fn test_error_display() {
        let err = CertStreamError::HttpStatus {
            status: 429,
            url: "https://ct.example.com/".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("429"));
        assert!(msg.contains("ct.example.com"));

        let err = CertStreamError::ParseError {
            message: "leaf too short".to_string(),
        };
        assert!(err.to_string().contains("leaf too short"));
    }

    #[test]
    fn test_error_conversion_from_io() {
        let io_err = io::Error::new(io::ErrorKind::AddrInUse, "in use");
        let err: CertStreamError = io_err.into();
        assert!(matches!(err, CertStreamError::IoError { .. }));
    }
}
