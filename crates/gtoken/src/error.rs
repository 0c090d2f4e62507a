//! Error types for gtoken

use std::path::PathBuf;
use thiserror::Error;

/// Failures reported by an identity or token capability
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Transport-level HTTP failure
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Upstream answered with a non-success status
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    /// Response or token payload could not be decoded
    #[error("decode error: {0}")]
    Decode(String),

    /// Local IO failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// No usable credentials were found
    #[error("missing credentials: {0}")]
    MissingCredentials(String),

    /// A JWT-bearer assertion could not be signed
    #[error("failed to sign assertion: {0}")]
    Signing(String),

    /// The request was abandoned because cancellation fired
    #[error("operation cancelled")]
    Cancelled,
}

/// Terminal failures of a refresh run and of the daemon shell
#[derive(Debug, Error)]
pub enum GtokenError {
    /// Both identity lookups failed; carries the fallback failure only
    #[error("failed to resolve service account identity: {0}")]
    Resolution(#[source] ProviderError),

    /// Token issuance failed
    #[error("failed to generate ID token: {0}")]
    Issuance(#[source] ProviderError),

    /// Token could not be written to the target file
    #[error("failed to write token to {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: ProviderError,
    },

    /// Refresh timing could not be derived from the token
    #[error("failed to get token duration: {0}")]
    ValidityInspection(#[source] ProviderError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Control server error
    #[error("Server error: {0}")]
    Server(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for capability calls
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Result type alias for gtoken operations
pub type GtokenResult<T> = Result<T, GtokenError>;
