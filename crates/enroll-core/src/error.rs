use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for enrollment operations
pub type Result<T> = std::result::Result<T, EnrollError>;

/// Errors that can occur while enrolling a node or bootstrapping trust
#[derive(Error, Debug)]
pub enum EnrollError {
    /// Transport-level failure talking to the CA
    #[error("connection to CA failed: {0}")]
    Connection(String),

    /// The call did not complete within the configured timeout (milliseconds)
    #[error("CA request timed out after {0} ms")]
    Timeout(u64),

    /// The CA understood the request and declined it
    #[error("CA rejected the request ({code}): {reason}")]
    Rejected {
        /// Status code returned by the CA
        code: u16,
        /// Reason given by the CA
        reason: String,
    },

    /// The CA does not know the requested resource
    #[error("resource not found on CA: {resource}")]
    NotFound {
        /// Description of the resource that wasn't found
        resource: String,
    },

    /// The CA answered with something that is not a valid protocol message
    #[error("invalid CA response: {0}")]
    InvalidResponse(String),

    /// Key pair generation failed
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    /// Signing the enrollment request failed
    #[error("signing failed: {0}")]
    Signing(String),

    /// Canonical serialization of a request failed
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// Local persistence failure
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// Path involved in the failed operation
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Certificate material could not be parsed
    #[error("failed to parse certificate from {source_name}: {reason}")]
    Parse {
        /// Where the material came from (file path or RPC name)
        source_name: String,
        /// Parser diagnostic
        reason: String,
    },

    /// No usable trust anchor could be established
    #[error("trust bootstrap failed: {0}")]
    TrustBootstrap(String),

    /// A certificate does not chain to anything in the trust pool
    #[error("certificate is not trusted: {0}")]
    Untrusted(String),

    /// Configuration is invalid
    #[error("configuration error: {0}")]
    Config(String),
}

/// Coarse classification of an [`EnrollError`], cheap to copy and compare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Transport failure or timeout
    Connection,
    /// CA declined the request
    RemoteRejection,
    /// CA has no such resource
    NotFound,
    /// CA spoke something other than the protocol
    InvalidResponse,
    /// Local key generation failure
    KeyGeneration,
    /// Local signing failure
    Signing,
    /// Local serialization failure
    Serialization,
    /// Local filesystem failure
    Io,
    /// Unparseable certificate material
    Parse,
    /// Missing or empty trust anchor
    TrustBootstrap,
    /// Certificate outside the trust pool
    Untrusted,
    /// Bad configuration
    Config,
}

impl EnrollError {
    /// Build an I/O error tagged with the path it happened on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Build a parse error tagged with where the bytes came from
    pub fn parse(source_name: impl Into<String>, reason: impl ToString) -> Self {
        Self::Parse {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }

    /// Classify this error
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Connection(_) | Self::Timeout(_) => ErrorKind::Connection,
            Self::Rejected { .. } => ErrorKind::RemoteRejection,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InvalidResponse(_) => ErrorKind::InvalidResponse,
            Self::KeyGeneration(_) => ErrorKind::KeyGeneration,
            Self::Signing(_) => ErrorKind::Signing,
            Self::Serialization(_) => ErrorKind::Serialization,
            Self::Io { .. } => ErrorKind::Io,
            Self::Parse { .. } => ErrorKind::Parse,
            Self::TrustBootstrap(_) => ErrorKind::TrustBootstrap,
            Self::Untrusted(_) => ErrorKind::Untrusted,
            Self::Config(_) => ErrorKind::Config,
        }
    }

    /// Returns true if the caller may retry the same request unchanged
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Timeout(_))
    }

    /// Returns true if the CA itself declined the request
    #[must_use]
    pub const fn is_remote_rejection(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }

    /// Returns the status code if the CA answered with one
    #[must_use]
    pub const fn status_code(&self) -> Option<u16> {
        match self {
            Self::Rejected { code, .. } => Some(*code),
            Self::NotFound { .. } => Some(404),
            _ => None,
        }
    }
}
