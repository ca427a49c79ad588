//! Unified error type for Vigil operations.
//!
//! One simple enum covers the whole workspace; variants mirror the failure
//! surfaces of the sync core rather than the crates they occur in.

/// Unified error type for all Vigil operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum VigilError {
    /// Stored ciphertext could not be decrypted (malformed blob or wrong key).
    ///
    /// Callers on the read path treat this as a cache miss: it is logged and
    /// the read fails open, never surfacing to the user as data loss.
    #[error("decrypt failed: {message}")]
    Decrypt {
        /// What failed to decrypt and why.
        message: String,
    },

    /// No valid credential is available for an authenticated operation.
    #[error("authentication required")]
    AuthRequired,

    /// Transport-level failure talking to the remote authority.
    #[error("network error: {message}")]
    Network {
        /// Underlying transport error.
        message: String,
    },

    /// The remote authority answered with a non-2xx status.
    #[error("server returned status {status}")]
    NonSuccessStatus {
        /// HTTP status code of the rejection.
        status: u16,
    },

    /// The streaming connection closed or could not be established.
    #[error("connection closed: {message}")]
    ConnectionClosed {
        /// Close reason, when one is known.
        message: String,
    },

    /// The secure blob store failed to read or write a record.
    #[error("storage error: {message}")]
    Storage {
        /// Underlying storage error.
        message: String,
    },

    /// A payload could not be encoded or decoded.
    #[error("serialization error: {message}")]
    Serialization {
        /// Underlying codec error.
        message: String,
    },

    /// Internal invariant violation.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the violated invariant.
        message: String,
    },
}

impl VigilError {
    /// Create a decrypt error.
    pub fn decrypt(message: impl Into<String>) -> Self {
        Self::Decrypt {
            message: message.into(),
        }
    }

    /// Create a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create a non-success status error.
    pub fn non_success(status: u16) -> Self {
        Self::NonSuccessStatus { status }
    }

    /// Create a connection-closed error.
    pub fn connection_closed(message: impl Into<String>) -> Self {
        Self::ConnectionClosed {
            message: message.into(),
        }
    }

    /// Create a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Create a serialization error.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Standard Result type for Vigil operations.
pub type Result<T> = std::result::Result<T, VigilError>;
