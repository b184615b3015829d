//! Connection-level error types.
//!
//! The taxonomy callers see: connection availability, missing entries, and
//! writes attempted outside a commit window. Adapter failures are wrapped
//! rather than flattened so their classification stays inspectable.

use ltx_directory::DirectoryError;
use thiserror::Error;

/// Errors surfaced by the connection manager.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// Invalid configuration.
    #[error("connection configuration error: {0}")]
    Configuration(String),

    /// The connection is not set to be open, so no operation may dial out.
    #[error("connection is closed and not permitted to open")]
    NotOpen,

    /// The connection could not be established or failed its liveness check.
    #[error("directory connection unavailable: {0}")]
    Unavailable(String),

    /// The server answered the bind with no-such-object; the bind DN or
    /// password is likely wrong. A soft, configuration-level failure as
    /// opposed to the server being unreachable.
    #[error(
        "directory server returned `no such object' for `{bind_dn}'; \
         possibly the bind DN or password is incorrect"
    )]
    CredentialsRejected {
        /// The bind DN that was refused.
        bind_dn: String,
    },

    /// The named entry does not exist, or is hidden by a pending staged
    /// deletion.
    #[error("entry not found: {0}")]
    NotFound(String),

    /// A write reached the wire gate while no commit was in progress.
    #[error("writes are only permitted while a commit is in progress")]
    NotInTransaction,

    /// An adapter-level failure.
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

impl ConnectionError {
    /// Creates a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Creates an unavailable error.
    #[must_use]
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Creates a not-found error.
    #[must_use]
    pub fn not_found(dn: impl Into<String>) -> Self {
        Self::NotFound(dn.into())
    }

    /// Checks whether this error reports a missing entry.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Checks whether this error is about connection availability rather
    /// than the operation itself.
    #[must_use]
    pub const fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::NotOpen | Self::Unavailable(_) | Self::CredentialsRejected { .. }
        )
    }
}

/// Result type for connection operations.
pub type Result<T> = std::result::Result<T, ConnectionError>;
