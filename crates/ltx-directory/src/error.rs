//! Directory-level error types.
//!
//! Errors at this layer describe what the directory server did, not what
//! the connection manager was trying to achieve. The connection crate maps
//! these into its own taxonomy.

use thiserror::Error;

/// Errors surfaced by a [`Directory`](crate::Directory) implementation.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The server could not be reached, or went away mid-operation.
    #[error("directory server unreachable: {0}")]
    ServerDown(String),

    /// The named entry does not exist (LDAP result code 32).
    #[error("no such object: {0}")]
    NoSuchObject(String),

    /// The bind credentials were refused (LDAP result code 49).
    #[error("invalid credentials for `{0}`")]
    InvalidCredentials(String),

    /// An entry with the target DN already exists (LDAP result code 68).
    #[error("entry already exists: {0}")]
    AlreadyExists(String),

    /// Any other protocol-level failure from the underlying client.
    #[error("directory protocol error: {0}")]
    Protocol(#[from] ldap3::LdapError),
}

impl DirectoryError {
    /// Creates a server-down error.
    #[must_use]
    pub fn server_down(msg: impl Into<String>) -> Self {
        Self::ServerDown(msg.into())
    }

    /// Creates a no-such-object error.
    #[must_use]
    pub fn no_such_object(dn: impl Into<String>) -> Self {
        Self::NoSuchObject(dn.into())
    }

    /// Checks whether this error means the server is unreachable.
    #[must_use]
    pub const fn is_server_down(&self) -> bool {
        matches!(self, Self::ServerDown(_))
    }

    /// Checks whether this error means the target entry is absent.
    #[must_use]
    pub const fn is_no_such_object(&self) -> bool {
        matches!(self, Self::NoSuchObject(_))
    }

    /// Classifies an `ldap3` error into this taxonomy.
    ///
    /// Result codes 32, 49, and 68 become the dedicated variants; transport
    /// failures become [`Self::ServerDown`]; everything else is kept as a
    /// protocol error.
    #[must_use]
    pub fn from_ldap(err: ldap3::LdapError) -> Self {
        match &err {
            ldap3::LdapError::LdapResult { result } => match result.rc {
                32 => return Self::NoSuchObject(result.text.clone()),
                49 => return Self::InvalidCredentials(result.text.clone()),
                68 => return Self::AlreadyExists(result.text.clone()),
                _ => {}
            },
            ldap3::LdapError::Io { source } => return Self::ServerDown(source.to_string()),
            ldap3::LdapError::EndOfStream => {
                return Self::ServerDown("connection closed by peer".to_string());
            }
            ldap3::LdapError::Timeout { .. } => {
                return Self::ServerDown("operation timed out".to_string());
            }
            _ => {}
        }
        Self::Protocol(err)
    }
}

/// Result type for directory operations.
pub type DirectoryResult<T> = Result<T, DirectoryError>;
