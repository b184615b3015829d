//! Wire-facing data types shared by every [`Directory`](crate::Directory)
//! implementation.

use std::collections::HashMap;
use std::fmt;

/// Multi-valued attribute map of a directory entry.
pub type Attributes = HashMap<String, Vec<String>>;

/// Transport used to reach a directory server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// TLS from connection start (`ldaps://`).
    Ldaps,
    /// Plain TCP (`ldap://`), used only as a fallback when the encrypted
    /// transport reports the server unreachable.
    Ldap,
}

impl Transport {
    /// Returns the URL scheme for this transport.
    #[must_use]
    pub const fn scheme(&self) -> &'static str {
        match self {
            Self::Ldaps => "ldaps",
            Self::Ldap => "ldap",
        }
    }

    /// Builds a connection URL for the given host and port.
    #[must_use]
    pub fn url(&self, host: &str, port: u16) -> String {
        format!("{}://{host}:{port}", self.scheme())
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.scheme())
    }
}

/// A raw directory entry: DN plus its attribute map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    /// Distinguished Name.
    pub dn: String,

    /// Attributes (all values are multi-valued).
    pub attributes: Attributes,
}

impl RawEntry {
    /// Creates an entry from a DN and attribute map.
    #[must_use]
    pub fn new(dn: impl Into<String>, attributes: Attributes) -> Self {
        Self {
            dn: dn.into(),
            attributes,
        }
    }

    /// Gets the first value of an attribute.
    #[must_use]
    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .get(name)
            .and_then(|v| v.first())
            .map(String::as_str)
    }

    /// Gets all values of an attribute.
    #[must_use]
    pub fn get_attrs(&self, name: &str) -> Option<&Vec<String>> {
        self.attributes.get(name)
    }

    /// Checks if the entry has an attribute.
    #[must_use]
    pub fn has_attr(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }
}

/// One buffered modification to an entry's attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModOp {
    /// Add values to an attribute, creating it if absent.
    Add(String, Vec<String>),
    /// Replace every value of an attribute.
    Replace(String, Vec<String>),
    /// Remove an attribute entirely.
    Delete(String),
}

impl ModOp {
    /// Returns the attribute this modification targets.
    #[must_use]
    pub fn attribute(&self) -> &str {
        match self {
            Self::Add(name, _) | Self::Replace(name, _) | Self::Delete(name) => name,
        }
    }
}
