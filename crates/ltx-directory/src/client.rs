//! The directory client boundary.
//!
//! The connection manager talks to a directory server exclusively through
//! these two traits, which keeps the protocol client swappable and lets
//! tests drive the full stack against the in-memory implementation.

use crate::error::DirectoryResult;
use crate::types::{Attributes, ModOp, RawEntry, Transport};

/// A live, possibly-bound directory connection.
///
/// All operations are synchronous, blocking calls; there is no internal
/// concurrency at this layer. Implementations are handed out by a
/// [`Connect`] impl and owned by exactly one connection manager.
pub trait Directory {
    /// Binds as the given DN with a password.
    fn simple_bind(&mut self, dn: &str, password: &str) -> DirectoryResult<()>;

    /// Cheap liveness probe; returns the authorization identity the server
    /// reports for this connection.
    fn who_am_i(&mut self) -> DirectoryResult<String>;

    /// Unbinds and tears the connection down.
    fn unbind(&mut self) -> DirectoryResult<()>;

    /// Base-scope search on a single DN.
    fn search_base(&mut self, dn: &str, filter: &str) -> DirectoryResult<Vec<RawEntry>>;

    /// One-level search for the immediate children of a DN.
    fn search_one_level(&mut self, dn: &str, filter: &str) -> DirectoryResult<Vec<RawEntry>>;

    /// Adds a new entry.
    fn add(&mut self, dn: &str, attributes: &Attributes) -> DirectoryResult<()>;

    /// Applies a modification list to an existing entry.
    fn modify(&mut self, dn: &str, mods: &[ModOp]) -> DirectoryResult<()>;

    /// Deletes an entry.
    fn delete(&mut self, dn: &str) -> DirectoryResult<()>;

    /// Drops any read-through cache held by the client.
    fn invalidate_cache(&mut self);
}

/// Dials a directory server over a chosen transport.
pub trait Connect {
    /// Opens an unbound connection to `host:port`.
    fn connect(
        &self,
        transport: Transport,
        host: &str,
        port: u16,
    ) -> DirectoryResult<Box<dyn Directory>>;
}

/// Presence filter matching every entry; the default filter for existence
/// checks and subtree listings.
pub const FILTER_ANY: &str = "(objectClass=*)";
