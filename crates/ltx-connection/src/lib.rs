//! # ltx-connection
//!
//! Transactional LDAP connection manager.
//!
//! A [`Connection`] holds one logical link to a directory server and
//! exposes it with transactional semantics: entry mutations are staged in
//! memory and only reach the directory when the enclosing transaction
//! commits, or immediately when transactional mode is off. The connection
//! also owns its own lifecycle: it opens lazily, falls back from the
//! encrypted to the cleartext transport when the server refuses the
//! former, treats handles older than five minutes as closed, and reopens
//! transparently.
//!
//! An external transaction coordinator drives the [`Participant`] side:
//! `begin → {register}* → vote → finish`, or `abort` on failure.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod config;
pub mod connection;
pub mod entry;
pub mod error;
pub mod transaction;

mod runtime;

pub use config::{split_host_port, ConnectionConfig, ConnectionConfigBuilder, ConnectionEdit};
pub use connection::{Connection, OpenStatus};
pub use entry::{Entry, EntryMode};
pub use error::{ConnectionError, Result};
pub use runtime::STALENESS_WINDOW;
pub use transaction::Participant;
