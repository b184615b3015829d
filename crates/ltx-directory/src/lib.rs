//! # ltx-directory
//!
//! Directory client boundary for the LTX connection manager.
//!
//! The crate defines the [`Directory`] and [`Connect`] traits the
//! connection manager is written against, an `ldap3`-backed
//! implementation for real servers, and an in-memory implementation with
//! an op log for tests.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod client;
pub mod error;
pub mod ldap;
pub mod memory;
pub mod types;

pub use client::{Connect, Directory, FILTER_ANY};
pub use error::{DirectoryError, DirectoryResult};
pub use ldap::{LdapConnector, LdapDirectory};
pub use memory::{MemoryConnector, MemoryDirectory, MemoryServer, Op};
pub use types::{Attributes, ModOp, RawEntry, Transport};
