//! In-memory directory server.
//!
//! Implements the same [`Directory`]/[`Connect`] boundary as the `ldap3`
//! client against a process-local entry tree. Every handled operation is
//! recorded in an op log so tests can assert exactly which wire calls a
//! scenario produced, and the server can be told to refuse the encrypted
//! transport or go offline to exercise the reconnect paths.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::client::{Connect, Directory};
use crate::error::{DirectoryError, DirectoryResult};
use crate::types::{Attributes, ModOp, RawEntry, Transport};

/// One operation the server handled, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    /// A simple bind as the given DN.
    Bind {
        /// Bind DN presented by the client.
        dn: String,
    },
    /// A who-am-i liveness probe.
    WhoAmI,
    /// Connection teardown.
    Unbind,
    /// Base-scope search.
    SearchBase {
        /// Search base DN.
        dn: String,
    },
    /// One-level search.
    SearchOneLevel {
        /// Search base DN.
        dn: String,
    },
    /// Entry addition.
    Add {
        /// Target DN.
        dn: String,
    },
    /// Entry modification.
    Modify {
        /// Target DN.
        dn: String,
        /// Number of modifications applied.
        mods: usize,
    },
    /// Entry deletion.
    Delete {
        /// Target DN.
        dn: String,
    },
    /// Read-through cache invalidation.
    InvalidateCache,
}

#[derive(Debug, Default)]
struct ServerState {
    entries: HashMap<String, Attributes>,
    credentials: Option<(String, String)>,
    refuse_ldaps: bool,
    offline: bool,
    ops: Vec<Op>,
    connects: Vec<Transport>,
}

/// Shared-state in-memory directory server.
///
/// Cloning yields another handle onto the same tree; handles produced by
/// [`MemoryServer::connector`] observe every change.
#[derive(Debug, Clone, Default)]
pub struct MemoryServer {
    state: Arc<Mutex<ServerState>>,
}

impl MemoryServer {
    /// Creates an empty server accepting any bind.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a connector dialing this server.
    #[must_use]
    pub fn connector(&self) -> MemoryConnector {
        MemoryConnector {
            server: self.clone(),
        }
    }

    /// Requires binds to present exactly these credentials.
    ///
    /// An unknown bind DN is answered with no-such-object, the way
    /// directory servers report a bind DN outside their naming context;
    /// a wrong password is answered with invalid-credentials.
    pub fn set_credentials(&self, bind_dn: impl Into<String>, password: impl Into<String>) {
        self.state.lock().credentials = Some((bind_dn.into(), password.into()));
    }

    /// Seeds or replaces an entry.
    pub fn insert(&self, dn: impl Into<String>, attributes: Attributes) {
        self.state.lock().entries.insert(dn.into(), attributes);
    }

    /// Checks whether an entry exists.
    #[must_use]
    pub fn contains(&self, dn: &str) -> bool {
        self.state.lock().entries.contains_key(dn)
    }

    /// Returns a copy of an entry's attributes.
    #[must_use]
    pub fn attributes(&self, dn: &str) -> Option<Attributes> {
        self.state.lock().entries.get(dn).cloned()
    }

    /// Makes the encrypted transport unreachable (or reachable again).
    pub fn refuse_ldaps(&self, refuse: bool) {
        self.state.lock().refuse_ldaps = refuse;
    }

    /// Takes the whole server offline (or back online).
    pub fn set_offline(&self, offline: bool) {
        self.state.lock().offline = offline;
    }

    /// Returns the op log so far.
    #[must_use]
    pub fn ops(&self) -> Vec<Op> {
        self.state.lock().ops.clone()
    }

    /// Clears the op log.
    pub fn clear_ops(&self) {
        self.state.lock().ops.clear();
    }

    /// Returns every connect attempt, including refused ones.
    #[must_use]
    pub fn connects(&self) -> Vec<Transport> {
        self.state.lock().connects.clone()
    }
}

/// Connector dialing a [`MemoryServer`].
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    server: MemoryServer,
}

impl Connect for MemoryConnector {
    fn connect(
        &self,
        transport: Transport,
        _host: &str,
        _port: u16,
    ) -> DirectoryResult<Box<dyn Directory>> {
        let mut state = self.server.state.lock();
        state.connects.push(transport);
        if state.offline {
            return Err(DirectoryError::server_down("server offline"));
        }
        if transport == Transport::Ldaps && state.refuse_ldaps {
            return Err(DirectoryError::server_down("encrypted transport refused"));
        }
        drop(state);
        Ok(Box::new(MemoryDirectory {
            server: self.server.clone(),
            bound: None,
        }))
    }
}

/// A live handle onto a [`MemoryServer`].
#[derive(Debug)]
pub struct MemoryDirectory {
    server: MemoryServer,
    bound: Option<String>,
}

impl MemoryDirectory {
    fn state(&self) -> DirectoryResult<parking_lot::MutexGuard<'_, ServerState>> {
        let state = self.server.state.lock();
        if state.offline {
            return Err(DirectoryError::server_down("server offline"));
        }
        Ok(state)
    }
}

impl Directory for MemoryDirectory {
    fn simple_bind(&mut self, dn: &str, password: &str) -> DirectoryResult<()> {
        let mut state = self.state()?;
        state.ops.push(Op::Bind { dn: dn.to_string() });
        if let Some((expected_dn, expected_pw)) = state.credentials.clone() {
            if dn != expected_dn {
                return Err(DirectoryError::no_such_object(dn));
            }
            if password != expected_pw {
                return Err(DirectoryError::InvalidCredentials(dn.to_string()));
            }
        }
        drop(state);
        self.bound = Some(dn.to_string());
        Ok(())
    }

    fn who_am_i(&mut self) -> DirectoryResult<String> {
        let mut state = self.state()?;
        state.ops.push(Op::WhoAmI);
        Ok(match &self.bound {
            Some(dn) => format!("dn:{dn}"),
            None => String::new(),
        })
    }

    fn unbind(&mut self) -> DirectoryResult<()> {
        let mut state = self.state()?;
        state.ops.push(Op::Unbind);
        drop(state);
        self.bound = None;
        Ok(())
    }

    fn search_base(&mut self, dn: &str, _filter: &str) -> DirectoryResult<Vec<RawEntry>> {
        let mut state = self.state()?;
        state.ops.push(Op::SearchBase { dn: dn.to_string() });
        match state.entries.get(dn) {
            Some(attrs) => Ok(vec![RawEntry::new(dn, attrs.clone())]),
            None => Err(DirectoryError::no_such_object(dn)),
        }
    }

    fn search_one_level(&mut self, dn: &str, _filter: &str) -> DirectoryResult<Vec<RawEntry>> {
        let mut state = self.state()?;
        state.ops.push(Op::SearchOneLevel { dn: dn.to_string() });
        if !state.entries.contains_key(dn) {
            return Err(DirectoryError::no_such_object(dn));
        }
        let mut children: Vec<RawEntry> = state
            .entries
            .iter()
            .filter(|(child, _)| is_child(dn, child))
            .map(|(child, attrs)| RawEntry::new(child.clone(), attrs.clone()))
            .collect();
        children.sort_by(|a, b| a.dn.cmp(&b.dn));
        Ok(children)
    }

    fn add(&mut self, dn: &str, attributes: &Attributes) -> DirectoryResult<()> {
        let mut state = self.state()?;
        state.ops.push(Op::Add { dn: dn.to_string() });
        if state.entries.contains_key(dn) {
            return Err(DirectoryError::AlreadyExists(dn.to_string()));
        }
        state.entries.insert(dn.to_string(), attributes.clone());
        Ok(())
    }

    fn modify(&mut self, dn: &str, mods: &[ModOp]) -> DirectoryResult<()> {
        let mut state = self.state()?;
        state.ops.push(Op::Modify {
            dn: dn.to_string(),
            mods: mods.len(),
        });
        let entry = state
            .entries
            .get_mut(dn)
            .ok_or_else(|| DirectoryError::no_such_object(dn))?;
        for op in mods {
            match op {
                ModOp::Add(name, values) => {
                    let existing = entry.entry(name.clone()).or_default();
                    for value in values {
                        if !existing.contains(value) {
                            existing.push(value.clone());
                        }
                    }
                }
                ModOp::Replace(name, values) => {
                    entry.insert(name.clone(), values.clone());
                }
                ModOp::Delete(name) => {
                    entry.remove(name);
                }
            }
        }
        Ok(())
    }

    fn delete(&mut self, dn: &str) -> DirectoryResult<()> {
        let mut state = self.state()?;
        state.ops.push(Op::Delete { dn: dn.to_string() });
        if state.entries.remove(dn).is_none() {
            return Err(DirectoryError::no_such_object(dn));
        }
        Ok(())
    }

    fn invalidate_cache(&mut self) {
        self.server.state.lock().ops.push(Op::InvalidateCache);
    }
}

/// True when `child` is an immediate child of `parent`.
fn is_child(parent: &str, child: &str) -> bool {
    match child.strip_suffix(parent) {
        Some(prefix) => match prefix.strip_suffix(',') {
            Some(rdn) => !rdn.is_empty() && !rdn.contains(','),
            None => false,
        },
        None => false,
    }
}
