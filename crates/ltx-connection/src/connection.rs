//! The connection facade.
//!
//! A [`Connection`] is the object an application holds: it owns the
//! lifecycle of one logical directory connection (lazy opening, encrypted
//! to cleartext transport fallback, staleness-based reconnection, explicit
//! close), serves entry reads with staged-work visibility applied, and
//! dispatches entry writes according to the connection's
//! [`EntryMode`](crate::EntryMode).

use std::time::Instant;

use ltx_directory::{
    Attributes, Connect, Directory, DirectoryResult, LdapConnector, ModOp, RawEntry, Transport,
    FILTER_ANY,
};

use crate::config::{ConnectionConfig, ConnectionEdit};
use crate::entry::{Entry, EntryMode};
use crate::error::{ConnectionError, Result};
use crate::runtime::ConnectionRuntime;
use crate::transaction::Participant;

/// Outcome of an explicit open attempt.
///
/// A refused bind DN is a soft, configuration-level result rather than a
/// hard fault: the server was reachable, the credentials were not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenStatus {
    /// The connection is open and bound.
    Opened,
    /// The server answered the bind with no-such-object; the bind DN or
    /// password is likely wrong. The connection stays closed.
    CredentialsRejected {
        /// The bind DN that was refused.
        bind_dn: String,
    },
}

/// One logical, transaction-aware directory connection.
pub struct Connection {
    config: ConnectionConfig,
    connector: Box<dyn Connect>,
    pub(crate) runtime: ConnectionRuntime,
    cached_mode: Option<EntryMode>,
}

impl Connection {
    /// Creates a connection over an arbitrary connector.
    ///
    /// Nothing is dialed here; the first operation that needs the
    /// directory opens the connection.
    pub fn new(config: ConnectionConfig, connector: Box<dyn Connect>) -> Result<Self> {
        config.validate()?;
        let committing = !config.transactional;
        let cached_mode = Some(EntryMode::for_transactional(config.transactional));
        Ok(Self {
            runtime: ConnectionRuntime::new(committing),
            cached_mode,
            config,
            connector,
        })
    }

    /// Creates a connection dialing real LDAP servers via `ldap3`.
    pub fn ldap(config: ConnectionConfig) -> Result<Self> {
        let connector = LdapConnector {
            connect_timeout: config.connect_timeout,
        };
        Self::new(config, Box::new(connector))
    }

    /// Returns the persisted configuration.
    #[must_use]
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Quickly checks whether the connection is usable as-is: a live
    /// handle exists, it was opened within the staleness window, and the
    /// connection is permitted to be open. No network call is made; a
    /// handle older than the window reads as closed even though it is
    /// still held.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.config.open_on_startup
            && self.runtime.handle.is_some()
            && self.runtime.handle_is_fresh()
    }

    /// Marks the connection as permitted to open and opens it.
    pub fn open(&mut self) -> Result<OpenStatus> {
        self.config.open_on_startup = true;
        self.reopen()
    }

    /// Closes the connection, ignoring unbind failures. Idempotent; the
    /// open-permission flag is left alone, so the next access reopens.
    pub fn close(&mut self) {
        if let Some(mut handle) = self.runtime.handle.take() {
            if let Err(e) = handle.unbind() {
                tracing::debug!(error = %e, "ignoring unbind failure during close");
            }
        }
        self.runtime.opened_at = None;
    }

    /// Drops any existing handle and dials the server again.
    ///
    /// Binds over the encrypted transport first, probing liveness with a
    /// who-am-i; when the server signals it is unreachable that way, one
    /// retry is made over the cleartext transport on the same host and
    /// port. A no-such-object answer to the bind itself is reported as
    /// [`OpenStatus::CredentialsRejected`] rather than raised.
    pub fn reopen(&mut self) -> Result<OpenStatus> {
        self.close();
        let host = self.config.host.clone();
        let port = self.config.port;

        let mut handle = match self.connect_probed(Transport::Ldaps, &host, port) {
            Ok(handle) => handle,
            Err(e) if e.is_server_down() => {
                tracing::debug!(
                    %host,
                    port,
                    "encrypted transport unreachable, falling back to cleartext"
                );
                self.connector.connect(Transport::Ldap, &host, port)?
            }
            Err(e) => return Err(e.into()),
        };

        match handle.simple_bind(&self.config.bind_dn, &self.config.bind_password) {
            Ok(()) => {}
            Err(e) if e.is_no_such_object() => {
                tracing::warn!(
                    bind_dn = %self.config.bind_dn,
                    error = %e,
                    "bind rejected, check the bind DN and password"
                );
                return Ok(OpenStatus::CredentialsRejected {
                    bind_dn: self.config.bind_dn.clone(),
                });
            }
            Err(e) => return Err(e.into()),
        }

        self.runtime.handle = Some(handle);
        self.runtime.opened_at = Some(Instant::now());
        tracing::debug!(%host, port, "directory connection opened");
        Ok(OpenStatus::Opened)
    }

    /// Expensive liveness check: a base-scope search on the base DN. Any
    /// failure force-closes the connection and reports false. Used before
    /// starting a transaction; ordinary reads rely on lazy reopening
    /// instead.
    pub fn ping(&mut self) -> bool {
        let base_dn = self.config.base_dn.clone();
        let probe = self.directory().and_then(|dir| {
            dir.search_base(&base_dn, FILTER_ANY)
                .map_err(ConnectionError::from)
        });
        match probe {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(error = %e, "liveness probe failed, closing connection");
                self.close();
                false
            }
        }
    }

    /// Drops the adapter's read-through cache.
    pub fn clear_cache(&mut self) -> Result<()> {
        self.directory()?.invalidate_cache();
        Ok(())
    }

    /// True when the connection is both permitted to open and marked
    /// browsable.
    #[must_use]
    pub fn can_browse(&self) -> bool {
        self.config.open_on_startup && self.config.browsable
    }

    /// Switches between deferred and immediate write behavior.
    ///
    /// The cached entry mode is recomputed on every toggle so entries
    /// built afterwards carry the policy in effect at toggle time. In
    /// immediate mode the commit gate is held permanently open; that is
    /// what lets writes reach the wire without a coordinator.
    pub fn set_transactional(&mut self, transactional: bool) {
        self.config.transactional = transactional;
        self.refresh_entry_mode();
        self.runtime.committing = !transactional;
    }

    /// Applies a full replacement set of settings.
    ///
    /// Changing host, port, bind DN, or password force-closes the live
    /// handle so the next access reopens with the new parameters. Turning
    /// the open flag on attempts an open and surfaces its status; turning
    /// it off closes.
    pub fn apply_edit(&mut self, edit: ConnectionEdit) -> Result<Option<OpenStatus>> {
        self.config.title = edit.title;
        if self.config.host != edit.host {
            self.close();
            self.config.host = edit.host;
        }
        if self.config.port != edit.port {
            self.close();
            self.config.port = edit.port;
        }
        if self.config.bind_dn != edit.bind_dn {
            self.close();
            self.config.bind_dn = edit.bind_dn;
        }
        if self.config.bind_password != edit.bind_password {
            self.close();
            self.config.bind_password = edit.bind_password;
        }

        let mut status = None;
        if edit.open_on_startup && !self.config.open_on_startup {
            self.config.open_on_startup = true;
            status = Some(self.reopen()?);
        } else if !edit.open_on_startup && self.config.open_on_startup {
            self.config.open_on_startup = false;
            self.close();
        }

        self.config.browsable = edit.browsable;
        self.set_transactional(edit.transactional);
        self.config.base_dn = edit.base_dn;
        Ok(status)
    }

    /// Returns the entry write mode in effect, computing and caching it if
    /// needed.
    #[must_use]
    pub fn entry_mode(&mut self) -> EntryMode {
        match self.cached_mode {
            Some(mode) => mode,
            None => {
                let mode = EntryMode::for_transactional(self.config.transactional);
                self.cached_mode = Some(mode);
                mode
            }
        }
    }

    fn refresh_entry_mode(&mut self) {
        self.cached_mode = Some(EntryMode::for_transactional(self.config.transactional));
    }

    /// Hands out the live handle, reopening first when the connection is
    /// closed or stale. Errors when the connection is not permitted to
    /// open, and surfaces a soft credentials rejection from the implicit
    /// reopen as a hard error since the caller needed a usable handle.
    fn directory(&mut self) -> Result<&mut dyn Directory> {
        if !self.config.open_on_startup {
            return Err(ConnectionError::NotOpen);
        }
        if !self.is_open() {
            match self.reopen()? {
                OpenStatus::Opened => {}
                OpenStatus::CredentialsRejected { bind_dn } => {
                    return Err(ConnectionError::CredentialsRejected { bind_dn });
                }
            }
        }
        match self.runtime.handle.as_deref_mut() {
            Some(handle) => Ok(handle),
            None => Err(ConnectionError::unavailable("no live handle after reopen")),
        }
    }

    fn connect_probed(
        &self,
        transport: Transport,
        host: &str,
        port: u16,
    ) -> DirectoryResult<Box<dyn Directory>> {
        let mut handle = self.connector.connect(transport, host, port)?;
        handle.who_am_i()?;
        Ok(handle)
    }

    pub(crate) fn invalidate_cache_best_effort(&mut self) {
        if let Some(handle) = self.runtime.handle.as_deref_mut() {
            handle.invalidate_cache();
        }
    }

    // ========================================================================
    // Reading entries
    // ========================================================================

    /// Checks whether an entry exists.
    ///
    /// A DN staged for adding exists; a DN staged for deletion does not,
    /// even though the directory still holds it. Otherwise a base-scope
    /// existence search decides, with no-such-object read as absence.
    pub fn has_entry(&mut self, dn: &str) -> Result<bool> {
        if self.runtime.staged_add.contains_key(dn) {
            return Ok(true);
        }
        if self.runtime.is_staged_for_delete(dn) {
            return Ok(false);
        }
        let dir = self.directory()?;
        match dir.search_base(dn, FILTER_ANY) {
            Ok(entries) => Ok(!entries.is_empty()),
            Err(e) if e.is_no_such_object() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Returns the raw DN-plus-attributes form of an entry.
    ///
    /// Staged adds are synthesized from their staged data; staged deletes
    /// and every lookup failure surface as [`ConnectionError::NotFound`].
    pub fn raw_entry(&mut self, dn: &str) -> Result<RawEntry> {
        if let Some(staged) = self.runtime.staged_add.get(dn) {
            return Ok(RawEntry::new(dn, staged.attributes()));
        }
        if self.runtime.is_staged_for_delete(dn) {
            return Err(ConnectionError::not_found(format!(
                "entry `{dn}' has been deleted"
            )));
        }
        let lookup = self.directory().and_then(|dir| {
            dir.search_base(dn, FILTER_ANY)
                .map_err(ConnectionError::from)
        });
        match lookup {
            Ok(mut entries) if !entries.is_empty() => Ok(entries.remove(0)),
            Ok(_) => Err(ConnectionError::not_found(format!(
                "cannot retrieve entry `{dn}'"
            ))),
            Err(e) => {
                tracing::debug!(%dn, error = %e, "entry lookup failed");
                Err(ConnectionError::not_found(format!(
                    "cannot retrieve entry `{dn}'"
                )))
            }
        }
    }

    /// Returns an entry wrapped in the active write mode. An entry staged
    /// for adding is returned directly; it is already the live object.
    pub fn entry(&mut self, dn: &str) -> Result<Entry> {
        if let Some(staged) = self.runtime.staged_add.get(dn) {
            return Ok(staged.clone());
        }
        let mode = self.entry_mode();
        let raw = self.raw_entry(dn)?;
        Ok(Entry::existing(raw.dn, raw.attributes, mode, &self.config.id))
    }

    /// Returns the entry at the connection's base DN.
    pub fn root(&mut self) -> Result<Entry> {
        let base_dn = self.config.base_dn.clone();
        self.entry(&base_dn)
    }

    /// Returns an entry's raw attribute map.
    pub fn attributes(&mut self, dn: &str) -> Result<Attributes> {
        Ok(self.raw_entry(dn)?.attributes)
    }

    /// Returns the raw immediate children of an entry, with DNs staged
    /// for deletion filtered out. One search call; the result is a finite
    /// materialized list.
    pub fn raw_sub_entries(&mut self, dn: &str) -> Result<Vec<RawEntry>> {
        // TODO: entries staged for adding below `dn` are not surfaced here.
        if self.runtime.is_staged_for_delete(dn) {
            return Err(ConnectionError::not_found(format!(
                "entry `{dn}' has been deleted"
            )));
        }
        let results = self.directory()?.search_one_level(dn, FILTER_ANY)?;
        Ok(results
            .into_iter()
            .filter(|e| !self.runtime.is_staged_for_delete(&e.dn))
            .collect())
    }

    /// Returns the immediate children of an entry, wrapped in the active
    /// write mode.
    pub fn sub_entries(&mut self, dn: &str) -> Result<Vec<Entry>> {
        let mode = self.entry_mode();
        let raw = self.raw_sub_entries(dn)?;
        Ok(raw
            .into_iter()
            .map(|e| Entry::existing(e.dn, e.attributes, mode, &self.config.id))
            .collect())
    }

    // ========================================================================
    // Writing entries
    // ========================================================================

    /// Creates an entry.
    ///
    /// Deferred mode stages the new entry until the enclosing transaction
    /// commits; immediate mode writes it through right away.
    pub fn create_entry(&mut self, dn: &str, attributes: Attributes) -> Result<Entry> {
        let mode = self.entry_mode();
        if mode.defers_writes() {
            let entry = Entry::created(dn, attributes, mode, &self.config.id);
            self.register_add(&entry);
            Ok(entry)
        } else {
            self.add_now(dn, &attributes)?;
            Ok(Entry::existing(dn, attributes, mode, &self.config.id))
        }
    }

    /// Hands an entry's buffered changes to the connection.
    ///
    /// Deferred mode registers the entry with the in-flight transaction;
    /// immediate mode flushes the buffer to the directory now.
    pub fn modify_entry(&mut self, entry: &Entry) -> Result<()> {
        if self.entry_mode().defers_writes() {
            self.register(entry)
        } else {
            let mods = entry.take_pending();
            if mods.is_empty() {
                return Ok(());
            }
            self.modify_now(entry.dn(), &mods)
        }
    }

    /// Deletes an entry.
    ///
    /// Deferred mode marks it deleted and stages the DN; an entry that was
    /// created within the same transaction is instead dropped from the
    /// staged adds so neither the add nor a delete ever reaches the wire.
    /// Immediate mode deletes from the directory now.
    pub fn delete_entry(&mut self, entry: &Entry) -> Result<()> {
        let dn = entry.dn().to_string();
        if self.entry_mode().defers_writes() {
            entry.mark_deleted();
            if entry.is_new() && self.runtime.staged_add.contains_key(&dn) {
                self.unregister_add(&dn);
            } else {
                self.register_delete(&dn);
            }
            Ok(())
        } else {
            self.delete_now(&dn)
        }
    }

    // ========================================================================
    // Wire operations, gated on the commit window
    // ========================================================================

    /// Sends an add to the directory. Only valid while a commit is in
    /// progress; otherwise fails with
    /// [`ConnectionError::NotInTransaction`] without touching the adapter.
    pub fn add_now(&mut self, dn: &str, attributes: &Attributes) -> Result<()> {
        if !self.runtime.committing {
            return Err(ConnectionError::NotInTransaction);
        }
        self.directory()?.add(dn, attributes)?;
        Ok(())
    }

    /// Sends a modification list to the directory. Gated like
    /// [`Connection::add_now`].
    pub fn modify_now(&mut self, dn: &str, mods: &[ModOp]) -> Result<()> {
        if !self.runtime.committing {
            return Err(ConnectionError::NotInTransaction);
        }
        self.directory()?.modify(dn, mods)?;
        Ok(())
    }

    /// Sends a delete to the directory. Gated like
    /// [`Connection::add_now`].
    pub fn delete_now(&mut self, dn: &str) -> Result<()> {
        if !self.runtime.committing {
            return Err(ConnectionError::NotInTransaction);
        }
        self.directory()?.delete(dn)?;
        Ok(())
    }

    // ========================================================================
    // Staged-work registries
    // ========================================================================

    pub(crate) fn register_add(&mut self, entry: &Entry) {
        self.runtime
            .staged_add
            .entry(entry.dn().to_string())
            .or_insert_with(|| entry.clone());
    }

    pub(crate) fn unregister_add(&mut self, dn: &str) {
        self.runtime.staged_add.remove(dn);
    }

    pub(crate) fn register_delete(&mut self, dn: &str) {
        if !self.runtime.is_staged_for_delete(dn) {
            self.runtime.staged_delete.push(dn.to_string());
        }
    }

    pub(crate) fn unregister_delete(&mut self, dn: &str) {
        self.runtime.staged_delete.retain(|d| d != dn);
        self.unregister_add(dn);
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use ltx_directory::{MemoryServer, Op};

    use super::*;
    use crate::runtime::STALENESS_WINDOW;

    const BASE: &str = "dc=example,dc=org";
    const PEOPLE: &str = "ou=people,dc=example,dc=org";

    fn attrs(pairs: &[(&str, &str)]) -> Attributes {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), vec![(*v).to_string()]))
            .collect()
    }

    fn seeded_server() -> MemoryServer {
        let server = MemoryServer::new();
        server.insert(BASE, attrs(&[("dc", "example")]));
        server.insert(PEOPLE, attrs(&[("ou", "people")]));
        server
    }

    fn connection(server: &MemoryServer) -> Connection {
        let config = ConnectionConfig::builder()
            .id("people")
            .host("dir.example.org")
            .port(636)
            .bind_dn("cn=admin,dc=example,dc=org")
            .bind_password("secret")
            .base_dn(BASE)
            .build()
            .unwrap();
        Connection::new(config, Box::new(server.connector())).unwrap()
    }

    #[test]
    fn opens_lazily_on_first_read() {
        let server = seeded_server();
        let mut conn = connection(&server);
        assert!(!conn.is_open());
        assert!(conn.has_entry(PEOPLE).unwrap());
        assert!(conn.is_open());
        assert_eq!(server.connects(), vec![Transport::Ldaps]);
    }

    #[test]
    fn stale_handle_reads_closed_and_reopens_once() {
        let server = seeded_server();
        let mut conn = connection(&server);
        conn.has_entry(PEOPLE).unwrap();
        assert_eq!(server.connects().len(), 1);

        let Some(stale) = Instant::now().checked_sub(STALENESS_WINDOW + Duration::from_secs(1))
        else {
            return;
        };
        conn.runtime.opened_at = Some(stale);
        assert!(!conn.is_open());

        conn.has_entry(PEOPLE).unwrap();
        assert_eq!(server.connects().len(), 2);
        assert!(conn.is_open());
    }

    #[test]
    fn closed_connection_refuses_to_dial() {
        let server = seeded_server();
        let mut conn = connection(&server);
        let mut edit = conn.config().edit();
        edit.open_on_startup = false;
        conn.apply_edit(edit).unwrap();

        let err = conn.has_entry(PEOPLE).unwrap_err();
        assert!(matches!(err, ConnectionError::NotOpen));
        assert!(server.connects().is_empty());
    }

    #[test]
    fn falls_back_to_cleartext_when_encrypted_refused() {
        let server = seeded_server();
        server.refuse_ldaps(true);
        let mut conn = connection(&server);
        assert_eq!(conn.open().unwrap(), OpenStatus::Opened);
        assert_eq!(server.connects(), vec![Transport::Ldaps, Transport::Ldap]);
    }

    #[test]
    fn unknown_bind_dn_is_a_soft_failure() {
        let server = seeded_server();
        server.set_credentials("cn=admin,dc=example,dc=org", "secret");
        let mut conn = connection(&server);
        {
            let mut edit = conn.config().edit();
            edit.bind_dn = "cn=typo,dc=example,dc=org".to_string();
            conn.apply_edit(edit).unwrap();
        }

        let status = conn.open().unwrap();
        assert!(matches!(
            status,
            OpenStatus::CredentialsRejected { ref bind_dn } if bind_dn.contains("typo")
        ));
        assert!(!conn.is_open());
    }

    #[test]
    fn wrong_password_is_a_hard_failure() {
        let server = seeded_server();
        server.set_credentials("cn=admin,dc=example,dc=org", "secret");
        let mut conn = connection(&server);
        {
            let mut edit = conn.config().edit();
            edit.bind_password = "wrong".to_string();
            conn.apply_edit(edit).unwrap();
        }
        assert!(conn.open().is_err());
    }

    #[test]
    fn ping_failure_force_closes() {
        let server = seeded_server();
        let mut conn = connection(&server);
        assert!(conn.ping());
        server.set_offline(true);
        assert!(!conn.ping());
        assert!(conn.runtime.handle.is_none());
    }

    #[test]
    fn write_gate_rejects_outside_commit_window() {
        let server = seeded_server();
        let mut conn = connection(&server);
        let err = conn
            .modify_now(PEOPLE, &[ModOp::Delete("ou".to_string())])
            .unwrap_err();
        assert!(matches!(err, ConnectionError::NotInTransaction));
        assert!(server.ops().is_empty());
    }

    #[test]
    fn immediate_mode_holds_the_gate_open() {
        let server = seeded_server();
        let mut conn = connection(&server);
        conn.set_transactional(false);

        let entry = conn.entry(PEOPLE).unwrap();
        assert_eq!(entry.mode(), EntryMode::Immediate);
        entry.set_attribute("description", vec!["unit".to_string()]);
        conn.modify_entry(&entry).unwrap();

        assert!(server
            .ops()
            .iter()
            .any(|op| matches!(op, Op::Modify { dn, .. } if dn == PEOPLE)));
    }

    #[test]
    fn edit_of_host_closes_the_live_handle() {
        let server = seeded_server();
        let mut conn = connection(&server);
        conn.has_entry(PEOPLE).unwrap();
        assert!(conn.is_open());

        let mut edit = conn.config().edit();
        edit.host = "other.example.org".to_string();
        conn.apply_edit(edit).unwrap();
        assert!(!conn.is_open());
        assert_eq!(conn.config().host, "other.example.org");
    }

    #[test]
    fn toggling_transactional_refreshes_the_entry_mode() {
        let server = seeded_server();
        let mut conn = connection(&server);
        assert_eq!(conn.entry_mode(), EntryMode::Deferred);
        conn.set_transactional(false);
        assert_eq!(conn.entry_mode(), EntryMode::Immediate);
        assert!(conn.runtime.committing);
        conn.set_transactional(true);
        assert_eq!(conn.entry_mode(), EntryMode::Deferred);
        assert!(!conn.runtime.committing);
    }

    #[test]
    fn root_returns_the_base_entry() {
        let server = seeded_server();
        let mut conn = connection(&server);
        let root = conn.root().unwrap();
        assert_eq!(root.dn(), BASE);
        assert_eq!(root.first_value("dc").as_deref(), Some("example"));
    }

    #[test]
    fn raw_entry_maps_lookup_failures_to_not_found() {
        let server = seeded_server();
        let mut conn = connection(&server);
        let err = conn.raw_entry("cn=ghost,dc=example,dc=org").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn can_browse_requires_both_flags() {
        let server = seeded_server();
        let mut conn = connection(&server);
        assert!(!conn.can_browse());
        let mut edit = conn.config().edit();
        edit.browsable = true;
        conn.apply_edit(edit).unwrap();
        assert!(conn.can_browse());
    }
}
