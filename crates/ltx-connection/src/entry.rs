//! Directory entries as handed to the application.
//!
//! An [`Entry`] is a shared handle: the application, the staged-add map,
//! and the in-flight transaction's ok-list may all hold the same entry at
//! once, so the state lives behind a mutex. Mutations never touch the
//! directory; they update the entry's working view and buffer the
//! corresponding wire modifications until the connection flushes them
//! inside a commit window.

use std::sync::Arc;

use ltx_directory::{Attributes, ModOp};
use parking_lot::Mutex;

/// Write behavior stamped into every entry at construction.
///
/// Selection is cached per connection and recomputed eagerly whenever the
/// transactional flag is toggled, so entries built after a toggle carry
/// the policy in effect at toggle time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryMode {
    /// Writes are staged and require an enclosing transaction to commit.
    Deferred,
    /// Writes go to the directory as soon as they are handed to the
    /// connection.
    Immediate,
}

impl EntryMode {
    /// Selects the mode for a connection's transactional flag.
    #[must_use]
    pub const fn for_transactional(transactional: bool) -> Self {
        if transactional {
            Self::Deferred
        } else {
            Self::Immediate
        }
    }

    /// True when writes must wait for a commit window.
    #[must_use]
    pub const fn defers_writes(&self) -> bool {
        matches!(self, Self::Deferred)
    }
}

#[derive(Debug)]
struct EntryState {
    attributes: Attributes,
    /// Pristine copy taken before the first buffered change; restored by
    /// rollback.
    saved: Option<Attributes>,
    pending: Vec<ModOp>,
    is_new: bool,
    is_deleted: bool,
    registered: bool,
}

/// One directory entry.
#[derive(Debug, Clone)]
pub struct Entry {
    dn: Arc<str>,
    mode: EntryMode,
    connection_id: Arc<str>,
    state: Arc<Mutex<EntryState>>,
}

impl Entry {
    pub(crate) fn existing(
        dn: impl Into<String>,
        attributes: Attributes,
        mode: EntryMode,
        connection_id: &str,
    ) -> Self {
        let dn: String = dn.into();
        Self {
            dn: dn.into(),
            mode,
            connection_id: connection_id.into(),
            state: Arc::new(Mutex::new(EntryState {
                attributes,
                saved: None,
                pending: Vec::new(),
                is_new: false,
                is_deleted: false,
                registered: false,
            })),
        }
    }

    pub(crate) fn created(
        dn: impl Into<String>,
        attributes: Attributes,
        mode: EntryMode,
        connection_id: &str,
    ) -> Self {
        let entry = Self::existing(dn, attributes, mode, connection_id);
        entry.state.lock().is_new = true;
        entry
    }

    /// Returns the distinguished name.
    #[must_use]
    pub fn dn(&self) -> &str {
        &self.dn
    }

    /// Returns the write mode stamped at construction.
    #[must_use]
    pub const fn mode(&self) -> EntryMode {
        self.mode
    }

    /// Identifier of the connection this entry belongs to.
    #[must_use]
    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    /// Returns a copy of the entry's current attribute view, buffered
    /// changes included.
    #[must_use]
    pub fn attributes(&self) -> Attributes {
        self.state.lock().attributes.clone()
    }

    /// Returns all values of one attribute.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<Vec<String>> {
        self.state.lock().attributes.get(name).cloned()
    }

    /// Returns the first value of one attribute.
    #[must_use]
    pub fn first_value(&self, name: &str) -> Option<String> {
        self.state
            .lock()
            .attributes
            .get(name)
            .and_then(|v| v.first())
            .cloned()
    }

    /// Replaces every value of an attribute, buffering the change.
    pub fn set_attribute(&self, name: impl Into<String>, values: Vec<String>) {
        let name = name.into();
        let mut state = self.state.lock();
        snapshot(&mut state);
        state.attributes.insert(name.clone(), values.clone());
        state.pending.push(ModOp::Replace(name, values));
    }

    /// Appends values to an attribute, buffering the change.
    pub fn add_values(&self, name: impl Into<String>, values: Vec<String>) {
        let name = name.into();
        let mut state = self.state.lock();
        snapshot(&mut state);
        state
            .attributes
            .entry(name.clone())
            .or_default()
            .extend(values.iter().cloned());
        state.pending.push(ModOp::Add(name, values));
    }

    /// Removes an attribute entirely, buffering the change.
    pub fn remove_attribute(&self, name: impl Into<String>) {
        let name = name.into();
        let mut state = self.state.lock();
        snapshot(&mut state);
        state.attributes.remove(&name);
        state.pending.push(ModOp::Delete(name));
    }

    /// Discards every buffered change and restores the attribute view to
    /// its state before the first mutation.
    pub fn rollback(&self) {
        let mut state = self.state.lock();
        if let Some(saved) = state.saved.take() {
            state.attributes = saved;
        }
        state.pending.clear();
    }

    /// Clears the deleted flag.
    pub fn undelete(&self) {
        self.state.lock().is_deleted = false;
    }

    /// True when the entry was created through the connection and has not
    /// been written to the directory yet.
    #[must_use]
    pub fn is_new(&self) -> bool {
        self.state.lock().is_new
    }

    /// True when the entry is marked for deletion.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.state.lock().is_deleted
    }

    /// True while the entry is registered with an in-flight transaction.
    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.state.lock().registered
    }

    /// True when the entry carries buffered changes.
    #[must_use]
    pub fn has_pending_changes(&self) -> bool {
        !self.state.lock().pending.is_empty()
    }

    /// Drains the buffered modification list. The current view becomes the
    /// new rollback baseline.
    pub(crate) fn take_pending(&self) -> Vec<ModOp> {
        let mut state = self.state.lock();
        state.saved = None;
        std::mem::take(&mut state.pending)
    }

    pub(crate) fn mark_deleted(&self) {
        self.state.lock().is_deleted = true;
    }

    pub(crate) fn clear_new(&self) {
        self.state.lock().is_new = false;
    }

    pub(crate) fn set_registered(&self, registered: bool) {
        self.state.lock().registered = registered;
    }
}

fn snapshot(state: &mut EntryState) {
    if state.saved.is_none() {
        state.saved = Some(state.attributes.clone());
    }
}
