//! Process-local connection state.
//!
//! Nothing in here survives a restart: the runtime is rebuilt empty when
//! the [`Connection`](crate::Connection) is constructed, and the staged
//! registries are transaction-scoped.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use ltx_directory::Directory;

use crate::entry::Entry;

/// Age beyond which a live handle is treated as closed and reopened on
/// the next access.
pub const STALENESS_WINDOW: Duration = Duration::from_secs(300);

pub(crate) struct ConnectionRuntime {
    /// Live adapter handle, if any.
    pub handle: Option<Box<dyn Directory>>,

    /// When the handle was last opened. Present iff `handle` is present.
    pub opened_at: Option<Instant>,

    /// True while wire writes are permitted. In transactional mode this
    /// only holds during a commit; in immediate mode it holds always.
    pub committing: bool,

    /// Entries created but not yet written, keyed by DN. Reads are served
    /// from here, bypassing the directory.
    pub staged_add: HashMap<String, Entry>,

    /// DNs marked for deletion; hidden from every read until the commit
    /// sends the deletes.
    pub staged_delete: Vec<String>,

    /// Entries accepted into the in-flight transaction.
    pub ok_list: Vec<Entry>,
}

impl ConnectionRuntime {
    pub fn new(committing: bool) -> Self {
        Self {
            handle: None,
            opened_at: None,
            committing,
            staged_add: HashMap::new(),
            staged_delete: Vec::new(),
            ok_list: Vec::new(),
        }
    }

    /// True when the handle was opened within the staleness window.
    pub fn handle_is_fresh(&self) -> bool {
        matches!(self.opened_at, Some(t) if t.elapsed() < STALENESS_WINDOW)
    }

    pub fn is_staged_for_delete(&self, dn: &str) -> bool {
        self.staged_delete.iter().any(|d| d == dn)
    }
}
