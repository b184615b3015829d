//! The two-phase-commit participant contract.
//!
//! An external coordinator drives a [`Connection`] through
//! `begin → {register}* → vote → finish` on success, or
//! `begin → {register}* → abort` on failure. Once `finish` or `abort` has
//! been invoked the transaction is past the point of no return, so neither
//! may fail outright: every per-entry failure inside them is logged and
//! discarded.

use crate::connection::Connection;
use crate::entry::Entry;
use crate::error::{ConnectionError, Result};

/// The participant side of a two-phase commit.
pub trait Participant {
    /// Opens a transaction. Fails when the connection does not pass its
    /// liveness probe; a transaction must not start against a dead
    /// connection. Resets the transaction-scoped registries.
    fn begin(&mut self) -> Result<()>;

    /// Offers an entry to the in-flight transaction.
    ///
    /// The entry is accepted when it is flagged new or deleted, or when
    /// its DN exists (a staged add counts). Entries with no committable
    /// state are silently left out; they will be neither committed nor
    /// rolled back.
    fn register(&mut self, entry: &Entry) -> Result<()>;

    /// Votes on the transaction. A single-participant coordinator shape:
    /// always yes.
    fn vote(&mut self) -> Result<()>;

    /// Applies the transaction: staged deletes first, then every accepted
    /// entry. Must not fail; per-entry failures are logged and discarded.
    fn finish(&mut self);

    /// Rolls the transaction back. Must not fail.
    fn abort(&mut self);

    /// Rolls a single entry back out of the transaction: unstages its
    /// deletion (and any staged add under the same DN), restores the
    /// deleted flag and buffered changes, and clears its registration.
    fn abort_entry(&mut self, entry: &Entry);
}

impl Participant for Connection {
    fn begin(&mut self) -> Result<()> {
        if !self.ping() {
            return Err(ConnectionError::unavailable(
                "liveness probe failed before transaction start",
            ));
        }
        self.runtime.ok_list.clear();
        self.runtime.staged_add.clear();
        self.runtime.staged_delete.clear();
        Ok(())
    }

    fn register(&mut self, entry: &Entry) -> Result<()> {
        let accepted = entry.is_new() || entry.is_deleted() || self.has_entry(entry.dn())?;
        if accepted {
            entry.set_registered(true);
            self.runtime.ok_list.push(entry.clone());
        } else {
            tracing::debug!(
                dn = %entry.dn(),
                "entry has no committable state, leaving it out of the transaction"
            );
        }
        Ok(())
    }

    fn vote(&mut self) -> Result<()> {
        Ok(())
    }

    fn finish(&mut self) {
        self.runtime.committing = true;

        let deletes = std::mem::take(&mut self.runtime.staged_delete);
        for dn in deletes {
            if let Err(e) = self.delete_now(&dn) {
                tracing::warn!(%dn, error = %e, "discarding failed delete during commit");
            }
        }

        let accepted = std::mem::take(&mut self.runtime.ok_list);
        for entry in accepted {
            if let Err(e) = commit_entry(self, &entry) {
                tracing::warn!(dn = %entry.dn(), error = %e, "discarding failed entry commit");
            }
        }

        self.runtime.staged_add.clear();
        self.runtime.committing = !self.config().transactional;
        self.invalidate_cache_best_effort();
    }

    fn abort(&mut self) {
        let accepted = std::mem::take(&mut self.runtime.ok_list);
        for entry in accepted {
            self.abort_entry(&entry);
        }
        self.runtime.staged_add.clear();
        self.runtime.staged_delete.clear();
        self.invalidate_cache_best_effort();
    }

    fn abort_entry(&mut self, entry: &Entry) {
        let dn = entry.dn().to_string();
        self.unregister_delete(&dn);
        if entry.is_deleted() {
            entry.undelete();
        }
        entry.rollback();
        entry.set_registered(false);
        if entry.is_new() {
            self.unregister_add(&dn);
        }
        self.invalidate_cache_best_effort();
    }
}

/// Applies one accepted entry during `finish`.
///
/// Deleted entries are skipped; the mass delete pass already handled their
/// DNs. New entries are added and leave the staged-add map; existing
/// entries flush their buffered modifications, skipping the wire call when
/// the buffer is empty.
fn commit_entry(conn: &mut Connection, entry: &Entry) -> Result<()> {
    if entry.is_deleted() {
        // Already covered by the staged-delete pass.
    } else if entry.is_new() {
        let dn = entry.dn().to_string();
        conn.add_now(&dn, &entry.attributes())?;
        entry.clear_new();
        conn.unregister_add(&dn);
    } else {
        let mods = entry.take_pending();
        if !mods.is_empty() {
            conn.modify_now(entry.dn(), &mods)?;
        }
    }
    entry.set_registered(false);
    Ok(())
}
