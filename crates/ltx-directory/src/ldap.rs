//! `ldap3`-backed directory client.
//!
//! Uses the synchronous `LdapConn` facade; the connection manager's
//! participant contract is blocking end to end, so the async driver is not
//! exposed here.

use std::collections::HashSet;
use std::time::Duration;

use ldap3::exop::{WhoAmI, WhoAmIResp};
use ldap3::{LdapConn, LdapConnSettings, Mod, Scope, SearchEntry};

use crate::client::{Connect, Directory};
use crate::error::{DirectoryError, DirectoryResult};
use crate::types::{Attributes, ModOp, RawEntry, Transport};

/// Connector dialing real LDAP servers via `ldap3`.
#[derive(Debug, Clone)]
pub struct LdapConnector {
    /// TCP/TLS connect timeout handed to the protocol client.
    pub connect_timeout: Duration,
}

impl Default for LdapConnector {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
        }
    }
}

impl Connect for LdapConnector {
    fn connect(
        &self,
        transport: Transport,
        host: &str,
        port: u16,
    ) -> DirectoryResult<Box<dyn Directory>> {
        let url = transport.url(host, port);
        let settings = LdapConnSettings::new().set_conn_timeout(self.connect_timeout);
        let conn =
            LdapConn::with_settings(settings, &url).map_err(DirectoryError::from_ldap)?;
        tracing::debug!(%url, "directory connection established");
        Ok(Box::new(LdapDirectory { conn }))
    }
}

/// A live `ldap3` connection.
pub struct LdapDirectory {
    conn: LdapConn,
}

impl LdapDirectory {
    fn search(
        &mut self,
        dn: &str,
        scope: Scope,
        filter: &str,
    ) -> DirectoryResult<Vec<RawEntry>> {
        let (rs, _res) = self
            .conn
            .search(dn, scope, filter, vec!["*"])
            .map_err(DirectoryError::from_ldap)?
            .success()
            .map_err(DirectoryError::from_ldap)?;

        Ok(rs
            .into_iter()
            .map(SearchEntry::construct)
            .map(|e| RawEntry::new(e.dn, e.attrs))
            .collect())
    }
}

impl Directory for LdapDirectory {
    fn simple_bind(&mut self, dn: &str, password: &str) -> DirectoryResult<()> {
        self.conn
            .simple_bind(dn, password)
            .map_err(DirectoryError::from_ldap)?
            .success()
            .map_err(DirectoryError::from_ldap)?;
        Ok(())
    }

    fn who_am_i(&mut self) -> DirectoryResult<String> {
        let (exop, _res) = self
            .conn
            .extended(WhoAmI)
            .map_err(DirectoryError::from_ldap)?
            .success()
            .map_err(DirectoryError::from_ldap)?;
        let resp = exop.parse::<WhoAmIResp>();
        Ok(resp.authzid)
    }

    fn unbind(&mut self) -> DirectoryResult<()> {
        self.conn.unbind().map_err(DirectoryError::from_ldap)
    }

    fn search_base(&mut self, dn: &str, filter: &str) -> DirectoryResult<Vec<RawEntry>> {
        self.search(dn, Scope::Base, filter)
    }

    fn search_one_level(&mut self, dn: &str, filter: &str) -> DirectoryResult<Vec<RawEntry>> {
        self.search(dn, Scope::OneLevel, filter)
    }

    fn add(&mut self, dn: &str, attributes: &Attributes) -> DirectoryResult<()> {
        let attrs: Vec<(String, HashSet<String>)> = attributes
            .iter()
            .map(|(name, values)| (name.clone(), values.iter().cloned().collect()))
            .collect();
        self.conn
            .add(dn, attrs)
            .map_err(DirectoryError::from_ldap)?
            .success()
            .map_err(DirectoryError::from_ldap)?;
        Ok(())
    }

    fn modify(&mut self, dn: &str, mods: &[ModOp]) -> DirectoryResult<()> {
        let mods: Vec<Mod<String>> = mods.iter().map(to_ldap_mod).collect();
        self.conn
            .modify(dn, mods)
            .map_err(DirectoryError::from_ldap)?
            .success()
            .map_err(DirectoryError::from_ldap)?;
        Ok(())
    }

    fn delete(&mut self, dn: &str) -> DirectoryResult<()> {
        self.conn
            .delete(dn)
            .map_err(DirectoryError::from_ldap)?
            .success()
            .map_err(DirectoryError::from_ldap)?;
        Ok(())
    }

    fn invalidate_cache(&mut self) {
        // ldap3 keeps no client-side result cache; nothing to drop.
    }
}

fn to_ldap_mod(op: &ModOp) -> Mod<String> {
    match op {
        ModOp::Add(name, values) => Mod::Add(name.clone(), values.iter().cloned().collect()),
        ModOp::Replace(name, values) => {
            Mod::Replace(name.clone(), values.iter().cloned().collect())
        }
        ModOp::Delete(name) => Mod::Delete(name.clone(), HashSet::new()),
    }
}
