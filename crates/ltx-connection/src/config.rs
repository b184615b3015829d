//! Connection configuration.
//!
//! The configuration is the only state that survives a restart; everything
//! the runtime tracks (handles, timestamps, staged work) is rebuilt empty.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConnectionError, Result};

/// Default LDAP port used when a host is given without one.
pub const DEFAULT_PORT: u16 = 389;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Persisted settings of one logical directory connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Identifier of this connection; also stamped into entries it hands
    /// out as their non-owning back-reference.
    pub id: String,

    /// Human-readable title.
    #[serde(default)]
    pub title: String,

    /// Directory server host.
    pub host: String,

    /// Directory server port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bind DN for the service account.
    #[serde(default)]
    pub bind_dn: String,

    /// Bind password.
    #[serde(default, skip_serializing)]
    pub bind_password: String,

    /// Base DN of the subtree this connection works in.
    pub base_dn: String,

    /// Whether the connection is permitted to open. When false, every
    /// operation that would dial out fails instead of reopening.
    #[serde(default = "default_true")]
    pub open_on_startup: bool,

    /// Whether the connection's tree may be browsed.
    #[serde(default)]
    pub browsable: bool,

    /// Whether mutations are deferred until an enclosing transaction
    /// commits. When false, writes go to the directory immediately.
    #[serde(default = "default_true")]
    pub transactional: bool,

    /// TCP/TLS connect timeout handed to the protocol client.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: Duration,
}

const fn default_port() -> u16 {
    DEFAULT_PORT
}

const fn default_true() -> bool {
    true
}

const fn default_connect_timeout() -> Duration {
    DEFAULT_CONNECT_TIMEOUT
}

impl ConnectionConfig {
    /// Creates a new configuration builder.
    #[must_use]
    pub fn builder() -> ConnectionConfigBuilder {
        ConnectionConfigBuilder::new()
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(ConnectionError::config("id cannot be empty"));
        }
        if self.host.is_empty() {
            return Err(ConnectionError::config("host cannot be empty"));
        }
        if self.port == 0 {
            return Err(ConnectionError::config("port cannot be zero"));
        }
        if self.base_dn.is_empty() {
            return Err(ConnectionError::config("base_dn cannot be empty"));
        }
        Ok(())
    }

    /// Seeds an edit with the current values.
    #[must_use]
    pub fn edit(&self) -> ConnectionEdit {
        ConnectionEdit {
            title: self.title.clone(),
            host: self.host.clone(),
            port: self.port,
            bind_dn: self.bind_dn.clone(),
            bind_password: self.bind_password.clone(),
            base_dn: self.base_dn.clone(),
            open_on_startup: self.open_on_startup,
            browsable: self.browsable,
            transactional: self.transactional,
        }
    }
}

/// A full replacement set of editable connection settings.
///
/// Applied through [`Connection::apply_edit`](crate::Connection::apply_edit),
/// which force-closes the live handle when host, port, or bind identity
/// change so the next access reopens with the new parameters.
#[derive(Debug, Clone)]
pub struct ConnectionEdit {
    /// New title.
    pub title: String,
    /// New host.
    pub host: String,
    /// New port.
    pub port: u16,
    /// New bind DN.
    pub bind_dn: String,
    /// New bind password.
    pub bind_password: String,
    /// New base DN.
    pub base_dn: String,
    /// New open flag.
    pub open_on_startup: bool,
    /// New browsable flag.
    pub browsable: bool,
    /// New transactional flag.
    pub transactional: bool,
}

/// Splits a combined `host[:port]` string, defaulting the port to 389.
pub fn split_host_port(hostport: &str) -> Result<(String, u16)> {
    let mut parts = hostport.splitn(2, ':');
    let host = parts.next().unwrap_or_default();
    if host.is_empty() {
        return Err(ConnectionError::config("host cannot be empty"));
    }
    let port = match parts.next() {
        Some(port) => port
            .parse::<u16>()
            .map_err(|_| ConnectionError::config(format!("invalid port `{port}'")))?,
        None => DEFAULT_PORT,
    };
    Ok((host.to_string(), port))
}

// ============================================================================
// Configuration Builder
// ============================================================================

/// Builder for [`ConnectionConfig`].
#[derive(Debug, Default)]
pub struct ConnectionConfigBuilder {
    id: Option<String>,
    title: String,
    host: Option<String>,
    port: u16,
    bind_dn: String,
    bind_password: String,
    base_dn: Option<String>,
    open_on_startup: bool,
    browsable: bool,
    transactional: bool,
    connect_timeout: Duration,
}

impl ConnectionConfigBuilder {
    /// Creates a new builder with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            port: DEFAULT_PORT,
            open_on_startup: true,
            transactional: true,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            ..Default::default()
        }
    }

    /// Sets the connection identifier.
    #[must_use]
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets the title.
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Sets the host.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Sets the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets host and port from a combined `host[:port]` string.
    pub fn host_port(mut self, hostport: &str) -> Result<Self> {
        let (host, port) = split_host_port(hostport)?;
        self.host = Some(host);
        self.port = port;
        Ok(self)
    }

    /// Sets the bind DN.
    #[must_use]
    pub fn bind_dn(mut self, dn: impl Into<String>) -> Self {
        self.bind_dn = dn.into();
        self
    }

    /// Sets the bind password.
    #[must_use]
    pub fn bind_password(mut self, password: impl Into<String>) -> Self {
        self.bind_password = password.into();
        self
    }

    /// Sets the base DN.
    #[must_use]
    pub fn base_dn(mut self, dn: impl Into<String>) -> Self {
        self.base_dn = Some(dn.into());
        self
    }

    /// Sets whether the connection is permitted to open.
    #[must_use]
    pub const fn open_on_startup(mut self, open: bool) -> Self {
        self.open_on_startup = open;
        self
    }

    /// Sets the browsable flag.
    #[must_use]
    pub const fn browsable(mut self, browsable: bool) -> Self {
        self.browsable = browsable;
        self
    }

    /// Sets the transactional flag.
    #[must_use]
    pub const fn transactional(mut self, transactional: bool) -> Self {
        self.transactional = transactional;
        self
    }

    /// Sets the connect timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Builds and validates the configuration.
    pub fn build(self) -> Result<ConnectionConfig> {
        let config = ConnectionConfig {
            id: self
                .id
                .ok_or_else(|| ConnectionError::config("id is required"))?,
            title: self.title,
            host: self
                .host
                .ok_or_else(|| ConnectionError::config("host is required"))?,
            port: self.port,
            bind_dn: self.bind_dn,
            bind_password: self.bind_password,
            base_dn: self
                .base_dn
                .ok_or_else(|| ConnectionError::config("base_dn is required"))?,
            open_on_startup: self.open_on_startup,
            browsable: self.browsable,
            transactional: self.transactional,
            connect_timeout: self.connect_timeout,
        };
        config.validate()?;
        Ok(config)
    }
}
