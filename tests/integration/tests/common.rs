//! Common test fixtures.

use ltx_connection::{Connection, ConnectionConfig};
use ltx_directory::{Attributes, MemoryServer, Op};

/// Base DN of the seeded tree.
pub const BASE: &str = "dc=example,dc=org";
/// An organizational unit under the base.
pub const PEOPLE: &str = "ou=people,dc=example,dc=org";
/// A person under the organizational unit.
pub const ANN: &str = "cn=ann,ou=people,dc=example,dc=org";

/// Builds an attribute map from string pairs.
pub fn attrs(pairs: &[(&str, &str)]) -> Attributes {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), vec![(*v).to_string()]))
        .collect()
}

/// Test environment: a seeded in-memory server and a connection onto it.
pub struct TestEnv {
    /// The directory server.
    pub server: MemoryServer,
    /// The connection under test.
    pub conn: Connection,
}

impl TestEnv {
    /// Creates a seeded environment with a transactional connection.
    pub fn new() -> Self {
        // Initialize tracing for tests
        let _ = tracing_subscriber::fmt()
            .with_env_filter("ltx_connection=debug,ltx_directory=debug")
            .try_init();

        let server = MemoryServer::new();
        server.insert(BASE, attrs(&[("dc", "example")]));
        server.insert(PEOPLE, attrs(&[("ou", "people")]));
        server.insert(ANN, attrs(&[("cn", "ann"), ("mail", "ann@example.org")]));

        let config = ConnectionConfig::builder()
            .id("people")
            .host("dir.example.org")
            .port(636)
            .bind_dn("cn=admin,dc=example,dc=org")
            .bind_password("secret")
            .base_dn(BASE)
            .build()
            .expect("valid config");
        let conn =
            Connection::new(config, Box::new(server.connector())).expect("valid connection");

        Self { server, conn }
    }

    /// Counts the write operations the server has seen: (adds, modifies,
    /// deletes).
    pub fn wire_writes(&self) -> (usize, usize, usize) {
        let mut adds = 0;
        let mut mods = 0;
        let mut dels = 0;
        for op in self.server.ops() {
            match op {
                Op::Add { .. } => adds += 1,
                Op::Modify { .. } => mods += 1,
                Op::Delete { .. } => dels += 1,
                _ => {}
            }
        }
        (adds, mods, dels)
    }
}
