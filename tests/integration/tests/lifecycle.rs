//! Connection lifecycle: transport fallback, soft bind failures, and
//! immediate-mode write-through.

use ltx_connection::{Connection, ConnectionConfig, OpenStatus};
use ltx_directory::Transport;

use crate::common::{attrs, TestEnv, ANN, BASE, PEOPLE};

#[test]
fn encrypted_refusal_falls_back_exactly_once() {
    let env = TestEnv::new();
    env.server.refuse_ldaps(true);
    let mut conn = env.conn;

    assert_eq!(conn.open().unwrap(), OpenStatus::Opened);
    assert_eq!(env.server.connects(), vec![Transport::Ldaps, Transport::Ldap]);
    assert!(conn.is_open());
}

#[test]
fn unknown_bind_dn_reports_credentials_not_a_fault() {
    let env = TestEnv::new();
    env.server
        .set_credentials("cn=admin,dc=example,dc=org", "secret");

    let config = ConnectionConfig::builder()
        .id("people")
        .host("dir.example.org")
        .port(636)
        .bind_dn("cn=amdin,dc=example,dc=org") // typo on purpose
        .bind_password("secret")
        .base_dn(BASE)
        .build()
        .unwrap();
    let mut conn = Connection::new(config, Box::new(env.server.connector())).unwrap();

    let status = conn.open().unwrap();
    assert!(matches!(status, OpenStatus::CredentialsRejected { .. }));
    assert!(!conn.is_open());
}

#[test]
fn explicit_close_is_transparent_to_the_next_read() {
    let mut env = TestEnv::new();
    assert!(env.conn.has_entry(PEOPLE).unwrap());
    env.conn.close();
    assert!(!env.conn.is_open());

    assert!(env.conn.has_entry(PEOPLE).unwrap());
    assert_eq!(env.server.connects().len(), 2);
}

#[test]
fn immediate_mode_writes_through_on_every_operation() {
    let mut env = TestEnv::new();
    env.conn.set_transactional(false);

    let dn = "cn=carol,ou=people,dc=example,dc=org";
    let carol = env.conn.create_entry(dn, attrs(&[("cn", "carol")])).unwrap();
    assert!(env.server.contains(dn));
    assert!(!carol.is_new());

    carol.set_attribute("mail", vec!["carol@example.org".to_string()]);
    env.conn.modify_entry(&carol).unwrap();
    assert_eq!(
        env.server
            .attributes(dn)
            .unwrap()
            .get("mail")
            .and_then(|v| v.first())
            .map(String::as_str),
        Some("carol@example.org")
    );

    env.conn.delete_entry(&carol).unwrap();
    assert!(!env.server.contains(dn));

    assert_eq!(env.wire_writes(), (1, 1, 1));
}

#[test]
fn browse_listing_walks_the_tree() {
    let mut env = TestEnv::new();
    let root = env.conn.root().unwrap();
    assert_eq!(root.dn(), BASE);

    let units = env.conn.sub_entries(root.dn()).unwrap();
    assert_eq!(units.len(), 1);
    let people = env.conn.sub_entries(units[0].dn()).unwrap();
    assert_eq!(people.len(), 1);
    assert_eq!(people[0].dn(), ANN);
}
