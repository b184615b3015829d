//! Two-phase-commit scenarios driven the way an external coordinator
//! would drive them.

use ltx_directory::Op;

use ltx_connection::Participant;

use crate::common::{attrs, TestEnv, ANN, PEOPLE};

#[test]
fn buffered_modify_commits_as_exactly_one_wire_call() {
    let mut env = TestEnv::new();
    env.conn.begin().unwrap();

    let people = env.conn.entry(PEOPLE).unwrap();
    people.set_attribute("description", vec!["People branch".to_string()]);
    env.conn.register(&people).unwrap();
    env.conn.vote().unwrap();

    env.server.clear_ops();
    env.conn.finish();

    assert_eq!(env.wire_writes(), (0, 1, 0));
    assert!(env
        .server
        .ops()
        .iter()
        .any(|op| matches!(op, Op::Modify { dn, mods } if dn == PEOPLE && *mods == 1)));
    assert_eq!(
        env.server
            .attributes(PEOPLE)
            .unwrap()
            .get("description")
            .and_then(|v| v.first())
            .map(String::as_str),
        Some("People branch")
    );
    assert!(!people.is_registered());
}

#[test]
fn create_then_delete_in_one_transaction_stays_off_the_wire() {
    let mut env = TestEnv::new();
    env.conn.begin().unwrap();

    let dn = "cn=fleeting,ou=people,dc=example,dc=org";
    let entry = env.conn.create_entry(dn, attrs(&[("cn", "fleeting")])).unwrap();
    env.conn.delete_entry(&entry).unwrap();
    env.conn.register(&entry).unwrap();
    env.conn.vote().unwrap();

    env.server.clear_ops();
    env.conn.finish();

    assert_eq!(env.wire_writes(), (0, 0, 0));
    assert!(!env.server.contains(dn));
    assert!(!env.conn.has_entry(dn).unwrap());
}

#[test]
fn commit_applies_creates_and_deletes_together() {
    let mut env = TestEnv::new();
    env.conn.begin().unwrap();

    let ann = env.conn.entry(ANN).unwrap();
    env.conn.delete_entry(&ann).unwrap();
    env.conn.register(&ann).unwrap();

    let dn = "cn=bob,ou=people,dc=example,dc=org";
    let bob = env.conn.create_entry(dn, attrs(&[("cn", "bob")])).unwrap();
    env.conn.register(&bob).unwrap();

    env.conn.vote().unwrap();
    env.server.clear_ops();
    env.conn.finish();

    assert_eq!(env.wire_writes(), (1, 0, 1));
    assert!(!env.server.contains(ANN));
    assert!(env.server.contains(dn));
    assert!(!bob.is_new());
    assert!(env.conn.has_entry(dn).unwrap());
}

#[test]
fn abort_restores_pre_transaction_reads() {
    let mut env = TestEnv::new();
    env.conn.begin().unwrap();

    let dn = "cn=draft,ou=people,dc=example,dc=org";
    let draft = env.conn.create_entry(dn, attrs(&[("cn", "draft")])).unwrap();
    env.conn.register(&draft).unwrap();

    let ann = env.conn.entry(ANN).unwrap();
    ann.set_attribute("mail", vec!["changed@example.org".to_string()]);
    env.conn.delete_entry(&ann).unwrap();
    env.conn.register(&ann).unwrap();

    assert!(env.conn.has_entry(dn).unwrap());
    assert!(!env.conn.has_entry(ANN).unwrap());

    env.conn.abort();

    assert!(!env.conn.has_entry(dn).unwrap());
    assert!(env.conn.has_entry(ANN).unwrap());
    assert!(!ann.is_deleted());
    assert_eq!(
        ann.first_value("mail").as_deref(),
        Some("ann@example.org"),
        "buffered change must be rolled back"
    );
    assert_eq!(env.wire_writes(), (0, 0, 0));
}

#[test]
fn finish_and_abort_tolerate_an_empty_transaction() {
    let mut env = TestEnv::new();
    env.conn.begin().unwrap();
    env.conn.vote().unwrap();
    env.conn.finish();

    env.conn.begin().unwrap();
    env.conn.abort();

    assert_eq!(env.wire_writes(), (0, 0, 0));
}

#[test]
fn a_second_transaction_starts_clean() {
    let mut env = TestEnv::new();
    env.conn.begin().unwrap();

    let ann = env.conn.entry(ANN).unwrap();
    env.conn.delete_entry(&ann).unwrap();
    // No register, no finish: the staged delete would linger.

    env.conn.begin().unwrap();
    assert!(
        env.conn.has_entry(ANN).unwrap(),
        "begin must reset transaction-scoped registries"
    );
}
