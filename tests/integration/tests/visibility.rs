//! Staged-work visibility: reads must reflect staged adds and deletes
//! before anything reaches the directory.

use ltx_connection::Participant;

use crate::common::{attrs, TestEnv, ANN, BASE, PEOPLE};

#[test]
fn staged_delete_hides_the_entry_from_every_read() {
    let mut env = TestEnv::new();
    env.conn.begin().unwrap();

    let ann = env.conn.entry(ANN).unwrap();
    env.conn.delete_entry(&ann).unwrap();

    assert!(!env.conn.has_entry(ANN).unwrap());
    assert!(env.conn.raw_entry(ANN).unwrap_err().is_not_found());
    let siblings = env.conn.sub_entries(PEOPLE).unwrap();
    assert!(siblings.iter().all(|e| e.dn() != ANN));

    // The directory itself has not been touched.
    assert!(env.server.contains(ANN));
    assert_eq!(env.wire_writes(), (0, 0, 0));
}

#[test]
fn staged_add_is_served_from_the_map() {
    let mut env = TestEnv::new();
    env.conn.begin().unwrap();

    let dn = "cn=new,ou=people,dc=example,dc=org";
    let created = env.conn.create_entry(dn, attrs(&[("cn", "new")])).unwrap();

    assert!(env.conn.has_entry(dn).unwrap());
    let raw = env.conn.raw_entry(dn).unwrap();
    assert_eq!(raw.get_attr("cn"), Some("new"));

    // The entry handed back for the staged DN is the live staged object,
    // not a copy built from a directory search.
    let fetched = env.conn.entry(dn).unwrap();
    fetched.set_attribute("mail", vec!["new@example.org".to_string()]);
    assert_eq!(
        created.first_value("mail").as_deref(),
        Some("new@example.org")
    );

    // Nothing was written.
    assert!(!env.server.contains(dn));
    assert_eq!(env.wire_writes(), (0, 0, 0));
}

#[test]
fn sub_entries_of_a_staged_deleted_base_are_gone() {
    let mut env = TestEnv::new();
    env.conn.begin().unwrap();

    let people = env.conn.entry(PEOPLE).unwrap();
    env.conn.delete_entry(&people).unwrap();

    assert!(env.conn.sub_entries(PEOPLE).unwrap_err().is_not_found());
}

#[test]
fn listing_the_base_excludes_staged_deletes_only() {
    let mut env = TestEnv::new();
    env.conn.begin().unwrap();

    let before = env.conn.sub_entries(BASE).unwrap();
    assert_eq!(before.len(), 1);
    assert_eq!(before[0].dn(), PEOPLE);

    let people = env.conn.entry(PEOPLE).unwrap();
    env.conn.delete_entry(&people).unwrap();
    let after = env.conn.sub_entries(BASE).unwrap();
    assert!(after.is_empty());
}
