//! Grant storage tests: exact-scope lookups, upsert semantics, membership

mod common;

use std::sync::Arc;
use std::thread;

use common::*;
use viewgate::*;

// ============================================================================
// Put / Get / Remove
// ============================================================================

#[test]
fn put_then_get_at_exact_scope() {
    let f = setup();
    let grants = f.engine.grants();
    let alice = Subject::user("alice");

    grants.put(&alice, &Scope::database(DB), AccessLevel::ReadOnly).unwrap();

    assert_eq!(grants.get(&alice, &Scope::database(DB)).unwrap(), Some(AccessLevel::ReadOnly));
}

/// A second grant at the same scope replaces the first, in either direction
#[test]
fn put_replaces_existing_grant() {
    let f = setup();
    let grants = f.engine.grants();
    let alice = Subject::user("alice");
    let scope = Scope::collection(DB, COL1);

    grants.put(&alice, &scope, AccessLevel::ReadWrite).unwrap();
    grants.put(&alice, &scope, AccessLevel::None).unwrap();
    assert_eq!(grants.get(&alice, &scope).unwrap(), Some(AccessLevel::None));

    grants.put(&alice, &scope, AccessLevel::ReadOnly).unwrap();
    assert_eq!(grants.get(&alice, &scope).unwrap(), Some(AccessLevel::ReadOnly));
    assert_eq!(grants.list_for_subject(&alice).unwrap().len(), 1);
}

/// The store never falls back to a parent scope
#[test]
fn get_has_no_implicit_fallback() {
    let f = setup();
    let grants = f.engine.grants();
    let alice = Subject::user("alice");

    grants.put(&alice, &Scope::database(DB), AccessLevel::ReadWrite).unwrap();

    assert_eq!(grants.get(&alice, &Scope::collection(DB, COL1)).unwrap(), None);
    assert_eq!(grants.get(&alice, &Scope::System).unwrap(), None);
}

#[test]
fn user_and_role_of_same_name_are_distinct() {
    let f = setup();
    let grants = f.engine.grants();

    grants.put(&Subject::user("ops"), &Scope::database(DB), AccessLevel::ReadWrite).unwrap();

    assert_eq!(grants.get(&Subject::role("ops"), &Scope::database(DB)).unwrap(), None);
}

#[test]
fn remove_deletes_only_that_scope() {
    let f = setup();
    let grants = f.engine.grants();
    let alice = Subject::user("alice");

    grants.put(&alice, &Scope::database(DB), AccessLevel::ReadWrite).unwrap();
    grants.put(&alice, &Scope::collection(DB, COL1), AccessLevel::ReadOnly).unwrap();

    assert!(grants.remove(&alice, &Scope::collection(DB, COL1)).unwrap());
    assert!(!grants.remove(&alice, &Scope::collection(DB, COL1)).unwrap());
    assert_eq!(grants.get(&alice, &Scope::collection(DB, COL1)).unwrap(), None);
    assert_eq!(grants.get(&alice, &Scope::database(DB)).unwrap(), Some(AccessLevel::ReadWrite));
}

// ============================================================================
// Listing
// ============================================================================

#[test]
fn list_for_subject_and_scope() {
    let f = setup();
    let grants = f.engine.grants();
    let alice = Subject::user("alice");
    let readers = Subject::role("readers");

    grants.put(&alice, &Scope::database(DB), AccessLevel::ReadWrite).unwrap();
    grants.put(&alice, &Scope::collection(DB, COL1), AccessLevel::None).unwrap();
    grants.put(&readers, &Scope::database(DB), AccessLevel::ReadOnly).unwrap();

    let mine = grants.list_for_subject(&alice).unwrap();
    assert_eq!(mine.len(), 2);
    assert!(mine.contains(&(Scope::collection(DB, COL1), AccessLevel::None)));
    assert!(mine.contains(&(Scope::database(DB), AccessLevel::ReadWrite)));

    let holders = grants.list_for_scope(&Scope::database(DB)).unwrap();
    assert_eq!(holders.len(), 2);
    assert!(holders.contains(&(readers, AccessLevel::ReadOnly)));
    assert!(holders.contains(&(alice, AccessLevel::ReadWrite)));
}

#[test]
fn purge_scope_removes_every_holder() {
    let f = setup();
    let grants = f.engine.grants();
    let scope = Scope::collection(DB, COL1);

    grants.put(&Subject::user("alice"), &scope, AccessLevel::ReadWrite).unwrap();
    grants.put(&Subject::role("readers"), &scope, AccessLevel::ReadOnly).unwrap();
    grants.put(&Subject::user("alice"), &Scope::database(DB), AccessLevel::ReadOnly).unwrap();

    assert_eq!(grants.purge_scope(&scope).unwrap(), 2);
    assert!(grants.list_for_scope(&scope).unwrap().is_empty());
    assert_eq!(grants.list_for_subject(&Subject::user("alice")).unwrap().len(), 1);
}

// ============================================================================
// Role membership
// ============================================================================

#[test]
fn role_membership_round_trip() {
    let f = setup();
    let grants = f.engine.grants();

    grants.add_member("alice", "readers").unwrap();
    grants.add_member("alice", "writers").unwrap();
    grants.add_member("bob", "readers").unwrap();

    assert_eq!(grants.roles_of("alice").unwrap(), vec!["readers", "writers"]);
    let mut members = grants.members_of("readers").unwrap();
    members.sort();
    assert_eq!(members, vec!["alice", "bob"]);

    assert!(grants.remove_member("alice", "readers").unwrap());
    assert_eq!(grants.roles_of("alice").unwrap(), vec!["writers"]);
}

/// A user whose name is a prefix of another's does not see their roles
#[test]
fn roles_of_does_not_match_name_prefixes() {
    let f = setup();
    let grants = f.engine.grants();

    grants.add_member("alicia", "writers").unwrap();

    assert!(grants.roles_of("alice").unwrap().is_empty());
}

// ============================================================================
// Input validation
// ============================================================================

#[test]
fn reserved_characters_rejected() {
    let f = setup();
    let grants = f.engine.grants();

    let bad = [
        (Subject::user(""), Scope::database(DB)),
        (Subject::user("a/b"), Scope::database(DB)),
        (Subject::user("alice"), Scope::database("x:y")),
        (Subject::user("alice"), Scope::collection(DB, "c/d")),
        (Subject::role("r\n"), Scope::System),
    ];
    for (subject, scope) in bad {
        assert!(
            matches!(grants.put(&subject, &scope, AccessLevel::ReadWrite), Err(Error::Invalid(_))),
            "{:?} at {:?} should be rejected",
            subject,
            scope
        );
    }
    assert!(matches!(grants.add_member("alice", "a:b"), Err(Error::Invalid(_))));
}

#[test]
fn overlong_name_rejected() {
    let f = setup();
    let name = "x".repeat(viewgate::constants::MAX_NAME_LEN + 1);
    let r = f.engine.grants().put(&Subject::user(name), &Scope::System, AccessLevel::ReadOnly);
    assert!(matches!(r, Err(Error::Invalid(_))));
}

#[test]
fn access_level_names() {
    assert_eq!(AccessLevel::parse("rw").unwrap(), AccessLevel::ReadWrite);
    assert_eq!(AccessLevel::parse("ro").unwrap(), AccessLevel::ReadOnly);
    assert_eq!(AccessLevel::parse("none").unwrap(), AccessLevel::None);
    assert!(AccessLevel::parse("admin").is_err());
    assert!(AccessLevel::None < AccessLevel::ReadOnly && AccessLevel::ReadOnly < AccessLevel::ReadWrite);
}

// ============================================================================
// Concurrency
// ============================================================================

/// Readers racing an upserting writer only ever see one of the written levels
#[test]
fn concurrent_upserts_are_never_torn() {
    let f = setup();
    let grants = Arc::new(f.engine.grants());
    let alice = Subject::user("alice");
    let scope = Scope::collection(DB, COL1);
    grants.put(&alice, &scope, AccessLevel::ReadOnly).unwrap();

    let writer = {
        let grants = Arc::clone(&grants);
        let (alice, scope) = (alice.clone(), scope.clone());
        thread::spawn(move || {
            for i in 0..200 {
                let level = if i % 2 == 0 { AccessLevel::ReadWrite } else { AccessLevel::ReadOnly };
                grants.put(&alice, &scope, level).unwrap();
            }
        })
    };
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let grants = Arc::clone(&grants);
            let (alice, scope) = (alice.clone(), scope.clone());
            thread::spawn(move || {
                for _ in 0..200 {
                    let got = grants.get(&alice, &scope).unwrap();
                    assert!(matches!(got, Some(AccessLevel::ReadOnly) | Some(AccessLevel::ReadWrite)));
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for r in readers {
        r.join().unwrap();
    }
}
