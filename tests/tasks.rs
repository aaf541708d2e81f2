//! Deferred tasks: admission, identity capture, completion handshake

mod common;

use std::time::Duration;

use common::*;
use viewgate::*;

const KS: &str = "UnitTestsKeySpace";

fn keyspace(f: &Fixture) -> &KeySpaces {
    let ks = f.engine.keyspaces();
    ks.create(KS, viewgate::constants::DEFAULT_KEYSPACE_CAPACITY);
    ks
}

fn wait(f: &Fixture, key: &CompletionKey) -> Completion {
    await_completion(f.engine.keyspaces(), key, &f.engine.poll())
}

// ============================================================================
// Admission
// ============================================================================

#[test]
fn rename_task_completes_with_success() {
    let f = setup();
    f.seed_collections();
    let created = f.seed_view();
    keyspace(&f);
    f.grant_db("alice", AccessLevel::ReadWrite);
    let scheduler = Scheduler::start(f.engine.clone()).unwrap();
    let key = CompletionKey::new(KS, "renamed");

    let handle = scheduler
        .register(
            &user("alice"),
            "rename",
            DB,
            Command::RenameView {
                view: VIEW1.into(),
                new_name: VIEW2.into(),
            },
            key.clone(),
        )
        .unwrap();

    assert!(handle.id.starts_with("task-"));
    assert_eq!(handle.name, "rename");
    assert_eq!(wait(&f, &key), Completion::Finished { success: true });
    assert!(f.engine.catalog().view(DB, VIEW1).unwrap().is_none());
    assert_eq!(f.engine.catalog().view(DB, VIEW2).unwrap().unwrap().id, created.id);
}

#[test]
fn registration_needs_database_rw() {
    let f = setup();
    f.seed_collections();
    f.seed_view();
    keyspace(&f);
    f.grant_db("alice", AccessLevel::ReadOnly);
    let scheduler = Scheduler::start(f.engine.clone()).unwrap();
    let key = CompletionKey::new(KS, "never");

    let r = scheduler.register(
        &user("alice"),
        "rename",
        DB,
        Command::RenameView {
            view: VIEW1.into(),
            new_name: VIEW2.into(),
        },
        key.clone(),
    );

    assert_eq!(r.unwrap_err(), Error::Forbidden);
    drop(scheduler);
    assert_eq!(f.engine.keyspaces().get(KS, &key.key), None);
    assert!(f.engine.catalog().view(DB, VIEW1).unwrap().is_some());
}

#[test]
fn registration_in_missing_database_is_not_found() {
    let f = setup();
    let scheduler = Scheduler::start(f.engine.clone()).unwrap();

    let r = scheduler.register(
        &root(),
        "drop",
        "nowhere",
        Command::DropView { view: VIEW1.into() },
        CompletionKey::new(KS, "k"),
    );

    assert!(matches!(r, Err(Error::NotFound(_))));
}

// ============================================================================
// Identity capture
// ============================================================================

/// The worker runs as the registering user, not with any ambient authority
#[test]
fn task_runs_as_registering_identity() {
    let f = setup();
    f.seed_collections();
    f.seed_view();
    keyspace(&f);
    f.grant_db("alice", AccessLevel::ReadWrite);
    f.grant_col("alice", COL1, AccessLevel::ReadOnly);
    let before = f.props(VIEW1);
    let scheduler = Scheduler::start(f.engine.clone()).unwrap();
    let key = CompletionKey::new(KS, "replaced");

    scheduler
        .register(
            &user("alice"),
            "replace",
            DB,
            Command::UpdateProperties {
                view: VIEW1.into(),
                patch: PropertiesPatch::default(),
                partial: false,
            },
            key.clone(),
        )
        .unwrap();

    assert_eq!(wait(&f, &key), Completion::Finished { success: false });
    assert_eq!(f.props(VIEW1), before);
}

#[test]
fn link_task_succeeds_with_collection_rw() {
    let f = setup();
    f.seed_collections();
    f.seed_view();
    keyspace(&f);
    f.grant_db("alice", AccessLevel::ReadWrite);
    f.grant_col("alice", COL2, AccessLevel::ReadWrite);
    let scheduler = Scheduler::start(f.engine.clone()).unwrap();
    let key = CompletionKey::new(KS, "linked");

    scheduler
        .register(
            &user("alice"),
            "link",
            DB,
            Command::UpdateProperties {
                view: VIEW1.into(),
                patch: PropertiesPatch::default().with_link(COL2, LinkFields::default().include_all_fields(true)),
                partial: true,
            },
            key.clone(),
        )
        .unwrap();

    assert_eq!(wait(&f, &key), Completion::Finished { success: true });
    let props = f.props(VIEW1);
    assert!(props.links[COL2].include_all_fields);
    assert!(props.links.contains_key(COL1));
}

// ============================================================================
// Completion handshake
// ============================================================================

#[test]
fn missing_flag_times_out() {
    let f = setup();
    keyspace(&f);
    let poll = PollConfig {
        retries: 3,
        interval: Duration::from_millis(1),
    };

    let outcome = await_completion(f.engine.keyspaces(), &CompletionKey::new(KS, "absent"), &poll);

    assert_eq!(outcome, Completion::TimedOut);
}

/// Status is written before the completion flag
#[test]
fn status_is_visible_once_flag_is_set() {
    let f = setup();
    f.seed_collections();
    f.seed_view();
    keyspace(&f);
    let scheduler = Scheduler::start(f.engine.clone()).unwrap();
    let key = CompletionKey::new(KS, "dropped");

    scheduler
        .register(&root(), "drop", DB, Command::DropView { view: VIEW1.into() }, key.clone())
        .unwrap();
    assert_eq!(wait(&f, &key), Completion::Finished { success: true });

    let ks = f.engine.keyspaces();
    assert_eq!(ks.get(KS, &key.status_key()), Some(serde_json::Value::Bool(true)));
    assert_eq!(key.status_key(), "dropped_status");
}

/// A full key space cannot take the status, so the outcome stays unknown
#[test]
fn unrecorded_status_leaves_completion_unset() {
    let f = setup();
    f.seed_collections();
    f.seed_view();
    f.grant_db("alice", AccessLevel::ReadWrite);
    let ks = f.engine.keyspaces();
    ks.create("single", 1);
    ks.set("single", "alice", false).unwrap();
    let key = CompletionKey::new("single", "alice");
    let scheduler = Scheduler::start(f.engine.clone()).unwrap();

    scheduler
        .register(
            &user("alice"),
            "rename",
            DB,
            Command::RenameView {
                view: VIEW1.into(),
                new_name: VIEW2.into(),
            },
            key.clone(),
        )
        .unwrap();
    drop(scheduler);

    let poll = PollConfig {
        retries: 3,
        interval: Duration::from_millis(1),
    };
    assert_eq!(await_completion(ks, &key, &poll), Completion::TimedOut);
    assert_eq!(ks.get("single", "alice"), Some(serde_json::Value::Bool(false)));
    assert!(f.engine.catalog().view(DB, VIEW2).unwrap().is_some());
}

#[test]
fn dropping_scheduler_drains_queue() {
    let f = setup();
    f.seed_collections();
    keyspace(&f);
    let scheduler = Scheduler::start(f.engine.clone()).unwrap();
    let views = ["v1", "v2", "v3"];
    for v in views {
        viewgate::protected::create_view(&f.engine, &root(), DB, v, ViewType::Search, &PropertiesPatch::default())
            .unwrap();
        scheduler
            .register(&root(), "drop", DB, Command::DropView { view: v.into() }, CompletionKey::new(KS, v))
            .unwrap();
    }

    drop(scheduler);

    for v in views {
        assert!(f.engine.keyspaces().flag(KS, v));
        assert!(f.engine.catalog().view(DB, v).unwrap().is_none());
    }
}

#[test]
fn failed_task_without_keyspace_still_finishes_worker() {
    let f = setup();
    let scheduler = Scheduler::start(f.engine.clone()).unwrap();

    scheduler
        .register(
            &root(),
            "drop",
            DB,
            Command::DropView { view: "ghost".into() },
            CompletionKey::new("missing", "k"),
        )
        .unwrap();
    drop(scheduler);

    assert!(!f.engine.keyspaces().exists("missing"));
}

// ============================================================================
// Key spaces
// ============================================================================

#[test]
fn keyspace_set_get_and_flag() {
    let ks = KeySpaces::new();
    assert!(ks.create("ns", 2));
    assert!(!ks.create("ns", 2));

    ks.set("ns", "done", true).unwrap();
    ks.set("ns", "note", "true").unwrap();

    assert!(ks.flag("ns", "done"));
    assert!(!ks.flag("ns", "note"));
    assert!(!ks.flag("ns", "absent"));
    assert!(matches!(ks.set("other", "k", 1), Err(Error::NotFound(_))));
}

#[test]
fn keyspace_capacity_counts_distinct_keys() {
    let ks = KeySpaces::new();
    ks.create("ns", 1);

    ks.set("ns", "a", 1).unwrap();
    ks.set("ns", "a", 2).unwrap();

    assert!(matches!(ks.set("ns", "b", 3), Err(Error::Conflict(_))));
    assert!(ks.destroy("ns"));
    assert!(!ks.exists("ns"));
}
