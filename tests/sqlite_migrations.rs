//! End-to-end migration tests against a real SQLite database file.
//!
//! These drive the public surface the CLI uses: `engine::connect`, the
//! executors, and the snapshot path.

use std::fs;
use std::path::PathBuf;

use caravan::engine;
use caravan::migrations::{create_migration, migrate_down, migrate_up};
use caravan::snapshot::write_snapshot;
use caravan::CaravanError;
use tempfile::TempDir;

struct Fixture {
    // Held so the directory outlives the test body.
    _tmp: TempDir,
    dir: PathBuf,
    dsn: String,
}

fn fixture() -> Fixture {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("migrations");
    fs::create_dir(&dir).unwrap();
    let dsn = tmp
        .path()
        .join("test.db")
        .to_str()
        .unwrap()
        .to_string();
    Fixture {
        _tmp: tmp,
        dir,
        dsn,
    }
}

fn write_pair(fx: &Fixture, name: &str, up_sql: &str, down_sql: &str) {
    fs::write(fx.dir.join(format!("{name}_up.sql")), up_sql).unwrap();
    fs::write(fx.dir.join(format!("{name}_down.sql")), down_sql).unwrap();
}

#[tokio::test]
async fn applying_twice_is_idempotent() {
    let fx = fixture();
    write_pair(
        &fx,
        "20240101000000_users",
        "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL);",
        "DROP TABLE users;",
    );
    write_pair(
        &fx,
        "20240102000000_posts",
        "CREATE TABLE posts (id INTEGER PRIMARY KEY, user_id INTEGER REFERENCES users(id));",
        "DROP TABLE posts;",
    );

    let mut engine = engine::connect(&fx.dsn).await.unwrap();
    assert_eq!(migrate_up(engine.as_ref(), &fx.dir).await.unwrap(), 2);
    let after_first = engine.applied_list().await.unwrap();

    assert_eq!(migrate_up(engine.as_ref(), &fx.dir).await.unwrap(), 0);
    assert_eq!(engine.applied_list().await.unwrap(), after_first);

    engine.close().await.unwrap();
}

#[tokio::test]
async fn pending_order_is_lexicographic_not_discovery_order() {
    let fx = fixture();
    // Written out of timestamp order on purpose.
    write_pair(
        &fx,
        "20240103000000_b",
        "CREATE TABLE b (id INTEGER);",
        "DROP TABLE b;",
    );
    write_pair(
        &fx,
        "20240101000000_a",
        "CREATE TABLE a (id INTEGER);",
        "DROP TABLE a;",
    );
    write_pair(
        &fx,
        "20240102000000_c",
        "CREATE TABLE c (id INTEGER);",
        "DROP TABLE c;",
    );

    let mut engine = engine::connect(&fx.dsn).await.unwrap();
    migrate_up(engine.as_ref(), &fx.dir).await.unwrap();

    assert_eq!(
        engine.applied_list().await.unwrap(),
        vec![
            "20240101000000_a".to_string(),
            "20240102000000_c".to_string(),
            "20240103000000_b".to_string(),
        ]
    );
    engine.close().await.unwrap();
}

#[tokio::test]
async fn rollback_then_reapply_round_trips() {
    let fx = fixture();
    write_pair(
        &fx,
        "20240101000000_users",
        "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL);",
        "DROP TABLE users;",
    );
    write_pair(
        &fx,
        "20240102000000_posts",
        "CREATE TABLE posts (id INTEGER PRIMARY KEY);",
        "DROP TABLE posts;",
    );
    write_pair(
        &fx,
        "20240103000000_tags",
        "CREATE TABLE tags (id INTEGER PRIMARY KEY);",
        "DROP TABLE tags;",
    );

    let mut engine = engine::connect(&fx.dsn).await.unwrap();
    migrate_up(engine.as_ref(), &fx.dir).await.unwrap();
    let before_ids = engine.applied_list().await.unwrap();
    let before_dump = engine.dump_schema().await.unwrap();

    assert_eq!(migrate_down(engine.as_ref(), &fx.dir, 2).await.unwrap(), 2);
    assert_eq!(
        engine.applied_list().await.unwrap(),
        vec!["20240101000000_users".to_string()]
    );

    migrate_up(engine.as_ref(), &fx.dir).await.unwrap();
    assert_eq!(engine.applied_list().await.unwrap(), before_ids);

    // Re-running the up files reproduces the same table state. Ledger
    // sequence ids move on after a rollback, so compare the DDL portion.
    let after_dump = engine.dump_schema().await.unwrap();
    let ddl = |dump: &str| dump.split("INSERT INTO").next().unwrap().to_string();
    assert_eq!(ddl(&before_dump), ddl(&after_dump));

    engine.close().await.unwrap();
}

#[tokio::test]
async fn rollback_more_than_applied_rolls_back_everything() {
    let fx = fixture();
    write_pair(
        &fx,
        "20240101000000_a",
        "CREATE TABLE a (id INTEGER);",
        "DROP TABLE a;",
    );
    write_pair(
        &fx,
        "20240102000000_b",
        "CREATE TABLE b (id INTEGER);",
        "DROP TABLE b;",
    );

    let mut engine = engine::connect(&fx.dsn).await.unwrap();
    migrate_up(engine.as_ref(), &fx.dir).await.unwrap();

    assert_eq!(
        migrate_down(engine.as_ref(), &fx.dir, 10).await.unwrap(),
        2
    );
    assert!(engine.applied_list().await.unwrap().is_empty());
    engine.close().await.unwrap();
}

#[tokio::test]
async fn failed_migration_leaves_no_ledger_row_but_keeps_prior_commits() {
    let fx = fixture();
    write_pair(
        &fx,
        "20240101000000_good",
        "CREATE TABLE widgets (id INTEGER PRIMARY KEY);",
        "DROP TABLE widgets;",
    );
    write_pair(
        &fx,
        "20240102000000_bad",
        "CREATE TABLE broken (id INTEGER PRIMARY KEY);\nINSERT INTO missing_table VALUES (1);",
        "DROP TABLE broken;",
    );

    let mut engine = engine::connect(&fx.dsn).await.unwrap();
    let err = migrate_up(engine.as_ref(), &fx.dir).await.unwrap_err();
    match err {
        CaravanError::Execution { migration, .. } => {
            assert_eq!(migration, "20240102000000_bad");
        }
        other => panic!("expected execution error, got {other:?}"),
    }

    // The good migration's transaction already committed independently.
    assert_eq!(
        engine.applied_list().await.unwrap(),
        vec!["20240101000000_good".to_string()]
    );

    // The failed batch rolled back wholesale: no half-created table either.
    let dump = engine.dump_schema().await.unwrap();
    assert!(dump.contains("CREATE TABLE widgets"));
    assert!(!dump.contains("broken"));

    engine.close().await.unwrap();
}

#[tokio::test]
async fn consecutive_snapshots_are_byte_identical() {
    let fx = fixture();
    write_pair(
        &fx,
        "20240101000000_users",
        "CREATE TABLE users (id INTEGER PRIMARY KEY, email TEXT UNIQUE);",
        "DROP TABLE users;",
    );

    let mut engine = engine::connect(&fx.dsn).await.unwrap();
    migrate_up(engine.as_ref(), &fx.dir).await.unwrap();

    let first = engine.dump_schema().await.unwrap();
    let second = engine.dump_schema().await.unwrap();
    assert_eq!(first, second);

    // The snapshot file is the dump text, verbatim.
    let target = fx.dir.join("schema.sql");
    write_snapshot(engine.as_ref(), &target).await.unwrap();
    assert_eq!(fs::read_to_string(&target).unwrap(), first);

    engine.close().await.unwrap();
}

#[tokio::test]
async fn sqlite_snapshot_replays_stored_ddl_and_reseeds_the_ledger() {
    let fx = fixture();
    write_pair(
        &fx,
        "20240101000000_users",
        "CREATE TABLE users (id INTEGER PRIMARY KEY);",
        "DROP TABLE users;",
    );

    let mut engine = engine::connect(&fx.dsn).await.unwrap();
    migrate_up(engine.as_ref(), &fx.dir).await.unwrap();

    let dump = engine.dump_schema().await.unwrap();
    assert!(dump.starts_with("-- This file has been automatically generated"));
    assert!(dump.contains("PRAGMA foreign_keys = OFF;"));
    assert!(dump.contains("CREATE TABLE users (id INTEGER PRIMARY KEY);"));
    assert!(dump.contains("PRAGMA foreign_keys = ON;"));
    assert!(dump.contains(
        "INSERT INTO _caravan_migrations (sequence_id, migration_id) VALUES\n\t(1, '20240101000000_users');"
    ));

    engine.close().await.unwrap();
}

#[tokio::test]
async fn empty_migrations_directory_applies_cleanly() {
    let fx = fixture();
    let mut engine = engine::connect(&fx.dsn).await.unwrap();
    assert_eq!(migrate_up(engine.as_ref(), &fx.dir).await.unwrap(), 0);
    assert!(engine.applied_list().await.unwrap().is_empty());
    engine.close().await.unwrap();
}

#[tokio::test]
async fn missing_down_file_fails_without_touching_the_ledger() {
    let fx = fixture();
    write_pair(
        &fx,
        "20240101000000_users",
        "CREATE TABLE users (id INTEGER PRIMARY KEY);",
        "DROP TABLE users;",
    );

    let mut engine = engine::connect(&fx.dsn).await.unwrap();
    migrate_up(engine.as_ref(), &fx.dir).await.unwrap();

    fs::remove_file(fx.dir.join("20240101000000_users_down.sql")).unwrap();
    let err = migrate_down(engine.as_ref(), &fx.dir, 1).await.unwrap_err();
    assert!(matches!(err, CaravanError::Execution { .. }));
    assert_eq!(
        engine.applied_list().await.unwrap(),
        vec!["20240101000000_users".to_string()]
    );

    engine.close().await.unwrap();
}

#[tokio::test]
async fn connect_is_idempotent_about_the_ledger() {
    let fx = fixture();
    let mut first = engine::connect(&fx.dsn).await.unwrap();
    first.close().await.unwrap();

    // Reconnecting must not recreate or alter an existing ledger.
    let mut second = engine::connect(&fx.dsn).await.unwrap();
    assert!(second.applied_list().await.unwrap().is_empty());
    second.close().await.unwrap();
}

#[tokio::test]
async fn closing_twice_is_an_error() {
    let fx = fixture();
    let mut engine = engine::connect(&fx.dsn).await.unwrap();
    engine.close().await.unwrap();
    assert!(matches!(
        engine.close().await.unwrap_err(),
        CaravanError::Closed
    ));
    assert!(matches!(
        engine.applied_set().await.unwrap_err(),
        CaravanError::Closed
    ));
}

#[tokio::test]
async fn created_stubs_apply_out_of_the_box() {
    let fx = fixture();
    // Stubs are comment-only; applying them should still record the pair.
    let (up, _down) = create_migration(&fx.dir, "add_users").unwrap();

    let mut engine = engine::connect(&fx.dsn).await.unwrap();
    migrate_up(engine.as_ref(), &fx.dir).await.unwrap();

    let applied = engine.applied_list().await.unwrap();
    assert_eq!(applied.len(), 1);
    assert_eq!(
        applied[0],
        caravan::migrations::migration_id(&up).unwrap()
    );
    engine.close().await.unwrap();
}
