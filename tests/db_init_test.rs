//! Database initialization: on-disk creation, idempotent reopen, and
//! schema versioning.

mod helpers;

use memoria::db;

#[test]
fn creates_and_reopens_an_on_disk_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("memoria.db");

    {
        let conn = db::open_database(&path).unwrap();
        conn.execute(
            "INSERT INTO users (email, name, created_at) VALUES ('a@b.c', NULL, '2026-01-01')",
            [],
        )
        .unwrap();
    }

    // reopening must not lose data or fail re-running DDL and migrations
    let conn = db::open_database(&path).unwrap();
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn all_tables_exist() {
    let conn = helpers::test_db();
    for table in ["users", "people", "projects", "decisions", "conversations", "chunks"] {
        let found: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE name = ?1",
                [table],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(found, 1, "missing table {table}");
    }
    // the vec0 virtual table is queryable
    let rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM chunks_vec", [], |r| r.get(0))
        .unwrap();
    assert_eq!(rows, 0);
}

#[test]
fn schema_version_is_current_and_model_is_pinned() {
    let conn = helpers::test_db();
    assert_eq!(
        db::migrations::schema_version(&conn).unwrap(),
        db::migrations::CURRENT_SCHEMA_VERSION
    );
    assert_eq!(
        db::migrations::embedding_model_pin(&conn).unwrap().as_deref(),
        Some("text-embedding-3-small")
    );
}
