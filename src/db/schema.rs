//! SQL DDL for all memoria tables.
//!
//! Defines the `users`, `people`, `projects`, `decisions`, `conversations`,
//! `chunks`, `chunks_vec` (vec0), and `schema_meta` tables. All DDL uses
//! `IF NOT EXISTS` for idempotent initialization. Every entity table is
//! foreign-keyed to `users` — tenant scoping rides on that column plus a
//! `user_id` filter on every query.

use rusqlite::Connection;

use crate::semantic::EMBEDDING_DIM;

/// All schema DDL statements for memoria's core tables.
const SCHEMA_SQL: &str = r#"
-- Tenant identities
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    email TEXT NOT NULL UNIQUE,
    name TEXT,
    created_at TEXT NOT NULL
);

-- People the user knows (the user themselves is the row with is_self = 1)
CREATE TABLE IF NOT EXISTS people (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    notes TEXT NOT NULL DEFAULT '[]',
    info TEXT NOT NULL DEFAULT '{}',
    is_self INTEGER NOT NULL DEFAULT 0,
    last_mentioned TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_people_user ON people(user_id);
-- At most one self profile per user
CREATE UNIQUE INDEX IF NOT EXISTS idx_people_one_self ON people(user_id) WHERE is_self = 1;

-- Projects and tasks
CREATE TABLE IF NOT EXISTS projects (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'idea',
    description TEXT,
    info TEXT NOT NULL DEFAULT '{}',
    last_updated TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_projects_user ON projects(user_id);
CREATE INDEX IF NOT EXISTS idx_projects_status ON projects(user_id, status);

-- Recorded decisions
CREATE TABLE IF NOT EXISTS decisions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    text TEXT NOT NULL,
    info TEXT NOT NULL DEFAULT '{}',
    date TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_decisions_user ON decisions(user_id);

-- Conversation ledger: append-only, thread-scoped
CREATE TABLE IF NOT EXISTS conversations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    thread_id TEXT NOT NULL,
    sender TEXT NOT NULL CHECK(sender IN ('user','ai')),
    message TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_conversations_thread ON conversations(user_id, thread_id);

-- Semantic memory chunks
CREATE TABLE IF NOT EXISTS chunks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    source TEXT NOT NULL,
    content TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chunks_user_source ON chunks(user_id, source);

-- Schema metadata
CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Initialize all schema tables. Idempotent (uses IF NOT EXISTS).
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    // vec0 virtual table must be created separately (sqlite-vec syntax).
    // user_id is a partition key so KNN queries can never cross tenants;
    // source is a filterable metadata column.
    conn.execute_batch(&format!(
        "CREATE VIRTUAL TABLE IF NOT EXISTS chunks_vec USING vec0(
            chunk_id INTEGER PRIMARY KEY,
            embedding FLOAT[{EMBEDDING_DIM}],
            user_id INTEGER PARTITION KEY,
            source TEXT
        );"
    ))?;

    // Set initial schema version if not already present
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', '1')",
        [],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_creates_all_tables() {
        crate::db::load_sqlite_vec();
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        // Verify all tables exist
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        for expected in [
            "users",
            "people",
            "projects",
            "decisions",
            "conversations",
            "chunks",
            "schema_meta",
        ] {
            assert!(tables.contains(&expected.to_string()), "missing {expected}");
        }

        // Verify the vec0 extension is live
        let version: String = conn
            .query_row("SELECT vec_version()", [], |r| r.get(0))
            .unwrap();
        assert!(!version.is_empty());
    }

    #[test]
    fn schema_is_idempotent() {
        crate::db::load_sqlite_vec();
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap(); // second call should not error
    }

    #[test]
    fn at_most_one_self_row_per_user() {
        crate::db::load_sqlite_vec();
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        conn.execute(
            "INSERT INTO users (email, created_at) VALUES ('a@b.c', '2026-01-01T00:00:00+00:00')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO people (user_id, name, is_self, last_mentioned) \
             VALUES (1, 'Self', 1, '2026-01-01T00:00:00+00:00')",
            [],
        )
        .unwrap();

        let second = conn.execute(
            "INSERT INTO people (user_id, name, is_self, last_mentioned) \
             VALUES (1, 'Self', 1, '2026-01-01T00:00:00+00:00')",
            [],
        );
        assert!(second.is_err());
    }
}
