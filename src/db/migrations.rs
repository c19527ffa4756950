//! Schema versioning and the embedding-model pin.
//!
//! `schema_meta` carries two keys. `schema_version` is bumped by the
//! forward-only migrations registered in [`MIGRATIONS`]. `embedding_model`
//! pins the model whose vectors populate the semantic index;
//! [`verify_embedding_model`] checks that pin against the configured model
//! before any command that could write new vectors, so a config change
//! cannot mix embeddings from two models in one index.

use rusqlite::Connection;

use crate::error::{Error, Result};

/// Schema version this binary writes.
pub const CURRENT_SCHEMA_VERSION: u32 = 2;

/// Migration steps indexed by target version: entry 0 upgrades v1 to v2.
const MIGRATIONS: &[fn(&Connection) -> rusqlite::Result<()>] = &[pin_initial_embedding_model];

/// Read the schema version recorded in the database.
pub fn schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    conn.query_row(
        "SELECT value FROM schema_meta WHERE key = 'schema_version'",
        [],
        |row| {
            let raw: String = row.get(0)?;
            Ok(raw.parse::<u32>().unwrap_or(0))
        },
    )
}

/// Read the embedding-model pin, absent on databases that predate v2.
pub fn embedding_model_pin(conn: &Connection) -> rusqlite::Result<Option<String>> {
    match conn.query_row(
        "SELECT value FROM schema_meta WHERE key = 'embedding_model'",
        [],
        |row| row.get::<_, String>(0),
    ) {
        Ok(model) => Ok(Some(model)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

fn pin_embedding_model(conn: &Connection, model: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_meta (key, value) VALUES ('embedding_model', ?1)",
        [model],
    )?;
    Ok(())
}

/// Check the embedding-model pin against the configured model.
///
/// An unpinned or empty index adopts the configured model. A populated index
/// refuses a mismatch, since distances between vectors produced by different
/// models are meaningless.
pub fn verify_embedding_model(conn: &Connection, configured: &str) -> Result<()> {
    let pinned = match embedding_model_pin(conn)? {
        Some(pinned) => pinned,
        None => {
            pin_embedding_model(conn, configured)?;
            return Ok(());
        }
    };
    if pinned == configured {
        return Ok(());
    }

    let stored: i64 = conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;
    if stored == 0 {
        tracing::info!(from = %pinned, to = %configured, "semantic index is empty, adopting new embedding model");
        pin_embedding_model(conn, configured)?;
        return Ok(());
    }

    Err(Error::Configuration(format!(
        "semantic index holds {stored} chunks embedded with '{pinned}' but the config \
         now selects '{configured}'; restore the original model or clear the index first"
    )))
}

/// Bring the database up to [`CURRENT_SCHEMA_VERSION`], one step at a time.
pub fn run_migrations(conn: &Connection) -> rusqlite::Result<()> {
    let mut version = schema_version(conn)?;
    tracing::debug!(schema_version = version, target = CURRENT_SCHEMA_VERSION, "checking migrations");

    while version < CURRENT_SCHEMA_VERSION {
        let next = version + 1;
        let Some(step) = next.checked_sub(2).and_then(|i| MIGRATIONS.get(i as usize)) else {
            tracing::error!(version = next, "no migration registered for this version");
            break;
        };

        tracing::info!(from = version, to = next, "migrating schema");
        step(conn)?;
        conn.execute(
            "UPDATE schema_meta SET value = ?1 WHERE key = 'schema_version'",
            [next.to_string()],
        )?;
        version = next;
    }

    Ok(())
}

/// v1 -> v2: databases from before the pin existed were all embedded with
/// text-embedding-3-small, so record that.
fn pin_initial_embedding_model(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('embedding_model', 'text-embedding-3-small')",
        [],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh_db() -> Connection {
        crate::db::load_sqlite_vec();
        let conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "foreign_keys", "ON").unwrap();
        crate::db::schema::init_schema(&conn).unwrap();
        conn
    }

    fn migrated_db() -> Connection {
        let conn = fresh_db();
        run_migrations(&conn).unwrap();
        conn
    }

    #[test]
    fn fresh_database_starts_at_version_1() {
        assert_eq!(schema_version(&fresh_db()).unwrap(), 1);
    }

    #[test]
    fn run_migrations_reaches_current_version_and_reruns_cleanly() {
        let conn = migrated_db();
        assert_eq!(schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
        run_migrations(&conn).unwrap();
        assert_eq!(schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn v2_pins_the_model_that_built_old_indexes() {
        let conn = fresh_db();
        assert!(embedding_model_pin(&conn).unwrap().is_none());
        run_migrations(&conn).unwrap();
        assert_eq!(
            embedding_model_pin(&conn).unwrap().as_deref(),
            Some("text-embedding-3-small")
        );
    }

    #[test]
    fn verify_accepts_the_pinned_model() {
        let conn = migrated_db();
        verify_embedding_model(&conn, "text-embedding-3-small").unwrap();
    }

    #[test]
    fn verify_adopts_a_new_model_while_the_index_is_empty() {
        let conn = migrated_db();
        verify_embedding_model(&conn, "text-embedding-3-large").unwrap();
        assert_eq!(
            embedding_model_pin(&conn).unwrap().as_deref(),
            Some("text-embedding-3-large")
        );
    }

    #[test]
    fn verify_refuses_a_model_change_once_vectors_exist() {
        let conn = migrated_db();
        conn.execute(
            "INSERT INTO users (email, name, created_at) VALUES ('a@b.c', 'a', '2026-01-01T00:00:00Z')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO chunks (user_id, source, content, created_at)
             VALUES (1, 'mind_palace', 'the wifi password', '2026-01-01T00:00:00Z')",
            [],
        )
        .unwrap();

        let err = verify_embedding_model(&conn, "text-embedding-3-large").unwrap_err();
        assert!(matches!(err, Error::Configuration(_)), "got {err:?}");
        // the pin must survive the refused change
        assert_eq!(
            embedding_model_pin(&conn).unwrap().as_deref(),
            Some("text-embedding-3-small")
        );
    }
}
