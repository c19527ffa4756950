pub mod chat;
pub mod ingest;
pub mod threads;
pub mod user;

use anyhow::{bail, Context, Result};
use rusqlite::Connection;

use crate::config::MemoriaConfig;
use crate::memory::users::{self, User};

/// Open the configured database, creating parent directories first.
pub fn open_db(config: &MemoriaConfig) -> Result<Connection> {
    let path = config.resolved_db_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create data dir: {}", parent.display()))?;
    }
    let conn = crate::db::open_database(&path)
        .with_context(|| format!("failed to open database: {}", path.display()))?;
    crate::db::migrations::verify_embedding_model(&conn, &config.embedding.model)?;
    Ok(conn)
}

/// Resolve an email to an existing user, with a hint when absent.
pub fn require_user(conn: &Connection, email: &str) -> Result<User> {
    match users::get_user_by_email(conn, email)? {
        Some(user) => Ok(user),
        None => bail!("no user with email '{email}'. Create one with `memoria user add {email}`"),
    }
}
