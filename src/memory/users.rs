//! Tenant identities. Authentication lives outside the core; this store
//! only materializes the user row every other table is keyed on.

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::memory::now_utc;

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: Option<String>,
    pub created_at: String,
}

/// Fetch a user by email.
pub fn get_user_by_email(conn: &Connection, email: &str) -> Result<Option<User>> {
    let user = conn
        .query_row(
            "SELECT id, email, name, created_at FROM users WHERE email = ?1",
            params![email],
            map_user,
        )
        .optional()?;
    Ok(user)
}

/// Fetch a user by id.
pub fn get_user(conn: &Connection, user_id: i64) -> Result<Option<User>> {
    let user = conn
        .query_row(
            "SELECT id, email, name, created_at FROM users WHERE id = ?1",
            params![user_id],
            map_user,
        )
        .optional()?;
    Ok(user)
}

/// Fetch the user with the given email, creating the row if absent.
pub fn ensure_user(conn: &Connection, email: &str, name: Option<&str>) -> Result<User> {
    if email.trim().is_empty() || !email.contains('@') {
        return Err(Error::Validation(format!("invalid email: '{email}'")));
    }
    if let Some(user) = get_user_by_email(conn, email)? {
        return Ok(user);
    }

    conn.execute(
        "INSERT INTO users (email, name, created_at) VALUES (?1, ?2, ?3)",
        params![email, name, now_utc()],
    )?;
    let id = conn.last_insert_rowid();
    tracing::info!(user_id = id, "user created");

    get_user(conn, id)?.ok_or(Error::NotFound("user"))
}

fn map_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        created_at: row.get(3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[test]
    fn ensure_user_is_idempotent() {
        let conn = db::open_memory_database().unwrap();
        let a = ensure_user(&conn, "ada@example.com", Some("Ada")).unwrap();
        let b = ensure_user(&conn, "ada@example.com", None).unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(b.name.as_deref(), Some("Ada"));
    }

    #[test]
    fn email_must_be_plausible() {
        let conn = db::open_memory_database().unwrap();
        assert!(matches!(
            ensure_user(&conn, "not-an-email", None),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn emails_are_unique() {
        let conn = db::open_memory_database().unwrap();
        ensure_user(&conn, "a@example.com", None).unwrap();
        let dup = conn.execute(
            "INSERT INTO users (email, created_at) VALUES ('a@example.com', '2026-01-01T00:00:00+00:00')",
            [],
        );
        assert!(dup.is_err());
    }
}
