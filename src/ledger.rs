//! Conversation ledger: every user and agent turn, grouped into threads.
//!
//! Thread ids are namespaced per user (`user-{id}--{raw}`) so two users
//! naming a thread "groceries" never share history.

use rusqlite::{params, Connection};
use serde::Serialize;

use crate::error::Result;
use crate::memory::now_utc;
use crate::memory::types::Sender;

#[derive(Debug, Clone, Serialize)]
pub struct LedgerMessage {
    pub id: i64,
    pub thread_id: String,
    pub sender: Sender,
    pub message: String,
    pub created_at: String,
}

/// The most recent message of one thread, used for thread discovery.
#[derive(Debug, Clone, Serialize)]
pub struct ThreadPreview {
    pub thread_id: String,
    pub title: String,
    pub sender: Sender,
    pub message: String,
    pub created_at: String,
}

/// Prefix a raw thread id with the owning user. Already-namespaced ids
/// pass through unchanged, so the operation is idempotent.
pub fn namespace_thread_id(user_id: i64, raw: &str) -> String {
    let prefix = format!("user-{user_id}--");
    if raw.starts_with(&prefix) {
        raw.to_string()
    } else {
        format!("{prefix}{raw}")
    }
}

/// The human-facing thread name, with the namespace prefix stripped.
pub fn display_title(thread_id: &str) -> &str {
    match thread_id.split_once("--") {
        Some((prefix, rest)) if prefix.starts_with("user-") => rest,
        _ => thread_id,
    }
}

/// Append one turn. `thread_id` must already be namespaced.
pub fn append_message(
    conn: &Connection,
    user_id: i64,
    thread_id: &str,
    sender: Sender,
    message: &str,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO conversations (user_id, thread_id, sender, message, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![user_id, thread_id, sender.as_str(), message, now_utc()],
    )?;
    Ok(conn.last_insert_rowid())
}

fn map_sender(raw: String) -> Sender {
    // the CHECK constraint keeps this total
    raw.parse().unwrap_or(Sender::Ai)
}

/// Full history of one thread, oldest first.
pub fn thread_history(
    conn: &Connection,
    user_id: i64,
    thread_id: &str,
) -> Result<Vec<LedgerMessage>> {
    let mut stmt = conn.prepare(
        "SELECT id, thread_id, sender, message, created_at FROM conversations \
         WHERE user_id = ?1 AND thread_id = ?2 ORDER BY id",
    )?;
    let messages = stmt
        .query_map(params![user_id, thread_id], |row| {
            Ok(LedgerMessage {
                id: row.get(0)?,
                thread_id: row.get(1)?,
                sender: map_sender(row.get(2)?),
                message: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(messages)
}

/// One preview row per thread: the newest message of each, with the most
/// recently active thread first. Ties on timestamp fall to the higher row
/// id, which is the later insert.
pub fn latest_per_thread(conn: &Connection, user_id: i64) -> Result<Vec<ThreadPreview>> {
    let mut stmt = conn.prepare(
        "SELECT thread_id, sender, message, created_at FROM ( \
             SELECT thread_id, sender, message, created_at, \
                    ROW_NUMBER() OVER ( \
                        PARTITION BY thread_id \
                        ORDER BY created_at DESC, id DESC \
                    ) AS rn \
             FROM conversations WHERE user_id = ?1 \
         ) WHERE rn = 1 ORDER BY created_at DESC, thread_id",
    )?;
    let previews = stmt
        .query_map(params![user_id], |row| {
            let thread_id: String = row.get(0)?;
            Ok(ThreadPreview {
                title: display_title(&thread_id).to_string(),
                thread_id,
                sender: map_sender(row.get(1)?),
                message: row.get(2)?,
                created_at: row.get(3)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(previews)
}

/// Drop a whole thread. Returns false when the user has no such thread.
pub fn delete_thread(conn: &Connection, user_id: i64, thread_id: &str) -> Result<bool> {
    let rows = conn.execute(
        "DELETE FROM conversations WHERE user_id = ?1 AND thread_id = ?2",
        params![user_id, thread_id],
    )?;
    if rows > 0 {
        tracing::info!(user_id, thread_id, rows, "thread deleted");
    }
    Ok(rows > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn setup() -> (Connection, i64) {
        let conn = db::open_memory_database().unwrap();
        let user = crate::memory::users::ensure_user(&conn, "t@example.com", None).unwrap();
        (conn, user.id)
    }

    fn insert_at(
        conn: &Connection,
        user_id: i64,
        thread_id: &str,
        sender: Sender,
        message: &str,
        created_at: &str,
    ) {
        conn.execute(
            "INSERT INTO conversations (user_id, thread_id, sender, message, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![user_id, thread_id, sender.as_str(), message, created_at],
        )
        .unwrap();
    }

    #[test]
    fn namespacing_is_idempotent() {
        let once = namespace_thread_id(7, "groceries");
        assert_eq!(once, "user-7--groceries");
        assert_eq!(namespace_thread_id(7, &once), once);
    }

    #[test]
    fn display_title_strips_the_namespace() {
        assert_eq!(display_title("user-7--groceries"), "groceries");
        assert_eq!(display_title("plain"), "plain");
    }

    #[test]
    fn history_comes_back_oldest_first() {
        let (conn, uid) = setup();
        let tid = namespace_thread_id(uid, "chat");
        append_message(&conn, uid, &tid, Sender::User, "hi").unwrap();
        append_message(&conn, uid, &tid, Sender::Ai, "hello").unwrap();
        append_message(&conn, uid, &tid, Sender::User, "how are you").unwrap();

        let history = thread_history(&conn, uid, &tid).unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].message, "hi");
        assert_eq!(history[1].sender, Sender::Ai);
        assert_eq!(history[2].message, "how are you");
    }

    #[test]
    fn latest_per_thread_picks_one_row_per_thread_most_recent_first() {
        let (conn, uid) = setup();
        let a = namespace_thread_id(uid, "a");
        let b = namespace_thread_id(uid, "b");
        insert_at(&conn, uid, &a, Sender::User, "a1", "2026-01-01T10:00:00+00:00");
        insert_at(&conn, uid, &a, Sender::Ai, "a2", "2026-01-01T10:00:03+00:00");
        insert_at(&conn, uid, &b, Sender::User, "b1", "2026-01-01T10:00:02+00:00");

        let previews = latest_per_thread(&conn, uid).unwrap();
        assert_eq!(previews.len(), 2);
        // thread a was touched at t+3, thread b at t+2
        assert_eq!(previews[0].thread_id, a);
        assert_eq!(previews[0].message, "a2");
        assert_eq!(previews[1].thread_id, b);
        assert_eq!(previews[0].title, "a");
    }

    #[test]
    fn latest_per_thread_breaks_timestamp_ties_by_row_id() {
        let (conn, uid) = setup();
        let tid = namespace_thread_id(uid, "t");
        insert_at(&conn, uid, &tid, Sender::User, "first", "2026-01-01T10:00:00+00:00");
        insert_at(&conn, uid, &tid, Sender::Ai, "second", "2026-01-01T10:00:00+00:00");

        let previews = latest_per_thread(&conn, uid).unwrap();
        assert_eq!(previews.len(), 1);
        assert_eq!(previews[0].message, "second");
    }

    #[test]
    fn threads_are_tenant_scoped() {
        let (conn, uid) = setup();
        let other = crate::memory::users::ensure_user(&conn, "o@example.com", None).unwrap();
        let theirs = namespace_thread_id(other.id, "private");
        append_message(&conn, other.id, &theirs, Sender::User, "secret").unwrap();

        assert!(latest_per_thread(&conn, uid).unwrap().is_empty());
        assert!(thread_history(&conn, uid, &theirs).unwrap().is_empty());
    }

    #[test]
    fn delete_thread_reports_whether_anything_existed() {
        let (conn, uid) = setup();
        let tid = namespace_thread_id(uid, "gone");
        append_message(&conn, uid, &tid, Sender::User, "bye").unwrap();

        assert!(delete_thread(&conn, uid, &tid).unwrap());
        assert!(!delete_thread(&conn, uid, &tid).unwrap());
        assert!(thread_history(&conn, uid, &tid).unwrap().is_empty());
    }
}
