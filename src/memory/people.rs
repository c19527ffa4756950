//! Person store — facts about people the user knows, including the user's
//! own profile (the row with `is_self` set).
//!
//! Every query is scoped by `user_id`; a row owned by another tenant is
//! indistinguishable from a missing one. The self profile is protected: it
//! can never be deleted, and the schema enforces at most one per user.

use rusqlite::{params, Connection, OptionalExtension};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;
use std::sync::{Arc, Mutex};

use crate::agent::capability::{lock_db, Capability, EmptyParams};
use crate::error::{Error, Result};
use crate::memory::types::{NotesUpdate, Person, PersonSummary};
use crate::memory::{date_to_timestamp, now_utc, parse_calendar_date};

const SELECT_COLS: &str = "id, user_id, name, notes, info, is_self, last_mentioned";

fn map_person(row: &rusqlite::Row<'_>) -> rusqlite::Result<Person> {
    let notes: String = row.get(3)?;
    let info: String = row.get(4)?;
    Ok(Person {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        notes: serde_json::from_str(&notes).unwrap_or_default(),
        info: serde_json::from_str(&info).unwrap_or_else(|_| json!({})),
        is_self: row.get(5)?,
        last_mentioned: row.get(6)?,
    })
}

fn query_people(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<Person>> {
    let mut stmt = conn.prepare(sql)?;
    let people = stmt
        .query_map(params, map_person)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(people)
}

/// Create a person. A name of "self" (any casing) marks the row as the
/// user's own profile; the schema rejects a second one.
pub fn create_person(
    conn: &Connection,
    user_id: i64,
    name: &str,
    notes: Vec<String>,
    info: Option<serde_json::Value>,
    last_mentioned: Option<&str>,
) -> Result<Person> {
    if name.trim().is_empty() {
        return Err(Error::Validation("person name must not be empty".into()));
    }
    let info = match info {
        Some(v) if !v.is_object() => {
            return Err(Error::Validation("info must be a JSON object".into()))
        }
        Some(v) => v,
        None => json!({}),
    };
    let is_self = name.trim().eq_ignore_ascii_case("self");
    let mentioned = match last_mentioned {
        Some(s) => date_to_timestamp(s)?,
        None => now_utc(),
    };

    let inserted = conn.execute(
        "INSERT INTO people (user_id, name, notes, info, is_self, last_mentioned) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            user_id,
            name.trim(),
            serde_json::to_string(&notes)?,
            info.to_string(),
            is_self,
            mentioned,
        ],
    );
    match inserted {
        Ok(_) => {}
        Err(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation && is_self =>
        {
            return Err(Error::Validation(
                "a Self profile already exists; update it instead".into(),
            ));
        }
        Err(e) => return Err(e.into()),
    }

    let id = conn.last_insert_rowid();
    tracing::info!(user_id, person_id = id, is_self, "person created");
    get_person(conn, user_id, id)?.ok_or(Error::NotFound("person"))
}

/// Fetch a person by id, scoped to the user.
pub fn get_person(conn: &Connection, user_id: i64, person_id: i64) -> Result<Option<Person>> {
    let person = conn
        .query_row(
            &format!("SELECT {SELECT_COLS} FROM people WHERE id = ?1 AND user_id = ?2"),
            params![person_id, user_id],
            map_person,
        )
        .optional()?;
    Ok(person)
}

/// All people, id/name/last_mentioned/relationship only, to bound payload size.
pub fn list_people(conn: &Connection, user_id: i64) -> Result<Vec<PersonSummary>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, last_mentioned, \
         COALESCE(json_extract(info, '$.relationship'), 'stranger') \
         FROM people WHERE user_id = ?1 ORDER BY id",
    )?;
    let people = stmt
        .query_map(params![user_id], |row| {
            Ok(PersonSummary {
                id: row.get(0)?,
                name: row.get(1)?,
                last_mentioned: row.get(2)?,
                relationship: row.get(3)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(people)
}

/// The `n` most recently created people.
pub fn last_n_people(conn: &Connection, user_id: i64, n: u32) -> Result<Vec<Person>> {
    query_people(
        conn,
        &format!("SELECT {SELECT_COLS} FROM people WHERE user_id = ?1 ORDER BY id DESC LIMIT ?2"),
        params![user_id, n],
    )
}

/// The `n` most recently mentioned people.
pub fn last_n_mentioned_people(conn: &Connection, user_id: i64, n: u32) -> Result<Vec<Person>> {
    query_people(
        conn,
        &format!(
            "SELECT {SELECT_COLS} FROM people WHERE user_id = ?1 \
             ORDER BY last_mentioned DESC, id DESC LIMIT ?2"
        ),
        params![user_id, n],
    )
}

/// The nth person, 1-based, counting back from the most recently created.
pub fn nth_person(conn: &Connection, user_id: i64, n: u32) -> Result<Option<Person>> {
    if n == 0 {
        return Err(Error::Validation("n is 1-based and must be at least 1".into()));
    }
    let person = conn
        .query_row(
            &format!(
                "SELECT {SELECT_COLS} FROM people WHERE user_id = ?1 \
                 ORDER BY id DESC LIMIT 1 OFFSET ?2"
            ),
            params![user_id, n - 1],
            map_person,
        )
        .optional()?;
    Ok(person)
}

/// Case-insensitive substring match on name.
pub fn people_by_name(conn: &Connection, user_id: i64, name: &str) -> Result<Vec<Person>> {
    query_people(
        conn,
        &format!(
            "SELECT {SELECT_COLS} FROM people WHERE user_id = ?1 \
             AND name LIKE '%' || ?2 || '%' ORDER BY id"
        ),
        params![user_id, name],
    )
}

/// Case-insensitive substring match over the notes list.
pub fn people_by_notes(conn: &Connection, user_id: i64, keyword: &str) -> Result<Vec<Person>> {
    query_people(
        conn,
        &format!(
            "SELECT {SELECT_COLS} FROM people WHERE user_id = ?1 \
             AND notes LIKE '%' || ?2 || '%' ORDER BY id"
        ),
        params![user_id, keyword],
    )
}

/// People whose info.relationship matches; rows without one count as "stranger".
pub fn people_by_relationship(
    conn: &Connection,
    user_id: i64,
    relationship: &str,
) -> Result<Vec<Person>> {
    query_people(
        conn,
        &format!(
            "SELECT {SELECT_COLS} FROM people WHERE user_id = ?1 \
             AND COALESCE(json_extract(info, '$.relationship'), 'stranger') = ?2 ORDER BY id"
        ),
        params![user_id, relationship],
    )
}

/// People last mentioned on the given `YYYY-MM-DD` date.
pub fn people_by_date(conn: &Connection, user_id: i64, date: &str) -> Result<Vec<Person>> {
    let date = parse_calendar_date(date)?;
    query_people(
        conn,
        &format!(
            "SELECT {SELECT_COLS} FROM people WHERE user_id = ?1 \
             AND date(last_mentioned) = ?2 ORDER BY id"
        ),
        params![user_id, date.to_string()],
    )
}

/// People last mentioned within an inclusive date range.
pub fn people_in_date_range(
    conn: &Connection,
    user_id: i64,
    start: &str,
    end: &str,
) -> Result<Vec<Person>> {
    let start = parse_calendar_date(start)?;
    let end = parse_calendar_date(end)?;
    query_people(
        conn,
        &format!(
            "SELECT {SELECT_COLS} FROM people WHERE user_id = ?1 \
             AND date(last_mentioned) BETWEEN ?2 AND ?3 ORDER BY id"
        ),
        params![user_id, start.to_string(), end.to_string()],
    )
}

/// The user's own profile, if one exists.
pub fn self_profile(conn: &Connection, user_id: i64) -> Result<Option<Person>> {
    let person = conn
        .query_row(
            &format!(
                "SELECT {SELECT_COLS} FROM people WHERE user_id = ?1 \
                 AND (is_self = 1 OR lower(name) = 'self') LIMIT 1"
            ),
            params![user_id],
            map_person,
        )
        .optional()?;
    Ok(person)
}

/// Partial update: omitted fields stay untouched. Always refreshes
/// `last_mentioned`, even when nothing else changed.
pub fn update_person(
    conn: &mut Connection,
    user_id: i64,
    person_id: i64,
    name: Option<&str>,
    notes_update: Option<NotesUpdate>,
    info: Option<serde_json::Value>,
) -> Result<Person> {
    if let Some(ref v) = info {
        if !v.is_object() {
            return Err(Error::Validation("info must be a JSON object".into()));
        }
    }

    let tx = conn.transaction()?;
    let mut person = tx
        .query_row(
            &format!("SELECT {SELECT_COLS} FROM people WHERE id = ?1 AND user_id = ?2"),
            params![person_id, user_id],
            map_person,
        )
        .optional()?
        .ok_or(Error::NotFound("person"))?;

    if let Some(name) = name {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::Validation("person name must not be empty".into()));
        }
        // Only the flagged row may carry the reserved name, or self_profile
        // lookups by name would match an ordinary person.
        if name.eq_ignore_ascii_case("self") && !person.is_self {
            return Err(Error::Validation(
                "'Self' is reserved for the owner's profile".into(),
            ));
        }
        person.name = name.to_string();
    }
    if let Some(update) = notes_update {
        update.apply(&mut person.notes);
    }
    if let Some(info) = info {
        person.info = info;
    }
    person.last_mentioned = now_utc();

    tx.execute(
        "UPDATE people SET name = ?1, notes = ?2, info = ?3, last_mentioned = ?4 \
         WHERE id = ?5 AND user_id = ?6",
        params![
            person.name,
            serde_json::to_string(&person.notes)?,
            person.info.to_string(),
            person.last_mentioned,
            person_id,
            user_id,
        ],
    )?;
    tx.commit()?;

    tracing::info!(user_id, person_id, "person updated");
    Ok(person)
}

/// Delete a person. Returns false when no such row belongs to the user.
/// The self profile is never deletable, whether marked by flag or by name.
pub fn delete_person(conn: &Connection, user_id: i64, person_id: i64) -> Result<bool> {
    let row: Option<(String, bool)> = conn
        .query_row(
            "SELECT name, is_self FROM people WHERE id = ?1 AND user_id = ?2",
            params![person_id, user_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    let Some((name, is_self)) = row else {
        return Ok(false);
    };
    if is_self || name.eq_ignore_ascii_case("self") {
        return Err(Error::Validation("the Self profile cannot be deleted".into()));
    }

    conn.execute(
        "DELETE FROM people WHERE id = ?1 AND user_id = ?2",
        params![person_id, user_id],
    )?;
    tracing::info!(user_id, person_id, "person deleted");
    Ok(true)
}

// ── Capability table ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, JsonSchema)]
pub struct LastNParams {
    #[schemars(description = "How many records to return. Defaults to 5.")]
    pub n: Option<u32>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct NthParams {
    #[schemars(description = "1-based index, counting back from the most recent")]
    pub n: u32,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct IdParams {
    pub id: i64,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DateParams {
    #[schemars(description = "Calendar date in YYYY-MM-DD format")]
    pub date: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DateRangeParams {
    #[schemars(description = "Start date in YYYY-MM-DD format (inclusive)")]
    pub start_date: String,
    #[schemars(description = "End date in YYYY-MM-DD format (inclusive)")]
    pub end_date: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct KeywordParams {
    #[schemars(description = "Keyword to match, case-insensitive substring")]
    pub keyword: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreatePersonParams {
    #[schemars(description = "The person's name. Use \"Self\" for the user themselves.")]
    pub name: String,
    #[schemars(description = "Notes about the person: behavior, interests, relevant details")]
    pub notes: Option<Vec<String>>,
    #[schemars(
        description = "Additional attributes. Store how this person relates to the user under the \"relationship\" key (e.g. \"friend\", \"colleague\", \"self\")."
    )]
    pub info: Option<serde_json::Value>,
    #[schemars(description = "When the person was last mentioned, YYYY-MM-DD. Defaults to now.")]
    pub last_mentioned: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdatePersonParams {
    pub id: i64,
    #[schemars(description = "New name, if changing. Use \"Self\" for the user themselves.")]
    pub name: Option<String>,
    #[schemars(
        description = "Notes edit: {\"action\": \"append\"|\"replace\"|\"delete\", \"data\": [...]}. For delete, data is a list of 0-based indexes."
    )]
    pub notes_update: Option<NotesUpdate>,
    #[schemars(description = "Replacement for the additional attributes object")]
    pub info: Option<serde_json::Value>,
}

/// The person capability table, bound to one user.
pub fn capabilities(db: Arc<Mutex<Connection>>, user_id: i64) -> Vec<Capability> {
    let conn = move || db.clone();
    vec![
        Capability::blocking(
            "get_all_people",
            "List every person the user has recorded: id, name, last_mentioned, and relationship only.",
            {
                let db = conn();
                move |_: EmptyParams| {
                    let guard = lock_db(&db)?;
                    Ok(serde_json::to_value(list_people(&guard, user_id)?)?)
                }
            },
        ),
        Capability::blocking(
            "get_person_by_id",
            "Fetch the full record for one person by id.",
            {
                let db = conn();
                move |p: IdParams| {
                    let guard = lock_db(&db)?;
                    Ok(serde_json::to_value(get_person(&guard, user_id, p.id)?)?)
                }
            },
        ),
        Capability::blocking(
            "get_last_n_people",
            "The n most recently added people.",
            {
                let db = conn();
                move |p: LastNParams| {
                    let guard = lock_db(&db)?;
                    Ok(serde_json::to_value(last_n_people(&guard, user_id, p.n.unwrap_or(5))?)?)
                }
            },
        ),
        Capability::blocking(
            "get_last_n_mentioned_people",
            "The n most recently mentioned people.",
            {
                let db = conn();
                move |p: LastNParams| {
                    let guard = lock_db(&db)?;
                    Ok(serde_json::to_value(last_n_mentioned_people(
                        &guard,
                        user_id,
                        p.n.unwrap_or(5),
                    )?)?)
                }
            },
        ),
        Capability::blocking(
            "get_nth_person",
            "The nth person, 1-based, counting back from the most recently added.",
            {
                let db = conn();
                move |p: NthParams| {
                    let guard = lock_db(&db)?;
                    Ok(serde_json::to_value(nth_person(&guard, user_id, p.n)?)?)
                }
            },
        ),
        Capability::blocking(
            "get_person_by_name",
            "Find people whose name contains the keyword (case-insensitive).",
            {
                let db = conn();
                move |p: KeywordParams| {
                    let guard = lock_db(&db)?;
                    Ok(serde_json::to_value(people_by_name(&guard, user_id, &p.keyword)?)?)
                }
            },
        ),
        Capability::blocking(
            "get_person_by_description",
            "Find people whose notes contain the keyword (case-insensitive).",
            {
                let db = conn();
                move |p: KeywordParams| {
                    let guard = lock_db(&db)?;
                    Ok(serde_json::to_value(people_by_notes(&guard, user_id, &p.keyword)?)?)
                }
            },
        ),
        Capability::blocking(
            "get_person_by_relationship",
            "Find people by their relationship to the user. Try synonyms for best results.",
            {
                let db = conn();
                move |p: KeywordParams| {
                    let guard = lock_db(&db)?;
                    Ok(serde_json::to_value(people_by_relationship(
                        &guard, user_id, &p.keyword,
                    )?)?)
                }
            },
        ),
        Capability::blocking(
            "get_person_by_date",
            "People last mentioned on a specific date.",
            {
                let db = conn();
                move |p: DateParams| {
                    let guard = lock_db(&db)?;
                    Ok(serde_json::to_value(people_by_date(&guard, user_id, &p.date)?)?)
                }
            },
        ),
        Capability::blocking(
            "get_people_in_date_range",
            "People last mentioned within an inclusive date range.",
            {
                let db = conn();
                move |p: DateRangeParams| {
                    let guard = lock_db(&db)?;
                    Ok(serde_json::to_value(people_in_date_range(
                        &guard,
                        user_id,
                        &p.start_date,
                        &p.end_date,
                    )?)?)
                }
            },
        ),
        Capability::blocking(
            "get_user_details",
            "The user's own profile (the \"Self\" record). Keep this entry up to date whenever the user shares something about themselves; create it if missing.",
            {
                let db = conn();
                move |_: EmptyParams| {
                    let guard = lock_db(&db)?;
                    Ok(serde_json::to_value(self_profile(&guard, user_id)?)?)
                }
            },
        ),
        Capability::blocking(
            "create_person",
            "Record a new person. Include behavior and interests in notes, and the relationship in info.",
            {
                let db = conn();
                move |p: CreatePersonParams| {
                    let guard = lock_db(&db)?;
                    Ok(serde_json::to_value(create_person(
                        &guard,
                        user_id,
                        &p.name,
                        p.notes.unwrap_or_default(),
                        p.info,
                        p.last_mentioned.as_deref(),
                    )?)?)
                }
            },
        ),
        Capability::blocking(
            "update_person",
            "Update a person. Ask the user for confirmation before overwriting fields. Omitted fields are left untouched.",
            {
                let db = conn();
                move |p: UpdatePersonParams| {
                    let mut guard = lock_db(&db)?;
                    Ok(serde_json::to_value(update_person(
                        &mut guard,
                        user_id,
                        p.id,
                        p.name.as_deref(),
                        p.notes_update,
                        p.info,
                    )?)?)
                }
            },
        ),
        Capability::blocking(
            "delete_person",
            "Delete a person by id. Ask the user for confirmation first. The \"Self\" profile can never be deleted.",
            {
                let db = conn();
                move |p: IdParams| {
                    let guard = lock_db(&db)?;
                    let deleted = delete_person(&guard, user_id, p.id)?;
                    Ok(json!({ "deleted": deleted }))
                }
            },
        ),
    ]
}
