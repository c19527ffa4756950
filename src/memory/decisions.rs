//! Decision store — choices the user has made, named by a short summary
//! sentence and dated.

use rusqlite::{params, Connection, OptionalExtension};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;
use std::sync::{Arc, Mutex};

use crate::agent::capability::{lock_db, Capability, EmptyParams};
use crate::error::{Error, Result};
use crate::memory::people::{DateParams, DateRangeParams, IdParams, KeywordParams, LastNParams, NthParams};
use crate::memory::types::{Decision, DecisionSummary};
use crate::memory::{date_to_timestamp, now_utc, parse_calendar_date};

const SELECT_COLS: &str = "id, user_id, name, text, info, date";

/// Decision names are summary sentences, not labels. Too short and they
/// collide, too long and they stop being names.
const NAME_WORDS_MIN: usize = 5;
const NAME_WORDS_MAX: usize = 15;

fn validate_name(name: &str) -> Result<()> {
    let words = name.split_whitespace().count();
    if !(NAME_WORDS_MIN..=NAME_WORDS_MAX).contains(&words) {
        return Err(Error::Validation(format!(
            "decision name must be a short sentence of {NAME_WORDS_MIN} to \
             {NAME_WORDS_MAX} words, got {words}"
        )));
    }
    Ok(())
}

fn map_decision(row: &rusqlite::Row<'_>) -> rusqlite::Result<Decision> {
    let info: String = row.get(4)?;
    Ok(Decision {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        text: row.get(3)?,
        info: serde_json::from_str(&info).unwrap_or_else(|_| json!({})),
        date: row.get(5)?,
    })
}

fn query_decisions(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<Decision>> {
    let mut stmt = conn.prepare(sql)?;
    let decisions = stmt
        .query_map(params, map_decision)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(decisions)
}

/// Record a decision. `date` is `YYYY-MM-DD` and defaults to now.
pub fn create_decision(
    conn: &Connection,
    user_id: i64,
    name: &str,
    text: &str,
    info: Option<serde_json::Value>,
    date: Option<&str>,
) -> Result<Decision> {
    let name = name.trim();
    validate_name(name)?;
    let info = match info {
        Some(v) if !v.is_object() => {
            return Err(Error::Validation("info must be a JSON object".into()))
        }
        Some(v) => v,
        None => json!({}),
    };
    let date = match date {
        Some(s) => date_to_timestamp(s)?,
        None => now_utc(),
    };

    conn.execute(
        "INSERT INTO decisions (user_id, name, text, info, date) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![user_id, name, text, info.to_string(), date],
    )?;
    let id = conn.last_insert_rowid();
    tracing::info!(user_id, decision_id = id, "decision recorded");
    get_decision(conn, user_id, id)?.ok_or(Error::NotFound("decision"))
}

/// Fetch a decision by id, scoped to the user.
pub fn get_decision(conn: &Connection, user_id: i64, decision_id: i64) -> Result<Option<Decision>> {
    let decision = conn
        .query_row(
            &format!("SELECT {SELECT_COLS} FROM decisions WHERE id = ?1 AND user_id = ?2"),
            params![decision_id, user_id],
            map_decision,
        )
        .optional()?;
    Ok(decision)
}

/// All decisions, id/name/date only.
pub fn list_decisions(conn: &Connection, user_id: i64) -> Result<Vec<DecisionSummary>> {
    let mut stmt = conn
        .prepare("SELECT id, name, date FROM decisions WHERE user_id = ?1 ORDER BY id")?;
    let decisions = stmt
        .query_map(params![user_id], |row| {
            Ok(DecisionSummary {
                id: row.get(0)?,
                name: row.get(1)?,
                date: row.get(2)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(decisions)
}

/// The `n` most recently recorded decisions.
pub fn last_n_decisions(conn: &Connection, user_id: i64, n: u32) -> Result<Vec<Decision>> {
    query_decisions(
        conn,
        &format!(
            "SELECT {SELECT_COLS} FROM decisions WHERE user_id = ?1 ORDER BY id DESC LIMIT ?2"
        ),
        params![user_id, n],
    )
}

/// The `n` decisions with the latest decision dates.
pub fn last_n_decisions_by_date(conn: &Connection, user_id: i64, n: u32) -> Result<Vec<Decision>> {
    query_decisions(
        conn,
        &format!(
            "SELECT {SELECT_COLS} FROM decisions WHERE user_id = ?1 \
             ORDER BY date DESC, id DESC LIMIT ?2"
        ),
        params![user_id, n],
    )
}

/// The nth decision, 1-based, counting back from the most recently recorded.
pub fn nth_decision(conn: &Connection, user_id: i64, n: u32) -> Result<Option<Decision>> {
    if n == 0 {
        return Err(Error::Validation("n is 1-based and must be at least 1".into()));
    }
    let decision = conn
        .query_row(
            &format!(
                "SELECT {SELECT_COLS} FROM decisions WHERE user_id = ?1 \
                 ORDER BY id DESC LIMIT 1 OFFSET ?2"
            ),
            params![user_id, n - 1],
            map_decision,
        )
        .optional()?;
    Ok(decision)
}

/// Decisions made on the given `YYYY-MM-DD` date.
pub fn decisions_by_date(conn: &Connection, user_id: i64, date: &str) -> Result<Vec<Decision>> {
    let date = parse_calendar_date(date)?;
    query_decisions(
        conn,
        &format!(
            "SELECT {SELECT_COLS} FROM decisions WHERE user_id = ?1 \
             AND date(date) = ?2 ORDER BY id"
        ),
        params![user_id, date.to_string()],
    )
}

/// Decisions made within an inclusive date range.
pub fn decisions_in_date_range(
    conn: &Connection,
    user_id: i64,
    start: &str,
    end: &str,
) -> Result<Vec<Decision>> {
    let start = parse_calendar_date(start)?;
    let end = parse_calendar_date(end)?;
    query_decisions(
        conn,
        &format!(
            "SELECT {SELECT_COLS} FROM decisions WHERE user_id = ?1 \
             AND date(date) BETWEEN ?2 AND ?3 ORDER BY id"
        ),
        params![user_id, start.to_string(), end.to_string()],
    )
}

/// Case-insensitive substring match over name and text.
pub fn decisions_by_keyword(conn: &Connection, user_id: i64, keyword: &str) -> Result<Vec<Decision>> {
    query_decisions(
        conn,
        &format!(
            "SELECT {SELECT_COLS} FROM decisions WHERE user_id = ?1 \
             AND (name LIKE '%' || ?2 || '%' OR text LIKE '%' || ?2 || '%') ORDER BY id"
        ),
        params![user_id, keyword],
    )
}

/// Partial update: omitted fields stay untouched. A new name goes through
/// the same word-count validation as create.
pub fn update_decision(
    conn: &mut Connection,
    user_id: i64,
    decision_id: i64,
    name: Option<&str>,
    text: Option<&str>,
    info: Option<serde_json::Value>,
    date: Option<&str>,
) -> Result<Decision> {
    if let Some(ref v) = info {
        if !v.is_object() {
            return Err(Error::Validation("info must be a JSON object".into()));
        }
    }

    let tx = conn.transaction()?;
    let mut decision = tx
        .query_row(
            &format!("SELECT {SELECT_COLS} FROM decisions WHERE id = ?1 AND user_id = ?2"),
            params![decision_id, user_id],
            map_decision,
        )
        .optional()?
        .ok_or(Error::NotFound("decision"))?;

    if let Some(name) = name {
        let name = name.trim();
        validate_name(name)?;
        decision.name = name.to_string();
    }
    if let Some(text) = text {
        decision.text = text.to_string();
    }
    if let Some(info) = info {
        decision.info = info;
    }
    if let Some(date) = date {
        decision.date = date_to_timestamp(date)?;
    }

    tx.execute(
        "UPDATE decisions SET name = ?1, text = ?2, info = ?3, date = ?4 \
         WHERE id = ?5 AND user_id = ?6",
        params![
            decision.name,
            decision.text,
            decision.info.to_string(),
            decision.date,
            decision_id,
            user_id,
        ],
    )?;
    tx.commit()?;

    tracing::info!(user_id, decision_id, "decision updated");
    Ok(decision)
}

/// Delete a decision. Returns false when no such row belongs to the user.
pub fn delete_decision(conn: &Connection, user_id: i64, decision_id: i64) -> Result<bool> {
    let rows = conn.execute(
        "DELETE FROM decisions WHERE id = ?1 AND user_id = ?2",
        params![decision_id, user_id],
    )?;
    if rows > 0 {
        tracing::info!(user_id, decision_id, "decision deleted");
    }
    Ok(rows > 0)
}

// ── Capability table ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateDecisionParams {
    #[schemars(description = "A short summary sentence naming the decision, 5 to 15 words")]
    pub name: String,
    #[schemars(description = "The full decision: what was decided and why")]
    pub text: String,
    #[schemars(description = "Additional attributes as a JSON object")]
    pub info: Option<serde_json::Value>,
    #[schemars(description = "When the decision was made, YYYY-MM-DD. Defaults to now.")]
    pub date: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateDecisionParams {
    pub id: i64,
    #[schemars(description = "New summary sentence, 5 to 15 words")]
    pub name: Option<String>,
    pub text: Option<String>,
    #[schemars(description = "Replacement for the additional attributes object")]
    pub info: Option<serde_json::Value>,
    #[schemars(description = "New decision date, YYYY-MM-DD")]
    pub date: Option<String>,
}

/// The decision capability table, bound to one user.
pub fn capabilities(db: Arc<Mutex<Connection>>, user_id: i64) -> Vec<Capability> {
    let conn = move || db.clone();
    vec![
        Capability::blocking(
            "get_all_decisions",
            "List every decision: id, name, and date only.",
            {
                let db = conn();
                move |_: EmptyParams| {
                    let guard = lock_db(&db)?;
                    Ok(serde_json::to_value(list_decisions(&guard, user_id)?)?)
                }
            },
        ),
        Capability::blocking(
            "get_decision_by_id",
            "Fetch the full record for one decision by id.",
            {
                let db = conn();
                move |p: IdParams| {
                    let guard = lock_db(&db)?;
                    Ok(serde_json::to_value(get_decision(&guard, user_id, p.id)?)?)
                }
            },
        ),
        Capability::blocking(
            "get_last_n_decisions",
            "The n most recently recorded decisions.",
            {
                let db = conn();
                move |p: LastNParams| {
                    let guard = lock_db(&db)?;
                    Ok(serde_json::to_value(last_n_decisions(&guard, user_id, p.n.unwrap_or(5))?)?)
                }
            },
        ),
        Capability::blocking(
            "get_last_n_decisions_by_date",
            "The n decisions with the latest decision dates.",
            {
                let db = conn();
                move |p: LastNParams| {
                    let guard = lock_db(&db)?;
                    Ok(serde_json::to_value(last_n_decisions_by_date(
                        &guard,
                        user_id,
                        p.n.unwrap_or(5),
                    )?)?)
                }
            },
        ),
        Capability::blocking(
            "get_nth_decision",
            "The nth decision, 1-based, counting back from the most recently recorded.",
            {
                let db = conn();
                move |p: NthParams| {
                    let guard = lock_db(&db)?;
                    Ok(serde_json::to_value(nth_decision(&guard, user_id, p.n)?)?)
                }
            },
        ),
        Capability::blocking(
            "get_decision_by_date",
            "Decisions made on a specific date.",
            {
                let db = conn();
                move |p: DateParams| {
                    let guard = lock_db(&db)?;
                    Ok(serde_json::to_value(decisions_by_date(&guard, user_id, &p.date)?)?)
                }
            },
        ),
        Capability::blocking(
            "get_decisions_in_date_range",
            "Decisions made within an inclusive date range.",
            {
                let db = conn();
                move |p: DateRangeParams| {
                    let guard = lock_db(&db)?;
                    Ok(serde_json::to_value(decisions_in_date_range(
                        &guard,
                        user_id,
                        &p.start_date,
                        &p.end_date,
                    )?)?)
                }
            },
        ),
        Capability::blocking(
            "search_decisions",
            "Decisions whose name or text contains the keyword (case-insensitive).",
            {
                let db = conn();
                move |p: KeywordParams| {
                    let guard = lock_db(&db)?;
                    Ok(serde_json::to_value(decisions_by_keyword(&guard, user_id, &p.keyword)?)?)
                }
            },
        ),
        Capability::blocking(
            "create_decision",
            "Record a decision the user has made.",
            {
                let db = conn();
                move |p: CreateDecisionParams| {
                    let guard = lock_db(&db)?;
                    Ok(serde_json::to_value(create_decision(
                        &guard,
                        user_id,
                        &p.name,
                        &p.text,
                        p.info,
                        p.date.as_deref(),
                    )?)?)
                }
            },
        ),
        Capability::blocking(
            "update_decision",
            "Update a decision. Ask the user for confirmation before overwriting fields. Omitted fields are left untouched.",
            {
                let db = conn();
                move |p: UpdateDecisionParams| {
                    let mut guard = lock_db(&db)?;
                    Ok(serde_json::to_value(update_decision(
                        &mut guard,
                        user_id,
                        p.id,
                        p.name.as_deref(),
                        p.text.as_deref(),
                        p.info,
                        p.date.as_deref(),
                    )?)?)
                }
            },
        ),
        Capability::blocking(
            "delete_decision",
            "Delete a decision by id. Ask the user for confirmation first.",
            {
                let db = conn();
                move |p: IdParams| {
                    let guard = lock_db(&db)?;
                    let deleted = delete_decision(&guard, user_id, p.id)?;
                    Ok(json!({ "deleted": deleted }))
                }
            },
        ),
    ]
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

    #[test]
    fn name_must_be_a_short_sentence() {
        let (conn, uid) = setup();
        let err = create_decision(&conn, uid, "Switch", "Switched banks.", None, None);
        assert!(matches!(err, Err(Error::Validation(_))));

        let ok = create_decision(
            &conn,
            uid,
            "Switch the household savings to a different bank",
            "Better rates and an actual app.",
            None,
            None,
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn rename_goes_through_validation_again() {
        let (mut conn, uid) = setup();
        let d = create_decision(
            &conn,
            uid,
            "Stop renewing the unused gym membership next month",
            "It has gone unused since March.",
            None,
            None,
        )
        .unwrap();

        let err = update_decision(&mut conn, uid, d.id, Some("Gym"), None, None, None);
        assert!(matches!(err, Err(Error::Validation(_))));

        // the failed rename must not have touched the row
        let again = get_decision(&conn, uid, d.id).unwrap().unwrap();
        assert_eq!(again.name, d.name);
    }

    #[test]
    fn explicit_date_is_stored_as_midnight_utc() {
        let (conn, uid) = setup();
        let d = create_decision(
            &conn,
            uid,
            "Move the vegetable patch to the south corner",
            "More sun there.",
            None,
            Some("2026-03-05"),
        )
        .unwrap();
        assert!(d.date.starts_with("2026-03-05T00:00:00"));
    }

    #[test]
    fn by_date_and_range() {
        let (conn, uid) = setup();
        create_decision(
            &conn,
            uid,
            "Move the vegetable patch to the south corner",
            "",
            None,
            Some("2026-03-05"),
        )
        .unwrap();
        create_decision(
            &conn,
            uid,
            "Repaint the kitchen in a lighter shade of green",
            "",
            None,
            Some("2026-04-10"),
        )
        .unwrap();

        assert_eq!(decisions_by_date(&conn, uid, "2026-03-05").unwrap().len(), 1);
        assert_eq!(
            decisions_in_date_range(&conn, uid, "2026-03-01", "2026-04-30")
                .unwrap()
                .len(),
            2
        );
        assert!(decisions_by_date(&conn, uid, "bad-date").is_err());
    }

    #[test]
    fn keyword_search_covers_name_and_text() {
        let (conn, uid) = setup();
        create_decision(
            &conn,
            uid,
            "Switch the household savings to a different bank",
            "The old one kept raising fees.",
            None,
            None,
        )
        .unwrap();
        create_decision(
            &conn,
            uid,
            "Keep the current phone for another full year",
            "No bank-breaking upgrades worth it.",
            None,
            None,
        )
        .unwrap();

        assert_eq!(decisions_by_keyword(&conn, uid, "bank").unwrap().len(), 2);
    }

    #[test]
    fn nth_counts_back_from_most_recent() {
        let (conn, uid) = setup();
        for name in [
            "Move the vegetable patch to the south corner",
            "Repaint the kitchen in a lighter shade of green",
        ] {
            create_decision(&conn, uid, name, "", None, None).unwrap();
        }

        let first = nth_decision(&conn, uid, 1).unwrap().unwrap();
        assert!(first.name.starts_with("Repaint"));
        assert!(nth_decision(&conn, uid, 3).unwrap().is_none());
        assert!(nth_decision(&conn, uid, 0).is_err());
    }

    #[test]
    fn delete_returns_found_flag() {
        let (conn, uid) = setup();
        let d = create_decision(
            &conn,
            uid,
            "Stop renewing the unused gym membership next month",
            "",
            None,
            None,
        )
        .unwrap();
        assert!(delete_decision(&conn, uid, d.id).unwrap());
        assert!(!delete_decision(&conn, uid, d.id).unwrap());
    }
}
