//! Project store — tasks and initiatives, scoped per user.

use rusqlite::{params, Connection, OptionalExtension};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;
use std::sync::{Arc, Mutex};

use crate::agent::capability::{lock_db, Capability, EmptyParams};
use crate::error::{Error, Result};
use crate::memory::people::{DateParams, DateRangeParams, IdParams, KeywordParams, LastNParams, NthParams};
use crate::memory::types::{Project, ProjectSummary};
use crate::memory::{date_to_timestamp, now_utc, parse_calendar_date};

const SELECT_COLS: &str = "id, user_id, title, status, description, info, last_updated";

fn map_project(row: &rusqlite::Row<'_>) -> rusqlite::Result<Project> {
    let info: String = row.get(5)?;
    Ok(Project {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        status: row.get(3)?,
        description: row.get(4)?,
        info: serde_json::from_str(&info).unwrap_or_else(|_| json!({})),
        last_updated: row.get(6)?,
    })
}

fn query_projects(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<Project>> {
    let mut stmt = conn.prepare(sql)?;
    let projects = stmt
        .query_map(params, map_project)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(projects)
}

/// Create a project. Status defaults to "idea".
pub fn create_project(
    conn: &Connection,
    user_id: i64,
    title: &str,
    description: Option<&str>,
    info: Option<serde_json::Value>,
    status: Option<&str>,
    last_updated: Option<&str>,
) -> Result<Project> {
    if title.trim().is_empty() {
        return Err(Error::Validation("project title must not be empty".into()));
    }
    let info = match info {
        Some(v) if !v.is_object() => {
            return Err(Error::Validation("info must be a JSON object".into()))
        }
        Some(v) => v,
        None => json!({}),
    };
    let updated = match last_updated {
        Some(s) => date_to_timestamp(s)?,
        None => now_utc(),
    };

    conn.execute(
        "INSERT INTO projects (user_id, title, status, description, info, last_updated) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            user_id,
            title.trim(),
            status.unwrap_or("idea"),
            description,
            info.to_string(),
            updated,
        ],
    )?;
    let id = conn.last_insert_rowid();
    tracing::info!(user_id, project_id = id, "project created");
    get_project(conn, user_id, id)?.ok_or(Error::NotFound("project"))
}

/// Fetch a project by id, scoped to the user.
pub fn get_project(conn: &Connection, user_id: i64, project_id: i64) -> Result<Option<Project>> {
    let project = conn
        .query_row(
            &format!("SELECT {SELECT_COLS} FROM projects WHERE id = ?1 AND user_id = ?2"),
            params![project_id, user_id],
            map_project,
        )
        .optional()?;
    Ok(project)
}

/// All projects, id/title/status/last_updated only.
pub fn list_projects(conn: &Connection, user_id: i64) -> Result<Vec<ProjectSummary>> {
    let mut stmt = conn.prepare(
        "SELECT id, title, status, last_updated FROM projects WHERE user_id = ?1 ORDER BY id",
    )?;
    let projects = stmt
        .query_map(params![user_id], |row| {
            Ok(ProjectSummary {
                id: row.get(0)?,
                title: row.get(1)?,
                status: row.get(2)?,
                last_updated: row.get(3)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(projects)
}

/// The `n` most recently created projects.
pub fn last_n_projects(conn: &Connection, user_id: i64, n: u32) -> Result<Vec<Project>> {
    query_projects(
        conn,
        &format!(
            "SELECT {SELECT_COLS} FROM projects WHERE user_id = ?1 ORDER BY id DESC LIMIT ?2"
        ),
        params![user_id, n],
    )
}

/// The `n` most recently updated projects.
pub fn last_n_projects_by_date(conn: &Connection, user_id: i64, n: u32) -> Result<Vec<Project>> {
    query_projects(
        conn,
        &format!(
            "SELECT {SELECT_COLS} FROM projects WHERE user_id = ?1 \
             ORDER BY last_updated DESC, id DESC LIMIT ?2"
        ),
        params![user_id, n],
    )
}

/// The nth project, 1-based, counting back from the most recently created.
pub fn nth_project(conn: &Connection, user_id: i64, n: u32) -> Result<Option<Project>> {
    if n == 0 {
        return Err(Error::Validation("n is 1-based and must be at least 1".into()));
    }
    let project = conn
        .query_row(
            &format!(
                "SELECT {SELECT_COLS} FROM projects WHERE user_id = ?1 \
                 ORDER BY id DESC LIMIT 1 OFFSET ?2"
            ),
            params![user_id, n - 1],
            map_project,
        )
        .optional()?;
    Ok(project)
}

/// Projects with exactly this status.
pub fn projects_by_status(conn: &Connection, user_id: i64, status: &str) -> Result<Vec<Project>> {
    query_projects(
        conn,
        &format!(
            "SELECT {SELECT_COLS} FROM projects WHERE user_id = ?1 AND status = ?2 ORDER BY id"
        ),
        params![user_id, status],
    )
}

/// Case-insensitive substring match on title.
pub fn projects_by_title(conn: &Connection, user_id: i64, title: &str) -> Result<Vec<Project>> {
    query_projects(
        conn,
        &format!(
            "SELECT {SELECT_COLS} FROM projects WHERE user_id = ?1 \
             AND title LIKE '%' || ?2 || '%' ORDER BY id"
        ),
        params![user_id, title],
    )
}

/// Case-insensitive substring match over title and description.
pub fn projects_by_keyword(conn: &Connection, user_id: i64, keyword: &str) -> Result<Vec<Project>> {
    query_projects(
        conn,
        &format!(
            "SELECT {SELECT_COLS} FROM projects WHERE user_id = ?1 \
             AND (title LIKE '%' || ?2 || '%' OR description LIKE '%' || ?2 || '%') ORDER BY id"
        ),
        params![user_id, keyword],
    )
}

/// Projects last updated on the given `YYYY-MM-DD` date.
pub fn projects_by_date(conn: &Connection, user_id: i64, date: &str) -> Result<Vec<Project>> {
    let date = parse_calendar_date(date)?;
    query_projects(
        conn,
        &format!(
            "SELECT {SELECT_COLS} FROM projects WHERE user_id = ?1 \
             AND date(last_updated) = ?2 ORDER BY id"
        ),
        params![user_id, date.to_string()],
    )
}

/// Projects last updated within an inclusive date range.
pub fn projects_in_date_range(
    conn: &Connection,
    user_id: i64,
    start: &str,
    end: &str,
) -> Result<Vec<Project>> {
    let start = parse_calendar_date(start)?;
    let end = parse_calendar_date(end)?;
    query_projects(
        conn,
        &format!(
            "SELECT {SELECT_COLS} FROM projects WHERE user_id = ?1 \
             AND date(last_updated) BETWEEN ?2 AND ?3 ORDER BY id"
        ),
        params![user_id, start.to_string(), end.to_string()],
    )
}

/// Partial update: omitted fields stay untouched. Always refreshes
/// `last_updated`, even for an empty update.
pub fn update_project(
    conn: &mut Connection,
    user_id: i64,
    project_id: i64,
    title: Option<&str>,
    description: Option<&str>,
    info: Option<serde_json::Value>,
    status: Option<&str>,
) -> Result<Project> {
    if let Some(ref v) = info {
        if !v.is_object() {
            return Err(Error::Validation("info must be a JSON object".into()));
        }
    }

    let tx = conn.transaction()?;
    let mut project = tx
        .query_row(
            &format!("SELECT {SELECT_COLS} FROM projects WHERE id = ?1 AND user_id = ?2"),
            params![project_id, user_id],
            map_project,
        )
        .optional()?
        .ok_or(Error::NotFound("project"))?;

    if let Some(title) = title {
        if title.trim().is_empty() {
            return Err(Error::Validation("project title must not be empty".into()));
        }
        project.title = title.trim().to_string();
    }
    if let Some(description) = description {
        project.description = Some(description.to_string());
    }
    if let Some(info) = info {
        project.info = info;
    }
    if let Some(status) = status {
        project.status = status.to_string();
    }
    project.last_updated = now_utc();

    tx.execute(
        "UPDATE projects SET title = ?1, status = ?2, description = ?3, info = ?4, \
         last_updated = ?5 WHERE id = ?6 AND user_id = ?7",
        params![
            project.title,
            project.status,
            project.description,
            project.info.to_string(),
            project.last_updated,
            project_id,
            user_id,
        ],
    )?;
    tx.commit()?;

    tracing::info!(user_id, project_id, "project updated");
    Ok(project)
}

/// Delete a project. Returns false when no such row belongs to the user.
pub fn delete_project(conn: &Connection, user_id: i64, project_id: i64) -> Result<bool> {
    let rows = conn.execute(
        "DELETE FROM projects WHERE id = ?1 AND user_id = ?2",
        params![project_id, user_id],
    )?;
    if rows > 0 {
        tracing::info!(user_id, project_id, "project deleted");
    }
    Ok(rows > 0)
}

// ── Capability table ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateProjectParams {
    pub title: String,
    pub description: Option<String>,
    #[schemars(description = "Additional attributes as a JSON object")]
    pub info: Option<serde_json::Value>,
    #[schemars(description = "Project status, e.g. \"idea\", \"active\", \"done\". Defaults to \"idea\".")]
    pub status: Option<String>,
    #[schemars(description = "When the project was last worked on, YYYY-MM-DD. Defaults to now.")]
    pub last_updated: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateProjectParams {
    pub id: i64,
    pub title: Option<String>,
    pub description: Option<String>,
    #[schemars(description = "Replacement for the additional attributes object")]
    pub info: Option<serde_json::Value>,
    pub status: Option<String>,
}

/// The project capability table, bound to one user.
pub fn capabilities(db: Arc<Mutex<Connection>>, user_id: i64) -> Vec<Capability> {
    let conn = move || db.clone();
    vec![
        Capability::blocking(
            "get_all_projects",
            "List every project: id, title, status, and last_updated only.",
            {
                let db = conn();
                move |_: EmptyParams| {
                    let guard = lock_db(&db)?;
                    Ok(serde_json::to_value(list_projects(&guard, user_id)?)?)
                }
            },
        ),
        Capability::blocking(
            "get_project_by_id",
            "Fetch the full record for one project by id.",
            {
                let db = conn();
                move |p: IdParams| {
                    let guard = lock_db(&db)?;
                    Ok(serde_json::to_value(get_project(&guard, user_id, p.id)?)?)
                }
            },
        ),
        Capability::blocking(
            "get_last_n_projects",
            "The n most recently created projects.",
            {
                let db = conn();
                move |p: LastNParams| {
                    let guard = lock_db(&db)?;
                    Ok(serde_json::to_value(last_n_projects(&guard, user_id, p.n.unwrap_or(5))?)?)
                }
            },
        ),
        Capability::blocking(
            "get_last_n_projects_by_date",
            "The n most recently updated projects.",
            {
                let db = conn();
                move |p: LastNParams| {
                    let guard = lock_db(&db)?;
                    Ok(serde_json::to_value(last_n_projects_by_date(
                        &guard,
                        user_id,
                        p.n.unwrap_or(5),
                    )?)?)
                }
            },
        ),
        Capability::blocking(
            "get_nth_project",
            "The nth project, 1-based, counting back from the most recently created.",
            {
                let db = conn();
                move |p: NthParams| {
                    let guard = lock_db(&db)?;
                    Ok(serde_json::to_value(nth_project(&guard, user_id, p.n)?)?)
                }
            },
        ),
        Capability::blocking(
            "get_project_by_status",
            "Projects with exactly this status. Try synonyms (e.g. \"active\", \"in progress\").",
            {
                let db = conn();
                move |p: KeywordParams| {
                    let guard = lock_db(&db)?;
                    Ok(serde_json::to_value(projects_by_status(&guard, user_id, &p.keyword)?)?)
                }
            },
        ),
        Capability::blocking(
            "get_project_by_title",
            "Projects whose title contains the keyword (case-insensitive).",
            {
                let db = conn();
                move |p: KeywordParams| {
                    let guard = lock_db(&db)?;
                    Ok(serde_json::to_value(projects_by_title(&guard, user_id, &p.keyword)?)?)
                }
            },
        ),
        Capability::blocking(
            "get_project_by_keyword",
            "Projects whose title or description contains the keyword (case-insensitive).",
            {
                let db = conn();
                move |p: KeywordParams| {
                    let guard = lock_db(&db)?;
                    Ok(serde_json::to_value(projects_by_keyword(&guard, user_id, &p.keyword)?)?)
                }
            },
        ),
        Capability::blocking(
            "get_project_by_date",
            "Projects last updated on a specific date.",
            {
                let db = conn();
                move |p: DateParams| {
                    let guard = lock_db(&db)?;
                    Ok(serde_json::to_value(projects_by_date(&guard, user_id, &p.date)?)?)
                }
            },
        ),
        Capability::blocking(
            "get_projects_in_date_range",
            "Projects last updated within an inclusive date range.",
            {
                let db = conn();
                move |p: DateRangeParams| {
                    let guard = lock_db(&db)?;
                    Ok(serde_json::to_value(projects_in_date_range(
                        &guard,
                        user_id,
                        &p.start_date,
                        &p.end_date,
                    )?)?)
                }
            },
        ),
        Capability::blocking(
            "create_project",
            "Record a new project when the user starts one.",
            {
                let db = conn();
                move |p: CreateProjectParams| {
                    let guard = lock_db(&db)?;
                    Ok(serde_json::to_value(create_project(
                        &guard,
                        user_id,
                        &p.title,
                        p.description.as_deref(),
                        p.info,
                        p.status.as_deref(),
                        p.last_updated.as_deref(),
                    )?)?)
                }
            },
        ),
        Capability::blocking(
            "update_project",
            "Update a project. Ask the user for confirmation before overwriting fields. Omitted fields are left untouched.",
            {
                let db = conn();
                move |p: UpdateProjectParams| {
                    let mut guard = lock_db(&db)?;
                    Ok(serde_json::to_value(update_project(
                        &mut guard,
                        user_id,
                        p.id,
                        p.title.as_deref(),
                        p.description.as_deref(),
                        p.info,
                        p.status.as_deref(),
                    )?)?)
                }
            },
        ),
        Capability::blocking(
            "delete_project",
            "Delete a project by id. Ask the user for confirmation first.",
            {
                let db = conn();
                move |p: IdParams| {
                    let guard = lock_db(&db)?;
                    let deleted = delete_project(&guard, user_id, p.id)?;
                    Ok(json!({ "deleted": deleted }))
                }
            },
        ),
    ]
}
