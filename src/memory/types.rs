//! Entity definitions for the structured memory store.
//!
//! Defines [`Person`], [`Project`], and [`Decision`] records with their
//! summary projections, the [`Sender`] of a conversation turn, and
//! [`NotesUpdate`] (the three explicit note-editing modes).

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A fact about someone the user knows. The user's own profile is the row
/// with `is_self` set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Person {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    /// Ordered free-text notes.
    pub notes: Vec<String>,
    /// Open-ended attributes; the "relationship" key records how this
    /// person relates to the user.
    pub info: serde_json::Value,
    pub is_self: bool,
    /// RFC 3339 timestamp, refreshed on every update.
    pub last_mentioned: String,
}

/// Compact projection used by list-all, to bound payload size.
#[derive(Debug, Clone, Serialize)]
pub struct PersonSummary {
    pub id: i64,
    pub name: String,
    pub last_mentioned: String,
    pub relationship: String,
}

/// A task or initiative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    /// Free-form status, "idea" when unspecified.
    pub status: String,
    pub description: Option<String>,
    pub info: serde_json::Value,
    /// RFC 3339 timestamp, refreshed on every update.
    pub last_updated: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectSummary {
    pub id: i64,
    pub title: String,
    pub status: String,
    pub last_updated: String,
}

/// A recorded choice. The name is validated to 5–15 words.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub text: String,
    pub info: serde_json::Value,
    /// RFC 3339 timestamp — creation time unless an explicit date was given.
    pub date: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DecisionSummary {
    pub id: i64,
    pub name: String,
    pub date: String,
}

/// The three explicit note-editing modes for `update_person`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "action", content = "data", rename_all = "snake_case")]
pub enum NotesUpdate {
    /// Append notes to the end of the list.
    Append(Vec<String>),
    /// Replace the whole list.
    Replace(Vec<String>),
    /// Remove notes by 0-based index. Indexes are applied highest-first so
    /// earlier removals don't shift later ones.
    Delete(Vec<usize>),
}

impl NotesUpdate {
    /// Apply this update to an existing notes list.
    pub fn apply(self, notes: &mut Vec<String>) {
        match self {
            NotesUpdate::Append(new) => notes.extend(new),
            NotesUpdate::Replace(new) => *notes = new,
            NotesUpdate::Delete(mut indexes) => {
                indexes.sort_unstable();
                indexes.dedup();
                for index in indexes.into_iter().rev() {
                    if index < notes.len() {
                        notes.remove(index);
                    }
                }
            }
        }
    }
}

/// Sender of one conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
    Ai,
}

impl Sender {
    /// SQL-compatible string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Ai => "ai",
        }
    }
}

impl std::fmt::Display for Sender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Sender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "ai" => Ok(Self::Ai),
            _ => Err(format!("unknown sender: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notes_append() {
        let mut notes = vec!["a".to_string()];
        NotesUpdate::Append(vec!["b".into(), "c".into()]).apply(&mut notes);
        assert_eq!(notes, ["a", "b", "c"]);
    }

    #[test]
    fn notes_replace() {
        let mut notes = vec!["a".to_string(), "b".to_string()];
        NotesUpdate::Replace(vec!["x".into()]).apply(&mut notes);
        assert_eq!(notes, ["x"]);
    }

    #[test]
    fn notes_delete_applies_indexes_high_to_low() {
        let mut notes: Vec<String> =
            ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect();
        // Given in ascending order, naive left-to-right removal would shift
        // index 2 onto "d". High-to-low removal deletes "a" and "c".
        NotesUpdate::Delete(vec![0, 2]).apply(&mut notes);
        assert_eq!(notes, ["b", "d"]);
    }

    #[test]
    fn notes_delete_ignores_out_of_range() {
        let mut notes = vec!["a".to_string()];
        NotesUpdate::Delete(vec![5, 0]).apply(&mut notes);
        assert!(notes.is_empty());
    }

    #[test]
    fn notes_update_parses_tool_json() {
        let update: NotesUpdate =
            serde_json::from_value(serde_json::json!({"action": "delete", "data": [1, 0]}))
                .unwrap();
        assert!(matches!(update, NotesUpdate::Delete(_)));
    }

    #[test]
    fn sender_round_trips() {
        for s in [Sender::User, Sender::Ai] {
            assert_eq!(s.as_str().parse::<Sender>().unwrap(), s);
        }
        assert!("robot".parse::<Sender>().is_err());
    }
}
