#![allow(dead_code)]

use std::sync::Mutex;

use async_trait::async_trait;
use memoria::db;
use memoria::error::Result;
use memoria::provider::{CompletionBackend, CompletionRequest, CompletionTurn, ToolCallRequest};
use memoria::semantic::EMBEDDING_DIM;
use rusqlite::Connection;
use serde_json::{json, Value};

/// Open a fresh in-memory database with schema and migrations applied.
pub fn test_db() -> Connection {
    db::open_memory_database().unwrap()
}

/// Create a user and return its id.
pub fn test_user(conn: &Connection, email: &str) -> i64 {
    memoria::memory::users::ensure_user(conn, email, None)
        .unwrap()
        .id
}

/// A deterministic embedding with a spike at position `seed`. Distinct
/// seeds give distinct, orthogonal vectors.
pub fn spike(seed: usize) -> Vec<f32> {
    let mut v = vec![0.0f32; EMBEDDING_DIM];
    v[seed % EMBEDDING_DIM] = 1.0;
    v
}

/// Deterministic text-to-vector mapping: equal text embeds identically,
/// different text almost certainly differently.
pub fn text_embedding(text: &str) -> Vec<f32> {
    let seed = text.bytes().fold(0usize, |acc, b| {
        acc.wrapping_mul(31).wrapping_add(b as usize)
    });
    spike(seed)
}

/// A completion backend that replays a fixed script of turns and embeds
/// text deterministically. Once the script runs out it goes silent.
pub struct ScriptedBackend {
    turns: Mutex<Vec<CompletionTurn>>,
}

impl ScriptedBackend {
    pub fn new(turns: Vec<CompletionTurn>) -> Self {
        ScriptedBackend {
            turns: Mutex::new(turns),
        }
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    async fn complete(&self, _request: CompletionRequest) -> Result<CompletionTurn> {
        let mut turns = self.turns.lock().unwrap();
        if turns.is_empty() {
            Ok(CompletionTurn::default())
        } else {
            Ok(turns.remove(0))
        }
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(text_embedding(text))
    }
}

/// A scripted turn in which the model asks for one tool call.
pub fn tool_turn(name: &str, arguments: Value) -> CompletionTurn {
    CompletionTurn {
        content: None,
        tool_calls: vec![ToolCallRequest {
            id: format!("call_{name}"),
            name: name.to_string(),
            arguments: arguments.clone(),
            raw: json!({
                "id": format!("call_{name}"),
                "type": "function",
                "function": { "name": name, "arguments": arguments.to_string() },
            }),
        }],
    }
}

/// A scripted turn in which the model answers in plain content.
pub fn answer_turn(text: &str) -> CompletionTurn {
    CompletionTurn {
        content: Some(text.to_string()),
        tool_calls: vec![],
    }
}
