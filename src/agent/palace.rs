//! The orchestrator: one entry point that ties ledger, memory,
//! capabilities, and the reasoning loop together for a single turn.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use rusqlite::Connection;

use crate::agent::capability::lock_db;
use crate::agent::executor::{self, StepTrace, FALLBACK_ANSWER};
use crate::agent::{assembler, prompt};
use crate::config::MemoriaConfig;
use crate::error::{Error, Result};
use crate::ledger;
use crate::memory::types::Sender;
use crate::memory::users;
use crate::provider::{ChatMessage, CompletionBackend, ModelSelection};
use crate::timeutil::TimeTools;

#[derive(Debug, Clone)]
pub struct RespondRequest {
    pub user_id: i64,
    pub message: String,
    /// Raw thread id; a fresh one is minted when absent.
    pub thread_id: Option<String>,
    pub selection: ModelSelection,
    /// IANA timezone name for the user.
    pub timezone: String,
    pub debug: bool,
}

#[derive(Debug)]
pub struct RespondOutcome {
    pub answer: String,
    /// The namespaced thread id the turn was recorded under.
    pub thread_id: String,
    pub steps: Vec<StepTrace>,
}

pub struct MindPalace {
    db: Arc<Mutex<Connection>>,
    backend: Arc<dyn CompletionBackend>,
    config: MemoriaConfig,
}

impl MindPalace {
    pub fn new(
        db: Arc<Mutex<Connection>>,
        backend: Arc<dyn CompletionBackend>,
        config: MemoriaConfig,
    ) -> Self {
        MindPalace { db, backend, config }
    }

    pub fn db(&self) -> Arc<Mutex<Connection>> {
        self.db.clone()
    }

    async fn with_db<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = lock_db(&db)?;
            f(&mut guard)
        })
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "database task panicked");
            Error::Processing
        })?
    }

    /// Handle one user turn. Validation happens before anything is
    /// written; once the user's message is in the ledger, an answer is
    /// always recorded, falling back when the reasoning loop fails.
    pub async fn respond(&self, request: RespondRequest) -> Result<RespondOutcome> {
        request.selection.validate()?;
        let time = TimeTools::new(&request.timezone)?;

        let user_id = request.user_id;
        let user = self
            .with_db(move |conn| users::get_user(conn, user_id))
            .await?
            .ok_or(Error::NotFound("user"))?;

        let raw_thread = request
            .thread_id
            .unwrap_or_else(|| format!("chat-{}", Utc::now().format("%Y%m%d%H%M%S")));
        let thread_id = ledger::namespace_thread_id(user.id, &raw_thread);

        tracing::info!(user_id = user.id, thread_id, "handling turn");

        let message = request.message.clone();
        {
            let thread_id = thread_id.clone();
            self.with_db(move |conn| {
                ledger::append_message(conn, user_id, &thread_id, Sender::User, &message)
            })
            .await?;
        }

        let history = {
            let thread_id = thread_id.clone();
            self.with_db(move |conn| ledger::thread_history(conn, user_id, &thread_id))
                .await?
        };

        let mut messages = vec![ChatMessage::system(prompt::system_prompt(
            &request.timezone,
            &time.now_local().to_rfc3339(),
        ))];
        messages.extend(history.into_iter().map(|m| match m.sender {
            Sender::User => ChatMessage::user(m.message),
            Sender::Ai => ChatMessage::assistant(m.message),
        }));

        let capabilities = assembler::assemble(
            self.db.clone(),
            self.backend.clone(),
            user.id,
            time,
            self.config.chunking.clone(),
        );

        let (answer, steps) = match executor::run(
            self.backend.as_ref(),
            &request.selection,
            &capabilities,
            messages,
            self.config.agent.max_steps,
            request.debug,
        )
        .await
        {
            Ok(run) => (run.answer, run.steps),
            // The user's turn is already in the ledger; record a failure
            // answer instead of leaving the thread dangling.
            Err(e) => {
                tracing::error!(user_id = user.id, error = %e, "reasoning loop failed");
                (FALLBACK_ANSWER.to_string(), Vec::new())
            }
        };

        {
            let thread_id = thread_id.clone();
            let answer = answer.clone();
            self.with_db(move |conn| {
                ledger::append_message(conn, user_id, &thread_id, Sender::Ai, &answer)
            })
            .await?;
        }

        Ok(RespondOutcome {
            answer,
            thread_id,
            steps,
        })
    }
}
