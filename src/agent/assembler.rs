//! Builds the full capability table for one request.

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::agent::capability::Capability;
use crate::config::ChunkingConfig;
use crate::provider::CompletionBackend;
use crate::timeutil::TimeTools;
use crate::{memory, semantic, timeutil};

/// Everything the agent can do for this user, assembled fresh per
/// request: structured memory, semantic memory, and time conversion.
pub fn assemble(
    db: Arc<Mutex<Connection>>,
    backend: Arc<dyn CompletionBackend>,
    user_id: i64,
    time: TimeTools,
    chunking: ChunkingConfig,
) -> Vec<Capability> {
    let mut capabilities = memory::people::capabilities(db.clone(), user_id);
    capabilities.extend(memory::projects::capabilities(db.clone(), user_id));
    capabilities.extend(memory::decisions::capabilities(db.clone(), user_id));
    capabilities.extend(semantic::capabilities(db, backend, user_id, chunking));
    capabilities.extend(timeutil::capabilities(time));
    capabilities
}
