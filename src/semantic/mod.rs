//! Semantic memory: free-form text chunked, embedded, and indexed in a
//! sqlite-vec vec0 table for KNN retrieval.
//!
//! The vector table is partitioned by `user_id` and carries `source` as
//! metadata, so every query is tenant-scoped in the index itself rather
//! than filtered after the fact. Memories stored in conversation live under
//! the [`PALACE_SOURCE`] tag; documents ingested from the CLI carry a tag
//! of their own and are reachable through `search_memory`'s `source` field.

pub mod chunker;

use std::sync::{Arc, Mutex};

use rusqlite::{params, Connection};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::agent::capability::{lock_db, Capability};
use crate::config::ChunkingConfig;
use crate::error::{Error, Result};
use crate::memory::now_utc;
use crate::provider::CompletionBackend;

/// Embedding width for text-embedding-3-small.
pub const EMBEDDING_DIM: usize = 1536;

/// Source tag for memories the agent stores on the user's behalf.
pub const PALACE_SOURCE: &str = "mind_palace";

const DEFAULT_K: u32 = 5;

/// Convert an f32 embedding slice to raw bytes for sqlite-vec.
pub fn embedding_to_bytes(embedding: &[f32]) -> &[u8] {
    unsafe {
        std::slice::from_raw_parts(
            embedding.as_ptr() as *const u8,
            embedding.len() * std::mem::size_of::<f32>(),
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SemanticHit {
    pub chunk_id: i64,
    pub content: String,
    pub source: String,
    pub distance: f64,
}

fn ensure_dim(embedding: &[f32]) -> Result<()> {
    if embedding.len() != EMBEDDING_DIM {
        tracing::error!(
            got = embedding.len(),
            expected = EMBEDDING_DIM,
            "embedding dimension mismatch"
        );
        return Err(Error::Processing);
    }
    Ok(())
}

/// Insert chunk rows and their vectors in one transaction.
pub fn store_chunks(
    conn: &mut Connection,
    user_id: i64,
    source: &str,
    chunks: &[(String, Vec<f32>)],
) -> Result<usize> {
    let tx = conn.transaction()?;
    for (content, embedding) in chunks {
        ensure_dim(embedding)?;
        tx.execute(
            "INSERT INTO chunks (user_id, source, content, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![user_id, source, content, now_utc()],
        )?;
        let chunk_id = tx.last_insert_rowid();
        tx.execute(
            "INSERT INTO chunks_vec (chunk_id, embedding, user_id, source) \
             VALUES (?1, ?2, ?3, ?4)",
            params![chunk_id, embedding_to_bytes(embedding), user_id, source],
        )?;
    }
    tx.commit()?;
    tracing::info!(user_id, source, chunks = chunks.len(), "semantic memory stored");
    Ok(chunks.len())
}

/// KNN over the user's chunks with the given source tag. An empty index
/// just returns no hits.
pub fn knn_search(
    conn: &Connection,
    user_id: i64,
    source: &str,
    query_embedding: &[f32],
    k: u32,
) -> Result<Vec<SemanticHit>> {
    ensure_dim(query_embedding)?;
    let mut stmt = conn.prepare(
        "SELECT v.chunk_id, c.content, c.source, v.distance \
         FROM chunks_vec v JOIN chunks c ON c.id = v.chunk_id \
         WHERE v.embedding MATCH ?1 AND v.user_id = ?2 AND v.source = ?3 AND v.k = ?4 \
         ORDER BY v.distance",
    )?;
    let hits = stmt
        .query_map(
            params![embedding_to_bytes(query_embedding), user_id, source, k],
            |row| {
                Ok(SemanticHit {
                    chunk_id: row.get(0)?,
                    content: row.get(1)?,
                    source: row.get(2)?,
                    distance: row.get(3)?,
                })
            },
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(hits)
}

/// Chunk, embed, and index a piece of text for later recall.
pub async fn remember(
    db: Arc<Mutex<Connection>>,
    backend: Arc<dyn CompletionBackend>,
    user_id: i64,
    source: String,
    text: String,
    chunking: ChunkingConfig,
) -> Result<usize> {
    let pieces = chunker::chunk_text(&text, chunking.chunk_size, chunking.chunk_overlap);
    if pieces.is_empty() {
        return Ok(0);
    }

    let mut chunks = Vec::with_capacity(pieces.len());
    for piece in pieces {
        let embedding = backend.embed(&piece).await?;
        chunks.push((piece, embedding));
    }

    tokio::task::spawn_blocking(move || {
        let mut guard = lock_db(&db)?;
        store_chunks(&mut guard, user_id, &source, &chunks)
    })
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "semantic store task panicked");
        Error::Processing
    })?
}

/// Embed the query and search the user's index.
pub async fn search(
    db: Arc<Mutex<Connection>>,
    backend: Arc<dyn CompletionBackend>,
    user_id: i64,
    source: String,
    query: String,
    k: u32,
) -> Result<Vec<SemanticHit>> {
    let embedding = backend.embed(&query).await?;
    tokio::task::spawn_blocking(move || {
        let guard = lock_db(&db)?;
        knn_search(&guard, user_id, &source, &embedding, k)
    })
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "semantic search task panicked");
        Error::Processing
    })?
}

// ── Capability table ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AddMemoryParams {
    #[schemars(description = "The text to remember, verbatim")]
    pub text: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchMemoryParams {
    #[schemars(description = "What to look for, phrased as a question or topic")]
    pub query: String,
    #[schemars(description = "How many matches to return. Defaults to 5.")]
    pub k: Option<u32>,
    #[schemars(
        description = "Which index to search: 'mind_palace' (the default) for memories \
                       stored in conversation, or the source tag of an ingested document."
    )]
    pub source: Option<String>,
}

/// Resolve an optional source tag, falling back to the palace index.
fn resolve_source(source: Option<String>) -> String {
    match source {
        Some(s) if !s.trim().is_empty() => s.trim().to_string(),
        _ => PALACE_SOURCE.to_string(),
    }
}

/// The semantic memory capability table, bound to one user.
pub fn capabilities(
    db: Arc<Mutex<Connection>>,
    backend: Arc<dyn CompletionBackend>,
    user_id: i64,
    chunking: ChunkingConfig,
) -> Vec<Capability> {
    vec![
        Capability::new(
            "add_memory",
            "Store free-form information that doesn't fit people, projects, or decisions, for later semantic recall.",
            {
                let db = db.clone();
                let backend = backend.clone();
                let chunking = chunking.clone();
                move |p: AddMemoryParams| {
                    let db = db.clone();
                    let backend = backend.clone();
                    let chunking = chunking.clone();
                    async move {
                        let stored = remember(
                            db,
                            backend,
                            user_id,
                            PALACE_SOURCE.to_string(),
                            p.text,
                            chunking,
                        )
                        .await?;
                        Ok(json!({ "chunks_stored": stored }))
                    }
                }
            },
        ),
        Capability::new(
            "search_memory",
            "Recall free-form memories or ingested documents by meaning, not exact wording.",
            move |p: SearchMemoryParams| {
                let db = db.clone();
                let backend = backend.clone();
                async move {
                    let hits = search(
                        db,
                        backend,
                        user_id,
                        resolve_source(p.source),
                        p.query,
                        p.k.unwrap_or(DEFAULT_K),
                    )
                    .await?;
                    Ok(serde_json::to_value(hits)?)
                }
            },
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn spike(dim_at: usize) -> Vec<f32> {
        let mut v = vec![0.0; EMBEDDING_DIM];
        v[dim_at] = 1.0;
        v
    }

    fn setup() -> (Connection, i64) {
        let conn = db::open_memory_database().unwrap();
        let user = crate::memory::users::ensure_user(&conn, "t@example.com", None).unwrap();
        (conn, user.id)
    }

    #[test]
    fn stored_chunks_come_back_nearest_first() {
        let (mut conn, uid) = setup();
        store_chunks(
            &mut conn,
            uid,
            PALACE_SOURCE,
            &[
                ("likes hiking".to_string(), spike(0)),
                ("allergic to peanuts".to_string(), spike(7)),
            ],
        )
        .unwrap();

        let hits = knn_search(&conn, uid, PALACE_SOURCE, &spike(7), 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].content, "allergic to peanuts");
        assert!(hits[0].distance < hits[1].distance);
    }

    #[test]
    fn search_is_tenant_isolated() {
        let (mut conn, uid) = setup();
        let other = crate::memory::users::ensure_user(&conn, "o@example.com", None).unwrap();
        store_chunks(
            &mut conn,
            other.id,
            PALACE_SOURCE,
            &[("their secret".to_string(), spike(3))],
        )
        .unwrap();

        let hits = knn_search(&conn, uid, PALACE_SOURCE, &spike(3), 5).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn search_is_source_scoped() {
        let (mut conn, uid) = setup();
        store_chunks(&mut conn, uid, "documents", &[("doc text".to_string(), spike(1))]).unwrap();

        assert!(knn_search(&conn, uid, PALACE_SOURCE, &spike(1), 5).unwrap().is_empty());
        assert_eq!(knn_search(&conn, uid, "documents", &spike(1), 5).unwrap().len(), 1);
    }

    #[test]
    fn empty_index_returns_empty_not_error() {
        let (conn, uid) = setup();
        let hits = knn_search(&conn, uid, PALACE_SOURCE, &spike(0), 5).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn blank_source_falls_back_to_the_palace_index() {
        assert_eq!(resolve_source(None), PALACE_SOURCE);
        assert_eq!(resolve_source(Some("  ".into())), PALACE_SOURCE);
        assert_eq!(resolve_source(Some(" manuals ".into())), "manuals");
    }

    #[test]
    fn wrong_dimension_is_rejected() {
        let (mut conn, uid) = setup();
        let err = store_chunks(&mut conn, uid, PALACE_SOURCE, &[("x".to_string(), vec![1.0])]);
        assert!(matches!(err, Err(Error::Processing)));
    }
}
