use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{bail, Context, Result};

use crate::config::MemoriaConfig;
use crate::provider::{OpenAiCompatibleBackend, Provider};
use crate::semantic;

pub struct IngestArgs {
    pub email: String,
    pub source: String,
    pub file: PathBuf,
}

/// Chunk and embed a document into the user's semantic index under its own
/// source tag, reachable through `search_memory`'s `source` field.
pub async fn ingest(config: MemoriaConfig, args: IngestArgs) -> Result<()> {
    let source = args.source.trim();
    if source.is_empty() {
        bail!("--source must not be empty");
    }
    if source == semantic::PALACE_SOURCE {
        bail!("'{}' is reserved for memories the agent stores itself", semantic::PALACE_SOURCE);
    }

    let text = std::fs::read_to_string(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;

    let conn = super::open_db(&config)?;
    let user = super::require_user(&conn, &args.email)?;

    // Embeddings always go through the OpenAI-compatible endpoint.
    let backend = OpenAiCompatibleBackend::from_config(&config, Provider::OpenAi)
        .context("failed to build embedding client")?;

    let chunking = config.chunking.clone();
    let stored = semantic::remember(
        Arc::new(Mutex::new(conn)),
        Arc::new(backend),
        user.id,
        source.to_string(),
        text,
        chunking,
    )
    .await?;

    println!(
        "Ingested {stored} chunks from {} under source '{source}'",
        args.file.display()
    );
    Ok(())
}
