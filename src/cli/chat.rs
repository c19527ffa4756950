use std::str::FromStr;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};

use crate::agent::{MindPalace, RespondRequest};
use crate::config::MemoriaConfig;
use crate::provider::{ModelSelection, OpenAiCompatibleBackend, Provider};

pub struct ChatArgs {
    pub email: String,
    pub message: String,
    pub thread: Option<String>,
    pub provider: String,
    pub model: String,
    pub temperature: Option<f64>,
    pub timezone: String,
    pub debug: bool,
}

/// Send one message through the agent and print the answer.
pub async fn chat(config: MemoriaConfig, args: ChatArgs) -> Result<()> {
    let provider = Provider::from_str(&args.provider)?;
    let selection = ModelSelection::new(
        provider,
        args.model,
        args.temperature.unwrap_or(config.agent.default_temperature),
    );
    selection.validate()?;

    let conn = super::open_db(&config)?;
    let user = super::require_user(&conn, &args.email)?;

    let backend = OpenAiCompatibleBackend::from_config(&config, provider)
        .context("failed to build provider client")?;
    let palace = MindPalace::new(Arc::new(Mutex::new(conn)), Arc::new(backend), config);

    let outcome = palace
        .respond(RespondRequest {
            user_id: user.id,
            message: args.message,
            thread_id: args.thread,
            selection,
            timezone: args.timezone,
            debug: args.debug,
        })
        .await?;

    if args.debug {
        for (i, step) in outcome.steps.iter().enumerate() {
            eprintln!("step {}: {} {}", i + 1, step.tool, step.arguments);
            eprintln!("  -> {}", step.result);
        }
    }
    println!("{}", outcome.answer);
    Ok(())
}
