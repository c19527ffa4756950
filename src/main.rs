use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use memoria::cli;
use memoria::config::MemoriaConfig;

#[derive(Parser)]
#[command(name = "memoria", version, about = "Personal mind-palace agent with persistent memory")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Manage users
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Send one message to the agent
    Chat {
        /// Email of the user speaking
        #[arg(long)]
        user: String,
        /// The message
        message: String,
        /// Thread to continue; a new one is started when omitted
        #[arg(long)]
        thread: Option<String>,
        /// Provider family: openai, gemini, or groq
        #[arg(long, default_value = "openai")]
        provider: String,
        /// Chat model to use
        #[arg(long, default_value = "gpt-4o-mini")]
        model: String,
        /// Sampling temperature, 0 to 1
        #[arg(long)]
        temperature: Option<f64>,
        /// IANA timezone the user is in
        #[arg(long, default_value = "UTC")]
        timezone: String,
        /// Print every tool call the agent makes
        #[arg(long)]
        debug: bool,
    },
    /// Index a document into semantic memory under a source tag
    Ingest {
        /// Email of the owning user
        #[arg(long)]
        user: String,
        /// Source tag to file the document under
        #[arg(long, default_value = "documents")]
        source: String,
        /// Path to a UTF-8 text file
        file: std::path::PathBuf,
    },
    /// List a user's conversation threads
    Threads {
        #[arg(long)]
        user: String,
    },
    /// Show the full history of one thread
    History {
        #[arg(long)]
        user: String,
        thread: String,
    },
    /// Delete one thread's history
    ForgetThread {
        #[arg(long)]
        user: String,
        thread: String,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a user (idempotent)
    Add {
        email: String,
        #[arg(long)]
        name: Option<String>,
    },
    /// Show a user's record
    Show { email: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = MemoriaConfig::load()?;

    // Log to stderr so stdout stays clean for answers.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::User { action } => match action {
            UserAction::Add { email, name } => cli::user::add(&config, &email, name.as_deref())?,
            UserAction::Show { email } => cli::user::show(&config, &email)?,
        },
        Command::Chat {
            user,
            message,
            thread,
            provider,
            model,
            temperature,
            timezone,
            debug,
        } => {
            cli::chat::chat(
                config,
                cli::chat::ChatArgs {
                    email: user,
                    message,
                    thread,
                    provider,
                    model,
                    temperature,
                    timezone,
                    debug,
                },
            )
            .await?;
        }
        Command::Ingest { user, source, file } => {
            cli::ingest::ingest(config, cli::ingest::IngestArgs { email: user, source, file })
                .await?;
        }
        Command::Threads { user } => cli::threads::list(&config, &user)?,
        Command::History { user, thread } => cli::threads::history(&config, &user, &thread)?,
        Command::ForgetThread { user, thread } => cli::threads::forget(&config, &user, &thread)?,
    }

    Ok(())
}
