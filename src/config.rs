use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::Error;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MemoriaConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub agent: AgentConfig,
    pub embedding: EmbeddingConfig,
    pub chunking: ChunkingConfig,
    pub providers: ProvidersConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AgentConfig {
    /// Upper bound on think/act/observe iterations per user turn.
    pub max_steps: usize,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    pub default_temperature: f64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ProvidersConfig {
    pub openai_base_url: String,
    pub gemini_base_url: String,
    pub groq_base_url: String,
}

impl Default for MemoriaConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            agent: AgentConfig::default(),
            embedding: EmbeddingConfig::default(),
            chunking: ChunkingConfig::default(),
            providers: ProvidersConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_memoria_dir()
            .join("memoria.db")
            .to_string_lossy()
            .into_owned();
        Self { db_path }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: 15,
            request_timeout_secs: 60,
            max_retries: 3,
            default_temperature: 0.3,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".into(),
            model: "text-embedding-3-small".into(),
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            chunk_overlap: 200,
        }
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            openai_base_url: "https://api.openai.com/v1".into(),
            gemini_base_url: "https://generativelanguage.googleapis.com/v1beta/openai".into(),
            groq_base_url: "https://api.groq.com/openai/v1".into(),
        }
    }
}

/// Returns `~/.memoria/`
pub fn default_memoria_dir() -> PathBuf {
    dirs::home_dir()
        .expect("home directory must exist")
        .join(".memoria")
}

/// Returns the default config file path: `~/.memoria/config.toml`
pub fn default_config_path() -> PathBuf {
    default_memoria_dir().join("config.toml")
}

impl MemoriaConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            MemoriaConfig::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides (MEMORIA_DB, MEMORIA_LOG_LEVEL).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("MEMORIA_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("MEMORIA_LOG_LEVEL") {
            self.server.log_level = val;
        }
    }

    /// Reject configurations the rest of the system assumes away.
    pub fn validate(&self) -> Result<(), Error> {
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(Error::Configuration(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }
        if self.agent.max_steps == 0 {
            return Err(Error::Configuration(
                "agent.max_steps must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir()
            .expect("home directory must exist")
            .join(rest)
    } else {
        PathBuf::from(path)
    }
}
