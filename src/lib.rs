//! Memoria — a personal mind-palace agent with persistent, structured
//! memory.
//!
//! Memoria keeps what a user tells it in four places and lets a chat
//! model consult and maintain them through tool calls:
//!
//! | Store | Holds |
//! |-------|-------|
//! | **People** | Everyone the user mentions, with notes and a special "Self" record |
//! | **Projects** | Things the user is working on, with status and freshness |
//! | **Decisions** | Choices the user has made, named by a summary sentence |
//! | **Semantic** | Everything else, chunked and embedded for recall by meaning |
//!
//! # Architecture
//!
//! - **Storage**: SQLite with [sqlite-vec](https://github.com/asg017/sqlite-vec)
//!   for vector search, partitioned per user
//! - **Embeddings**: OpenAI `text-embedding-3-small` (1536 dimensions)
//! - **Reasoning**: a bounded tool-calling loop over any OpenAI-compatible
//!   chat model (OpenAI, Gemini, or Groq)
//!
//! # Modules
//!
//! - [`config`] — Configuration loading from TOML files and environment variables
//! - [`db`] — SQLite database initialization, schema, and migrations
//! - [`memory`] — Structured stores: users, people, projects, decisions
//! - [`semantic`] — Chunked, embedded free-form memory
//! - [`ledger`] — Conversation history grouped into per-user threads
//! - [`provider`] — Completion and embedding provider clients
//! - [`agent`] — Capability registry, reasoning loop, and orchestrator

pub mod agent;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod ledger;
pub mod memory;
pub mod provider;
pub mod semantic;
pub mod timeutil;

pub use error::{Error, Result};
