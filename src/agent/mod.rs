//! The agent: capability registry, per-request assembler, reasoning
//! loop, and the orchestrator that drives one conversation turn.

pub mod assembler;
pub mod capability;
pub mod executor;
pub mod palace;
pub mod prompt;

pub use capability::Capability;
pub use executor::{AgentRun, StepTrace, FALLBACK_ANSWER};
pub use palace::{MindPalace, RespondOutcome, RespondRequest};
