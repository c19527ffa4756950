//! Error taxonomy for memoria.
//!
//! Core modules return [`Error`]; the CLI boundary converts to `anyhow`.
//! Database and serialization failures collapse into the opaque
//! [`Error::Processing`] at the point of conversion, with full detail
//! kept in server-side logs.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Bad input shape or range (decision-name word count, temperature
    /// out of range, malformed tool arguments).
    #[error("validation error: {0}")]
    Validation(String),

    /// The id does not exist — or belongs to another user. The message
    /// never distinguishes the two.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Unsupported provider or model selection.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Malformed date or datetime string.
    #[error("parse error: {0}")]
    Parse(String),

    /// Timeout or rate limit from the completion/embedding provider.
    /// Retried with bounded attempts before surfacing.
    #[error("provider error: {0}")]
    Transient(String),

    /// Generic failure surfaced to the caller with no internal detail.
    #[error("an error occurred while processing your request")]
    Processing,
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        tracing::error!(error = %e, "database error");
        Error::Processing
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        tracing::error!(error = %e, "serialization error");
        Error::Processing
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn processing_message_leaks_no_detail() {
        let err: Error = rusqlite::Error::QueryReturnedNoRows.into();
        assert_eq!(
            err.to_string(),
            "an error occurred while processing your request"
        );
    }

    #[test]
    fn not_found_names_only_the_entity_kind() {
        assert_eq!(Error::NotFound("person").to_string(), "person not found");
    }
}
