//! Error types for se-core

use thiserror::Error;

/// Main error type for se-core
#[derive(Error, Debug)]
pub enum Error {
    /// The only failure a resolve caller ever sees: the session could not
    /// be initialized because a collaborator was unreachable.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Gemini API error: {0}")]
    LlmApi(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for se-core
pub type Result<T> = std::result::Result<T, Error>;
